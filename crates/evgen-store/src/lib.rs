//! Event and profile collaborators consumed by the generation pipeline.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use evgen_core::{DomainEvent, Profile};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

pub const CRATE_NAME: &str = "evgen-store";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user {0} not found")]
    UserNotFound(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn add_event(&self, event: DomainEvent) -> Result<(), StoreError>;

    async fn get_all_events(&self) -> Result<Vec<DomainEvent>, StoreError>;

    /// Stores a batch of generated events and returns them with their
    /// assigned ids.
    async fn persist_ai_events(
        &self,
        events: Vec<DomainEvent>,
    ) -> Result<Vec<DomainEvent>, StoreError>;
}

#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn get_user(&self, id: &str) -> Result<Profile, StoreError>;
}

fn assign_id(mut event: DomainEvent) -> DomainEvent {
    if event.id.is_empty() {
        event.id = Uuid::new_v4().to_string();
    }
    event
}

#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: Mutex<Vec<DomainEvent>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.events.lock().await.len()
    }
}

#[async_trait]
impl EventRepository for MemoryEventStore {
    async fn add_event(&self, event: DomainEvent) -> Result<(), StoreError> {
        self.events.lock().await.push(assign_id(event));
        Ok(())
    }

    async fn get_all_events(&self) -> Result<Vec<DomainEvent>, StoreError> {
        Ok(self.events.lock().await.clone())
    }

    async fn persist_ai_events(
        &self,
        events: Vec<DomainEvent>,
    ) -> Result<Vec<DomainEvent>, StoreError> {
        let stored: Vec<_> = events.into_iter().map(assign_id).collect();
        self.events.lock().await.extend(stored.iter().cloned());
        Ok(stored)
    }
}

/// Events kept as one JSON array on disk, rewritten atomically on every
/// mutation.
#[derive(Debug)]
pub struct FileEventStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileEventStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> anyhow::Result<Vec<DomainEvent>> {
        if !fs::try_exists(&self.path)
            .await
            .with_context(|| format!("checking event file {}", self.path.display()))?
        {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading {}", self.path.display()))?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&text).with_context(|| format!("parsing {}", self.path.display()))
    }

    async fn save(&self, events: &[DomainEvent]) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec_pretty(events).context("serializing events")?;
        write_atomically(&self.path, &bytes).await
    }
}

#[async_trait]
impl EventRepository for FileEventStore {
    async fn add_event(&self, event: DomainEvent) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut events = self.load().await?;
        let event = assign_id(event);
        debug!(id = %event.id, path = %self.path.display(), "storing event");
        events.push(event);
        self.save(&events).await?;
        Ok(())
    }

    async fn get_all_events(&self) -> Result<Vec<DomainEvent>, StoreError> {
        Ok(self.load().await?)
    }

    async fn persist_ai_events(
        &self,
        events: Vec<DomainEvent>,
    ) -> Result<Vec<DomainEvent>, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.load().await?;
        let stored: Vec<_> = events.into_iter().map(assign_id).collect();
        all.extend(stored.iter().cloned());
        self.save(&all).await?;
        Ok(stored)
    }
}

/// Temp file in the target directory, then rename over the target.
async fn write_atomically(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)
        .await
        .with_context(|| format!("creating directory {}", parent.display()))?;

    let temp_path = parent.join(format!(".{}.{}.tmp", Uuid::new_v4(), bytes.len()));
    let mut file = fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(&temp_path)
        .await
        .with_context(|| format!("opening temp file {}", temp_path.display()))?;
    file.write_all(bytes)
        .await
        .with_context(|| format!("writing temp file {}", temp_path.display()))?;
    file.flush()
        .await
        .with_context(|| format!("flushing temp file {}", temp_path.display()))?;
    drop(file);

    if let Err(err) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(err).with_context(|| {
            format!(
                "atomically renaming {} -> {}",
                temp_path.display(),
                path.display()
            )
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct MemoryProfileDirectory {
    profiles: HashMap<String, Profile>,
}

impl MemoryProfileDirectory {
    pub fn from_profiles(profiles: impl IntoIterator<Item = Profile>) -> Self {
        Self {
            profiles: profiles.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    /// Loads a JSON array of profiles.
    pub async fn load_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let profiles: Vec<Profile> =
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        Ok(Self::from_profiles(profiles))
    }

    pub fn insert(&mut self, profile: Profile) {
        self.profiles.insert(profile.id.clone(), profile);
    }
}

#[async_trait]
impl ProfileDirectory for MemoryProfileDirectory {
    async fn get_user(&self, id: &str) -> Result<Profile, StoreError> {
        self.profiles
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::UserNotFound(id.to_string()))
    }
}
