use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::{Args, Parser, Subcommand};
use evgen_core::{
    ContextConfig, Coordinates, GenerationQuery, TaskConfig, ViewportSnapshot, DEFAULT_TIME_FRAME,
};
use evgen_pipeline::PipelineConfig;
use evgen_store::{EventRepository, FileEventStore, MemoryProfileDirectory, ProfileDirectory};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "evgen")]
#[command(about = "Generate map events with a chat-completion model")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the structured-output schema sent with every request.
    Schema,
    /// Print the chat messages that would be sent for a user.
    Prompt(QueryArgs),
    /// Parse a saved model reply; `-` reads stdin.
    Parse { input: PathBuf },
    /// Run one ungated generation and print the outcome.
    Generate {
        #[command(flatten)]
        query: QueryArgs,
        /// Append the valid events to EVGEN_EVENTS_FILE.
        #[arg(long)]
        persist: bool,
    },
    /// Run the gated pipeline for a viewport and store the results.
    MaybeGenerate(ViewportArgs),
}

#[derive(Debug, Args)]
struct ProfileArgs {
    /// JSON array of user profiles.
    #[arg(long, default_value = "fixtures/profiles.json")]
    profiles: PathBuf,
    #[arg(long)]
    user: String,
}

#[derive(Debug, Args)]
struct QueryArgs {
    #[command(flatten)]
    profile: ProfileArgs,
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    lat: Option<f64>,
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lon: Option<f64>,
    #[arg(long)]
    radius_km: Option<f64>,
    #[arg(long)]
    count: Option<u32>,
    #[arg(long)]
    time_frame: Option<String>,
}

#[derive(Debug, Args)]
struct ViewportArgs {
    #[command(flatten)]
    profile: ProfileArgs,
    #[arg(long, allow_negative_numbers = true)]
    camera_lat: f64,
    #[arg(long, allow_negative_numbers = true)]
    camera_lon: f64,
    #[arg(long, requires = "user_lon", allow_negative_numbers = true)]
    user_lat: Option<f64>,
    #[arg(long, requires = "user_lat", allow_negative_numbers = true)]
    user_lon: Option<f64>,
    #[arg(long, default_value_t = 14.0)]
    zoom: f64,
    /// Events already visible in the viewport.
    #[arg(long, default_value_t = 0)]
    existing: usize,
    /// RFC 3339 timestamp of the previous generation.
    #[arg(long)]
    last_generation: Option<DateTime<Utc>>,
}

impl QueryArgs {
    fn context(&self) -> ContextConfig {
        let mut context = match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => ContextConfig {
                location_name: None,
                coordinates: Some(Coordinates::new(lat, lon)),
                radius_km: None,
                time_frame: Some(DEFAULT_TIME_FRAME.to_string()),
            },
            _ => ContextConfig::default(),
        };
        if self.radius_km.is_some() {
            context.radius_km = self.radius_km;
        }
        if let Some(frame) = &self.time_frame {
            context.time_frame = Some(frame.clone());
        }
        context
    }

    async fn query(&self) -> Result<GenerationQuery> {
        let profiles = load_profiles(&self.profile.profiles).await?;
        let profile = profiles
            .get_user(&self.profile.user)
            .await
            .with_context(|| format!("looking up user {}", self.profile.user))?;
        Ok(GenerationQuery::new(profile)
            .with_task(TaskConfig {
                count: self.count,
                ..TaskConfig::default()
            })
            .with_context(self.context()))
    }
}

impl ViewportArgs {
    fn viewport(&self) -> ViewportSnapshot {
        ViewportSnapshot {
            user_location: self.user_lat.zip(self.user_lon).map(|(lat, lon)| Coordinates::new(lat, lon)),
            camera_center: Coordinates::new(self.camera_lat, self.camera_lon),
            zoom: self.zoom,
            bounds: None,
        }
    }
}

async fn load_profiles(path: &Path) -> Result<MemoryProfileDirectory> {
    MemoryProfileDirectory::load_json_file(path)
        .await
        .with_context(|| format!("loading profiles from {}", path.display()))
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("serializing output")?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Schema => print_json(&evgen_llm::event_response_schema())?,
        Commands::Prompt(args) => {
            let query = args.query().await?;
            print_json(&evgen_llm::build_messages(&query, Local::now().date_naive()))?;
        }
        Commands::Parse { input } => {
            let outcome = evgen_llm::parse_events(&read_input(&input)?)?;
            print_json(&outcome)?;
        }
        Commands::Generate { query, persist } => {
            let config = PipelineConfig::from_env()?;
            let query = query.query().await?;
            let mut outcome = config.build_generator()?.generate(&query).await?;
            if persist {
                let store = FileEventStore::new(config.events_file.clone());
                outcome.events = store.persist_ai_events(outcome.events).await?;
                info!(path = %store.path().display(), count = outcome.events.len(), "events persisted");
            }
            print_json(&outcome)?;
        }
        Commands::MaybeGenerate(args) => {
            let config = PipelineConfig::from_env()?;
            let profiles = load_profiles(&args.profile.profiles).await?;
            let orchestrator = config.build_orchestrator(Arc::new(profiles))?;
            let events = orchestrator
                .maybe_generate(
                    &args.profile.user,
                    Some(&args.viewport()),
                    args.existing,
                    args.last_generation,
                    Utc::now(),
                )
                .await?;
            if events.is_empty() {
                info!(user = %args.profile.user, "nothing generated");
            }
            print_json(&events)?;
        }
    }

    Ok(())
}
