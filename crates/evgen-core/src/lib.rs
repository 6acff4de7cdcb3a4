//! Core domain model for AI event generation.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "evgen-core";

/// Creator label stamped on every generated event.
pub const AI_CREATOR: &str = "AI";

pub const DEFAULT_LOCATION_NAME: &str = "Lausanne";
pub const DEFAULT_TIME_FRAME: &str = "today";

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn latitude_in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude)
    }

    pub fn longitude_in_range(&self) -> bool {
        (-180.0..=180.0).contains(&self.longitude)
    }

    /// Sum of the absolute latitude and longitude deltas, in degrees.
    pub fn manhattan_degrees(&self, other: &Coordinates) -> f64 {
        (self.latitude - other.latitude).abs() + (self.longitude - other.longitude).abs()
    }

    /// Great-circle distance (haversine).
    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLngBounds {
    pub south_west: Coordinates,
    pub north_east: Coordinates,
}

/// What the map was showing when a generation trigger fired.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportSnapshot {
    pub user_location: Option<Coordinates>,
    pub camera_center: Coordinates,
    pub zoom: f64,
    pub bounds: Option<LatLngBounds>,
}

impl ViewportSnapshot {
    /// Radius covering the visible area, measured from the camera center to
    /// the farthest corner.
    pub fn visible_radius_km(&self) -> Option<f64> {
        let bounds = self.bounds?;
        let sw = self.camera_center.distance_km(&bounds.south_west);
        let ne = self.camera_center.distance_km(&bounds.north_east);
        Some(sw.max(ne))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tag {
    Music,
    Rock,
    Pop,
    Jazz,
    Classical,
    Electronic,
    Sports,
    Football,
    Running,
    Hiking,
    Outdoors,
    Art,
    Photography,
    Theater,
    Cinema,
    Food,
    Wine,
    Technology,
    Gaming,
    Education,
    Networking,
    Party,
    Wellness,
    Travel,
    Books,
}

impl Tag {
    pub const ALL: [Tag; 25] = [
        Tag::Music,
        Tag::Rock,
        Tag::Pop,
        Tag::Jazz,
        Tag::Classical,
        Tag::Electronic,
        Tag::Sports,
        Tag::Football,
        Tag::Running,
        Tag::Hiking,
        Tag::Outdoors,
        Tag::Art,
        Tag::Photography,
        Tag::Theater,
        Tag::Cinema,
        Tag::Food,
        Tag::Wine,
        Tag::Technology,
        Tag::Gaming,
        Tag::Education,
        Tag::Networking,
        Tag::Party,
        Tag::Wellness,
        Tag::Travel,
        Tag::Books,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            Tag::Music => "Music",
            Tag::Rock => "Rock",
            Tag::Pop => "Pop",
            Tag::Jazz => "Jazz",
            Tag::Classical => "Classical",
            Tag::Electronic => "Electronic",
            Tag::Sports => "Sports",
            Tag::Football => "Football",
            Tag::Running => "Running",
            Tag::Hiking => "Hiking",
            Tag::Outdoors => "Outdoors",
            Tag::Art => "Art",
            Tag::Photography => "Photography",
            Tag::Theater => "Theater",
            Tag::Cinema => "Cinema",
            Tag::Food => "Food",
            Tag::Wine => "Wine",
            Tag::Technology => "Technology",
            Tag::Gaming => "Gaming",
            Tag::Education => "Education",
            Tag::Networking => "Networking",
            Tag::Party => "Party",
            Tag::Wellness => "Wellness",
            Tag::Travel => "Travel",
            Tag::Books => "Books",
        }
    }

    /// Case-insensitive lookup; surrounding whitespace is ignored.
    pub fn from_display_name(name: &str) -> Option<Tag> {
        let name = name.trim();
        Tag::ALL
            .into_iter()
            .find(|tag| tag.display_name().eq_ignore_ascii_case(name))
    }
}

/// Resolves model-supplied tag names against the known vocabulary.
pub trait TagResolver: Send + Sync {
    fn resolve(&self, display_name: &str) -> Option<Tag>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTags;

impl TagResolver for BuiltinTags {
    fn resolve(&self, display_name: &str) -> Option<Tag> {
        Tag::from_display_name(display_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub country: String,
    pub description: String,
    pub birth_date: NaiveDate,
    #[serde(default)]
    pub interests: BTreeSet<Tag>,
}

impl Profile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    /// Whole years lived as of `today`; zero for birth dates in the future.
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        today.years_since(self.birth_date).unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub count: Option<u32>,
    pub require_relevant_tags: bool,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            count: None,
            require_relevant_tags: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    pub location_name: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub radius_km: Option<f64>,
    pub time_frame: Option<String>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            location_name: Some(DEFAULT_LOCATION_NAME.to_string()),
            coordinates: None,
            radius_km: None,
            time_frame: Some(DEFAULT_TIME_FRAME.to_string()),
        }
    }
}

impl ContextConfig {
    pub fn from_viewport(viewport: &ViewportSnapshot) -> Self {
        Self {
            location_name: None,
            coordinates: Some(viewport.camera_center),
            radius_km: viewport.visible_radius_km(),
            time_frame: Some(DEFAULT_TIME_FRAME.to_string()),
        }
    }
}

/// Everything the generator needs for one completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationQuery {
    pub profile: Profile,
    pub task: TaskConfig,
    pub context: ContextConfig,
}

impl GenerationQuery {
    pub fn new(profile: Profile) -> Self {
        Self {
            profile,
            task: TaskConfig::default(),
            context: ContextConfig::default(),
        }
    }

    pub fn with_task(mut self, task: TaskConfig) -> Self {
        self.task = task;
        self
    }

    pub fn with_context(mut self, context: ContextConfig) -> Self {
        self.context = context;
        self
    }
}

/// One event as decoded from the model reply, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub title: String,
    pub description: String,
    pub date: String,
    pub tags: Vec<String>,
    #[serde(default)]
    pub location: Option<Coordinates>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: String,
    pub title: String,
    pub description: String,
    pub date: NaiveDateTime,
    pub tags: BTreeSet<Tag>,
    pub creator: String,
    pub participants: BTreeSet<String>,
    pub location: Coordinates,
}

impl DomainEvent {
    /// A freshly generated event: no id yet, no participants, AI creator.
    pub fn generated(
        title: String,
        description: String,
        date: NaiveDateTime,
        tags: BTreeSet<Tag>,
        location: Coordinates,
    ) -> Self {
        Self {
            id: String::new(),
            title,
            description,
            date,
            tags,
            creator: AI_CREATOR.to_string(),
            participants: BTreeSet::new(),
            location,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub candidate: CandidateRecord,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub events: Vec<DomainEvent>,
    pub failures: Vec<ValidationFailure>,
}

impl GenerationOutcome {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.failures.is_empty()
    }
}
