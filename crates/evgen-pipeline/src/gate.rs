//! Decides whether a viewport change is worth a paid generation call.

use std::fmt;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use evgen_core::Coordinates;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatePolicy {
    pub min_zoom_level: f64,
    pub cooldown_ms: u64,
    pub min_event_threshold: usize,
    pub max_camera_offset_deg: f64,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            min_zoom_level: 13.0,
            cooldown_ms: 60_000,
            min_event_threshold: 5,
            max_camera_offset_deg: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectReason {
    NoUserLocation,
    /// Zoom or a coordinate is NaN or infinite.
    InvalidViewport,
    ZoomedOut { zoom: f64 },
    CoolingDown { elapsed_ms: i64 },
    EnoughEvents { existing: usize },
    CameraTooFar { offset_deg: f64 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NoUserLocation => write!(f, "user location unknown"),
            RejectReason::InvalidViewport => write!(f, "viewport has non-finite values"),
            RejectReason::ZoomedOut { zoom } => write!(f, "zoom {zoom} below minimum"),
            RejectReason::CoolingDown { elapsed_ms } => {
                write!(f, "last generation only {elapsed_ms} ms ago")
            }
            RejectReason::EnoughEvents { existing } => write!(f, "{existing} events already in view"),
            RejectReason::CameraTooFar { offset_deg } => {
                write!(f, "camera {offset_deg:.3} deg away from user")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateVerdict {
    Approve,
    Reject(RejectReason),
}

impl GateVerdict {
    pub fn is_approved(&self) -> bool {
        matches!(self, GateVerdict::Approve)
    }
}

impl GatePolicy {
    pub fn from_yaml_str(text: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(text).context("parsing gate policy yaml")
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("loading {}", path.display()))
    }

    /// Overrides individual thresholds from `lookup` (normally the process
    /// environment). Unset or unparsable values keep the current setting.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<f64>().ok());
        if let Some(v) = parsed("EVGEN_MIN_ZOOM") {
            self.min_zoom_level = v;
        }
        if let Some(v) = lookup("EVGEN_COOLDOWN_MS").and_then(|v| v.trim().parse().ok()) {
            self.cooldown_ms = v;
        }
        if let Some(v) = lookup("EVGEN_MIN_EVENT_THRESHOLD").and_then(|v| v.trim().parse().ok()) {
            self.min_event_threshold = v;
        }
        if let Some(v) = parsed("EVGEN_MAX_CAMERA_OFFSET_DEG") {
            self.max_camera_offset_deg = v;
        }
        self
    }

    /// Pure check over the caller's view of the world. The first failing
    /// condition wins.
    pub fn evaluate(
        &self,
        user_location: Option<Coordinates>,
        camera_center: Coordinates,
        zoom: f64,
        existing_count: usize,
        last_generation: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> GateVerdict {
        let Some(user_location) = user_location else {
            return GateVerdict::Reject(RejectReason::NoUserLocation);
        };
        let finite = |c: Coordinates| c.latitude.is_finite() && c.longitude.is_finite();
        if !zoom.is_finite() || !finite(user_location) || !finite(camera_center) {
            return GateVerdict::Reject(RejectReason::InvalidViewport);
        }
        if zoom < self.min_zoom_level || self.min_zoom_level.is_nan() {
            return GateVerdict::Reject(RejectReason::ZoomedOut { zoom });
        }
        if let Some(last) = last_generation {
            let elapsed_ms = (now - last).num_milliseconds();
            if elapsed_ms < i64::try_from(self.cooldown_ms).unwrap_or(i64::MAX) {
                return GateVerdict::Reject(RejectReason::CoolingDown { elapsed_ms });
            }
        }
        if existing_count >= self.min_event_threshold {
            return GateVerdict::Reject(RejectReason::EnoughEvents {
                existing: existing_count,
            });
        }
        let offset_deg = camera_center.manhattan_degrees(&user_location);
        if offset_deg > self.max_camera_offset_deg || self.max_camera_offset_deg.is_nan() {
            return GateVerdict::Reject(RejectReason::CameraTooFar { offset_deg });
        }
        GateVerdict::Approve
    }

    pub fn should_generate(
        &self,
        user_location: Option<Coordinates>,
        camera_center: Coordinates,
        zoom: f64,
        existing_count: usize,
        last_generation: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        self.evaluate(user_location, camera_center, zoom, existing_count, last_generation, now)
            .is_approved()
    }
}
