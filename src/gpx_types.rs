use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::timestamp::parse_timestamp;

/// A parsed GPX file: every track plus a time-ordered view of all points.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpxDocument {
    pub creator: String,
    pub metadata: Metadata,
    pub tracks: Vec<Track>,
    /// Union of every track's points, stable-sorted by timestamp.
    pub all_points: Vec<TrackPoint>,
    /// Set by a normalizer; `None` until then.
    pub service: Option<Service>,
}

impl GpxDocument {
    /// Total number of points across all tracks.
    pub fn point_count(&self) -> usize {
        self.tracks.iter().map(|t| t.points.len()).sum()
    }
}

/// The `<metadata>` block. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub name: Option<String>,
    pub desc: Option<String>,
    pub time: Option<String>,
    pub keywords: Option<String>,
    pub author: Option<String>,
    pub link: Option<String>,
    pub link_text: Option<String>,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A GPX track (<trk>), segments flattened.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub track_type: Option<String>,
    pub number: Option<String>,
    /// Track-level start time (Runkeeper exports carry one).
    pub time: Option<String>,
    pub desc: Option<String>,
    pub points: Vec<TrackPoint>,
}

/// A single <trkpt>. Coordinates stay as text so their formatting survives
/// until a normalizer rewrites them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackPoint {
    pub lat: String,
    pub lon: String,
    pub ele: Option<String>,
    pub time: Option<String>,
    /// Vendor extension fields, flattened one level, in document order.
    pub extensions: IndexMap<String, String>,
}

impl TrackPoint {
    pub fn new(lat: impl Into<String>, lon: impl Into<String>) -> Self {
        Self {
            lat: lat.into(),
            lon: lon.into(),
            ..Default::default()
        }
    }

    /// Parsed `time`, or `None` when absent or not ISO-8601.
    pub fn timestamp(&self) -> Option<DateTime<FixedOffset>> {
        self.time.as_deref().and_then(parse_timestamp)
    }
}

/// The service that produced a GPX file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Yamareco,
    Strava,
    Runkeeper,
    /// Recognized from the creator string but has no dedicated normalizer.
    Garmin,
    Unknown,
}

impl Service {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yamareco => "yamareco",
            Self::Strava => "strava",
            Self::Runkeeper => "runkeeper",
            Self::Garmin => "garmin",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yamareco" => Ok(Self::Yamareco),
            "strava" => Ok(Self::Strava),
            "runkeeper" => Ok(Self::Runkeeper),
            "garmin" => Ok(Self::Garmin),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown service '{other}'")),
        }
    }
}

/// Activity vocabulary offered by the shells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Hiking,
    Running,
    Cycling,
    Walking,
    Swimming,
    Other,
}

impl ActivityType {
    pub const ALL: [ActivityType; 6] = [
        Self::Hiking,
        Self::Running,
        Self::Cycling,
        Self::Walking,
        Self::Swimming,
        Self::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hiking => "hiking",
            Self::Running => "running",
            Self::Cycling => "cycling",
            Self::Walking => "walking",
            Self::Swimming => "swimming",
            Self::Other => "other",
        }
    }

    /// `"hiking"` -> `"Hiking"`, used for generated track names.
    pub fn label(self) -> &'static str {
        match self {
            Self::Hiking => "Hiking",
            Self::Running => "Running",
            Self::Cycling => "Cycling",
            Self::Walking => "Walking",
            Self::Swimming => "Swimming",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown activity type '{s}'"))
    }
}
