use serde::Deserialize;

use crate::gpx_types::{ActivityType, GpxDocument, Service};

/// Options for normalization into the canonical document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeOptions {
    /// Track name to use instead of the inferred one
    #[serde(default)]
    pub track_name: Option<String>,

    /// Activity type to use instead of the track's own (free text)
    #[serde(default)]
    pub activity_type: Option<String>,

    /// Which normalizer to run (default: detect from the document)
    #[serde(default)]
    pub service: ServiceChoice,

    /// Fixed `conversion_date` stamp (default: local time at serialization)
    #[serde(default)]
    pub conversion_date: Option<String>,
}

/// Service selection for normalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum ServiceChoice {
    #[default]
    Auto,
    Yamareco,
    Strava,
    Runkeeper,
}

impl ServiceChoice {
    /// The service to normalize `doc` as.
    pub fn resolve(self, doc: &GpxDocument) -> Service {
        match self {
            Self::Auto => crate::detect::detect_service(doc),
            Self::Yamareco => Service::Yamareco,
            Self::Strava => Service::Strava,
            Self::Runkeeper => Service::Runkeeper,
        }
    }
}

/// Options for the Yamareco to Runkeeper point converter.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunkeeperOptions {
    /// Activity written to `<type>` and used as the name prefix (default: hiking).
    /// `null` omits the element.
    #[serde(default = "default_activity_type")]
    pub activity_type: Option<ActivityType>,

    /// Explicit track name (default: generated from date and start time)
    #[serde(default)]
    pub track_name: Option<String>,

    /// Indent the output (default: false)
    #[serde(default)]
    pub format_xml: bool,

    /// Fractional digits for lat/lon (default: 6)
    #[serde(default = "default_precision")]
    pub coordinate_precision: u32,

    /// Meters added to every elevation (default: 5.2)
    #[serde(default = "default_elevation_adjustment")]
    pub elevation_adjustment: f64,

    /// Emit a `<metadata>` block (default: true)
    #[serde(default = "default_true")]
    pub add_metadata: bool,

    /// Record the source service in metadata extensions (default: true)
    #[serde(default = "default_true")]
    pub keep_source: bool,

    /// Root `creator` attribute
    #[serde(default = "default_creator")]
    pub creator: String,

    /// Fixed `conversion_date` stamp (default: local time at conversion)
    #[serde(default)]
    pub conversion_date: Option<String>,
}

impl Default for RunkeeperOptions {
    fn default() -> Self {
        Self {
            activity_type: default_activity_type(),
            track_name: None,
            format_xml: false,
            coordinate_precision: default_precision(),
            elevation_adjustment: default_elevation_adjustment(),
            add_metadata: true,
            keep_source: true,
            creator: default_creator(),
            conversion_date: None,
        }
    }
}

impl RunkeeperOptions {
    /// Output of the first-generation converter: Runkeeper's own creator
    /// string, no metadata and no `<type>`.
    pub fn basic() -> Self {
        Self {
            activity_type: None,
            add_metadata: false,
            keep_source: false,
            creator: "Runkeeper - http://www.runkeeper.com".to_string(),
            ..Self::default()
        }
    }
}

/// Options for the GeoJSON map preview.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewOptions {
    /// Include elevation as the 3rd coordinate value (default: true)
    #[serde(default = "default_true")]
    pub include_elevation: bool,

    /// Include timestamps in coordinateProperties.times (default: true)
    #[serde(default = "default_true")]
    pub include_time: bool,

    /// Add start and end marker points (default: true)
    #[serde(default = "default_true")]
    pub include_markers: bool,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            include_elevation: true,
            include_time: true,
            include_markers: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_activity_type() -> Option<ActivityType> {
    Some(ActivityType::Hiking)
}

fn default_precision() -> u32 {
    6
}

fn default_elevation_adjustment() -> f64 {
    5.2
}

fn default_creator() -> String {
    "TrailSync - Runkeeper Converter".to_string()
}
