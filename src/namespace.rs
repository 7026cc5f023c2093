use quick_xml::name::ResolveResult;

pub const GPX_1_1: &str = "http://www.topografix.com/GPX/1/1";
pub const XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const TRACK_POINT_EXTENSION: &str = "http://www.garmin.com/xmlschemas/TrackPointExtension/v1";
pub const YAMARECO_EXTENSION: &str = "http://www.yamareco.com/xmlschemas/YamarecoExtension/v1";
pub const STRAVA_EXTENSION: &str = "http://www.strava.com/xmlschemas/StravaExtension/v1";
pub const RUNKEEPER_EXTENSION: &str = "http://www.runkeeper.com/xmlschemas/RunkeeperExtension/v1";
pub const SCHEMA_LOCATION: &str =
    "http://www.topografix.com/GPX/1/1 http://www.topografix.com/GPX/1/1/gpx.xsd";

/// The namespace every GPX element lookup is qualified with.
///
/// Exports differ in which URI they bind (`GPX/1/0`, `GPX/1/1`, or none at
/// all), so it is taken from the root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpxNamespace {
    uri: String,
    /// Root carried no namespace: unqualified elements are GPX elements too.
    unqualified: bool,
}

impl GpxNamespace {
    /// Resolve from the root element's namespace, falling back to GPX 1.1.
    pub fn from_root(root: &ResolveResult<'_>) -> Self {
        match root {
            ResolveResult::Bound(ns) => Self {
                uri: String::from_utf8_lossy(ns.as_ref()).into_owned(),
                unqualified: false,
            },
            ResolveResult::Unbound => Self {
                uri: GPX_1_1.to_string(),
                unqualified: true,
            },
            ResolveResult::Unknown(_) => Self {
                uri: GPX_1_1.to_string(),
                unqualified: false,
            },
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Whether an element in namespace `ns` belongs to the document's GPX vocabulary.
    pub fn matches(&self, ns: &ResolveResult<'_>) -> bool {
        match ns {
            ResolveResult::Bound(bound) => bound.as_ref() == self.uri.as_bytes(),
            ResolveResult::Unbound => self.unqualified,
            ResolveResult::Unknown(_) => false,
        }
    }
}

impl Default for GpxNamespace {
    fn default() -> Self {
        Self {
            uri: GPX_1_1.to_string(),
            unqualified: false,
        }
    }
}
