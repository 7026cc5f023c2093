//! Runkeeper exports: no metadata block, a track-level `<time>`, and a
//! CDATA-wrapped track name such as `Hiking 31/1/25 8:32 am` from which the
//! activity type is inferred.

use std::sync::LazyLock;

use regex::Regex;

use crate::gpx_types::{ActivityType, GpxDocument, Service};

static CDATA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!\[CDATA\[(.*?)\]\]>").expect("valid CDATA regex"));

/// Keyword table for type inference, checked in order.
const TYPE_KEYWORDS: [(&[&str], ActivityType); 4] = [
    (&["running", "run"], ActivityType::Running),
    (&["walking", "walk"], ActivityType::Walking),
    (&["hiking", "hike"], ActivityType::Hiking),
    (&["cycling", "bike", "biking"], ActivityType::Cycling),
];

pub fn normalize(mut doc: GpxDocument) -> GpxDocument {
    doc.service = Some(Service::Runkeeper);

    if let Some(time) = doc.tracks.iter().find_map(|t| t.time.clone()) {
        doc.metadata.time = Some(time);
    }

    for track in &mut doc.tracks {
        let Some(name) = track.name.as_mut() else {
            continue;
        };
        if name.contains("CDATA") {
            *name = strip_cdata(name);
        }
        if let Some(kind) = infer_activity_type(name) {
            track.track_type = Some(kind.as_str().to_string());
        }
    }

    super::normalize_points(&mut doc);
    tracing::debug!(tracks = doc.tracks.len(), "normalized runkeeper document");
    doc
}

/// Unwrap every `<![CDATA[...]]>` section left as literal text.
pub fn strip_cdata(text: &str) -> String {
    CDATA.replace_all(text, "$1").into_owned()
}

/// Guess the activity type from keywords in a track name.
pub fn infer_activity_type(name: &str) -> Option<ActivityType> {
    let name = name.to_lowercase();
    TYPE_KEYWORDS
        .iter()
        .find(|(words, _)| words.iter().any(|w| name.contains(w)))
        .map(|(_, kind)| *kind)
}
