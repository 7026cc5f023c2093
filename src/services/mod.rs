//! Per-service normalizers.
//!
//! Every normalizer tags the document with its service and rewrites point
//! coordinates to a common precision; the service modules add whatever
//! their dialect needs on top.

pub mod runkeeper;
pub mod strava;
pub mod yamareco;

use crate::error::{GpxError, Result};
use crate::gpx_types::{GpxDocument, Service, TrackPoint};

/// Fractional digits kept for latitude and longitude.
pub const COORDINATE_DIGITS: usize = 9;
/// Fractional digits kept for elevation.
pub const ELEVATION_DIGITS: usize = 1;

/// Run the normalizer for `service`.
///
/// Garmin and unknown documents have no normalizer and come back untouched.
pub fn normalize(doc: GpxDocument, service: Service) -> GpxDocument {
    match service {
        Service::Yamareco => yamareco::normalize(doc),
        Service::Strava => strava::normalize(doc),
        Service::Runkeeper => runkeeper::normalize(doc),
        Service::Garmin | Service::Unknown => {
            tracing::debug!(%service, "no normalizer for service, passing through");
            doc
        }
    }
}

/// Render `value` as a decimal with exactly `digits` fractional digits.
pub fn format_fixed(field: &'static str, value: &str, digits: usize) -> Result<String> {
    let parsed = value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| GpxError::Format {
            field,
            value: value.to_string(),
        })?;
    Ok(format!("{parsed:.digits$}"))
}

/// Reformat in place; on failure the original text is kept.
fn reformat(field: &'static str, value: &mut String, digits: usize) {
    match format_fixed(field, value, digits) {
        Ok(formatted) => *value = formatted,
        Err(e) => tracing::warn!(error = %e, "keeping original value"),
    }
}

/// Apply the shared precision policy to one point.
pub fn normalize_point(point: &mut TrackPoint) {
    reformat("lat", &mut point.lat, COORDINATE_DIGITS);
    reformat("lon", &mut point.lon, COORDINATE_DIGITS);
    if let Some(ele) = point.ele.as_mut().filter(|e| !e.is_empty()) {
        reformat("ele", ele, ELEVATION_DIGITS);
    }
}

/// Normalize every point, both per track and in the sorted union.
pub(crate) fn normalize_points(doc: &mut GpxDocument) {
    doc.tracks
        .iter_mut()
        .flat_map(|t| t.points.iter_mut())
        .chain(doc.all_points.iter_mut())
        .for_each(normalize_point);
}
