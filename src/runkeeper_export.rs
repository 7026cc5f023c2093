//! Direct Yamareco to Runkeeper conversion.
//!
//! Unlike the canonical path this keeps points in document order and
//! rewrites them into the layout Runkeeper's importer accepts: a CDATA
//! track name such as `Hiking 31/01/25 8:32 am`, rounded coordinates and
//! offset elevations.

use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{GpxError, Result};
use crate::gpx_types::{ActivityType, GpxDocument, TrackPoint};
use crate::namespace::{GPX_1_1, SCHEMA_LOCATION, XSI};
use crate::options::RunkeeperOptions;
use crate::parser::{parse_gpx, parse_gpx_file};
use crate::timestamp::conversion_stamp;
use crate::xml_tree::XmlElement;

static DATE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})").expect("valid date regex"));
static CLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"T(\d{2}):(\d{2}):\d{2}Z").expect("valid clock regex"));

const SOURCE_SERVICE: &str = "Yamareco";

/// Convert the GPX file at `input` and write the result to `output`.
///
/// Returns `false` when the input cannot be parsed, carries no timestamped
/// points, or the output cannot be written. The cause is logged.
pub fn convert(input: impl AsRef<Path>, output: impl AsRef<Path>, opts: &RunkeeperOptions) -> bool {
    let (input, output) = (input.as_ref(), output.as_ref());
    let result = parse_gpx_file(input)
        .and_then(|doc| convert_document(&doc, opts))
        .and_then(|xml| std::fs::write(output, xml).map_err(GpxError::from));

    match result {
        Ok(()) => {
            tracing::info!(input = %input.display(), output = %output.display(), "converted for Runkeeper");
            true
        }
        Err(e) => {
            tracing::error!(input = %input.display(), error = %e, "Runkeeper conversion failed");
            false
        }
    }
}

/// Convert GPX text, returning the Runkeeper document.
pub fn convert_str(xml: &str, opts: &RunkeeperOptions) -> Result<String> {
    let doc = parse_gpx(xml)?;
    convert_document(&doc, opts)
}

/// Convert an already parsed document.
pub fn convert_document(doc: &GpxDocument, opts: &RunkeeperOptions) -> Result<String> {
    let points: Vec<&TrackPoint> = doc.tracks.iter().flat_map(|t| &t.points).collect();

    let activity_date = activity_dates(&points)
        .into_iter()
        .next()
        .ok_or(GpxError::MissingData("no timestamped points to date the activity"))?;
    let first_time = points
        .first()
        .and_then(|p| p.time.clone())
        .unwrap_or_default();
    let explicit_name = opts.track_name.as_deref().filter(|n| !n.is_empty());

    let mut root = XmlElement::new("gpx")
        .attr("xmlns", GPX_1_1)
        .attr("xmlns:xsi", XSI)
        .attr("version", "1.1")
        .attr("creator", opts.creator.as_str())
        .attr("xsi:schemaLocation", SCHEMA_LOCATION);

    if opts.add_metadata {
        let mut metadata = XmlElement::new("metadata").text_child("time", first_time.as_str());
        if let Some(name) = explicit_name {
            metadata.push(XmlElement::new("name").text(name));
        }
        if opts.keep_source {
            let stamp = opts.conversion_date.clone().unwrap_or_else(conversion_stamp);
            metadata.push(
                XmlElement::new("extensions").child(
                    XmlElement::new("source_info")
                        .text_child("original_service", SOURCE_SERVICE)
                        .text_child("conversion_date", stamp),
                ),
            );
        }
        root.push(metadata);
    }

    let mut trk = XmlElement::new("trk");
    if let Some(kind) = opts.activity_type {
        trk.push(XmlElement::new("type").text(kind.as_str()));
    }
    let name = match explicit_name {
        Some(name) => name.to_string(),
        None => generated_name(opts.activity_type, &activity_date, &first_time),
    };
    trk.push(XmlElement::new("name").cdata(name));
    trk.push(XmlElement::new("time").text(first_time.as_str()));

    let mut trkseg = XmlElement::new("trkseg");
    for point in &points {
        trkseg.push(point_element(point, opts));
    }
    trk.push(trkseg);
    root.push(trk);

    tracing::debug!(points = points.len(), date = %activity_date, "built Runkeeper document");
    root.to_tree_xml(opts.format_xml)
}

/// Distinct `YYYY-MM-DD` prefixes of point times, in ascending order.
fn activity_dates(points: &[&TrackPoint]) -> BTreeSet<String> {
    points
        .iter()
        .filter_map(|p| p.time.as_deref())
        .filter_map(|time| DATE_PREFIX.find(time))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// `{Type} DD/MM/YY h:mm am|pm`. The clock part is left empty unless the
/// first time is a UTC stamp.
fn generated_name(kind: Option<ActivityType>, date: &str, first_time: &str) -> String {
    let label = kind.unwrap_or(ActivityType::Hiking).label();
    let date = match DATE_PREFIX.captures(date) {
        Some(caps) => format!("{}/{}/{}", &caps[3], &caps[2], &caps[1][2..]),
        None => date.to_string(),
    };
    let clock = CLOCK
        .captures(first_time)
        .and_then(|caps| {
            let hour: u32 = caps[1].parse().ok()?;
            let meridiem = if hour < 12 { "am" } else { "pm" };
            let hour = match hour % 12 {
                0 => 12,
                h => h,
            };
            Some(format!("{hour}:{} {meridiem}", &caps[2]))
        })
        .unwrap_or_default();
    format!("{label} {date} {clock}")
}

fn point_element(point: &TrackPoint, opts: &RunkeeperOptions) -> XmlElement {
    let precision = opts.coordinate_precision;
    let mut trkpt = XmlElement::new("trkpt")
        .attr("lat", or_original(format_coordinate(&point.lat, precision), &point.lat))
        .attr("lon", or_original(format_coordinate(&point.lon, precision), &point.lon));
    if let Some(ele) = &point.ele {
        let adjusted = or_original(adjust_elevation(ele, opts.elevation_adjustment), ele);
        trkpt.push(XmlElement::new("ele").text(adjusted));
    }
    if let Some(time) = &point.time {
        trkpt.push(XmlElement::new("time").text(time.as_str()));
    }
    trkpt
}

fn or_original(result: Result<String>, original: &str) -> String {
    result.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "keeping original value");
        original.to_string()
    })
}

/// Significant digits a coordinate may carry once rounded; larger values
/// are rejected rather than silently truncated.
const MAX_SIGNIFICANT_DIGITS: usize = 28;

/// Round a decimal coordinate half away from zero to `precision` digits.
///
/// The sign of the input is kept even when the value rounds to zero, so
/// `-0.0000004` becomes `-0.000000`.
pub fn format_coordinate(value: &str, precision: u32) -> Result<String> {
    let invalid = || GpxError::Format {
        field: "coordinate",
        value: value.to_string(),
    };
    let trimmed = value.trim();
    let decimal = Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| invalid())?;
    let rounded = decimal
        .round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero)
        .abs();

    let mut digits = rounded.to_string();
    let precision = precision as usize;
    let fraction = digits.find('.').map_or(0, |dot| digits.len() - dot - 1);
    if fraction < precision {
        if fraction == 0 {
            digits.push('.');
        }
        digits.push_str(&"0".repeat(precision - fraction));
    }

    let significant = digits
        .trim_start_matches(['0', '.'])
        .chars()
        .filter(char::is_ascii_digit)
        .count();
    if significant > MAX_SIGNIFICANT_DIGITS {
        return Err(invalid());
    }

    if trimmed.starts_with('-') {
        digits.insert(0, '-');
    }
    Ok(digits)
}

/// Add `adjustment` meters and render with one fractional digit.
pub fn adjust_elevation(value: &str, adjustment: f64) -> Result<String> {
    let elevation = value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| GpxError::Format {
            field: "ele",
            value: value.to_string(),
        })?;
    Ok(format!("{:.1}", elevation + adjustment))
}
