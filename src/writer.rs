//! Canonical GPX 1.1 output.

use std::path::Path;

use crate::error::{GpxError, Result};
use crate::gpx_types::{GpxDocument, Metadata, Service, TrackPoint};
use crate::namespace::{
    GPX_1_1, RUNKEEPER_EXTENSION, SCHEMA_LOCATION, STRAVA_EXTENSION, TRACK_POINT_EXTENSION, XSI,
    YAMARECO_EXTENSION,
};
use crate::options::NormalizeOptions;
use crate::timestamp::conversion_stamp;
use crate::xml_tree::XmlElement;

pub const CREATOR: &str = "Universal GPX Converter";

/// Placeholder track name written by Yamareco.
const PLACEHOLDER_NAME: &str = "track";
const FALLBACK_NAME: &str = "Converted Activity";
const FALLBACK_TYPE: &str = "hiking";

/// Extension keys that go under `gpxtpx:TrackPointExtension`, with their
/// output element. `atemp` is folded into `temp`.
const VITALS: [(&str, &str); 4] = [
    ("hr", "gpxtpx:hr"),
    ("cad", "gpxtpx:cad"),
    ("temp", "gpxtpx:temp"),
    ("atemp", "gpxtpx:temp"),
];

/// Serialize `doc` as a canonical document.
///
/// Fails with [`GpxError::MissingData`] when the document has no points.
pub fn to_canonical_xml(doc: &GpxDocument, opts: &NormalizeOptions) -> Result<String> {
    build_document(doc, opts)?.to_pretty_xml()
}

/// Serialize `doc` and write it to `path`. Nothing is written on failure.
pub fn write_canonical(doc: &GpxDocument, path: impl AsRef<Path>, opts: &NormalizeOptions) -> Result<()> {
    let xml = to_canonical_xml(doc, opts)?;
    std::fs::write(path.as_ref(), xml)?;
    tracing::info!(path = %path.as_ref().display(), points = doc.all_points.len(), "wrote canonical GPX");
    Ok(())
}

/// Assemble the canonical element tree.
pub fn build_document(doc: &GpxDocument, opts: &NormalizeOptions) -> Result<XmlElement> {
    if doc.all_points.is_empty() {
        return Err(GpxError::MissingData("document has no track points"));
    }

    let conversion_date = opts.conversion_date.clone().unwrap_or_else(conversion_stamp);

    let root = XmlElement::new("gpx")
        .attr("xmlns", GPX_1_1)
        .attr("xmlns:xsi", XSI)
        .attr("xmlns:gpxtpx", TRACK_POINT_EXTENSION)
        .attr("xmlns:yamareco", YAMARECO_EXTENSION)
        .attr("xmlns:strava", STRAVA_EXTENSION)
        .attr("xmlns:runkeeper", RUNKEEPER_EXTENSION)
        .attr("version", "1.1")
        .attr("creator", CREATOR)
        .attr("xsi:schemaLocation", SCHEMA_LOCATION)
        .child(metadata_element(doc, &conversion_date))
        .child(track_element(doc, opts));

    Ok(root)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn metadata_element(doc: &GpxDocument, conversion_date: &str) -> XmlElement {
    let Metadata {
        name,
        desc,
        time,
        keywords,
        author,
        link,
        link_text,
    } = &doc.metadata;

    let mut metadata = XmlElement::new("metadata");
    if let Some(name) = non_empty(name) {
        metadata.push(XmlElement::new("name").text(name));
    }
    if let Some(desc) = non_empty(desc) {
        metadata.push(XmlElement::new("desc").text(desc));
    }
    let time = non_empty(time).or_else(|| doc.all_points.first().and_then(|p| non_empty(&p.time)));
    if let Some(time) = time {
        metadata.push(XmlElement::new("time").text(time));
    }
    if let Some(keywords) = non_empty(keywords) {
        metadata.push(XmlElement::new("keywords").text(keywords));
    }
    if let Some(author) = non_empty(author) {
        metadata.push(XmlElement::new("author").text_child("name", author));
    }
    if let Some(href) = non_empty(link) {
        let mut link = XmlElement::new("link").attr("href", href);
        if let Some(text) = non_empty(link_text) {
            link.push(XmlElement::new("text").text(text));
        }
        metadata.push(link);
    }

    let service = doc.service.unwrap_or(Service::Unknown);
    metadata.child(
        XmlElement::new("extensions").child(
            XmlElement::new("source_info")
                .text_child("original_service", service.as_str())
                .text_child("conversion_date", conversion_date),
        ),
    )
}

fn track_element(doc: &GpxDocument, opts: &NormalizeOptions) -> XmlElement {
    let mut trk = XmlElement::new("trk")
        .text_child("name", resolve_track_name(doc, opts.track_name.as_deref()))
        .text_child("type", resolve_activity_type(doc, opts.activity_type.as_deref()));

    if let Some(number) = doc.tracks.iter().find_map(|t| non_empty(&t.number)) {
        trk.push(XmlElement::new("number").text(number));
    }
    if let Some(desc) = doc.tracks.iter().find_map(|t| non_empty(&t.desc)) {
        trk.push(XmlElement::new("desc").text(desc));
    }
    if let Some(time) = doc.all_points.first().and_then(|p| non_empty(&p.time)) {
        trk.push(XmlElement::new("time").text(time));
    }

    let service_data = service_data(doc);
    if !service_data.is_empty() {
        let mut data = XmlElement::new("service_data");
        for (key, value) in service_data {
            data.push(XmlElement::new(key).text(value));
        }
        trk.push(XmlElement::new("extensions").child(data));
    }

    let mut trkseg = XmlElement::new("trkseg");
    for point in &doc.all_points {
        trkseg.push(point_element(point));
    }
    trk.child(trkseg)
}

/// Name for the unified track.
///
/// An explicit override wins, then the first named track unless it carries
/// the Yamareco placeholder, then a name generated from the activity dates.
pub fn resolve_track_name(doc: &GpxDocument, track_name: Option<&str>) -> String {
    if let Some(name) = track_name.filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    match doc.tracks.iter().find_map(|t| non_empty(&t.name)) {
        Some(name) if name != PLACEHOLDER_NAME => name.to_string(),
        _ => generated_name(&doc.all_points),
    }
}

/// `Activity 2025-01-31`, or `Activity 2025-01-31 for 2 days` when the
/// points cross midnight.
fn generated_name(points: &[TrackPoint]) -> String {
    let first = points.first().and_then(TrackPoint::timestamp);
    let last = points.last().and_then(TrackPoint::timestamp);
    let (Some(start), Some(end)) = (first, last) else {
        return FALLBACK_NAME.to_string();
    };

    let date = start.format("%Y-%m-%d");
    let days = (end.date_naive() - start.date_naive()).num_days();
    if days > 0 {
        format!("Activity {date} for {} days", days + 1)
    } else {
        format!("Activity {date}")
    }
}

pub fn resolve_activity_type(doc: &GpxDocument, activity_type: Option<&str>) -> String {
    activity_type
        .filter(|t| !t.is_empty())
        .or_else(|| doc.tracks.iter().find_map(|t| non_empty(&t.track_type)))
        .unwrap_or(FALLBACK_TYPE)
        .to_string()
}

/// Per-service track extension fields. When several tracks qualify the
/// last one wins.
fn service_data(doc: &GpxDocument) -> Vec<(&'static str, String)> {
    let (key, value) = match doc.service {
        Some(Service::Yamareco) => (
            "yamareco:mountain_name",
            doc.tracks
                .iter()
                .rev()
                .find_map(|t| non_empty(&t.name).filter(|n| *n != PLACEHOLDER_NAME))
                .map(str::to_string),
        ),
        Some(Service::Strava) => (
            "strava:activity_type",
            doc.tracks.iter().rev().find_map(|t| non_empty(&t.track_type)).map(str::to_string),
        ),
        Some(Service::Runkeeper) => (
            "runkeeper:activity_name",
            doc.tracks.iter().rev().find_map(|t| non_empty(&t.name)).map(|name| {
                if name.contains("<![CDATA[") {
                    crate::parser::strip_cdata_markers(name)
                } else {
                    name.to_string()
                }
            }),
        ),
        _ => return Vec::new(),
    };
    value.map(|v| vec![(key, v)]).unwrap_or_default()
}

fn point_element(point: &TrackPoint) -> XmlElement {
    let mut trkpt = XmlElement::new("trkpt")
        .attr("lat", point.lat.as_str())
        .attr("lon", point.lon.as_str());
    if let Some(ele) = non_empty(&point.ele) {
        trkpt.push(XmlElement::new("ele").text(ele));
    }
    if let Some(time) = non_empty(&point.time) {
        trkpt.push(XmlElement::new("time").text(time));
    }

    if !point.extensions.is_empty() {
        let mut extensions = XmlElement::new("extensions");

        let mut vitals = XmlElement::new("gpxtpx:TrackPointExtension");
        for (key, value) in &point.extensions {
            if let Some((_, tag)) = VITALS.iter().find(|(k, _)| k == key) {
                vitals.push(XmlElement::new(*tag).text(value.as_str()));
            }
        }
        if !vitals.children().is_empty() {
            extensions.push(vitals);
        }

        for (key, value) in &point.extensions {
            if !VITALS.iter().any(|(k, _)| k == key) {
                extensions.push(XmlElement::new(key.as_str()).text(value.as_str()));
            }
        }
        trkpt.push(extensions);
    }

    trkpt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpx_types::Track;
    use pretty_assertions::assert_eq;

    fn point(time: Option<&str>) -> TrackPoint {
        let mut p = TrackPoint::new("35.000000000", "139.000000000");
        p.time = time.map(String::from);
        p
    }

    fn doc_with(names: &[Option<&str>], points: Vec<TrackPoint>) -> GpxDocument {
        GpxDocument {
            creator: "test".into(),
            tracks: names
                .iter()
                .map(|n| Track {
                    name: n.map(String::from),
                    ..Default::default()
                })
                .collect(),
            all_points: points,
            ..Default::default()
        }
    }

    fn fixed_date() -> NormalizeOptions {
        NormalizeOptions {
            conversion_date: Some("2025-02-01T10:00:00.000000".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_name_override_wins() {
        let doc = doc_with(&[Some("Existing")], vec![point(None)]);
        assert_eq!(resolve_track_name(&doc, Some("Mine")), "Mine");
        assert_eq!(resolve_track_name(&doc, Some("")), "Existing");
    }

    #[test]
    fn test_name_generated_single_day() {
        let doc = doc_with(
            &[Some("track")],
            vec![point(Some("2025-01-30T23:32:36Z")), point(Some("2025-01-30T23:59:00Z"))],
        );
        assert_eq!(resolve_track_name(&doc, None), "Activity 2025-01-30");
    }

    #[test]
    fn test_name_generated_multi_day() {
        let doc = doc_with(
            &[],
            vec![point(Some("2025-01-30T23:32:36Z")), point(Some("2025-01-31T01:00:00Z"))],
        );
        let name = resolve_track_name(&doc, None);
        assert_eq!(name, "Activity 2025-01-30 for 2 days");
    }

    #[test]
    fn test_name_uses_local_dates() {
        // 2025-01-30T23:32:36Z, read in its own offset.
        let doc = doc_with(
            &[],
            vec![point(Some("2025-01-31T08:32:36+09:00")), point(Some("2025-01-31T10:00:00+09:00"))],
        );
        assert_eq!(resolve_track_name(&doc, None), "Activity 2025-01-31");
    }

    #[test]
    fn test_name_fallback() {
        let doc = doc_with(&[None], vec![point(None), point(Some("2025-01-30T23:32:36Z"))]);
        assert_eq!(resolve_track_name(&doc, None), "Converted Activity");
    }

    #[test]
    fn test_first_named_track_only() {
        // The placeholder on the first named track is not skipped over.
        let doc = doc_with(&[None, Some("track"), Some("Real")], vec![point(Some("2025-01-30T00:00:00Z"))]);
        assert_eq!(resolve_track_name(&doc, None), "Activity 2025-01-30");
    }

    #[test]
    fn test_activity_type_resolution() {
        let mut doc = doc_with(&[None], vec![point(None)]);
        assert_eq!(resolve_activity_type(&doc, None), "hiking");
        doc.tracks[0].track_type = Some("running".into());
        assert_eq!(resolve_activity_type(&doc, None), "running");
        assert_eq!(resolve_activity_type(&doc, Some("cycling")), "cycling");
    }

    #[test]
    fn test_empty_document_fails() {
        let doc = doc_with(&[Some("x")], Vec::new());
        assert!(matches!(
            to_canonical_xml(&doc, &fixed_date()),
            Err(GpxError::MissingData(_))
        ));
    }

    #[test]
    fn test_point_extensions_split() {
        let mut p = point(Some("2025-01-30T23:32:36Z"));
        p.ele = Some("35.2".into());
        p.extensions.insert("power".into(), "210".into());
        p.extensions.insert("hr".into(), "150".into());
        p.extensions.insert("atemp".into(), "21".into());
        let doc = doc_with(&[Some("Ride")], vec![p]);

        let xml = to_canonical_xml(&doc, &fixed_date()).unwrap();
        let expected = r#"      <trkpt lat="35.000000000" lon="139.000000000">
        <ele>35.2</ele>
        <time>2025-01-30T23:32:36Z</time>
        <extensions>
          <gpxtpx:TrackPointExtension>
            <gpxtpx:hr>150</gpxtpx:hr>
            <gpxtpx:temp>21</gpxtpx:temp>
          </gpxtpx:TrackPointExtension>
          <power>210</power>
        </extensions>
      </trkpt>
"#;
        assert!(xml.contains(expected), "{xml}");
    }

    #[test]
    fn test_full_document() {
        let mut doc = doc_with(
            &[Some("Hiking 31/1/25 8:32 am")],
            vec![point(Some("2025-01-30T23:32:36Z"))],
        );
        doc.service = Some(Service::Runkeeper);
        doc.tracks[0].track_type = Some("hiking".into());
        doc.metadata.time = Some("2025-01-30T23:32:36Z".into());

        let xml = to_canonical_xml(&doc, &fixed_date()).unwrap();
        let expected = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx xmlns="http://www.topografix.com/GPX/1/1" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:gpxtpx="http://www.garmin.com/xmlschemas/TrackPointExtension/v1" xmlns:yamareco="http://www.yamareco.com/xmlschemas/YamarecoExtension/v1" xmlns:strava="http://www.strava.com/xmlschemas/StravaExtension/v1" xmlns:runkeeper="http://www.runkeeper.com/xmlschemas/RunkeeperExtension/v1" version="1.1" creator="Universal GPX Converter" xsi:schemaLocation="http://www.topografix.com/GPX/1/1 http://www.topografix.com/GPX/1/1/gpx.xsd">
  <metadata>
    <time>2025-01-30T23:32:36Z</time>
    <extensions>
      <source_info>
        <original_service>runkeeper</original_service>
        <conversion_date>2025-02-01T10:00:00.000000</conversion_date>
      </source_info>
    </extensions>
  </metadata>
  <trk>
    <name>Hiking 31/1/25 8:32 am</name>
    <type>hiking</type>
    <time>2025-01-30T23:32:36Z</time>
    <extensions>
      <service_data>
        <runkeeper:activity_name>Hiking 31/1/25 8:32 am</runkeeper:activity_name>
      </service_data>
    </extensions>
    <trkseg>
      <trkpt lat="35.000000000" lon="139.000000000">
        <time>2025-01-30T23:32:36Z</time>
      </trkpt>
    </trkseg>
  </trk>
</gpx>
"#;
        assert_eq!(xml, expected);
    }

    #[test]
    fn test_service_data_last_track_wins() {
        let mut doc = doc_with(&[Some("Mt. Hiei"), Some("track"), Some("Mt. Atago")], vec![point(None)]);
        doc.service = Some(Service::Yamareco);
        assert_eq!(
            service_data(&doc),
            vec![("yamareco:mountain_name", "Mt. Atago".to_string())]
        );

        doc.service = None;
        assert!(service_data(&doc).is_empty());
    }

    #[test]
    fn test_unknown_service_label() {
        let doc = doc_with(&[], vec![point(None)]);
        let xml = to_canonical_xml(&doc, &fixed_date()).unwrap();
        assert!(xml.contains("<original_service>unknown</original_service>"));
        assert!(xml.contains("<name>Converted Activity</name>"));
        assert!(xml.contains("<trkpt lat=\"35.000000000\" lon=\"139.000000000\"/>"));
    }
}
