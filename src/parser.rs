use std::borrow::Cow;
use std::path::Path;

use indexmap::IndexMap;
use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{GpxError, Result};
use crate::gpx_types::*;
use crate::namespace::GpxNamespace;

type Reader<'a> = NsReader<&'a [u8]>;

/// Parse a GPX file from disk.
pub fn parse_gpx_file(path: impl AsRef<Path>) -> Result<GpxDocument> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "read GPX file");
    parse_gpx_bytes(&bytes)
}

/// Parse raw bytes. Input must be UTF-8; a leading BOM is ignored.
pub fn parse_gpx_bytes(bytes: &[u8]) -> Result<GpxDocument> {
    let xml = std::str::from_utf8(bytes)
        .map_err(|e| GpxError::Malformed(format!("input is not UTF-8: {e}")))?;
    parse_gpx(xml)
}

/// Parse a GPX XML string into a [`GpxDocument`].
pub fn parse_gpx(xml: &str) -> Result<GpxDocument> {
    let xml = xml.trim_start_matches('\u{feff}');
    let mut reader = NsReader::from_str(xml);

    let (ns, root) = loop {
        let (resolved, event) = reader.read_resolved_event()?;
        match event {
            Event::Start(e) => break (GpxNamespace::from_root(&resolved), e),
            Event::Empty(e) => {
                return Ok(GpxDocument {
                    creator: creator_of(&e),
                    ..Default::default()
                });
            }
            Event::Eof => return Err(GpxError::Malformed("no root element".into())),
            _ => {}
        }
    };
    tracing::debug!(namespace = ns.uri(), "resolved GPX namespace");

    let creator = creator_of(&root);
    let mut metadata: Option<Metadata> = None;
    let mut tracks = Vec::new();
    let mut depth = 0usize;

    loop {
        let (in_gpx, event) = next_event(&mut reader, &ns)?;
        match event {
            Event::Start(e) if in_gpx && e.local_name().as_ref() == b"trk" => {
                tracks.push(parse_track(&mut reader, &ns)?);
            }
            Event::Start(e) if in_gpx && e.local_name().as_ref() == b"metadata" => {
                let parsed = parse_metadata(&mut reader, &ns)?;
                metadata.get_or_insert(parsed);
            }
            // Tracks may sit below wrapper elements; keep descending.
            Event::Start(_) => depth += 1,
            Event::End(_) if depth == 0 => break,
            Event::End(_) => depth -= 1,
            Event::Eof => return Err(unexpected_eof("gpx")),
            _ => {}
        }
    }

    // Surface errors in anything trailing the root element.
    while !matches!(reader.read_event()?, Event::Eof) {}

    let all_points = sorted_points(&tracks);
    tracing::debug!(
        creator = %creator,
        tracks = tracks.len(),
        points = all_points.len(),
        "extracted GPX document"
    );

    Ok(GpxDocument {
        creator,
        metadata: metadata.unwrap_or_default(),
        tracks,
        all_points,
        service: None,
    })
}

/// Concatenate every track's points and stable-sort them by timestamp.
/// Points without a parseable time sort first.
pub fn sorted_points(tracks: &[Track]) -> Vec<TrackPoint> {
    let mut points: Vec<TrackPoint> = tracks.iter().flat_map(|t| t.points.iter().cloned()).collect();
    points.sort_by_cached_key(TrackPoint::timestamp);
    points
}

/// Remove literal CDATA markers left in text by exporters that escaped them.
pub fn strip_cdata_markers(text: &str) -> String {
    text.replace("<![CDATA[", "").replace("]]>", "")
}

/// Read the next event and report whether it belongs to the GPX namespace.
fn next_event<'a>(reader: &mut Reader<'a>, ns: &GpxNamespace) -> Result<(bool, Event<'a>)> {
    let (resolved, event) = reader.read_resolved_event()?;
    Ok((ns.matches(&resolved), event))
}

fn unexpected_eof(element: &str) -> GpxError {
    GpxError::Malformed(format!("unexpected end of input inside <{element}>"))
}

fn creator_of(root: &BytesStart<'_>) -> String {
    attribute_value(root, b"creator").unwrap_or_else(|| "Unknown".to_string())
}

/// Parse a <metadata> element.
fn parse_metadata(reader: &mut Reader<'_>, ns: &GpxNamespace) -> Result<Metadata> {
    let mut meta = Metadata::default();

    loop {
        let (in_gpx, event) = next_event(reader, ns)?;
        match event {
            Event::Start(e) if in_gpx => match e.local_name().as_ref() {
                b"name" => set_first(&mut meta.name, read_text_owned(reader, &e)?),
                b"desc" => set_first(&mut meta.desc, read_text_owned(reader, &e)?),
                b"time" => set_first(&mut meta.time, read_text_owned(reader, &e)?),
                b"keywords" => set_first(&mut meta.keywords, read_text_owned(reader, &e)?),
                b"author" => {
                    if let Some(name) = parse_author(reader, ns)? {
                        set_first(&mut meta.author, name);
                    }
                }
                b"link" => {
                    if meta.link.is_none() {
                        meta.link = attribute_value(&e, b"href").filter(|h| !h.is_empty());
                    }
                    if let Some(text) = parse_link_text(reader, ns)? {
                        set_first(&mut meta.link_text, text);
                    }
                }
                _ => skip(reader, &e)?,
            },
            Event::Empty(e) if in_gpx && e.local_name().as_ref() == b"link" => {
                if meta.link.is_none() {
                    meta.link = attribute_value(&e, b"href").filter(|h| !h.is_empty());
                }
            }
            Event::Start(e) => skip(reader, &e)?,
            Event::End(_) => break,
            Event::Eof => return Err(unexpected_eof("metadata")),
            _ => {}
        }
    }

    Ok(meta)
}

/// Parse <author>, returning its <name>.
fn parse_author(reader: &mut Reader<'_>, ns: &GpxNamespace) -> Result<Option<String>> {
    let mut name = None;

    loop {
        let (in_gpx, event) = next_event(reader, ns)?;
        match event {
            Event::Start(e) if in_gpx && e.local_name().as_ref() == b"name" => {
                set_first(&mut name, read_text_owned(reader, &e)?);
            }
            Event::Start(e) => skip(reader, &e)?,
            Event::End(_) => break,
            Event::Eof => return Err(unexpected_eof("author")),
            _ => {}
        }
    }

    Ok(name)
}

/// Parse the body of a <link> element, returning its <text>.
fn parse_link_text(reader: &mut Reader<'_>, ns: &GpxNamespace) -> Result<Option<String>> {
    let mut text = None;

    loop {
        let (in_gpx, event) = next_event(reader, ns)?;
        match event {
            Event::Start(e) if in_gpx && e.local_name().as_ref() == b"text" => {
                set_first(&mut text, read_text_owned(reader, &e)?);
            }
            Event::Start(e) => skip(reader, &e)?,
            Event::End(_) => break,
            Event::Eof => return Err(unexpected_eof("link")),
            _ => {}
        }
    }

    Ok(text)
}

/// Parse a <trk> element.
fn parse_track(reader: &mut Reader<'_>, ns: &GpxNamespace) -> Result<Track> {
    let mut track = Track::default();

    loop {
        let (in_gpx, event) = next_event(reader, ns)?;
        match event {
            Event::Start(e) if in_gpx => match e.local_name().as_ref() {
                b"name" => {
                    let text = read_text_owned(reader, &e)?;
                    let text = if text.contains("]]>") {
                        strip_cdata_markers(&text)
                    } else {
                        text
                    };
                    set_first(&mut track.name, text);
                }
                b"type" => set_first(&mut track.track_type, read_text_owned(reader, &e)?),
                b"number" => set_first(&mut track.number, read_text_owned(reader, &e)?),
                b"time" => set_first(&mut track.time, read_text_owned(reader, &e)?),
                b"desc" => set_first(&mut track.desc, read_text_owned(reader, &e)?),
                b"trkseg" => parse_segment(reader, ns, &mut track.points)?,
                _ => skip(reader, &e)?,
            },
            Event::Start(e) => skip(reader, &e)?,
            Event::End(_) => break,
            Event::Eof => return Err(unexpected_eof("trk")),
            _ => {}
        }
    }

    Ok(track)
}

/// Parse a <trkseg> element, appending its points.
fn parse_segment(
    reader: &mut Reader<'_>,
    ns: &GpxNamespace,
    points: &mut Vec<TrackPoint>,
) -> Result<()> {
    loop {
        let (in_gpx, event) = next_event(reader, ns)?;
        match event {
            Event::Start(e) if in_gpx && e.local_name().as_ref() == b"trkpt" => {
                points.push(parse_point(&e, reader, ns)?);
            }
            Event::Empty(e) if in_gpx && e.local_name().as_ref() == b"trkpt" => {
                points.push(point_from_attributes(&e));
            }
            Event::Start(e) => skip(reader, &e)?,
            Event::End(_) => break,
            Event::Eof => return Err(unexpected_eof("trkseg")),
            _ => {}
        }
    }

    Ok(())
}

/// Build a point from the lat/lon attributes of its start tag.
/// Missing coordinates are carried as empty strings.
fn point_from_attributes(start: &BytesStart<'_>) -> TrackPoint {
    let lat = attribute_value(start, b"lat");
    let lon = attribute_value(start, b"lon");
    if lat.is_none() || lon.is_none() {
        tracing::debug!("trkpt without lat/lon attributes");
    }
    TrackPoint::new(lat.unwrap_or_default(), lon.unwrap_or_default())
}

/// Parse a <trkpt> element and its children.
fn parse_point(
    start: &BytesStart<'_>,
    reader: &mut Reader<'_>,
    ns: &GpxNamespace,
) -> Result<TrackPoint> {
    let mut point = point_from_attributes(start);

    loop {
        let (in_gpx, event) = next_event(reader, ns)?;
        match event {
            Event::Start(e) if in_gpx => match e.local_name().as_ref() {
                b"ele" => set_first(&mut point.ele, read_text_owned(reader, &e)?),
                b"time" => set_first(&mut point.time, read_text_owned(reader, &e)?),
                b"extensions" => parse_extensions(reader, &mut point.extensions)?,
                _ => skip(reader, &e)?,
            },
            Event::Start(e) => skip(reader, &e)?,
            Event::End(_) => break,
            Event::Eof => return Err(unexpected_eof("trkpt")),
            _ => {}
        }
    }

    Ok(point)
}

/// Flatten an <extensions> block into `fields`.
///
/// Leaf children map their local name to their text. A child that wraps
/// further elements (e.g. `gpxtpx:TrackPointExtension`) contributes its
/// children instead.
fn parse_extensions(reader: &mut Reader<'_>, fields: &mut IndexMap<String, String>) -> Result<()> {
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let key = local_name_of(&e);
                let mut text = String::new();
                let mut children = Vec::new();
                loop {
                    match reader.read_event()? {
                        Event::Start(child) => {
                            let value = read_text_owned(reader, &child)?;
                            children.push((local_name_of(&child), value));
                        }
                        Event::Empty(child) => children.push((local_name_of(&child), String::new())),
                        Event::End(_) => break,
                        Event::Eof => return Err(unexpected_eof(&key)),
                        other => append_text(&mut text, &other),
                    }
                }
                if children.is_empty() {
                    fields.insert(key, text);
                } else {
                    fields.extend(children);
                }
            }
            Event::Empty(e) => {
                fields.insert(local_name_of(&e), String::new());
            }
            Event::End(_) => break,
            Event::Eof => return Err(unexpected_eof("extensions")),
            _ => {}
        }
    }

    Ok(())
}

fn skip(reader: &mut Reader<'_>, start: &BytesStart<'_>) -> Result<()> {
    reader.read_to_end(start.name())?;
    Ok(())
}

fn set_first(slot: &mut Option<String>, value: String) {
    if slot.is_none() {
        *slot = Some(value);
    }
}

fn local_name_of(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Look up an attribute by local name and return its unescaped value.
fn attribute_value(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == name)
        .map(|attr| {
            let raw = String::from_utf8_lossy(&attr.value);
            match quick_xml::escape::unescape(&raw) {
                Ok(Cow::Borrowed(_)) => raw.into_owned(),
                Ok(Cow::Owned(unescaped)) => unescaped,
                Err(_) => raw.into_owned(),
            }
        })
}

/// Read text content of an element as an owned String.
/// Handles regular text, CDATA sections, and entity references (Event::GeneralRef).
/// Text inside nested elements is ignored.
fn read_text_owned(reader: &mut Reader<'_>, start: &BytesStart<'_>) -> Result<String> {
    let mut text = String::new();
    let mut depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(_) => depth += 1,
            Event::End(_) if depth == 0 => break,
            Event::End(_) => depth -= 1,
            Event::Eof => return Err(unexpected_eof(&local_name_of(start))),
            other if depth == 0 => append_text(&mut text, &other),
            _ => {}
        }
    }

    Ok(text)
}

fn append_text(text: &mut String, event: &Event<'_>) {
    match event {
        Event::Text(e) => {
            text.push_str(std::str::from_utf8(e.as_ref()).unwrap_or_default());
        }
        Event::CData(e) => {
            text.push_str(std::str::from_utf8(e.as_ref()).unwrap_or_default());
        }
        Event::GeneralRef(e) => {
            // Handle character references (&#60; &#x3C;) and predefined entities
            if let Ok(Some(ch)) = e.resolve_char_ref() {
                text.push(ch);
            } else {
                match std::str::from_utf8(e.as_ref()).unwrap_or_default() {
                    "amp" => text.push('&'),
                    "lt" => text.push('<'),
                    "gt" => text.push('>'),
                    "quot" => text.push('"'),
                    "apos" => text.push('\''),
                    _ => {} // Unknown entity, skip
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAMARECO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns="http://www.topografix.com/GPX/1/1" creator="Yamareco iOS 7.22 - www.yamareco.com">
<trk><name>track</name><number>1</number><trkseg>
<trkpt lat="34.93293983529206" lon="135.76569236945932"><ele>30</ele><time>2025-01-30T23:32:36Z</time></trkpt>
<trkpt lat="34.933004458708005" lon="135.76616544961826"><ele>31</ele><time>2025-01-30T23:33:29Z</time></trkpt>
</trkseg>
</trk>
</gpx>"#;

    #[test]
    fn test_yamareco_track() {
        let doc = parse_gpx(YAMARECO).unwrap();
        assert_eq!(doc.creator, "Yamareco iOS 7.22 - www.yamareco.com");
        assert_eq!(doc.tracks.len(), 1);
        let trk = &doc.tracks[0];
        assert_eq!(trk.name.as_deref(), Some("track"));
        assert_eq!(trk.number.as_deref(), Some("1"));
        assert_eq!(trk.points.len(), 2);
        assert_eq!(trk.points[0].lat, "34.93293983529206");
        assert_eq!(trk.points[0].lon, "135.76569236945932");
        assert_eq!(trk.points[0].ele.as_deref(), Some("30"));
        assert_eq!(trk.points[0].time.as_deref(), Some("2025-01-30T23:32:36Z"));
        assert!(doc.metadata.is_empty());
        assert_eq!(doc.all_points.len(), 2);
        assert!(doc.service.is_none());
    }

    #[test]
    fn test_missing_creator_defaults() {
        let xml = r#"<gpx xmlns="http://www.topografix.com/GPX/1/1"><trk/></gpx>"#;
        let doc = parse_gpx(xml).unwrap();
        assert_eq!(doc.creator, "Unknown");
    }

    #[test]
    fn test_metadata_fields() {
        let xml = r#"<?xml version="1.0"?>
<gpx xmlns="http://www.topografix.com/GPX/1/1" creator="test">
  <metadata>
    <name>Kyoto</name>
    <desc>Trail &amp; temples</desc>
    <author><name>Taro</name></author>
    <link href="https://example.com/a"><text>Report</text></link>
    <time>2025-01-30T23:32:36Z</time>
    <keywords>kyoto,trail</keywords>
  </metadata>
</gpx>"#;
        let doc = parse_gpx(xml).unwrap();
        let meta = &doc.metadata;
        assert_eq!(meta.name.as_deref(), Some("Kyoto"));
        assert_eq!(meta.desc.as_deref(), Some("Trail & temples"));
        assert_eq!(meta.author.as_deref(), Some("Taro"));
        assert_eq!(meta.link.as_deref(), Some("https://example.com/a"));
        assert_eq!(meta.link_text.as_deref(), Some("Report"));
        assert_eq!(meta.time.as_deref(), Some("2025-01-30T23:32:36Z"));
        assert_eq!(meta.keywords.as_deref(), Some("kyoto,trail"));
    }

    #[test]
    fn test_real_cdata_name() {
        let xml = r#"<gpx xmlns="http://www.topografix.com/GPX/1/1">
  <trk><name><![CDATA[Hiking 31/1/25 8:32 am]]></name><time>2025-01-30T23:32:36Z</time></trk>
</gpx>"#;
        let doc = parse_gpx(xml).unwrap();
        assert_eq!(doc.tracks[0].name.as_deref(), Some("Hiking 31/1/25 8:32 am"));
        assert_eq!(doc.tracks[0].time.as_deref(), Some("2025-01-30T23:32:36Z"));
    }

    #[test]
    fn test_escaped_cdata_markers_stripped() {
        let xml = r#"<gpx xmlns="http://www.topografix.com/GPX/1/1">
  <trk><name>&lt;![CDATA[Morning Run]]&gt;</name></trk>
</gpx>"#;
        let doc = parse_gpx(xml).unwrap();
        assert_eq!(doc.tracks[0].name.as_deref(), Some("Morning Run"));
    }

    #[test]
    fn test_extensions_flattened() {
        let xml = r#"<gpx xmlns="http://www.topografix.com/GPX/1/1" xmlns:gpxtpx="http://www.garmin.com/xmlschemas/TrackPointExtension/v1">
  <trk><trkseg>
    <trkpt lat="35.0" lon="139.0">
      <extensions>
        <power>210</power>
        <gpxtpx:TrackPointExtension>
          <gpxtpx:hr>150</gpxtpx:hr>
          <gpxtpx:cad>80</gpxtpx:cad>
        </gpxtpx:TrackPointExtension>
      </extensions>
    </trkpt>
  </trkseg></trk>
</gpx>"#;
        let doc = parse_gpx(xml).unwrap();
        let ext = &doc.tracks[0].points[0].extensions;
        let keys: Vec<&str> = ext.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["power", "hr", "cad"]);
        assert_eq!(ext["hr"], "150");
        assert_eq!(ext["power"], "210");
    }

    #[test]
    fn test_gpx10_namespace_resolved() {
        let xml = r#"<gpx xmlns="http://www.topografix.com/GPX/1/0" version="1.0">
  <trk><trkseg>
    <trkpt lat="35.0" lon="139.0"><speed>5.5</speed></trkpt>
    <trkpt lat="35.001" lon="139.001"/>
  </trkseg></trk>
</gpx>"#;
        let doc = parse_gpx(xml).unwrap();
        assert_eq!(doc.point_count(), 2);
    }

    #[test]
    fn test_no_namespace() {
        let xml = r#"<gpx version="1.1"><trk><trkseg><trkpt lat="1" lon="2"/></trkseg></trk></gpx>"#;
        let doc = parse_gpx(xml).unwrap();
        assert_eq!(doc.point_count(), 1);
    }

    #[test]
    fn test_foreign_namespace_elements_ignored() {
        let xml = r#"<gpx xmlns="http://www.topografix.com/GPX/1/1" xmlns:x="urn:other">
  <x:trk><trkseg><trkpt lat="1" lon="2"/></trkseg></x:trk>
  <trk><x:name>not a name</x:name><trkseg><trkpt lat="3" lon="4"/></trkseg></trk>
</gpx>"#;
        let doc = parse_gpx(xml).unwrap();
        assert_eq!(doc.tracks.len(), 1);
        assert!(doc.tracks[0].name.is_none());
        assert_eq!(doc.tracks[0].points[0].lat, "3");
    }

    #[test]
    fn test_points_sorted_missing_time_first() {
        let xml = r#"<gpx xmlns="http://www.topografix.com/GPX/1/1">
  <trk><trkseg>
    <trkpt lat="2" lon="0"><time>2025-01-02T00:00:00Z</time></trkpt>
    <trkpt lat="9" lon="0"/>
  </trkseg></trk>
  <trk><trkseg>
    <trkpt lat="1" lon="0"><time>2025-01-01T00:00:00Z</time></trkpt>
    <trkpt lat="8" lon="0"><time>garbage</time></trkpt>
  </trkseg></trk>
</gpx>"#;
        let doc = parse_gpx(xml).unwrap();
        let lats: Vec<&str> = doc.all_points.iter().map(|p| p.lat.as_str()).collect();
        assert_eq!(lats, vec!["9", "8", "1", "2"]);
        // Tracks keep document order.
        assert_eq!(doc.tracks[0].points[0].lat, "2");
    }

    #[test]
    fn test_missing_coordinates_pass_through() {
        let xml = r#"<gpx xmlns="http://www.topografix.com/GPX/1/1"><trk><trkseg><trkpt><ele>5</ele></trkpt></trkseg></trk></gpx>"#;
        let doc = parse_gpx(xml).unwrap();
        assert_eq!(doc.tracks[0].points[0].lat, "");
        assert_eq!(doc.tracks[0].points[0].ele.as_deref(), Some("5"));
    }

    #[test]
    fn test_bom_is_ignored() {
        let xml = "\u{feff}<gpx xmlns=\"http://www.topografix.com/GPX/1/1\" creator=\"x\"/>";
        assert_eq!(parse_gpx(xml).unwrap().creator, "x");
    }

    #[test]
    fn test_malformed_inputs() {
        assert!(parse_gpx("").is_err());
        assert!(parse_gpx("not xml at all").is_err());
        assert!(parse_gpx("<gpx><trk></gpx>").is_err());
        assert!(parse_gpx("<gpx><trk><trkseg>").is_err());
        assert!(parse_gpx_bytes(&[0x3c, 0xff, 0xfe]).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = parse_gpx_file("/definitely/not/here.gpx").unwrap_err();
        assert!(matches!(err, GpxError::Io(_)));
    }
}
