use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde_json::{Map, Value as JsonValue};

use crate::gpx_types::*;
use crate::options::PreviewOptions;
use crate::writer::{resolve_activity_type, resolve_track_name};

/// Map preview of a document: the time-ordered route as one LineString plus
/// start and end markers.
pub fn to_feature_collection(doc: &GpxDocument, opts: &PreviewOptions) -> FeatureCollection {
    let located: Vec<(Vec<f64>, &TrackPoint)> = doc
        .all_points
        .iter()
        .filter_map(|pt| point_coords(pt, opts.include_elevation).map(|c| (c, pt)))
        .collect();

    let skipped = doc.all_points.len() - located.len();
    if skipped > 0 {
        tracing::debug!(skipped, "points without usable coordinates left out of preview");
    }

    let mut features = Vec::new();

    if located.len() >= 2 {
        let coords: Vec<Vec<f64>> = located.iter().map(|(c, _)| c.clone()).collect();
        let mut props = Map::new();
        props.insert("gpxType".to_string(), JsonValue::String("track".to_string()));
        props.insert(
            "name".to_string(),
            JsonValue::String(resolve_track_name(doc, None)),
        );
        props.insert(
            "type".to_string(),
            JsonValue::String(resolve_activity_type(doc, None)),
        );
        props.insert("creator".to_string(), JsonValue::String(doc.creator.clone()));
        props.insert(
            "service".to_string(),
            JsonValue::String(doc.service.unwrap_or(Service::Unknown).to_string()),
        );

        if opts.include_time {
            let points: Vec<&TrackPoint> = located.iter().map(|(_, pt)| *pt).collect();
            insert_coordinate_times(&mut props, &points);
        }

        features.push(feature(Value::LineString(coords), props));
    }

    if opts.include_markers {
        let ends = match located.as_slice() {
            [] => Vec::new(),
            [only] => vec![("start", only)],
            [first, .., last] => vec![("start", first), ("end", last)],
        };
        for (marker, (coords, pt)) in ends {
            let mut props = Map::new();
            props.insert("marker".to_string(), JsonValue::String(marker.to_string()));
            if let Some(time) = &pt.time {
                props.insert("time".to_string(), JsonValue::String(time.clone()));
            }
            features.push(feature(Value::Point(coords.clone()), props));
        }
    }

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn feature(value: Value, props: Map<String, JsonValue>) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

/// `[lon, lat(, ele)]`, or `None` when lat/lon are not numbers.
fn point_coords(pt: &TrackPoint, include_elevation: bool) -> Option<Vec<f64>> {
    let lat: f64 = pt.lat.trim().parse().ok()?;
    let lon: f64 = pt.lon.trim().parse().ok()?;
    let ele = pt.ele.as_deref().and_then(|e| e.trim().parse::<f64>().ok());
    match (include_elevation, ele) {
        (true, Some(ele)) => Some(vec![lon, lat, ele]),
        _ => Some(vec![lon, lat]),
    }
}

fn insert_coordinate_times(props: &mut Map<String, JsonValue>, points: &[&TrackPoint]) {
    let times: Vec<JsonValue> = points
        .iter()
        .map(|pt| match &pt.time {
            Some(t) => JsonValue::String(t.clone()),
            None => JsonValue::Null,
        })
        .collect();

    // Only include if at least one time is present
    if times.iter().any(|t| !t.is_null()) {
        let mut coord_props = Map::new();
        coord_props.insert("times".to_string(), JsonValue::Array(times));
        props.insert(
            "coordinateProperties".to_string(),
            JsonValue::Object(coord_props),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_gpx;

    const GPX: &str = r#"<gpx xmlns="http://www.topografix.com/GPX/1/1" creator="StravaGPX">
  <trk><name>Ride</name><trkseg>
    <trkpt lat="35.0" lon="139.0"><ele>10</ele><time>2025-01-01T00:00:00Z</time></trkpt>
    <trkpt lat="bad" lon="139.5"><time>2025-01-01T00:00:30Z</time></trkpt>
    <trkpt lat="35.1" lon="139.1"><time>2025-01-01T00:01:00Z</time></trkpt>
  </trkseg></trk>
</gpx>"#;

    #[test]
    fn test_line_and_markers() {
        let doc = parse_gpx(GPX).unwrap();
        let fc = to_feature_collection(&doc, &PreviewOptions::default());
        assert_eq!(fc.features.len(), 3);

        let line = &fc.features[0];
        match &line.geometry.as_ref().unwrap().value {
            Value::LineString(coords) => {
                assert_eq!(coords.len(), 2);
                assert_eq!(coords[0], vec![139.0, 35.0, 10.0]);
                assert_eq!(coords[1], vec![139.1, 35.1]);
            }
            other => panic!("Expected LineString, got {:?}", other),
        }

        let props = line.properties.as_ref().unwrap();
        assert_eq!(props["name"], "Ride");
        assert_eq!(props["creator"], "StravaGPX");
        assert_eq!(props["service"], "unknown");
        let times = props["coordinateProperties"]["times"].as_array().unwrap();
        assert_eq!(times.len(), 2);
        assert_eq!(times[1], "2025-01-01T00:01:00Z");

        let end = fc.features[2].properties.as_ref().unwrap();
        assert_eq!(end["marker"], "end");
        assert_eq!(end["time"], "2025-01-01T00:01:00Z");
    }

    #[test]
    fn test_without_elevation_and_markers() {
        let doc = parse_gpx(GPX).unwrap();
        let opts = PreviewOptions {
            include_elevation: false,
            include_time: false,
            include_markers: false,
        };
        let fc = to_feature_collection(&doc, &opts);
        assert_eq!(fc.features.len(), 1);
        let props = fc.features[0].properties.as_ref().unwrap();
        assert!(props.get("coordinateProperties").is_none());
        match &fc.features[0].geometry.as_ref().unwrap().value {
            Value::LineString(coords) => assert_eq!(coords[0].len(), 2),
            other => panic!("Expected LineString, got {:?}", other),
        }
    }

    #[test]
    fn test_single_point_only_start_marker() {
        let xml = r#"<gpx xmlns="http://www.topografix.com/GPX/1/1"><trk><trkseg><trkpt lat="1" lon="2"/></trkseg></trk></gpx>"#;
        let fc = to_feature_collection(&parse_gpx(xml).unwrap(), &PreviewOptions::default());
        assert_eq!(fc.features.len(), 1);
        assert_eq!(fc.features[0].properties.as_ref().unwrap()["marker"], "start");
    }
}
