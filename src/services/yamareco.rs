//! Yamareco exports: no metadata block, one track named `track` with a
//! `<number>`, points with `ele` and `time` only.

use crate::gpx_types::{GpxDocument, Service};

pub fn normalize(mut doc: GpxDocument) -> GpxDocument {
    doc.service = Some(Service::Yamareco);
    super::normalize_points(&mut doc);
    tracing::debug!(tracks = doc.tracks.len(), "normalized yamareco document");
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpx_types::{Track, TrackPoint};

    #[test]
    fn test_keeps_placeholder_name_and_number() {
        let mut point = TrackPoint::new("34.93293983529206", "135.76569236945932");
        point.ele = Some("30".into());
        let doc = GpxDocument {
            creator: "Yamareco iOS 7.22 - www.yamareco.com".into(),
            tracks: vec![Track {
                name: Some("track".into()),
                number: Some("1".into()),
                points: vec![point.clone()],
                ..Default::default()
            }],
            all_points: vec![point],
            ..Default::default()
        };

        let out = normalize(doc);
        assert_eq!(out.service, Some(Service::Yamareco));
        assert_eq!(out.tracks[0].name.as_deref(), Some("track"));
        assert_eq!(out.tracks[0].number.as_deref(), Some("1"));
        assert_eq!(out.tracks[0].points[0].lat, "34.932939835");
        assert_eq!(out.all_points[0].lon, "135.765692369");
        assert_eq!(out.all_points[0].ele.as_deref(), Some("30.0"));
    }
}
