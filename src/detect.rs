use crate::gpx_types::{GpxDocument, Service};

/// Guess which service produced `doc`.
///
/// The creator attribute is authoritative; track names are only consulted
/// when it names none of the known services. First match wins.
///
/// Each track name is checked for `runkeeper` first, then `yamareco` or the
/// exact placeholder `track`, then `strava`.
pub fn detect_service(doc: &GpxDocument) -> Service {
    let creator = doc.creator.to_lowercase();
    let by_creator = [
        ("runkeeper", Service::Runkeeper),
        ("yamareco", Service::Yamareco),
        ("strava", Service::Strava),
        ("garmin", Service::Garmin),
    ]
    .into_iter()
    .find(|(needle, _)| creator.contains(needle));

    if let Some((_, service)) = by_creator {
        tracing::debug!(creator = %doc.creator, %service, "service detected from creator");
        return service;
    }

    for name in doc.tracks.iter().filter_map(|t| t.name.as_deref()) {
        let name = name.to_lowercase();
        let service = if name.contains("runkeeper") {
            Service::Runkeeper
        } else if name.contains("yamareco") || name == "track" {
            // Yamareco names every track literally "track".
            Service::Yamareco
        } else if name.contains("strava") {
            Service::Strava
        } else {
            continue;
        };
        tracing::debug!(%service, "service detected from track name");
        return service;
    }

    Service::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpx_types::Track;
    use rstest::rstest;

    fn doc(creator: &str, names: &[&str]) -> GpxDocument {
        GpxDocument {
            creator: creator.to_string(),
            tracks: names
                .iter()
                .map(|n| Track {
                    name: Some(n.to_string()),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[rstest]
    #[case("Runkeeper - http://www.runkeeper.com", Service::Runkeeper)]
    #[case("Yamareco iOS 7.22 - www.yamareco.com", Service::Yamareco)]
    #[case("StravaGPX", Service::Strava)]
    #[case("Garmin Connect", Service::Garmin)]
    #[case("Unknown", Service::Unknown)]
    fn test_creator(#[case] creator: &str, #[case] expected: Service) {
        assert_eq!(detect_service(&doc(creator, &[])), expected);
    }

    #[rstest]
    #[case(&["Morning Run via Runkeeper"], Service::Runkeeper)]
    #[case(&["track"], Service::Yamareco)]
    #[case(&["TRACK"], Service::Yamareco)]
    #[case(&["yamareco log"], Service::Yamareco)]
    #[case(&["strava export"], Service::Strava)]
    #[case(&["my track"], Service::Unknown)]
    #[case(&["afternoon", "track"], Service::Yamareco)]
    #[case(&["yamareco to strava"], Service::Yamareco)]
    fn test_track_names(#[case] names: &[&str], #[case] expected: Service) {
        assert_eq!(detect_service(&doc("SomeApp", names)), expected);
    }

    #[test]
    fn test_creator_beats_track_name() {
        assert_eq!(detect_service(&doc("StravaGPX", &["track"])), Service::Strava);
    }

    #[test]
    fn test_creator_precedence() {
        // Runkeeper is checked before Strava.
        assert_eq!(
            detect_service(&doc("Strava import from Runkeeper", &[])),
            Service::Runkeeper
        );
    }

    #[test]
    fn test_unnamed_tracks() {
        let mut d = doc("SomeApp", &[]);
        d.tracks.push(Track::default());
        assert_eq!(detect_service(&d), Service::Unknown);
    }
}
