//! Activity summary for inspection output.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::gpx_types::{GpxDocument, Service, TrackPoint};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySummary {
    pub creator: String,
    pub service: Option<Service>,
    pub tracks: Vec<TrackSummary>,
    pub point_count: usize,
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
    /// Calendar days between the earliest and latest point.
    pub span_days: Option<i64>,
    /// Point count per calendar date, in date order.
    pub points_per_date: BTreeMap<String, usize>,
    /// Seconds between the first and last points in time order.
    pub duration_secs: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSummary {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub track_type: Option<String>,
    pub points: usize,
}

impl ActivitySummary {
    pub fn unique_dates(&self) -> usize {
        self.points_per_date.len()
    }

    /// `1d 2h 5m` style rendering of [`Self::duration_secs`].
    pub fn duration_label(&self) -> Option<String> {
        self.duration_secs.map(|secs| {
            let days = secs.div_euclid(86_400);
            let rest = secs.rem_euclid(86_400);
            format!("{days}d {}h {}m", rest / 3600, (rest / 60) % 60)
        })
    }
}

pub fn summarize(doc: &GpxDocument) -> ActivitySummary {
    let stamps: Vec<DateTime<FixedOffset>> =
        doc.all_points.iter().filter_map(TrackPoint::timestamp).collect();

    let mut points_per_date = BTreeMap::new();
    for stamp in &stamps {
        *points_per_date
            .entry(stamp.format("%Y-%m-%d").to_string())
            .or_insert(0) += 1;
    }

    let start = stamps.iter().min().copied();
    let end = stamps.iter().max().copied();
    let span_days = start
        .zip(end)
        .map(|(s, e)| (e.date_naive() - s.date_naive()).num_days());

    let first = doc.all_points.first().and_then(TrackPoint::timestamp);
    let last = doc.all_points.last().and_then(TrackPoint::timestamp);
    let duration_secs = first.zip(last).map(|(f, l)| (l - f).num_seconds());

    ActivitySummary {
        creator: doc.creator.clone(),
        service: doc.service,
        tracks: doc
            .tracks
            .iter()
            .map(|t| TrackSummary {
                name: t.name.clone(),
                track_type: t.track_type.clone(),
                points: t.points.len(),
            })
            .collect(),
        point_count: doc.all_points.len(),
        start,
        end,
        span_days,
        points_per_date,
        duration_secs,
    }
}
