//! Run aggregation: drives resolver, enumerator, filter, and batcher for one
//! or many channels and accumulates the two result tables.
//!
//! Batch mode isolates failures per channel: a channel that errors is logged
//! and skipped, contributes no rows and no summary, and never aborts the run.

use std::collections::HashSet;

use chrono::{Months, NaiveDate, NaiveDateTime, NaiveTime};
use log::warn;

use crate::api::{ExtractError, RemoteCall};
use crate::extract::{
    VideoRecord, enumerate_playlist, fetch_details, filter_by_publish_window, resolve_stats,
    resolve_uploads,
};

/// Inclusive publish window, both bounds at midnight of their day.
#[derive(Debug, Clone, Copy)]
pub struct DateWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateWindow {
    /// Whole-months look-back ending today. Calendar subtraction clamps the
    /// day of month (Mar 31 minus one month is Feb 28/29).
    pub fn months_back(months: u32, today: NaiveDate) -> Self {
        let start_date = today
            .checked_sub_months(Months::new(months))
            .unwrap_or(today);
        Self {
            start: start_date.and_time(NaiveTime::MIN),
            end: today.and_time(NaiveTime::MIN),
        }
    }
}

/// One summary row per successfully processed channel.
#[derive(Debug, Clone)]
pub struct ChannelSummaryRecord {
    pub channel_id: String,
    pub channel_name: String,
    /// `None` when hidden upstream; kept distinct from zero end to end.
    pub subscriber_count: Option<i64>,
    pub total_view_count: i64,
    pub total_video_count: i64,
    pub videos_in_range: usize,
    pub extracted_at: String,
}

/// Everything one invocation produces; discarded once exported.
#[derive(Debug, Default)]
pub struct RunResult {
    pub videos: Vec<VideoRecord>,
    pub channels: Vec<ChannelSummaryRecord>,
}

/// Splits a newline-delimited identifier list, trimming whitespace and
/// dropping blank lines.
pub fn parse_channel_ids(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// First occurrence wins; later duplicates are dropped.
pub fn dedup_first_occurrence(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

/// Full pipeline for one channel. Any terminal error surfaces to the caller;
/// a summary row is emitted even when the window holds no videos.
pub fn run_single(
    gateway: &dyn RemoteCall,
    channel_id: &str,
    window: DateWindow,
    extracted_at: &str,
) -> Result<RunResult, ExtractError> {
    let (uploads_list_id, channel_name) = resolve_uploads(gateway, channel_id)?;
    let entries = enumerate_playlist(gateway, &uploads_list_id)?;
    let listed = entries.len();
    let in_range = filter_by_publish_window(entries, window.start, window.end);
    println!(
        "  {channel_name}: {} of {listed} uploads in range",
        in_range.len()
    );

    let mut videos = if in_range.is_empty() {
        Vec::new()
    } else {
        let video_ids: Vec<String> = in_range
            .iter()
            .map(|entry| entry.video_id.clone())
            .collect();
        fetch_details(gateway, &video_ids)?
    };

    let profile = resolve_stats(gateway, channel_id)?;
    for video in &mut videos {
        video.channel_id = profile.id.clone();
        video.channel_name = profile.display_name.clone();
    }

    let summary = ChannelSummaryRecord {
        channel_id: profile.id,
        channel_name: profile.display_name,
        subscriber_count: profile.subscriber_count,
        total_view_count: profile.total_view_count,
        total_video_count: profile.total_video_count,
        videos_in_range: videos.len(),
        extracted_at: extracted_at.to_string(),
    };

    Ok(RunResult {
        videos,
        channels: vec![summary],
    })
}

/// Batch path: dedup the identifiers (first occurrence wins), then run the
/// single-channel pipeline for each, concatenating results in processing
/// order. Failed channels are logged and skipped; the run itself never fails.
pub fn run_batch(
    gateway: &dyn RemoteCall,
    channel_ids: &[String],
    window: DateWindow,
    extracted_at: &str,
) -> RunResult {
    let ids = dedup_first_occurrence(channel_ids.to_vec());
    let total = ids.len();
    let mut combined = RunResult::default();

    for (index, channel_id) in ids.iter().enumerate() {
        println!("Processing {}/{total} - {channel_id}", index + 1);
        match run_single(gateway, channel_id, window, extracted_at) {
            Ok(result) => {
                combined.videos.extend(result.videos);
                combined.channels.extend(result.channels);
            }
            Err(err) => warn!("skipping channel {channel_id}: {err}"),
        }
    }

    combined
}
