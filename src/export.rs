//! CSV rendering and ZIP packaging of run results.
//!
//! Two tables per run: one row per extracted video and one summary row per
//! channel. Both land in a single deflated ZIP for delivery. Absent optional
//! values render as empty cells so a missing count never reads as zero.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use csv::Writer;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::extract::VideoRecord;
use crate::run::{ChannelSummaryRecord, RunResult};

pub const VIDEO_TABLE_FILE: &str = "videos.csv";
pub const CHANNEL_TABLE_FILE: &str = "channels.csv";

const VIDEO_HEADER: [&str; 13] = [
    "channelID",
    "channelName",
    "videoID",
    "videoTitle",
    "duration",
    "isShort",
    "views",
    "likes",
    "comments",
    "tags",
    "thumbnail",
    "publishedDate",
    "description",
];

const CHANNEL_HEADER: [&str; 7] = [
    "channelID",
    "channelName",
    "subscribers",
    "totalViews",
    "totalVideos",
    "videosInRange",
    "extractedAt",
];

fn optional_cell(value: Option<i64>) -> String {
    value.map(|value| value.to_string()).unwrap_or_default()
}

/// Renders the video-level table. An empty run still yields the fixed header
/// row.
pub fn video_table_csv(videos: &[VideoRecord]) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut writer = Writer::from_writer(&mut buffer);
    writer
        .write_record(VIDEO_HEADER)
        .context("writing video table header")?;

    for video in videos {
        let duration = optional_cell(video.duration_seconds);
        let views = video.view_count.to_string();
        let likes = optional_cell(video.like_count);
        let comments = optional_cell(video.comment_count);
        writer
            .write_record([
                video.channel_id.as_str(),
                video.channel_name.as_str(),
                video.video_id.as_str(),
                video.title.as_str(),
                duration.as_str(),
                if video.is_short { "true" } else { "false" },
                views.as_str(),
                likes.as_str(),
                comments.as_str(),
                video.tags.as_str(),
                video.thumbnail_url.as_deref().unwrap_or(""),
                video.published_at.as_str(),
                video.description.as_str(),
            ])
            .with_context(|| format!("writing video row for {}", video.video_id))?;
    }

    writer.flush().context("flushing video table")?;
    drop(writer);
    Ok(buffer)
}

/// Renders the channel-level summary table.
pub fn channel_table_csv(channels: &[ChannelSummaryRecord]) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut writer = Writer::from_writer(&mut buffer);
    writer
        .write_record(CHANNEL_HEADER)
        .context("writing channel table header")?;

    for channel in channels {
        let subscribers = optional_cell(channel.subscriber_count);
        let total_views = channel.total_view_count.to_string();
        let total_videos = channel.total_video_count.to_string();
        let in_range = channel.videos_in_range.to_string();
        writer
            .write_record([
                channel.channel_id.as_str(),
                channel.channel_name.as_str(),
                subscribers.as_str(),
                total_views.as_str(),
                total_videos.as_str(),
                in_range.as_str(),
                channel.extracted_at.as_str(),
            ])
            .with_context(|| format!("writing channel row for {}", channel.channel_id))?;
    }

    writer.flush().context("flushing channel table")?;
    drop(writer);
    Ok(buffer)
}

/// Writes both tables into one deflated ZIP at `path`, creating parent
/// directories as needed.
pub fn write_archive(path: &Path, result: &RunResult) -> Result<()> {
    let videos_csv = video_table_csv(&result.videos)?;
    let channels_csv = channel_table_csv(&result.channels)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(VIDEO_TABLE_FILE, options)
        .context("starting video table entry")?;
    zip.write_all(&videos_csv)
        .context("writing video table entry")?;

    zip.start_file(CHANNEL_TABLE_FILE, options)
        .context("starting channel table entry")?;
    zip.write_all(&channels_csv)
        .context("writing channel table entry")?;

    zip.finish().context("finishing export archive")?;
    Ok(())
}

/// Keeps only characters safe for a filename label: alphanumerics,
/// underscore, and hyphen.
pub fn sanitize_label(label: &str) -> String {
    label
        .trim()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn sample_video(video_id: &str) -> VideoRecord {
        VideoRecord {
            video_id: video_id.to_string(),
            title: format!("Video {video_id}"),
            description: "desc".to_string(),
            tags: "alpha|beta".to_string(),
            thumbnail_url: Some("https://i.ytimg.com/x/hq.jpg".to_string()),
            published_at: "2026-06-01T10:00:00Z".to_string(),
            duration_seconds: Some(120),
            is_short: false,
            view_count: 10,
            like_count: Some(2),
            comment_count: None,
            channel_id: "UC1".to_string(),
            channel_name: "Acme".to_string(),
        }
    }

    fn sample_channel() -> ChannelSummaryRecord {
        ChannelSummaryRecord {
            channel_id: "UC1".to_string(),
            channel_name: "Acme".to_string(),
            subscriber_count: None,
            total_view_count: 5000,
            total_video_count: 10,
            videos_in_range: 1,
            extracted_at: "2026-08-07T00:00:00Z".to_string(),
        }
    }

    fn rows(bytes: &[u8]) -> Vec<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(bytes);
        reader
            .records()
            .map(|record| {
                record
                    .unwrap()
                    .iter()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn video_table_has_fixed_header_even_when_empty() {
        let bytes = video_table_csv(&[]).unwrap();
        let rows = rows(&bytes);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0], VIDEO_HEADER);
    }

    #[test]
    fn video_rows_render_absent_counts_as_empty_cells() {
        let bytes = video_table_csv(&[sample_video("vid1")]).unwrap();
        let rows = rows(&bytes);
        assert_eq!(rows.len(), 2);
        let row = &rows[1];
        assert_eq!(row[0], "UC1");
        assert_eq!(row[4], "120");
        assert_eq!(row[5], "false");
        assert_eq!(row[7], "2");
        assert_eq!(row[8], "", "absent comment count must not become 0");
    }

    #[test]
    fn channel_rows_render_hidden_subscribers_as_empty_cell() {
        let bytes = channel_table_csv(&[sample_channel()]).unwrap();
        let rows = rows(&bytes);
        assert_eq!(rows[0], CHANNEL_HEADER);
        let row = &rows[1];
        assert_eq!(row[2], "");
        assert_eq!(row[3], "5000");
        assert_eq!(row[5], "1");
    }

    #[test]
    fn archive_contains_both_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exports/run.zip");
        let result = RunResult {
            videos: vec![sample_video("vid1")],
            channels: vec![sample_channel()],
        };
        write_archive(&path, &result).unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, [CHANNEL_TABLE_FILE, VIDEO_TABLE_FILE]);

        let mut videos_csv = String::new();
        archive
            .by_name(VIDEO_TABLE_FILE)
            .unwrap()
            .read_to_string(&mut videos_csv)
            .unwrap();
        assert!(videos_csv.starts_with("channelID,channelName,videoID"));
        assert!(videos_csv.contains("vid1"));
    }

    #[test]
    fn fields_with_commas_and_quotes_survive_a_round_trip() {
        let mut video = sample_video("vid1");
        video.title = "Title, with \"quotes\"".to_string();
        video.description = "line one\nline two".to_string();
        let bytes = video_table_csv(&[video]).unwrap();
        let rows = rows(&bytes);
        assert_eq!(rows[1][3], "Title, with \"quotes\"");
        assert_eq!(rows[1][12], "line one\nline two");
    }

    #[test]
    fn sanitize_label_strips_everything_unsafe() {
        assert_eq!(sanitize_label("  my category! "), "mycategory");
        assert_eq!(sanitize_label("tech_reviews-2026"), "tech_reviews-2026");
        assert_eq!(sanitize_label("a/b\\c"), "abc");
    }
}
