//! Channel resolution, playlist enumeration, window filtering, and batched
//! detail lookup.
//!
//! These are the four stages the run aggregator drives for every channel.
//! Each stage talks to the catalog through the [`RemoteCall`] seam and
//! decodes the raw JSON into the wire structs below before producing the
//! flat records the exports are built from.

use chrono::NaiveDateTime;
use log::warn;
use serde::{Deserialize, Deserializer};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api::{ExtractError, RemoteCall};
use crate::duration::parse_duration_seconds;

pub const CHANNELS_ENDPOINT: &str = "channels";
pub const PLAYLIST_ITEMS_ENDPOINT: &str = "playlistItems";
pub const VIDEOS_ENDPOINT: &str = "videos";

/// Upstream ceiling on both playlist pages and detail lookups.
pub const MAX_RESULTS_PER_CALL: usize = 50;

/// A video considered a Short: known duration of at most this many seconds.
const SHORT_MAX_SECONDS: i64 = 60;

// ---------------------------------------------------------------------------
// Domain records

/// Canonical channel metadata from a statistics lookup.
#[derive(Debug, Clone)]
pub struct ChannelProfile {
    pub id: String,
    pub display_name: String,
    pub uploads_list_id: String,
    /// `None` when the channel hides its subscriber count (or the upstream
    /// omits it); never coerced to zero.
    pub subscriber_count: Option<i64>,
    pub total_view_count: i64,
    pub total_video_count: i64,
}

/// Lightweight reference to one video as listed in an uploads playlist.
#[derive(Debug, Clone)]
pub struct PlaylistEntry {
    pub video_id: String,
    pub title: String,
    /// Raw upstream timestamp text; parsed only when filtering.
    pub published_at: String,
    pub thumbnail_url: Option<String>,
}

/// Fully enriched, flattened representation of one video after detail
/// lookup. `channel_id`/`channel_name` stay empty until the run aggregator
/// stamps them; the batcher itself is channel-agnostic.
#[derive(Debug, Clone)]
pub struct VideoRecord {
    pub video_id: String,
    pub title: String,
    pub description: String,
    /// Tag list joined with `|`; split on that delimiter to recover it.
    pub tags: String,
    pub thumbnail_url: Option<String>,
    pub published_at: String,
    pub duration_seconds: Option<i64>,
    pub is_short: bool,
    pub view_count: i64,
    pub like_count: Option<i64>,
    pub comment_count: Option<i64>,
    pub channel_id: String,
    pub channel_name: String,
}

// ---------------------------------------------------------------------------
// Wire structs

#[derive(Debug, Deserialize)]
struct ChannelListResponse {
    #[serde(default)]
    items: Vec<ChannelResource>,
}

#[derive(Debug, Deserialize)]
struct ChannelResource {
    id: String,
    snippet: ChannelSnippet,
    #[serde(rename = "contentDetails")]
    content_details: Option<ChannelContentDetails>,
    statistics: Option<ChannelStatistics>,
}

#[derive(Debug, Deserialize)]
struct ChannelSnippet {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ChannelContentDetails {
    #[serde(rename = "relatedPlaylists")]
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: String,
}

#[derive(Debug, Default, Deserialize)]
struct ChannelStatistics {
    #[serde(rename = "subscriberCount", default, deserialize_with = "opt_count")]
    subscriber_count: Option<i64>,
    #[serde(rename = "hiddenSubscriberCount", default)]
    hidden_subscriber_count: bool,
    #[serde(rename = "viewCount", default, deserialize_with = "opt_count")]
    view_count: Option<i64>,
    #[serde(rename = "videoCount", default, deserialize_with = "opt_count")]
    video_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemListResponse {
    #[serde(default)]
    items: Vec<PlaylistItemResource>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemResource {
    snippet: PlaylistItemSnippet,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemSnippet {
    #[serde(default)]
    title: String,
    #[serde(rename = "publishedAt", default)]
    published_at: String,
    #[serde(rename = "resourceId")]
    resource_id: ResourceId,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Deserialize)]
struct ResourceId {
    #[serde(rename = "videoId")]
    video_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl Thumbnails {
    /// Best available rendition; older uploads may only carry the default.
    fn best_url(self) -> Option<String> {
        self.high
            .or(self.medium)
            .or(self.default)
            .map(|thumbnail| thumbnail.url)
    }
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoResource>,
}

#[derive(Debug, Deserialize)]
struct VideoResource {
    id: String,
    snippet: VideoSnippet,
    statistics: Option<VideoStatistics>,
    #[serde(rename = "contentDetails")]
    content_details: Option<VideoContentDetails>,
}

#[derive(Debug, Deserialize)]
struct VideoSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(rename = "publishedAt", default)]
    published_at: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct VideoStatistics {
    #[serde(rename = "viewCount", default, deserialize_with = "opt_count")]
    view_count: Option<i64>,
    #[serde(rename = "likeCount", default, deserialize_with = "opt_count")]
    like_count: Option<i64>,
    #[serde(rename = "commentCount", default, deserialize_with = "opt_count")]
    comment_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct VideoContentDetails {
    duration: Option<String>,
}

/// Count fields arrive as JSON strings (`"1234"`); accept a bare integer
/// too, reject everything else.
fn opt_count<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(i64),
        Text(String),
    }

    match Option::<Count>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Count::Number(value)) => Ok(Some(value)),
        Some(Count::Text(text)) => text
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid count {text:?}"))),
    }
}

fn decode<T: DeserializeOwned>(endpoint: &str, value: Value) -> Result<T, ExtractError> {
    serde_json::from_value(value).map_err(|source| ExtractError::Payload {
        endpoint: endpoint.to_string(),
        source,
    })
}

fn missing_field(endpoint: &str, field: &str) -> ExtractError {
    ExtractError::Payload {
        endpoint: endpoint.to_string(),
        source: <serde_json::Error as serde::de::Error>::custom(format!("missing {field}")),
    }
}

// ---------------------------------------------------------------------------
// Channel resolver

/// Looks up the channel's uploads playlist id and display name.
pub fn resolve_uploads(
    gateway: &dyn RemoteCall,
    channel_id: &str,
) -> Result<(String, String), ExtractError> {
    let value = gateway.call(
        CHANNELS_ENDPOINT,
        &[("part", "contentDetails,snippet"), ("id", channel_id)],
    )?;
    let response: ChannelListResponse = decode(CHANNELS_ENDPOINT, value)?;
    let item = response
        .items
        .into_iter()
        .next()
        .ok_or_else(|| ExtractError::ChannelNotFound(channel_id.to_string()))?;
    let uploads = item
        .content_details
        .map(|details| details.related_playlists.uploads)
        .ok_or_else(|| missing_field(CHANNELS_ENDPOINT, "contentDetails"))?;
    Ok((uploads, item.snippet.title))
}

/// Fetches the channel's aggregate statistics as a [`ChannelProfile`].
pub fn resolve_stats(
    gateway: &dyn RemoteCall,
    channel_id: &str,
) -> Result<ChannelProfile, ExtractError> {
    let value = gateway.call(
        CHANNELS_ENDPOINT,
        &[("part", "snippet,statistics,contentDetails"), ("id", channel_id)],
    )?;
    let response: ChannelListResponse = decode(CHANNELS_ENDPOINT, value)?;
    let item = response
        .items
        .into_iter()
        .next()
        .ok_or_else(|| ExtractError::ChannelNotFound(channel_id.to_string()))?;

    let stats = item.statistics.unwrap_or_default();
    let subscriber_count = if stats.hidden_subscriber_count {
        None
    } else {
        stats.subscriber_count
    };

    Ok(ChannelProfile {
        id: item.id,
        display_name: item.snippet.title,
        uploads_list_id: item
            .content_details
            .map(|details| details.related_playlists.uploads)
            .unwrap_or_default(),
        subscriber_count,
        total_view_count: stats.view_count.unwrap_or(0),
        total_video_count: stats.video_count.unwrap_or(0),
    })
}

// ---------------------------------------------------------------------------
// Item enumerator

/// Pulls the whole uploads playlist into memory, page by page, following the
/// continuation cursor until the upstream stops returning one. Upstream
/// listing order is preserved as-is.
pub fn enumerate_playlist(
    gateway: &dyn RemoteCall,
    uploads_list_id: &str,
) -> Result<Vec<PlaylistEntry>, ExtractError> {
    let mut entries = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let mut params: Vec<(&str, &str)> = vec![
            ("part", "snippet"),
            ("playlistId", uploads_list_id),
            ("maxResults", "50"),
        ];
        if let Some(token) = page_token.as_deref() {
            params.push(("pageToken", token));
        }

        let value = gateway.call(PLAYLIST_ITEMS_ENDPOINT, &params)?;
        let page: PlaylistItemListResponse = decode(PLAYLIST_ITEMS_ENDPOINT, value)?;

        for item in page.items {
            let snippet = item.snippet;
            entries.push(PlaylistEntry {
                video_id: snippet.resource_id.video_id,
                title: snippet.title,
                published_at: snippet.published_at,
                thumbnail_url: snippet.thumbnails.best_url(),
            });
        }

        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    Ok(entries)
}

// ---------------------------------------------------------------------------
// Range filter

/// Keeps the entries published inside `[start, end]`, both bounds inclusive,
/// compared at full timestamp precision. Stable: output order matches input
/// order. Entries whose timestamp does not parse are dropped with a
/// diagnostic.
pub fn filter_by_publish_window(
    entries: Vec<PlaylistEntry>,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Vec<PlaylistEntry> {
    entries
        .into_iter()
        .filter(|entry| match parse_published_at(&entry.published_at) {
            Some(published) => start <= published && published <= end,
            None => {
                warn!(
                    "dropping {}: unparseable publish timestamp {:?}",
                    entry.video_id, entry.published_at
                );
                false
            }
        })
        .collect()
}

/// Upstream timestamps carry a trailing `Z`; the comparison is naive against
/// the caller-supplied midnight bounds.
fn parse_published_at(text: &str) -> Option<NaiveDateTime> {
    text.trim().trim_end_matches('Z').parse().ok()
}

// ---------------------------------------------------------------------------
// Detail batcher

/// Fetches full detail records for `video_ids` in chunks of at most 50 and
/// normalizes each into a flat [`VideoRecord`]. A failed chunk fails the
/// whole call; there is no partial-chunk salvage.
pub fn fetch_details(
    gateway: &dyn RemoteCall,
    video_ids: &[String],
) -> Result<Vec<VideoRecord>, ExtractError> {
    let mut records = Vec::new();

    for chunk in video_ids.chunks(MAX_RESULTS_PER_CALL) {
        let ids = chunk.join(",");
        let value = gateway.call(
            VIDEOS_ENDPOINT,
            &[("part", "snippet,statistics,contentDetails"), ("id", &ids)],
        )?;
        let response: VideoListResponse = decode(VIDEOS_ENDPOINT, value)?;
        for item in response.items {
            records.push(normalize_video(item));
        }
    }

    Ok(records)
}

fn normalize_video(item: VideoResource) -> VideoRecord {
    let snippet = item.snippet;
    let stats = item.statistics.unwrap_or_default();
    let duration_seconds = item
        .content_details
        .and_then(|details| details.duration)
        .as_deref()
        .and_then(parse_duration_seconds);

    VideoRecord {
        video_id: item.id,
        title: snippet.title,
        description: snippet.description,
        tags: snippet.tags.join("|"),
        thumbnail_url: snippet.thumbnails.best_url(),
        published_at: snippet.published_at,
        duration_seconds,
        is_short: duration_seconds.is_some_and(|seconds| seconds <= SHORT_MAX_SECONDS),
        view_count: stats.view_count.unwrap_or(0),
        like_count: stats.like_count,
        comment_count: stats.comment_count,
        channel_id: String::new(),
        channel_name: String::new(),
    }
}

// ---------------------------------------------------------------------------
