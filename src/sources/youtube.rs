use crate::podcasts::{Episode, Platform, PlatformStats};
use crate::sources::types::{FetchError, SourceMetadata};
use crate::sources::SourceFetcher;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

const VIDEOS_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/videos";
const CHANNELS_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/channels";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct YouTubeFetcher {
    api_key: String,
    client: reqwest::blocking::Client,
}

impl YouTubeFetcher {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::blocking::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("reqwest client builds"),
        }
    }

    fn video(&self, video_id: &str) -> Result<VideoItem, FetchError> {
        let resp = self
            .client
            .get(VIDEOS_ENDPOINT)
            .query(&[
                ("part", "snippet,statistics"),
                ("id", video_id),
                ("key", &self.api_key),
            ])
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::from_status(status, "youtube videos.list"));
        }

        let list: VideoListResponse = resp
            .json()
            .map_err(|err| FetchError::Terminal(format!("youtube videos.list parse: {err}")))?;

        list.items
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::Terminal(format!("video not found: {video_id}")))
    }

    /// Best effort. A video without a resolvable channel still yields
    /// metadata, just with a zero subscriber count.
    fn channel_subscribers(&self, channel_id: &str) -> Option<u64> {
        let resp = self
            .client
            .get(CHANNELS_ENDPOINT)
            .query(&[
                ("part", "statistics"),
                ("id", channel_id),
                ("key", &self.api_key),
            ])
            .send()
            .ok()?;

        if !resp.status().is_success() {
            log::warn!(
                "youtube channels.list returned {} for {channel_id}",
                resp.status()
            );
            return None;
        }

        let list: ChannelListResponse = resp.json().ok()?;
        list.items
            .into_iter()
            .next()
            .and_then(|c| c.statistics.subscriber_count)
            .and_then(|count| count.parse::<u64>().ok())
    }
}

impl SourceFetcher for YouTubeFetcher {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    fn fetch(&self, external_id: &str) -> Result<SourceMetadata, FetchError> {
        let item = self.video(external_id)?;
        Ok(map_video(item, |channel_id| {
            self.channel_subscribers(channel_id)
        }))
    }

    fn name(&self) -> &'static str {
        "YouTube Data API v3"
    }
}

/// Maps a videos.list item onto our record fields. Subscriber lookup is
/// injected so the mapping stays testable without the network.
pub fn map_video(
    item: VideoItem,
    subscribers: impl FnOnce(&str) -> Option<u64>,
) -> SourceMetadata {
    let views = parse_count(item.statistics.view_count.as_deref());
    let likes = parse_count(item.statistics.like_count.as_deref());
    let comments = parse_count(item.statistics.comment_count.as_deref());

    let subscriber_count = item
        .snippet
        .channel_id
        .as_deref()
        .and_then(subscribers)
        .unwrap_or(0);

    let published_at = item
        .snippet
        .published_at
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc));

    // the video itself is the single tracked episode
    let episode = Episode {
        id: item.id.clone(),
        title: item.snippet.title.clone(),
        published_at,
        downloads: 0,
        plays: views,
        likes,
        duration_secs: 0,
    };

    SourceMetadata {
        title: item.snippet.title,
        description: item.snippet.description.unwrap_or_default(),
        author: item.snippet.channel_title.unwrap_or_default(),
        cover_image_url: item.snippet.thumbnails.and_then(|t| {
            t.maxres
                .or(t.high)
                .or(t.medium)
                .or(t.default)
                .map(|thumb| thumb.url)
        }),
        stats: PlatformStats {
            views,
            likes,
            comments,
            subscribers: subscriber_count,
            episode_count: 1,
        },
        episodes: vec![episode],
    }
}

// the API reports counters as decimal strings
fn parse_count(raw: Option<&str>) -> u64 {
    raw.and_then(|v| v.parse::<u64>().ok()).unwrap_or(0)
}

#[derive(Debug, Deserialize)]
pub struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
pub struct VideoItem {
    pub id: String,
    pub snippet: VideoSnippet,
    #[serde(default)]
    pub statistics: VideoStatistics,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    pub title: String,
    pub description: Option<String>,
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,
    pub published_at: Option<String>,
    pub thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Deserialize)]
pub struct Thumbnails {
    pub default: Option<Thumbnail>,
    pub medium: Option<Thumbnail>,
    pub high: Option<Thumbnail>,
    pub maxres: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
pub struct Thumbnail {
    pub url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatistics {
    pub view_count: Option<String>,
    pub like_count: Option<String>,
    pub comment_count: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChannelListResponse {
    #[serde(default)]
    pub items: Vec<ChannelItem>,
}

#[derive(Debug, Deserialize)]
pub struct ChannelItem {
    pub statistics: ChannelStatistics,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatistics {
    pub subscriber_count: Option<String>,
}
