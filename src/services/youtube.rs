// src/services/youtube.rs
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error as StdError;

use crate::models::VideoObservation;

pub type Result<T> = std::result::Result<T, Box<dyn StdError + Send + Sync>>;

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const PAGE_SIZE: usize = 50;

/// Videos at or under this length count as shorts.
const SHORT_MAX_SECONDS: u64 = 60;

#[derive(Debug, Clone)]
pub struct ChannelSummary {
    pub channel_id: String,
    pub uploads_playlist_id: String,
    pub total_video_count: i64,
}

/// Thin client for the YouTube Data API v3.
pub struct YouTubeClient {
    client: Client,
    api_key: String,
}

#[derive(Deserialize)]
struct ChannelListResponse {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelItem {
    statistics: ChannelStatistics,
    content_details: ChannelContentDetails,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelStatistics {
    video_count: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelContentDetails {
    related_playlists: RelatedPlaylists,
}

#[derive(Deserialize)]
struct RelatedPlaylists {
    uploads: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemsResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    content_details: PlaylistItemContentDetails,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemContentDetails {
    video_id: String,
    video_published_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    statistics: Option<VideoStatistics>,
    content_details: Option<VideoContentDetails>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    view_count: Option<String>,
}

#[derive(Deserialize)]
struct VideoContentDetails {
    duration: String,
}

impl YouTubeClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
        }
    }

    /// Resolve a channel's uploads playlist and total video count.
    pub async fn fetch_channel_summary(&self, channel_id: &str) -> Result<ChannelSummary> {
        let url = format!(
            "{}/channels?part=statistics,contentDetails&id={}&key={}",
            API_BASE, channel_id, self.api_key
        );
        debug!("Fetching channel summary for {}", channel_id);

        let resp: ChannelListResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let item = resp
            .items
            .into_iter()
            .next()
            .ok_or_else(|| format!("Channel not found: {}", channel_id))?;

        Ok(ChannelSummary {
            channel_id: channel_id.to_string(),
            uploads_playlist_id: item.content_details.related_playlists.uploads,
            total_video_count: item.statistics.video_count.parse()?,
        })
    }

    /// Pull up to `limit` observations from a channel's uploads playlist,
    /// newest first. With `published_after` set, paging stops at the first
    /// item not newer than the cutoff (incremental fetch).
    pub async fn fetch_observations(
        &self,
        uploads_playlist_id: &str,
        limit: usize,
        published_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<VideoObservation>> {
        let mut published: HashMap<String, DateTime<Utc>> = HashMap::new();
        let mut ids: Vec<String> = Vec::new();
        let mut page_token: Option<String> = None;

        'pages: loop {
            let mut url = format!(
                "{}/playlistItems?part=contentDetails&playlistId={}&maxResults={}&key={}",
                API_BASE, uploads_playlist_id, PAGE_SIZE, self.api_key
            );
            if let Some(token) = &page_token {
                url.push_str("&pageToken=");
                url.push_str(token);
            }

            let resp: PlaylistItemsResponse = self
                .client
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            for item in resp.items {
                let details = item.content_details;
                let published_at = match details.video_published_at {
                    Some(ts) => ts,
                    // Scheduled/private entries carry no publish timestamp.
                    None => continue,
                };
                if let Some(cutoff) = published_after {
                    if published_at <= cutoff {
                        break 'pages;
                    }
                }
                published.insert(details.video_id.clone(), published_at);
                ids.push(details.video_id);
                if ids.len() >= limit {
                    break 'pages;
                }
            }

            page_token = resp.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        info!(
            "Collected {} video ids from playlist {}",
            ids.len(),
            uploads_playlist_id
        );

        let duration_re = Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$")?;
        let mut observations = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(PAGE_SIZE) {
            let url = format!(
                "{}/videos?part=statistics,contentDetails&id={}&key={}",
                API_BASE,
                chunk.join(","),
                self.api_key
            );
            let resp: VideoListResponse = self
                .client
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            for video in resp.items {
                let published_at = match published.get(&video.id) {
                    Some(ts) => *ts,
                    None => continue,
                };
                let view_count = video
                    .statistics
                    .and_then(|s| s.view_count)
                    .map(|v| v.parse::<u64>())
                    .transpose()?
                    .unwrap_or(0);
                let seconds = match video.content_details {
                    Some(details) => parse_duration_seconds(&duration_re, &details.duration),
                    None => None,
                };
                let is_short = match seconds {
                    Some(s) => is_short_duration(s),
                    None => {
                        warn!("Unparseable duration for video {}, assuming long-form", video.id);
                        false
                    }
                };
                observations.push(VideoObservation {
                    id: video.id,
                    view_count,
                    published_at,
                    is_short,
                });
            }
        }

        // Statistics lookups come back unordered; restore newest-first.
        observations.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(observations)
    }
}

fn is_short_duration(seconds: u64) -> bool {
    seconds <= SHORT_MAX_SECONDS
}

/// ISO-8601 duration ("PT1H2M3S") to whole seconds.
fn parse_duration_seconds(re: &Regex, duration: &str) -> Option<u64> {
    let caps = re.captures(duration)?;
    let part = |i: usize| -> u64 {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    Some(part(1) * 3600 + part(2) * 60 + part(3))
}
