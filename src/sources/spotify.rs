use crate::podcasts::{Episode, Platform, PlatformStats};
use crate::sources::types::{FetchError, SourceMetadata};
use crate::sources::SourceFetcher;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Mutex;
use std::time::Duration;

const TOKEN_ENDPOINT: &str = "https://accounts.spotify.com/api/token";
const SHOWS_ENDPOINT: &str = "https://api.spotify.com/v1/shows";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

// refresh the cached app token a minute before it actually expires
const TOKEN_EXPIRY_SLACK_SECS: i64 = 60;

struct CachedToken {
    access_token: String,
    expires_at: i64,
}

pub struct SpotifyFetcher {
    client_id: String,
    client_secret: String,
    client: reqwest::blocking::Client,
    token: Mutex<Option<CachedToken>>,
}

impl SpotifyFetcher {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            client: reqwest::blocking::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("reqwest client builds"),
            token: Mutex::new(None),
        }
    }

    /// Client-credentials flow, cached in-process until shortly before expiry.
    fn access_token(&self) -> Result<String, FetchError> {
        let mut cached = self.token.lock().unwrap();

        if let Some(token) = cached.as_ref() {
            if token.expires_at - TOKEN_EXPIRY_SLACK_SECS > Utc::now().timestamp() {
                return Ok(token.access_token.clone());
            }
        }

        let basic = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));
        let resp = self
            .client
            .post(TOKEN_ENDPOINT)
            .header("Authorization", format!("Basic {basic}"))
            .form(&[("grant_type", "client_credentials")])
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::from_status(status, "spotify token"));
        }

        let token: TokenResponse = resp
            .json()
            .map_err(|err| FetchError::Terminal(format!("spotify token parse: {err}")))?;

        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Utc::now().timestamp() + token.expires_in,
        });

        Ok(access_token)
    }

    fn show(&self, show_id: &str) -> Result<ShowResponse, FetchError> {
        let token = self.access_token()?;

        let resp = self
            .client
            .get(format!("{SHOWS_ENDPOINT}/{show_id}"))
            .query(&[("market", "US")])
            .bearer_auth(token)
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::from_status(status, "spotify shows.get"));
        }

        resp.json()
            .map_err(|err| FetchError::Terminal(format!("spotify shows.get parse: {err}")))
    }
}

impl SourceFetcher for SpotifyFetcher {
    fn platform(&self) -> Platform {
        Platform::Spotify
    }

    fn fetch(&self, external_id: &str) -> Result<SourceMetadata, FetchError> {
        Ok(map_show(self.show(external_id)?))
    }

    fn name(&self) -> &'static str {
        "Spotify Web API"
    }
}

/// Maps a show object onto our record fields. Spotify exposes no play or
/// follower counters through this endpoint, so those stay zero.
pub fn map_show(show: ShowResponse) -> SourceMetadata {
    let episodes = show
        .episodes
        .map(|page| page.items)
        .unwrap_or_default()
        .into_iter()
        .map(|item| Episode {
            id: item.id,
            title: item.name,
            published_at: parse_release_date(item.release_date.as_deref()),
            downloads: 0,
            plays: 0,
            likes: 0,
            duration_secs: (item.duration_ms.unwrap_or(0) / 1000) as u32,
        })
        .collect::<Vec<_>>();

    SourceMetadata {
        title: show.name,
        description: show.description.unwrap_or_default(),
        author: show.publisher.unwrap_or_default(),
        cover_image_url: show.images.into_iter().next().map(|img| img.url),
        stats: PlatformStats {
            views: 0,
            likes: 0,
            comments: 0,
            subscribers: 0,
            episode_count: show.total_episodes.unwrap_or(episodes.len() as u32),
        },
        episodes,
    }
}

// release_date precision varies: "2023-04-01", "2023-04" or just "2023"
fn parse_release_date(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d"))
        .or_else(|_| NaiveDate::parse_from_str(&format!("{raw}-01-01"), "%Y-%m-%d"))
        .ok()?;

    Some(DateTime::<Utc>::from_naive_utc_and_offset(
        date.and_hms_opt(0, 0, 0)?,
        Utc,
    ))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
pub struct ShowResponse {
    pub name: String,
    pub description: Option<String>,
    pub publisher: Option<String>,
    #[serde(default)]
    pub images: Vec<Image>,
    pub total_episodes: Option<u32>,
    pub episodes: Option<EpisodePage>,
}

#[derive(Debug, Deserialize)]
pub struct Image {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct EpisodePage {
    #[serde(default)]
    pub items: Vec<EpisodeItem>,
}

#[derive(Debug, Deserialize)]
pub struct EpisodeItem {
    pub id: String,
    pub name: String,
    pub release_date: Option<String>,
    pub duration_ms: Option<u64>,
}
