pub mod spotify;
pub mod types;
pub mod youtube;

use crate::config::Secrets;
use crate::podcasts::Platform;
use once_cell::sync::Lazy;
use regex::Regex;
pub use types::{FetchError, SourceMetadata};

/// Compile source URL regexes once
static YOUTUBE_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:https?://)?(?:www\.|m\.)?(?:youtube\.com/(?:watch\?v=|shorts/|embed/)|youtu\.be/)([A-Za-z0-9_-]{11})",
    )
    .expect("youtube url regex compiles")
});

static SPOTIFY_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:https?://)?open\.spotify\.com/show/([A-Za-z0-9]{22})")
        .expect("spotify url regex compiles")
});

/// A parsed source URL: which platform, and the platform's id for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub platform: Platform,
    pub external_id: String,
}

/// Recognizes YouTube watch/short/embed/share URLs and Spotify show URLs.
pub fn parse_source_url(url: &str) -> Option<SourceRef> {
    if let Some(caps) = YOUTUBE_URL_RE.captures(url) {
        return Some(SourceRef {
            platform: Platform::Youtube,
            external_id: caps.get(1)?.as_str().to_string(),
        });
    }

    if let Some(caps) = SPOTIFY_URL_RE.captures(url) {
        return Some(SourceRef {
            platform: Platform::Spotify,
            external_id: caps.get(1)?.as_str().to_string(),
        });
    }

    None
}

/// One strategy per platform, dispatched by the parsed URL.
pub trait SourceFetcher: Send + Sync {
    fn platform(&self) -> Platform;

    /// Calls the platform API and maps the response onto our record fields
    fn fetch(&self, external_id: &str) -> Result<SourceMetadata, FetchError>;

    /// Name for logging
    fn name(&self) -> &'static str;
}

/// Collection of the fetchers we have credentials for.
pub struct SourceRegistry {
    fetchers: Vec<Box<dyn SourceFetcher>>,
}

impl SourceRegistry {
    pub fn from_secrets(secrets: &Secrets) -> Self {
        let mut fetchers: Vec<Box<dyn SourceFetcher>> = Vec::new();

        if let Some(key) = &secrets.youtube_api_key {
            fetchers.push(Box::new(youtube::YouTubeFetcher::new(key.clone())));
        } else {
            log::warn!("YOUTUBE_API_KEY is missing; youtube urls will be rejected");
        }

        match (&secrets.spotify_client_id, &secrets.spotify_client_secret) {
            (Some(id), Some(secret)) => {
                fetchers.push(Box::new(spotify::SpotifyFetcher::new(
                    id.clone(),
                    secret.clone(),
                )));
            }
            _ => log::warn!(
                "SPOTIFY_CLIENT_ID/SPOTIFY_CLIENT_SECRET are missing; spotify urls will be rejected"
            ),
        }

        Self { fetchers }
    }

    /// Used by tests to substitute canned fetchers.
    pub fn with_fetchers(fetchers: Vec<Box<dyn SourceFetcher>>) -> Self {
        Self { fetchers }
    }

    pub fn fetch(&self, url: &str) -> Result<(SourceRef, SourceMetadata), FetchError> {
        let source = parse_source_url(url)
            .ok_or_else(|| FetchError::Terminal(format!("unsupported source url: {url}")))?;

        let fetcher = self
            .fetchers
            .iter()
            .find(|f| f.platform() == source.platform)
            .ok_or_else(|| {
                FetchError::Terminal(format!(
                    "no credentials configured for platform {}",
                    source.platform
                ))
            })?;

        log::info!(
            "fetching {} source {} via {}",
            source.platform,
            source.external_id,
            fetcher.name()
        );

        let meta = fetcher.fetch(&source.external_id)?;
        Ok((source, meta))
    }
}
