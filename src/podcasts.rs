use crate::eid::Eid;
use anyhow::bail;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

pub const TITLE_MAX_LEN: usize = 200;
pub const DESCRIPTION_MAX_LEN: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Spotify,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Youtube => write!(f, "youtube"),
            Platform::Spotify => write!(f, "spotify"),
        }
    }
}

/// Counters as reported by the source platform. `views` doubles as plays for
/// audio-only platforms; `subscribers` doubles as followers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformStats {
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub subscribers: u64,
    #[serde(default)]
    pub episode_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub plays: u64,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub duration_secs: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgeBucket {
    pub label: String,
    pub percent: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenderSplit {
    #[serde(default)]
    pub male: f32,
    #[serde(default)]
    pub female: f32,
    #[serde(default)]
    pub other: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CountryShare {
    pub country: String,
    pub percent: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Audience {
    #[serde(default)]
    pub age_buckets: Vec<AgeBucket>,
    #[serde(default)]
    pub gender: GenderSplit,
    #[serde(default)]
    pub top_countries: Vec<CountryShare>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartRanking {
    pub id: String,
    pub chart: String,
    pub category: String,
    pub position: u32,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Monetization {
    #[serde(default)]
    pub monthly_revenue_cents: u64,
    #[serde(default)]
    pub cpm_cents: u64,
    #[serde(default)]
    pub sponsor_count: u32,
    #[serde(default)]
    pub premium_subscribers: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Summary,
    Growth,
    Audience,
    Monetization,
}

impl std::fmt::Display for InsightKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InsightKind::Summary => write!(f, "summary"),
            InsightKind::Growth => write!(f, "growth"),
            InsightKind::Audience => write!(f, "audience"),
            InsightKind::Monetization => write!(f, "monetization"),
        }
    }
}

/// AI-generated text attached to a podcast record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    pub id: String,
    pub kind: InsightKind,
    pub content: String,
    /// Which provider/model produced the text
    pub model: String,
    pub created_at: DateTime<Utc>,
}

/// The denormalized aggregate document: one per tracked show/video, scoped to
/// an owning user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Podcast {
    pub id: String,
    pub user: String,

    pub url: String,
    pub platform: Platform,
    pub external_id: String,

    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,

    #[serde(default)]
    pub stats: PlatformStats,
    #[serde(default)]
    pub episodes: Vec<Episode>,
    #[serde(default)]
    pub audience: Audience,
    #[serde(default)]
    pub rankings: Vec<ChartRanking>,
    #[serde(default)]
    pub monetization: Monetization,
    #[serde(default)]
    pub insights: Vec<Insight>,

    /// Derived: sum of episode downloads, recomputed on every store mutation
    #[serde(default)]
    pub total_downloads: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PodcastCreate {
    pub user: String,
    pub url: String,
    pub platform: Option<Platform>,
    pub external_id: Option<String>,

    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<PlatformStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episodes: Option<Vec<Episode>>,
}

/// Typed partial update: `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PodcastUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<PlatformStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monetization: Option<Monetization>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SearchQuery {
    pub id: Option<String>,
    pub user: Option<String>,
    pub platform: Option<Platform>,
    pub external_id: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,

    #[serde(default)]
    pub exact: bool,

    #[serde(default)]
    pub limit: Option<usize>,
}

pub trait PodcastStore: Send + Sync {
    fn search(&self, query: SearchQuery) -> anyhow::Result<Vec<Podcast>>;
    fn create(&self, create: PodcastCreate) -> anyhow::Result<Podcast>;
    fn update(&self, id: &str, update: PodcastUpdate) -> anyhow::Result<Option<Podcast>>;
    /// Writes back a whole document (nested list edits go through here)
    fn replace(&self, podcast: Podcast) -> anyhow::Result<Option<Podcast>>;
    fn delete(&self, id: &str) -> anyhow::Result<bool>;
    fn total(&self) -> anyhow::Result<usize>;
}

/// Schema-level checks mirroring what a document store validator enforces.
/// Returns a human-readable message on the first violation.
pub fn validate_create(create: &PodcastCreate) -> Result<(), String> {
    if crate::sources::parse_source_url(&create.url).is_none() {
        return Err(format!("unsupported or malformed source url: {}", create.url));
    }
    validate_title(&create.title)?;
    if let Some(description) = &create.description {
        validate_description(description)?;
    }
    Ok(())
}

pub fn validate_update(update: &PodcastUpdate) -> Result<(), String> {
    if let Some(title) = &update.title {
        validate_title(title)?;
    }
    if let Some(description) = &update.description {
        validate_description(description)?;
    }
    Ok(())
}

pub fn validate_title(title: &str) -> Result<(), String> {
    if title.trim().is_empty() {
        return Err("title is required".to_string());
    }
    if title.chars().count() > TITLE_MAX_LEN {
        return Err(format!("title exceeds {TITLE_MAX_LEN} characters"));
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<(), String> {
    if description.chars().count() > DESCRIPTION_MAX_LEN {
        return Err(format!("description exceeds {DESCRIPTION_MAX_LEN} characters"));
    }
    Ok(())
}

pub fn validate_audience(audience: &Audience) -> Result<(), String> {
    let in_range = |p: f32| (0.0..=100.0).contains(&p);

    for bucket in &audience.age_buckets {
        if bucket.label.trim().is_empty() {
            return Err("age bucket label is required".to_string());
        }
        if !in_range(bucket.percent) {
            return Err(format!("age bucket percent out of range: {}", bucket.percent));
        }
    }
    for share in &audience.top_countries {
        if share.country.trim().is_empty() {
            return Err("country is required".to_string());
        }
        if !in_range(share.percent) {
            return Err(format!("country percent out of range: {}", share.percent));
        }
    }
    let g = &audience.gender;
    if !in_range(g.male) || !in_range(g.female) || !in_range(g.other) {
        return Err("gender percentages must be within 0..=100".to_string());
    }
    Ok(())
}

/// Derived-state recompute, applied after every mutation before persist.
fn finalize(podcast: &mut Podcast) {
    podcast.total_downloads = podcast.episodes.iter().map(|e| e.downloads).sum();
    podcast.stats.episode_count = podcast
        .stats
        .episode_count
        .max(podcast.episodes.len() as u32);
    podcast.updated_at = Utc::now();
}

/// JSON-file document store: full list in memory behind a lock, atomic
/// persist via temp-file-and-rename on every mutation.
#[derive(Debug, Clone, Default)]
pub struct BackendJson {
    list: Arc<RwLock<Vec<Podcast>>>,
    path: PathBuf,
}

impl BackendJson {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let podcasts: Vec<Podcast> = match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                log::info!("creating new podcast database at {}", path.display());
                Vec::new()
            }
            Err(err) => return Err(err.into()),
        };

        let store = BackendJson {
            list: Arc::new(RwLock::new(podcasts)),
            path: path.to_path_buf(),
        };
        store.save()?;

        Ok(store)
    }

    fn save(&self) -> anyhow::Result<()> {
        let podcasts = self.list.read().unwrap();

        let tmp_path = self.path.with_extension("json-tmp");
        std::fs::write(&tmp_path, serde_json::to_vec_pretty(&*podcasts)?)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl PodcastStore for BackendJson {
    fn create(&self, create: PodcastCreate) -> anyhow::Result<Podcast> {
        if let Err(msg) = validate_create(&create) {
            bail!("validation failed: {msg}");
        }

        let source = crate::sources::parse_source_url(&create.url);
        let (platform, external_id) = match (create.platform, create.external_id) {
            (Some(platform), Some(external_id)) => (platform, external_id),
            _ => {
                let source = source.expect("url validated above");
                (source.platform, source.external_id)
            }
        };

        let now = Utc::now();
        let mut podcast = Podcast {
            id: Eid::new().to_string(),
            user: create.user,
            url: create.url,
            platform,
            external_id,
            title: create.title,
            description: create.description.unwrap_or_default(),
            author: create.author.unwrap_or_default(),
            cover_image_url: create.cover_image_url,
            stats: create.stats.unwrap_or_default(),
            episodes: create.episodes.unwrap_or_default(),
            audience: Audience::default(),
            rankings: Vec::new(),
            monetization: Monetization::default(),
            insights: Vec::new(),
            total_downloads: 0,
            created_at: now,
            updated_at: now,
        };
        finalize(&mut podcast);

        self.list.write().unwrap().push(podcast.clone());
        self.save()?;

        Ok(podcast)
    }

    fn update(&self, id: &str, update: PodcastUpdate) -> anyhow::Result<Option<Podcast>> {
        if let Err(msg) = validate_update(&update) {
            bail!("validation failed: {msg}");
        }

        let mut podcasts = self.list.write().unwrap();

        let Some(podcast) = podcasts.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };

        if let Some(title) = update.title {
            podcast.title = title;
        }
        if let Some(description) = update.description {
            podcast.description = description;
        }
        if let Some(author) = update.author {
            podcast.author = author;
        }
        if let Some(cover_image_url) = update.cover_image_url {
            podcast.cover_image_url = Some(cover_image_url);
        }
        if let Some(stats) = update.stats {
            podcast.stats = stats;
        }
        if let Some(monetization) = update.monetization {
            podcast.monetization = monetization;
        }

        finalize(podcast);
        let result = podcast.clone();
        drop(podcasts);

        self.save()?;

        Ok(Some(result))
    }

    fn replace(&self, podcast: Podcast) -> anyhow::Result<Option<Podcast>> {
        let mut podcasts = self.list.write().unwrap();

        let Some(idx) = podcasts.iter().position(|p| p.id == podcast.id) else {
            return Ok(None);
        };

        let mut podcast = podcast;
        finalize(&mut podcast);
        podcasts[idx] = podcast.clone();
        drop(podcasts);

        self.save()?;

        Ok(Some(podcast))
    }

    fn delete(&self, id: &str) -> anyhow::Result<bool> {
        let mut podcasts = self.list.write().unwrap();
        let found = podcasts.iter().position(|p| p.id == id).map(|idx| {
            podcasts.remove(idx);
        });

        drop(podcasts);

        if found.is_some() {
            self.save()?;
        }

        Ok(found.is_some())
    }

    fn total(&self) -> anyhow::Result<usize> {
        Ok(self.list.read().unwrap().len())
    }

    fn search(&self, query: SearchQuery) -> anyhow::Result<Vec<Podcast>> {
        let podcasts = self.list.read().unwrap();

        let mut output = vec![];

        for podcast in podcasts.iter() {
            if let Some(id) = &query.id {
                if &podcast.id != id {
                    continue;
                }
            }

            if let Some(user) = &query.user {
                if &podcast.user != user {
                    continue;
                }
            }

            if let Some(platform) = query.platform {
                if podcast.platform != platform {
                    continue;
                }
            }

            if let Some(external_id) = &query.external_id {
                if &podcast.external_id != external_id {
                    continue;
                }
            }

            if let Some(url) = &query.url {
                let matches = if query.exact {
                    podcast.url.eq_ignore_ascii_case(url)
                } else {
                    podcast.url.to_lowercase().contains(&url.to_lowercase())
                };
                if !matches {
                    continue;
                }
            }

            if let Some(title) = &query.title {
                let matches = if query.exact {
                    podcast.title.eq_ignore_ascii_case(title)
                } else {
                    podcast.title.to_lowercase().contains(&title.to_lowercase())
                };
                if !matches {
                    continue;
                }
            }

            output.push(podcast.clone());

            let id_query = query.id.is_some();
            let limit_reached =
                query.limit.is_some() && output.len() >= query.limit.unwrap_or_default();

            if id_query || limit_reached {
                break;
            }
        }

        Ok(output)
    }
}
