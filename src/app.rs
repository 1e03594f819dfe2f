use crate::{
    auth,
    config::{Config, Secrets},
    eid::Eid,
    history::{FetchHistoryEntry, FetchOutcome, HistoryLog},
    insights::{self, InsightRegistry},
    podcasts::{
        self, Audience, ChartRanking, Episode, Insight, InsightKind, Platform, PlatformStats,
        Podcast, PodcastCreate, PodcastStore, PodcastUpdate, SearchQuery,
    },
    sources::{self, SourceRegistry},
    users::{PublicUser, Role, User, UserCreate, UserStore},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    path::Path,
    sync::{Arc, RwLock},
};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("record not found")]
    NotFound,

    #[error("authentication required")]
    Unauthorized,

    #[error("not allowed")]
    Forbidden,

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("upstream provider error: {0}")]
    Upstream(String),

    #[error("reqwest error: {0:?}")]
    Reqwest(#[from] reqwest::Error),

    #[error("io error: {0:?}")]
    IO(#[from] std::io::Error),

    #[error("unexpected error: {0:?}")]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub podcast: Podcast,
    pub created: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RankingCreate {
    pub chart: String,
    pub category: String,
    pub position: u32,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EpisodeCreate {
    pub title: String,
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

/// Stats plus the derived figures the dashboard charts are built from.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSummary {
    pub id: String,
    pub title: String,
    pub platform: Platform,
    pub stats: PlatformStats,
    pub total_downloads: u64,
    pub episode_count: usize,
    pub avg_downloads_per_episode: u64,
    pub best_ranking: Option<ChartRanking>,
    pub insight_count: usize,
    pub updated_at: DateTime<Utc>,
}

/// Service core. Every operation is lookup → ownership check → field mapping
/// → store call; the web layer only translates HTTP on top of this.
pub struct App {
    pub podcast_store: Arc<dyn PodcastStore>,
    pub user_store: Arc<dyn UserStore>,
    history: HistoryLog,

    config: Arc<RwLock<Config>>,
    secrets: Secrets,

    sources: SourceRegistry,
    insights: InsightRegistry,

    // digests of logged-out tokens, consulted on every request
    revoked_tokens: RwLock<HashSet<String>>,
}

impl App {
    pub fn new(
        config: Arc<RwLock<Config>>,
        secrets: Secrets,
        base_path: &str,
    ) -> anyhow::Result<Self> {
        let base = Path::new(base_path);

        let podcast_store = Arc::new(podcasts::BackendJson::load(&base.join("podcasts.json"))?);
        let user_store = Arc::new(crate::users::BackendJson::load(&base.join("users.json"))?);
        let history = HistoryLog::load(&base.join("history.json"))?;

        let sources = SourceRegistry::from_secrets(&secrets);
        let insight_config = config.read().unwrap().insight.clone();
        let insights = InsightRegistry::from_secrets(&secrets, &insight_config);

        Ok(Self {
            podcast_store,
            user_store,
            history,
            config,
            secrets,
            sources,
            insights,
            revoked_tokens: RwLock::new(HashSet::new()),
        })
    }

    /// Wires an App from parts. Tests use this to inject stub stores and
    /// canned fetchers/generators.
    pub fn new_with(
        podcast_store: Arc<dyn PodcastStore>,
        user_store: Arc<dyn UserStore>,
        history: HistoryLog,
        config: Arc<RwLock<Config>>,
        secrets: Secrets,
        sources: SourceRegistry,
        insights: InsightRegistry,
    ) -> Self {
        Self {
            podcast_store,
            user_store,
            history,
            config,
            secrets,
            sources,
            insights,
            revoked_tokens: RwLock::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> Arc<RwLock<Config>> {
        self.config.clone()
    }

    // --- auth ---

    pub fn register(&self, req: RegisterRequest) -> Result<AuthResponse, AppError> {
        let email = req.email.trim().to_lowercase();
        let username = req.username.trim().to_string();

        if !email.contains('@') || email.len() < 3 {
            return Err(AppError::Validation("email is not valid".to_string()));
        }
        if username.len() < 3 || username.len() > 32 {
            return Err(AppError::Validation(
                "username must be 3..=32 characters".to_string(),
            ));
        }
        if req.password.len() < 8 {
            return Err(AppError::Validation(
                "password must be at least 8 characters".to_string(),
            ));
        }

        if self.user_store.find_by_email(&email)?.is_some() {
            return Err(AppError::AlreadyExists(format!(
                "account with email {email}"
            )));
        }
        if self.user_store.find_by_username(&username)?.is_some() {
            return Err(AppError::AlreadyExists(format!(
                "account with username {username}"
            )));
        }

        let salt = auth::generate_salt();
        let password_hash = auth::hash_password(&req.password, &salt);

        let user = self.user_store.create(UserCreate {
            email,
            username,
            password_hash,
            salt,
            role: Role::User,
        })?;

        log::info!("registered user {} ({})", user.username, user.id);

        Ok(AuthResponse {
            token: self.issue_token(&user),
            user: PublicUser::from(&user),
        })
    }

    pub fn login(&self, email: &str, password: &str) -> Result<AuthResponse, AppError> {
        let user = self
            .user_store
            .find_by_email(email.trim())?
            .ok_or(AppError::Unauthorized)?;

        if !auth::verify_password(password, &user.salt, &user.password_hash) {
            return Err(AppError::Unauthorized);
        }

        Ok(AuthResponse {
            token: self.issue_token(&user),
            user: PublicUser::from(&user),
        })
    }

    pub fn authenticate(&self, token: &str) -> Result<PublicUser, AppError> {
        let payload = auth::verify_token(&self.secrets.token_secret, token)
            .ok_or(AppError::Unauthorized)?;

        if self
            .revoked_tokens
            .read()
            .unwrap()
            .contains(&auth::token_digest(token))
        {
            return Err(AppError::Unauthorized);
        }

        let user = self
            .user_store
            .find_by_id(&payload.sub)?
            .ok_or(AppError::Unauthorized)?;

        Ok(PublicUser::from(&user))
    }

    pub fn logout(&self, token: &str) {
        self.revoked_tokens
            .write()
            .unwrap()
            .insert(auth::token_digest(token));
    }

    fn issue_token(&self, user: &User) -> String {
        let ttl_secs = self.config.read().unwrap().token_expiry_hours as i64 * 3600;
        let payload = auth::TokenPayload::new(&user.id, ttl_secs);
        auth::sign_token(&self.secrets.token_secret, &payload)
    }

    // --- ownership ---

    /// Looks a record up and enforces the ownership check. A record owned by
    /// someone else reads as NotFound so ids don't leak across accounts;
    /// admins bypass.
    fn owned_podcast(&self, actor: &PublicUser, id: &str) -> Result<Podcast, AppError> {
        let podcast = self
            .podcast_store
            .search(SearchQuery {
                id: Some(id.to_string()),
                ..Default::default()
            })?
            .into_iter()
            .next()
            .ok_or(AppError::NotFound)?;

        if podcast.user != actor.id && actor.role != Role::Admin {
            return Err(AppError::NotFound);
        }

        Ok(podcast)
    }

    // --- podcasts ---

    pub fn list_podcasts(&self, actor: &PublicUser) -> Result<Vec<Podcast>, AppError> {
        Ok(self.podcast_store.search(SearchQuery {
            user: Some(actor.id.clone()),
            ..Default::default()
        })?)
    }

    pub fn create_podcast(
        &self,
        actor: &PublicUser,
        mut create: PodcastCreate,
    ) -> Result<Podcast, AppError> {
        create.user = actor.id.clone();

        podcasts::validate_create(&create).map_err(AppError::Validation)?;

        let source = sources::parse_source_url(&create.url)
            .ok_or_else(|| AppError::Validation("unsupported source url".to_string()))?;

        if let Some(existing) = self.find_source(actor, source.platform, &source.external_id)? {
            return Err(AppError::AlreadyExists(existing.id));
        }

        create.platform = Some(source.platform);
        create.external_id = Some(source.external_id);

        Ok(self.podcast_store.create(create)?)
    }

    /// The paste-a-URL flow: parse the platform, call its API, then upsert.
    /// A repeat fetch of the same source refreshes the existing record in
    /// place instead of inserting a duplicate.
    pub fn fetch_podcast(&self, actor: &PublicUser, url: &str) -> Result<FetchResult, AppError> {
        let source = sources::parse_source_url(url)
            .ok_or_else(|| AppError::Validation(format!("unsupported source url: {url}")))?;

        let meta = match self.sources.fetch(url) {
            Ok((_, meta)) => meta,
            Err(err) => {
                self.record_history(FetchHistoryEntry::new(
                    &actor.id,
                    url,
                    source.platform,
                    &source.external_id,
                    FetchOutcome::Failed,
                ));
                return Err(AppError::Upstream(err.to_string()));
            }
        };

        let existing = self.find_source(actor, source.platform, &source.external_id)?;
        let created = existing.is_none();

        let podcast = match existing {
            Some(mut podcast) => {
                podcast.title = meta.title;
                podcast.description = meta.description;
                podcast.author = meta.author;
                podcast.cover_image_url = meta.cover_image_url.or(podcast.cover_image_url);
                podcast.stats = meta.stats;
                merge_episodes(&mut podcast.episodes, meta.episodes);

                self.podcast_store
                    .replace(podcast)?
                    .ok_or(AppError::NotFound)?
            }
            None => self.podcast_store.create(PodcastCreate {
                user: actor.id.clone(),
                url: url.to_string(),
                platform: Some(source.platform),
                external_id: Some(source.external_id.clone()),
                title: meta.title,
                description: Some(meta.description),
                author: Some(meta.author),
                cover_image_url: meta.cover_image_url,
                stats: Some(meta.stats),
                episodes: Some(meta.episodes),
            })?,
        };

        self.record_history(FetchHistoryEntry::new(
            &actor.id,
            url,
            source.platform,
            &source.external_id,
            if created {
                FetchOutcome::Created
            } else {
                FetchOutcome::Refreshed
            },
        ));

        Ok(FetchResult { podcast, created })
    }

    pub fn get_podcast(&self, actor: &PublicUser, id: &str) -> Result<Podcast, AppError> {
        self.owned_podcast(actor, id)
    }

    pub fn update_podcast(
        &self,
        actor: &PublicUser,
        id: &str,
        update: PodcastUpdate,
    ) -> Result<Podcast, AppError> {
        self.owned_podcast(actor, id)?;

        podcasts::validate_update(&update).map_err(AppError::Validation)?;

        self.podcast_store
            .update(id, update)?
            .ok_or(AppError::NotFound)
    }

    pub fn delete_podcast(&self, actor: &PublicUser, id: &str) -> Result<(), AppError> {
        self.owned_podcast(actor, id)?;

        if !self.podcast_store.delete(id)? {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    pub fn analytics(&self, actor: &PublicUser, id: &str) -> Result<AnalyticsSummary, AppError> {
        let podcast = self.owned_podcast(actor, id)?;

        let episode_count = podcast.episodes.len();
        let avg_downloads_per_episode = if episode_count == 0 {
            0
        } else {
            podcast.total_downloads / episode_count as u64
        };

        let best_ranking = podcast
            .rankings
            .iter()
            .min_by_key(|r| r.position)
            .cloned();

        Ok(AnalyticsSummary {
            id: podcast.id,
            title: podcast.title,
            platform: podcast.platform,
            stats: podcast.stats,
            total_downloads: podcast.total_downloads,
            episode_count,
            avg_downloads_per_episode,
            best_ranking,
            insight_count: podcast.insights.len(),
            updated_at: podcast.updated_at,
        })
    }

    // --- audience ---

    pub fn get_audience(&self, actor: &PublicUser, id: &str) -> Result<Audience, AppError> {
        Ok(self.owned_podcast(actor, id)?.audience)
    }

    pub fn put_audience(
        &self,
        actor: &PublicUser,
        id: &str,
        audience: Audience,
    ) -> Result<Audience, AppError> {
        let mut podcast = self.owned_podcast(actor, id)?;

        podcasts::validate_audience(&audience).map_err(AppError::Validation)?;

        podcast.audience = audience;
        let podcast = self
            .podcast_store
            .replace(podcast)?
            .ok_or(AppError::NotFound)?;

        Ok(podcast.audience)
    }

    // --- rankings ---

    pub fn list_rankings(
        &self,
        actor: &PublicUser,
        id: &str,
    ) -> Result<Vec<ChartRanking>, AppError> {
        Ok(self.owned_podcast(actor, id)?.rankings)
    }

    pub fn add_ranking(
        &self,
        actor: &PublicUser,
        id: &str,
        create: RankingCreate,
    ) -> Result<ChartRanking, AppError> {
        let mut podcast = self.owned_podcast(actor, id)?;

        if create.chart.trim().is_empty() {
            return Err(AppError::Validation("chart is required".to_string()));
        }
        if create.position == 0 {
            return Err(AppError::Validation(
                "position must be 1 or greater".to_string(),
            ));
        }

        let ranking = ChartRanking {
            id: Eid::new().to_string(),
            chart: create.chart,
            category: create.category,
            position: create.position,
            recorded_at: create.recorded_at.unwrap_or_else(Utc::now),
        };

        podcast.rankings.push(ranking.clone());
        self.podcast_store
            .replace(podcast)?
            .ok_or(AppError::NotFound)?;

        Ok(ranking)
    }

    pub fn delete_ranking(
        &self,
        actor: &PublicUser,
        id: &str,
        ranking_id: &str,
    ) -> Result<(), AppError> {
        let mut podcast = self.owned_podcast(actor, id)?;

        let before = podcast.rankings.len();
        podcast.rankings.retain(|r| r.id != ranking_id);
        if podcast.rankings.len() == before {
            return Err(AppError::NotFound);
        }

        self.podcast_store
            .replace(podcast)?
            .ok_or(AppError::NotFound)?;
        Ok(())
    }

    // --- episodes ---

    pub fn list_episodes(&self, actor: &PublicUser, id: &str) -> Result<Vec<Episode>, AppError> {
        Ok(self.owned_podcast(actor, id)?.episodes)
    }

    pub fn add_episode(
        &self,
        actor: &PublicUser,
        id: &str,
        create: EpisodeCreate,
    ) -> Result<Episode, AppError> {
        let mut podcast = self.owned_podcast(actor, id)?;

        podcasts::validate_title(&create.title).map_err(AppError::Validation)?;

        let episode = Episode {
            id: Eid::new().to_string(),
            title: create.title,
            published_at: create.published_at,
            downloads: create.downloads,
            plays: create.plays,
            likes: create.likes,
            duration_secs: create.duration_secs,
        };

        podcast.episodes.push(episode.clone());
        self.podcast_store
            .replace(podcast)?
            .ok_or(AppError::NotFound)?;

        Ok(episode)
    }

    pub fn delete_episode(
        &self,
        actor: &PublicUser,
        id: &str,
        episode_id: &str,
    ) -> Result<(), AppError> {
        let mut podcast = self.owned_podcast(actor, id)?;

        let before = podcast.episodes.len();
        podcast.episodes.retain(|e| e.id != episode_id);
        if podcast.episodes.len() == before {
            return Err(AppError::NotFound);
        }

        self.podcast_store
            .replace(podcast)?
            .ok_or(AppError::NotFound)?;
        Ok(())
    }

    // --- insights ---

    pub fn generate_insight(
        &self,
        actor: &PublicUser,
        id: &str,
        kind: InsightKind,
    ) -> Result<Insight, AppError> {
        let mut podcast = self.owned_podcast(actor, id)?;

        let max_words = self.config.read().unwrap().insight.max_summary_words;
        let prompt = insights::build_prompt(&podcast, kind, max_words);

        let (model, content) = self
            .insights
            .generate(&prompt)
            .map_err(|err| AppError::Upstream(err.to_string()))?;

        let insight = Insight {
            id: Eid::new().to_string(),
            kind,
            content,
            model,
            created_at: Utc::now(),
        };

        podcast.insights.push(insight.clone());
        self.podcast_store
            .replace(podcast)?
            .ok_or(AppError::NotFound)?;

        Ok(insight)
    }

    pub fn list_insights(&self, actor: &PublicUser, id: &str) -> Result<Vec<Insight>, AppError> {
        Ok(self.owned_podcast(actor, id)?.insights)
    }

    pub fn update_insight(
        &self,
        actor: &PublicUser,
        id: &str,
        insight_id: &str,
        content: String,
    ) -> Result<Insight, AppError> {
        let mut podcast = self.owned_podcast(actor, id)?;

        if content.trim().is_empty() {
            return Err(AppError::Validation("content is required".to_string()));
        }

        let Some(insight) = podcast.insights.iter_mut().find(|i| i.id == insight_id) else {
            return Err(AppError::NotFound);
        };
        insight.content = content;
        let result = insight.clone();

        self.podcast_store
            .replace(podcast)?
            .ok_or(AppError::NotFound)?;

        Ok(result)
    }

    pub fn delete_insight(
        &self,
        actor: &PublicUser,
        id: &str,
        insight_id: &str,
    ) -> Result<(), AppError> {
        let mut podcast = self.owned_podcast(actor, id)?;

        let before = podcast.insights.len();
        podcast.insights.retain(|i| i.id != insight_id);
        if podcast.insights.len() == before {
            return Err(AppError::NotFound);
        }

        self.podcast_store
            .replace(podcast)?
            .ok_or(AppError::NotFound)?;
        Ok(())
    }

    // --- helpers ---

    fn find_source(
        &self,
        actor: &PublicUser,
        platform: Platform,
        external_id: &str,
    ) -> Result<Option<Podcast>, AppError> {
        Ok(self
            .podcast_store
            .search(SearchQuery {
                user: Some(actor.id.clone()),
                platform: Some(platform),
                external_id: Some(external_id.to_string()),
                limit: Some(1),
                ..Default::default()
            })?
            .into_iter()
            .next())
    }

    // secondary write: failures must never surface to the caller
    fn record_history(&self, entry: FetchHistoryEntry) {
        if let Err(err) = self.history.append(entry) {
            log::warn!("failed to record fetch history: {err:?}");
        }
    }

    pub fn fetch_history(&self, actor: &PublicUser) -> Vec<FetchHistoryEntry> {
        self.history.for_user(&actor.id)
    }
}

/// Refreshing keeps locally tracked counters (downloads) while taking the
/// platform's latest values for everything it owns.
fn merge_episodes(existing: &mut Vec<Episode>, incoming: Vec<Episode>) {
    for episode in incoming {
        if let Some(found) = existing.iter_mut().find(|e| e.id == episode.id) {
            found.title = episode.title;
            found.published_at = episode.published_at.or(found.published_at);
            found.plays = found.plays.max(episode.plays);
            found.likes = found.likes.max(episode.likes);
            if episode.duration_secs > 0 {
                found.duration_secs = episode.duration_secs;
            }
        } else {
            existing.push(episode);
        }
    }
}
