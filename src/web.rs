use crate::{
    app::{
        AnalyticsSummary, App, AppError, AuthResponse, EpisodeCreate, FetchResult, RankingCreate,
        RegisterRequest,
    },
    auth::extract_bearer_token,
    history::FetchHistoryEntry,
    podcasts::{
        Audience, ChartRanking, Episode, Insight, InsightKind, Podcast, PodcastCreate,
        PodcastUpdate,
    },
    users::PublicUser,
};
use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::{signal, sync::RwLock};

#[derive(Clone)]
pub struct SharedState {
    pub app: Arc<RwLock<App>>,
}

async fn start_app(app: App) {
    let bind_addr = app.config().read().unwrap().bind_addr.clone();

    let app = Arc::new(RwLock::new(app));
    let shared_state = Arc::new(SharedState { app });

    async fn shutdown_signal() {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
        };

        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    let router = build_router(shared_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await.unwrap();
    log::info!("listening on {bind_addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

pub fn start_daemon(app: App) {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(async { start_app(app).await });
}

pub fn build_router(state: Arc<SharedState>) -> Router {
    Router::new()
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/me", get(me))
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/podcasts", get(list_podcasts).post(create_podcast))
        .route("/api/v1/podcasts/fetch", post(fetch_podcast))
        .route(
            "/api/v1/podcasts/:id",
            get(get_podcast).patch(update_podcast).delete(delete_podcast),
        )
        .route("/api/v1/podcasts/:id/analytics", get(analytics))
        .route(
            "/api/v1/podcasts/:id/audience",
            get(get_audience).put(put_audience),
        )
        .route(
            "/api/v1/podcasts/:id/rankings",
            get(list_rankings).post(add_ranking),
        )
        .route(
            "/api/v1/podcasts/:id/rankings/:ranking_id",
            axum::routing::delete(delete_ranking),
        )
        .route(
            "/api/v1/podcasts/:id/episodes",
            get(list_episodes).post(add_episode),
        )
        .route(
            "/api/v1/podcasts/:id/episodes/:episode_id",
            axum::routing::delete(delete_episode),
        )
        .route(
            "/api/v1/podcasts/:id/insights",
            get(list_insights).post(generate_insight),
        )
        .route(
            "/api/v1/podcasts/:id/insights/:insight_id",
            axum::routing::patch(update_insight).delete(delete_insight),
        )
        .route("/api/v1/history", get(fetch_history))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(state)
}

// Wraps `AppError` so axum knows how to render it.
#[derive(Debug)]
struct HttpError(AppError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self.0 {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::AlreadyExists(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Upstream(_) => {
                log::error!("{self:?}");
                StatusCode::BAD_GATEWAY
            }
            AppError::Reqwest(_) | AppError::IO(_) | AppError::Other(_) => {
                log::error!("{self:?}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (
            status,
            Json(json!({ "success": false, "message": self.0.to_string() })),
        )
            .into_response()
    }
}

// This enables using `?` on anything convertible into `AppError` inside
// handlers without manual mapping.
impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// Resolves the caller from the Authorization header. Everything except
/// register/login goes through here.
fn authenticate(app: &App, headers: &HeaderMap) -> Result<PublicUser, AppError> {
    let token = bearer_token(headers).ok_or(AppError::Unauthorized)?;
    app.authenticate(&token)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer_token)
        .map(str::to_string)
}

// --- auth ---

async fn register(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        app.register(payload).map(Json).map_err(Into::into)
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

async fn login(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        app.login(&payload.email, &payload.password)
            .map(Json)
            .map_err(Into::into)
    })
}

async fn me(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
) -> Result<Json<PublicUser>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        let actor = authenticate(&app, &headers)?;
        Ok(Json(actor))
    })
}

async fn logout(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        authenticate(&app, &headers)?;

        let token = bearer_token(&headers).ok_or(AppError::Unauthorized)?;
        app.logout(&token);

        Ok(Json(json!({ "success": true })))
    })
}

// --- podcasts ---

async fn list_podcasts(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Podcast>>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        let actor = authenticate(&app, &headers)?;
        app.list_podcasts(&actor).map(Json).map_err(Into::into)
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct PodcastCreateRequest {
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub cover_image_url: Option<String>,
}

async fn create_podcast(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
    Json(payload): Json<PodcastCreateRequest>,
) -> Result<Json<Podcast>, HttpError> {
    let app = state.app.clone();

    log::debug!("payload: {payload:?}");

    let create = PodcastCreate {
        url: payload.url,
        title: payload.title,
        description: payload.description,
        author: payload.author,
        cover_image_url: payload.cover_image_url,
        ..Default::default()
    };

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        let actor = authenticate(&app, &headers)?;
        app.create_podcast(&actor, create)
            .map(Json)
            .map_err(Into::into)
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchPodcastRequest {
    pub url: String,
}

async fn fetch_podcast(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
    Json(payload): Json<FetchPodcastRequest>,
) -> Result<Json<FetchResult>, HttpError> {
    let app = state.app.clone();

    log::debug!("payload: {payload:?}");

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        let actor = authenticate(&app, &headers)?;
        app.fetch_podcast(&actor, &payload.url)
            .map(Json)
            .map_err(Into::into)
    })
}

async fn get_podcast(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Podcast>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        let actor = authenticate(&app, &headers)?;
        app.get_podcast(&actor, &id).map(Json).map_err(Into::into)
    })
}

async fn update_podcast(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<PodcastUpdate>,
) -> Result<Json<Podcast>, HttpError> {
    let app = state.app.clone();

    log::debug!("payload: {payload:?}");

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        let actor = authenticate(&app, &headers)?;
        app.update_podcast(&actor, &id, payload)
            .map(Json)
            .map_err(Into::into)
    })
}

async fn delete_podcast(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        let actor = authenticate(&app, &headers)?;
        app.delete_podcast(&actor, &id)?;
        Ok(Json(json!({ "success": true })))
    })
}

async fn analytics(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<AnalyticsSummary>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        let actor = authenticate(&app, &headers)?;
        app.analytics(&actor, &id).map(Json).map_err(Into::into)
    })
}

// --- audience ---

async fn get_audience(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Audience>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        let actor = authenticate(&app, &headers)?;
        app.get_audience(&actor, &id).map(Json).map_err(Into::into)
    })
}

async fn put_audience(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<Audience>,
) -> Result<Json<Audience>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        let actor = authenticate(&app, &headers)?;
        app.put_audience(&actor, &id, payload)
            .map(Json)
            .map_err(Into::into)
    })
}

// --- rankings ---

async fn list_rankings(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<ChartRanking>>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        let actor = authenticate(&app, &headers)?;
        app.list_rankings(&actor, &id).map(Json).map_err(Into::into)
    })
}

async fn add_ranking(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<RankingCreate>,
) -> Result<Json<ChartRanking>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        let actor = authenticate(&app, &headers)?;
        app.add_ranking(&actor, &id, payload)
            .map(Json)
            .map_err(Into::into)
    })
}

async fn delete_ranking(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
    Path((id, ranking_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        let actor = authenticate(&app, &headers)?;
        app.delete_ranking(&actor, &id, &ranking_id)?;
        Ok(Json(json!({ "success": true })))
    })
}

// --- episodes ---

async fn list_episodes(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<Episode>>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        let actor = authenticate(&app, &headers)?;
        app.list_episodes(&actor, &id).map(Json).map_err(Into::into)
    })
}

async fn add_episode(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<EpisodeCreate>,
) -> Result<Json<Episode>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        let actor = authenticate(&app, &headers)?;
        app.add_episode(&actor, &id, payload)
            .map(Json)
            .map_err(Into::into)
    })
}

async fn delete_episode(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
    Path((id, episode_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        let actor = authenticate(&app, &headers)?;
        app.delete_episode(&actor, &id, &episode_id)?;
        Ok(Json(json!({ "success": true })))
    })
}

// --- insights ---

#[derive(Debug, Clone, Deserialize)]
pub struct InsightGenerateRequest {
    pub kind: InsightKind,
}

async fn generate_insight(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<InsightGenerateRequest>,
) -> Result<Json<Insight>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        let actor = authenticate(&app, &headers)?;
        app.generate_insight(&actor, &id, payload.kind)
            .map(Json)
            .map_err(Into::into)
    })
}

async fn list_insights(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<Insight>>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        let actor = authenticate(&app, &headers)?;
        app.list_insights(&actor, &id).map(Json).map_err(Into::into)
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct InsightUpdateRequest {
    pub content: String,
}

async fn update_insight(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
    Path((id, insight_id)): Path<(String, String)>,
    Json(payload): Json<InsightUpdateRequest>,
) -> Result<Json<Insight>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        let actor = authenticate(&app, &headers)?;
        app.update_insight(&actor, &id, &insight_id, payload.content)
            .map(Json)
            .map_err(Into::into)
    })
}

async fn delete_insight(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
    Path((id, insight_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        let actor = authenticate(&app, &headers)?;
        app.delete_insight(&actor, &id, &insight_id)?;
        Ok(Json(json!({ "success": true })))
    })
}

// --- history ---

async fn fetch_history(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<FetchHistoryEntry>>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        let app = app.blocking_read();
        let actor = authenticate(&app, &headers)?;
        Ok(Json(app.fetch_history(&actor)))
    })
}
