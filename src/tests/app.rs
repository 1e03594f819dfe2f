use std::sync::{Arc, RwLock};

use chrono::Utc;
use serde_json::json;

use crate::app::{App, AppError, EpisodeCreate, RankingCreate, RegisterRequest};
use crate::config::{Config, Secrets};
use crate::history::HistoryLog;
use crate::insights::{InsightRegistry, TextGenerator};
use crate::podcasts::{self, Episode, InsightKind, Platform, PlatformStats};
use crate::sources::{SourceFetcher, SourceMetadata, SourceRegistry};
use crate::users::{PublicUser, Role};

/// Stub fetcher standing in for the YouTube API.
pub struct StubFetcher;

impl SourceFetcher for StubFetcher {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    fn fetch(&self, external_id: &str) -> Result<SourceMetadata, crate::sources::FetchError> {
        Ok(SourceMetadata {
            title: "Stub Video".to_string(),
            description: "stub description".to_string(),
            author: "Stub Channel".to_string(),
            cover_image_url: Some("https://img.example.com/cover.jpg".to_string()),
            stats: PlatformStats {
                views: 1000,
                likes: 50,
                comments: 10,
                subscribers: 400,
                episode_count: 1,
            },
            episodes: vec![Episode {
                id: external_id.to_string(),
                title: "Stub Video".to_string(),
                published_at: None,
                downloads: 0,
                plays: 1000,
                likes: 50,
                duration_secs: 0,
            }],
        })
    }

    fn name(&self) -> &'static str {
        "Stub"
    }
}

pub struct StubGenerator;

impl TextGenerator for StubGenerator {
    fn name(&self) -> String {
        "stub/model".to_string()
    }

    fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
        Ok("generated insight text".to_string())
    }
}

/// Creates an isolated App using a unique temp directory. Each test gets its
/// own directory so parallel tests never collide, and no real data is
/// touched.
pub fn create_app() -> (App, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let base_path = tmp.path().to_str().unwrap().to_string();

    let config = Arc::new(RwLock::new(
        Config::load_with(&base_path).expect("failed to load config"),
    ));
    let secrets = Secrets {
        token_secret: "test-secret".to_string(),
        ..Default::default()
    };

    let podcast_store = Arc::new(
        podcasts::BackendJson::load(&tmp.path().join("podcasts.json"))
            .expect("failed to create podcast store"),
    );
    let user_store = Arc::new(
        crate::users::BackendJson::load(&tmp.path().join("users.json"))
            .expect("failed to create user store"),
    );
    let history =
        HistoryLog::load(&tmp.path().join("history.json")).expect("failed to create history");

    let app = App::new_with(
        podcast_store,
        user_store,
        history,
        config,
        secrets,
        SourceRegistry::with_fetchers(vec![Box::new(StubFetcher)]),
        InsightRegistry::with_generators(vec![Box::new(StubGenerator)]),
    );

    (app, tmp)
}

pub fn register_user(app: &App, email: &str, username: &str) -> PublicUser {
    app.register(RegisterRequest {
        email: email.to_string(),
        username: username.to_string(),
        password: "hunter22-hunter22".to_string(),
    })
    .unwrap()
    .user
}

fn fake_admin() -> PublicUser {
    PublicUser {
        id: "01ADMIN".to_string(),
        email: "admin@example.com".to_string(),
        username: "admin".to_string(),
        role: Role::Admin,
        created_at: Utc::now(),
    }
}

const VIDEO_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

#[test]
fn test_register_login_roundtrip() {
    let (app, _tmp) = create_app();

    let registered = app
        .register(RegisterRequest {
            email: "Someone@Example.com".to_string(),
            username: "someone".to_string(),
            password: "long-enough-password".to_string(),
        })
        .unwrap();

    // email is normalized
    assert_eq!(registered.user.email, "someone@example.com");

    let logged_in = app
        .login("someone@example.com", "long-enough-password")
        .unwrap();
    assert_eq!(logged_in.user.id, registered.user.id);

    // token authenticates
    let actor = app.authenticate(&logged_in.token).unwrap();
    assert_eq!(actor.id, registered.user.id);

    // wrong password
    assert!(matches!(
        app.login("someone@example.com", "wrong-password"),
        Err(AppError::Unauthorized)
    ));
}

#[test]
fn test_register_validation() {
    let (app, _tmp) = create_app();

    let bad = |email: &str, username: &str, password: &str| RegisterRequest {
        email: email.to_string(),
        username: username.to_string(),
        password: password.to_string(),
    };

    assert!(matches!(
        app.register(bad("not-an-email", "someone", "long-enough")),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        app.register(bad("a@b.com", "ab", "long-enough")),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        app.register(bad("a@b.com", "someone", "short")),
        Err(AppError::Validation(_))
    ));
}

#[test]
fn test_register_duplicate_email() {
    let (app, _tmp) = create_app();
    register_user(&app, "dup@example.com", "first");

    assert!(matches!(
        app.register(RegisterRequest {
            email: "dup@example.com".to_string(),
            username: "second".to_string(),
            password: "long-enough-password".to_string(),
        }),
        Err(AppError::AlreadyExists(_))
    ));
}

#[test]
fn test_logout_revokes_token() {
    let (app, _tmp) = create_app();

    let resp = app
        .register(RegisterRequest {
            email: "out@example.com".to_string(),
            username: "outuser".to_string(),
            password: "long-enough-password".to_string(),
        })
        .unwrap();

    assert!(app.authenticate(&resp.token).is_ok());
    app.logout(&resp.token);
    assert!(matches!(
        app.authenticate(&resp.token),
        Err(AppError::Unauthorized)
    ));
}

#[test]
fn test_fetch_creates_then_refreshes() {
    let (app, _tmp) = create_app();
    let actor = register_user(&app, "a@example.com", "alice");

    let first = app.fetch_podcast(&actor, VIDEO_URL).unwrap();
    assert!(first.created);
    assert_eq!(first.podcast.title, "Stub Video");
    assert_eq!(first.podcast.platform, Platform::Youtube);
    assert_eq!(first.podcast.external_id, "dQw4w9WgXcQ");

    // repeat fetch dedupes into the same record
    let second = app.fetch_podcast(&actor, VIDEO_URL).unwrap();
    assert!(!second.created);
    assert_eq!(second.podcast.id, first.podcast.id);

    assert_eq!(app.list_podcasts(&actor).unwrap().len(), 1);

    // both attempts are in the fetch history
    assert_eq!(app.fetch_history(&actor).len(), 2);
}

#[test]
fn test_fetch_is_scoped_per_user() {
    let (app, _tmp) = create_app();
    let alice = register_user(&app, "a@example.com", "alice");
    let bob = register_user(&app, "b@example.com", "bob");

    app.fetch_podcast(&alice, VIDEO_URL).unwrap();
    let bobs = app.fetch_podcast(&bob, VIDEO_URL).unwrap();

    // same source, separate records per user
    assert!(bobs.created);
    assert_eq!(app.list_podcasts(&alice).unwrap().len(), 1);
    assert_eq!(app.list_podcasts(&bob).unwrap().len(), 1);
}

#[test]
fn test_fetch_rejects_unsupported_url() {
    let (app, _tmp) = create_app();
    let actor = register_user(&app, "a@example.com", "alice");

    assert!(matches!(
        app.fetch_podcast(&actor, "https://example.com/not-a-source"),
        Err(AppError::Validation(_))
    ));
}

#[test]
fn test_create_podcast_duplicate_conflicts() {
    let (app, _tmp) = create_app();
    let actor = register_user(&app, "a@example.com", "alice");

    app.fetch_podcast(&actor, VIDEO_URL).unwrap();

    let create = podcasts::PodcastCreate {
        url: VIDEO_URL.to_string(),
        title: "manual".to_string(),
        ..Default::default()
    };
    assert!(matches!(
        app.create_podcast(&actor, create),
        Err(AppError::AlreadyExists(_))
    ));
}

#[test]
fn test_ownership_enforced() {
    let (app, _tmp) = create_app();
    let alice = register_user(&app, "a@example.com", "alice");
    let bob = register_user(&app, "b@example.com", "bob");

    let podcast = app.fetch_podcast(&alice, VIDEO_URL).unwrap().podcast;

    // non-owner reads as not found
    assert!(matches!(
        app.get_podcast(&bob, &podcast.id),
        Err(AppError::NotFound)
    ));
    assert!(matches!(
        app.delete_podcast(&bob, &podcast.id),
        Err(AppError::NotFound)
    ));

    // admin bypasses
    assert!(app.get_podcast(&fake_admin(), &podcast.id).is_ok());

    // owner still works
    assert!(app.get_podcast(&alice, &podcast.id).is_ok());
}

#[test]
fn test_unknown_id_is_not_found() {
    let (app, _tmp) = create_app();
    let actor = register_user(&app, "a@example.com", "alice");

    assert!(matches!(
        app.get_podcast(&actor, "definitely-not-an-id"),
        Err(AppError::NotFound)
    ));
}

#[test]
fn test_update_and_delete() {
    let (app, _tmp) = create_app();
    let actor = register_user(&app, "a@example.com", "alice");
    let podcast = app.fetch_podcast(&actor, VIDEO_URL).unwrap().podcast;

    let updated = app
        .update_podcast(
            &actor,
            &podcast.id,
            podcasts::PodcastUpdate {
                title: Some("Renamed".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.title, "Renamed");
    // untouched fields survive
    assert_eq!(updated.author, "Stub Channel");

    app.delete_podcast(&actor, &podcast.id).unwrap();
    assert!(app.list_podcasts(&actor).unwrap().is_empty());
}

#[test]
fn test_update_validation() {
    let (app, _tmp) = create_app();
    let actor = register_user(&app, "a@example.com", "alice");
    let podcast = app.fetch_podcast(&actor, VIDEO_URL).unwrap().podcast;

    assert!(matches!(
        app.update_podcast(
            &actor,
            &podcast.id,
            podcasts::PodcastUpdate {
                title: Some("   ".to_string()),
                ..Default::default()
            },
        ),
        Err(AppError::Validation(_))
    ));
}

#[test]
fn test_audience_roundtrip_and_validation() {
    let (app, _tmp) = create_app();
    let actor = register_user(&app, "a@example.com", "alice");
    let podcast = app.fetch_podcast(&actor, VIDEO_URL).unwrap().podcast;

    let audience: podcasts::Audience = serde_json::from_value(json!({
        "age_buckets": [
            { "label": "18-24", "percent": 35.0 },
            { "label": "25-34", "percent": 45.0 }
        ],
        "gender": { "male": 60.0, "female": 38.0, "other": 2.0 },
        "top_countries": [{ "country": "US", "percent": 70.0 }]
    }))
    .unwrap();

    app.put_audience(&actor, &podcast.id, audience).unwrap();
    let stored = app.get_audience(&actor, &podcast.id).unwrap();
    assert_eq!(stored.age_buckets.len(), 2);
    assert_eq!(stored.top_countries[0].country, "US");

    // out-of-range percentages are rejected
    let bad: podcasts::Audience = serde_json::from_value(json!({
        "age_buckets": [{ "label": "18-24", "percent": 135.0 }]
    }))
    .unwrap();
    assert!(matches!(
        app.put_audience(&actor, &podcast.id, bad),
        Err(AppError::Validation(_))
    ));
}

#[test]
fn test_rankings_crud() {
    let (app, _tmp) = create_app();
    let actor = register_user(&app, "a@example.com", "alice");
    let podcast = app.fetch_podcast(&actor, VIDEO_URL).unwrap().podcast;

    let ranking = app
        .add_ranking(
            &actor,
            &podcast.id,
            RankingCreate {
                chart: "Top Podcasts".to_string(),
                category: "Technology".to_string(),
                position: 3,
                recorded_at: None,
            },
        )
        .unwrap();

    assert_eq!(app.list_rankings(&actor, &podcast.id).unwrap().len(), 1);

    // position 0 is invalid
    assert!(matches!(
        app.add_ranking(
            &actor,
            &podcast.id,
            RankingCreate {
                chart: "Top Podcasts".to_string(),
                category: "Technology".to_string(),
                position: 0,
                recorded_at: None,
            },
        ),
        Err(AppError::Validation(_))
    ));

    app.delete_ranking(&actor, &podcast.id, &ranking.id).unwrap();
    assert!(app.list_rankings(&actor, &podcast.id).unwrap().is_empty());

    // deleting again is not found
    assert!(matches!(
        app.delete_ranking(&actor, &podcast.id, &ranking.id),
        Err(AppError::NotFound)
    ));
}

#[test]
fn test_episodes_recompute_total_downloads() {
    let (app, _tmp) = create_app();
    let actor = register_user(&app, "a@example.com", "alice");
    let podcast = app.fetch_podcast(&actor, VIDEO_URL).unwrap().podcast;

    app.add_episode(
        &actor,
        &podcast.id,
        EpisodeCreate {
            title: "Episode 1".to_string(),
            downloads: 120,
            ..Default::default()
        },
    )
    .unwrap();
    app.add_episode(
        &actor,
        &podcast.id,
        EpisodeCreate {
            title: "Episode 2".to_string(),
            downloads: 80,
            ..Default::default()
        },
    )
    .unwrap();

    let analytics = app.analytics(&actor, &podcast.id).unwrap();
    assert_eq!(analytics.total_downloads, 200);
    // stub video episode plus the two added ones
    assert_eq!(analytics.episode_count, 3);

    // removing an episode re-derives the sum
    let episodes = app.list_episodes(&actor, &podcast.id).unwrap();
    let ep1 = episodes.iter().find(|e| e.title == "Episode 1").unwrap();
    app.delete_episode(&actor, &podcast.id, &ep1.id).unwrap();

    let analytics = app.analytics(&actor, &podcast.id).unwrap();
    assert_eq!(analytics.total_downloads, 80);
}

#[test]
fn test_insight_lifecycle() {
    let (app, _tmp) = create_app();
    let actor = register_user(&app, "a@example.com", "alice");
    let podcast = app.fetch_podcast(&actor, VIDEO_URL).unwrap().podcast;

    let insight = app
        .generate_insight(&actor, &podcast.id, InsightKind::Summary)
        .unwrap();
    assert_eq!(insight.content, "generated insight text");
    assert_eq!(insight.model, "stub/model");

    let listed = app.list_insights(&actor, &podcast.id).unwrap();
    assert_eq!(listed.len(), 1);

    let edited = app
        .update_insight(&actor, &podcast.id, &insight.id, "edited".to_string())
        .unwrap();
    assert_eq!(edited.content, "edited");

    app.delete_insight(&actor, &podcast.id, &insight.id).unwrap();
    assert!(app.list_insights(&actor, &podcast.id).unwrap().is_empty());
}

#[test]
fn test_insight_requires_provider() {
    let (app, _tmp) = create_app();
    let actor = register_user(&app, "a@example.com", "alice");
    let podcast = app.fetch_podcast(&actor, VIDEO_URL).unwrap().podcast;

    // same stores, but no generators configured
    let empty_app = App::new_with(
        app.podcast_store.clone(),
        app.user_store.clone(),
        HistoryLog::default(),
        app.config(),
        Secrets {
            token_secret: "test-secret".to_string(),
            ..Default::default()
        },
        SourceRegistry::with_fetchers(vec![]),
        InsightRegistry::with_generators(vec![]),
    );

    assert!(matches!(
        empty_app.generate_insight(&actor, &podcast.id, InsightKind::Summary),
        Err(AppError::Upstream(_))
    ));
}
