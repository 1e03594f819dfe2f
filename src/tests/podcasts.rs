use crate::podcasts::{
    BackendJson, Episode, Platform, Podcast, PodcastCreate, PodcastStore, PodcastUpdate,
    SearchQuery,
};

fn store() -> (BackendJson, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let store =
        BackendJson::load(&tmp.path().join("podcasts.json")).expect("failed to create store");
    (store, tmp)
}

fn video_create(user: &str, video_id: &str) -> PodcastCreate {
    PodcastCreate {
        user: user.to_string(),
        url: format!("https://www.youtube.com/watch?v={video_id}"),
        title: format!("video {video_id}"),
        ..Default::default()
    }
}

#[test]
fn test_create_derives_platform_and_id() {
    let (store, _tmp) = store();

    let podcast = store.create(video_create("u1", "dQw4w9WgXcQ")).unwrap();

    assert_eq!(podcast.platform, Platform::Youtube);
    assert_eq!(podcast.external_id, "dQw4w9WgXcQ");
    assert!(!podcast.id.is_empty());
}

#[test]
fn test_create_rejects_invalid_records() {
    let (store, _tmp) = store();

    // unsupported url
    let mut create = video_create("u1", "dQw4w9WgXcQ");
    create.url = "https://example.com/nope".to_string();
    assert!(store.create(create).is_err());

    // missing title
    let mut create = video_create("u1", "dQw4w9WgXcQ");
    create.title = "  ".to_string();
    assert!(store.create(create).is_err());

    // oversized title
    let mut create = video_create("u1", "dQw4w9WgXcQ");
    create.title = "x".repeat(201);
    assert!(store.create(create).is_err());
}

#[test]
fn test_search_filters_intersect() {
    let (store, _tmp) = store();

    store.create(video_create("u1", "AAAAAAAAAAA")).unwrap();
    store.create(video_create("u1", "BBBBBBBBBBB")).unwrap();
    store.create(video_create("u2", "AAAAAAAAAAA")).unwrap();

    let by_user = store
        .search(SearchQuery {
            user: Some("u1".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(by_user.len(), 2);

    let by_source = store
        .search(SearchQuery {
            user: Some("u1".to_string()),
            platform: Some(Platform::Youtube),
            external_id: Some("AAAAAAAAAAA".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(by_source.len(), 1);

    let none = store
        .search(SearchQuery {
            user: Some("u3".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn test_update_maps_only_provided_fields() {
    let (store, _tmp) = store();
    let podcast = store.create(video_create("u1", "dQw4w9WgXcQ")).unwrap();

    let updated = store
        .update(
            &podcast.id,
            PodcastUpdate {
                description: Some("new description".to_string()),
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();

    assert_eq!(updated.description, "new description");
    assert_eq!(updated.title, podcast.title);
    assert!(updated.updated_at >= podcast.updated_at);

    // unknown id maps to None, not an error
    assert!(store
        .update("missing", PodcastUpdate::default())
        .unwrap()
        .is_none());
}

#[test]
fn test_replace_recomputes_total_downloads() {
    let (store, _tmp) = store();
    let mut podcast: Podcast = store.create(video_create("u1", "dQw4w9WgXcQ")).unwrap();

    podcast.episodes = vec![
        Episode {
            id: "e1".to_string(),
            title: "one".to_string(),
            published_at: None,
            downloads: 10,
            plays: 0,
            likes: 0,
            duration_secs: 60,
        },
        Episode {
            id: "e2".to_string(),
            title: "two".to_string(),
            published_at: None,
            downloads: 32,
            plays: 0,
            likes: 0,
            duration_secs: 60,
        },
    ];
    // stale derived value must be ignored
    podcast.total_downloads = 9999;

    let stored = store.replace(podcast).unwrap().unwrap();
    assert_eq!(stored.total_downloads, 42);
    assert_eq!(stored.stats.episode_count, 2);
}

#[test]
fn test_delete() {
    let (store, _tmp) = store();
    let podcast = store.create(video_create("u1", "dQw4w9WgXcQ")).unwrap();

    assert!(store.delete(&podcast.id).unwrap());
    assert!(!store.delete(&podcast.id).unwrap());
    assert_eq!(store.total().unwrap(), 0);
}

#[test]
fn test_persist_and_reload() {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let path = tmp.path().join("podcasts.json");

    {
        let store = BackendJson::load(&path).unwrap();
        store.create(video_create("u1", "AAAAAAAAAAA")).unwrap();
        store.create(video_create("u1", "BBBBBBBBBBB")).unwrap();
    }

    let reloaded = BackendJson::load(&path).unwrap();
    assert_eq!(reloaded.total().unwrap(), 2);

    let found = reloaded
        .search(SearchQuery {
            external_id: Some("BBBBBBBBBBB".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].user, "u1");
}
