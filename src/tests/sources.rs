use crate::podcasts::Platform;
use crate::sources::{parse_source_url, spotify, youtube};
use serde_json::json;

#[test]
fn test_parse_youtube_urls() {
    let cases = [
        "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
        "http://youtube.com/watch?v=dQw4w9WgXcQ",
        "https://m.youtube.com/watch?v=dQw4w9WgXcQ",
        "https://youtu.be/dQw4w9WgXcQ",
        "https://www.youtube.com/shorts/dQw4w9WgXcQ",
        "https://www.youtube.com/embed/dQw4w9WgXcQ",
        "youtube.com/watch?v=dQw4w9WgXcQ",
    ];

    for url in cases {
        let source = parse_source_url(url).unwrap_or_else(|| panic!("failed to parse {url}"));
        assert_eq!(source.platform, Platform::Youtube, "{url}");
        assert_eq!(source.external_id, "dQw4w9WgXcQ", "{url}");
    }
}

#[test]
fn test_parse_spotify_urls() {
    let source =
        parse_source_url("https://open.spotify.com/show/4rOoJ6Egrf8K2IrywzwOMk").unwrap();
    assert_eq!(source.platform, Platform::Spotify);
    assert_eq!(source.external_id, "4rOoJ6Egrf8K2IrywzwOMk");

    // query strings don't get in the way
    let source =
        parse_source_url("https://open.spotify.com/show/4rOoJ6Egrf8K2IrywzwOMk?si=abc123").unwrap();
    assert_eq!(source.external_id, "4rOoJ6Egrf8K2IrywzwOMk");
}

#[test]
fn test_parse_rejects_non_sources() {
    assert!(parse_source_url("https://example.com/watch?v=dQw4w9WgXcQ").is_none());
    assert!(parse_source_url("https://open.spotify.com/episode/4rOoJ6Egrf8K2IrywzwOMk").is_none());
    assert!(parse_source_url("https://www.youtube.com/watch?v=tooshort").is_none());
    assert!(parse_source_url("not a url at all").is_none());
    assert!(parse_source_url("").is_none());
}

#[test]
fn test_map_youtube_video() {
    let item: youtube::VideoItem = serde_json::from_value(json!({
        "id": "dQw4w9WgXcQ",
        "snippet": {
            "title": "Never Gonna Give You Up",
            "description": "Official video",
            "channelId": "UCchannel",
            "channelTitle": "Rick Astley",
            "publishedAt": "2009-10-25T06:57:33Z",
            "thumbnails": {
                "high": { "url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg" }
            }
        },
        "statistics": {
            "viewCount": "1400000000",
            "likeCount": "16000000",
            "commentCount": "2200000"
        }
    }))
    .unwrap();

    let meta = youtube::map_video(item, |channel_id| {
        assert_eq!(channel_id, "UCchannel");
        Some(3400000)
    });

    assert_eq!(meta.title, "Never Gonna Give You Up");
    assert_eq!(meta.author, "Rick Astley");
    assert_eq!(meta.stats.views, 1400000000);
    assert_eq!(meta.stats.likes, 16000000);
    assert_eq!(meta.stats.comments, 2200000);
    assert_eq!(meta.stats.subscribers, 3400000);
    assert_eq!(
        meta.cover_image_url.as_deref(),
        Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg")
    );

    // the video itself becomes the single episode
    assert_eq!(meta.episodes.len(), 1);
    assert_eq!(meta.episodes[0].plays, 1400000000);
    assert!(meta.episodes[0].published_at.is_some());
}

#[test]
fn test_map_youtube_video_with_missing_counters() {
    let item: youtube::VideoItem = serde_json::from_value(json!({
        "id": "dQw4w9WgXcQ",
        "snippet": { "title": "Bare" }
    }))
    .unwrap();

    let meta = youtube::map_video(item, |_| None);

    assert_eq!(meta.title, "Bare");
    assert_eq!(meta.stats.views, 0);
    assert_eq!(meta.stats.subscribers, 0);
    assert!(meta.cover_image_url.is_none());
}

#[test]
fn test_map_spotify_show() {
    let show: spotify::ShowResponse = serde_json::from_value(json!({
        "name": "The Daily Tech",
        "description": "Daily technology news",
        "publisher": "Example Media",
        "images": [{ "url": "https://i.scdn.co/image/abc" }],
        "total_episodes": 230,
        "episodes": {
            "items": [
                {
                    "id": "ep1aaaaaaaaaaaaaaaaaaa",
                    "name": "Episode One",
                    "release_date": "2024-03-15",
                    "duration_ms": 1830000
                },
                {
                    "id": "ep2aaaaaaaaaaaaaaaaaaa",
                    "name": "Episode Two",
                    "release_date": "2024",
                    "duration_ms": 900000
                }
            ]
        }
    }))
    .unwrap();

    let meta = spotify::map_show(show);

    assert_eq!(meta.title, "The Daily Tech");
    assert_eq!(meta.author, "Example Media");
    assert_eq!(meta.stats.episode_count, 230);
    assert_eq!(meta.cover_image_url.as_deref(), Some("https://i.scdn.co/image/abc"));

    assert_eq!(meta.episodes.len(), 2);
    assert_eq!(meta.episodes[0].duration_secs, 1830);
    assert!(meta.episodes[0].published_at.is_some());
    // year-only precision still parses
    assert!(meta.episodes[1].published_at.is_some());
}
