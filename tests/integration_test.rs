//! 集成测试

use bilibili_relay::bilibili::{self, LinkKind};

#[test]
fn test_classify_valid() {
    let test_cases = vec![
        (
            "https://www.bilibili.com/video/BV1xx411c7mu",
            LinkKind::Video {
                bvid: String::from("BV1xx411c7mu"),
                page: 1,
            },
        ),
        (
            "https://www.bilibili.com/video/BV1xx411c7mu?p=4",
            LinkKind::Video {
                bvid: String::from("BV1xx411c7mu"),
                page: 4,
            },
        ),
        (
            "https://live.bilibili.com/21452505",
            LinkKind::Live {
                room_id: String::from("21452505"),
            },
        ),
        (
            "https://b23.tv/xyz123",
            LinkKind::ShortLink {
                url: String::from("https://b23.tv/xyz123"),
            },
        ),
    ];

    for (url, expected) in test_cases {
        assert_eq!(bilibili::classify(url), Some(expected), "Failed for URL: {}", url);
    }
}

#[test]
fn test_classify_invalid() {
    let invalid_urls = vec![
        "https://example.com/video/BV1xx411c7mu",
        "not-a-url",
        "https://www.bilibili.com/other/path",
        "",
    ];

    for url in invalid_urls {
        assert!(
            !bilibili::is_valid_bilibili_url(url),
            "Should reject invalid URL: {}",
            url
        );
    }
}

#[test]
fn test_rewrite_then_host() {
    let url = "https://upos-sz-estgoss.bilivideo.com/upgcxcode/a.m4s?e=abc&upsig=def";
    let out = bilibili::rewrite_host(url, "upos-sz-mirrorcos.bilivideo.com");
    assert_eq!(
        bilibili::host_of(&out).as_deref(),
        Some("upos-sz-mirrorcos.bilivideo.com")
    );
    assert!(out.ends_with("/upgcxcode/a.m4s?e=abc&upsig=def"));
}
