//! 链接识别
//!
//! 支持：
//! - https://www.bilibili.com/video/BVxxxx?p=2
//! - https://www.bilibili.com/...?bvid=BVxxxx
//! - https://live.bilibili.com/123456
//! - https://b23.tv/xxxx
//! - https://www.bilibili.com/bangumi/play/ep123（仅识别，不解析）

use regex::Regex;
use std::sync::OnceLock;

use super::types::LinkKind;

fn video_path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/video/(BV[a-zA-Z0-9]+)").unwrap())
}

fn bvid_query_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"bvid=(BV[a-zA-Z0-9]+)").unwrap())
}

fn bare_bvid_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"BV[a-zA-Z0-9]+").unwrap())
}

fn page_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[?&]p=(\d+)").unwrap())
}

fn live_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"live\.bilibili\.com/(\d+)").unwrap())
}

/// 默认的短链接域名
pub const DEFAULT_SHORT_LINK_HOSTS: &[&str] = &["b23.tv"];

fn bangumi_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"bilibili\.com/bangumi/play/([a-zA-Z0-9]+)").unwrap())
}

/// 去除首尾空白，没有协议时补上 https://
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

fn is_bilibili_host(url: &str) -> bool {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        .map_or(false, |h| h == "bilibili.com" || h.ends_with(".bilibili.com"))
}

fn is_short_link<S: AsRef<str>>(url: &str, short_hosts: &[S]) -> bool {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .map_or(false, |h| {
            short_hosts
                .iter()
                .any(|s| h.eq_ignore_ascii_case(s.as_ref().trim()))
        })
}

/// 识别链接类型（短链接域名使用默认值）
pub fn classify(url: &str) -> Option<LinkKind> {
    classify_with(url, DEFAULT_SHORT_LINK_HOSTS)
}

/// 识别链接类型，`short_hosts` 中的域名视为短链接
pub fn classify_with<S: AsRef<str>>(url: &str, short_hosts: &[S]) -> Option<LinkKind> {
    if url.trim().is_empty() {
        return None;
    }
    let url = normalize_url(url);

    if is_short_link(&url, short_hosts) {
        return Some(LinkKind::ShortLink { url });
    }

    if !is_bilibili_host(&url) {
        return None;
    }

    if let Some(caps) = live_re().captures(&url) {
        return Some(LinkKind::Live {
            room_id: caps[1].to_string(),
        });
    }

    let bvid = video_path_re()
        .captures(&url)
        .or_else(|| bvid_query_re().captures(&url))
        .map(|c| c[1].to_string());
    if let Some(bvid) = bvid {
        return Some(LinkKind::Video {
            bvid,
            page: extract_page(&url),
        });
    }

    bangumi_re().captures(&url).map(|caps| LinkKind::Bangumi {
        id: caps[1].to_string(),
    })
}

/// 分P，缺省或非法时为 1
pub fn extract_page(url: &str) -> u32 {
    page_re()
        .captures(url)
        .and_then(|c| c[1].parse::<u32>().ok())
        .filter(|p| *p > 0)
        .unwrap_or(1)
}

/// 从任意文本中提取 BV 号
pub fn extract_bvid(text: &str) -> Option<String> {
    if let Some(c) = video_path_re().captures(text) {
        return Some(c[1].to_string());
    }
    if let Some(c) = bvid_query_re().captures(text) {
        return Some(c[1].to_string());
    }
    bare_bvid_re().find(text).map(|m| m.as_str().to_string())
}

pub fn is_valid_bilibili_url(url: &str) -> bool {
    classify(url).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_video() {
        assert_eq!(
            classify("https://www.bilibili.com/video/BV1xx411c7mu"),
            Some(LinkKind::Video {
                bvid: "BV1xx411c7mu".to_string(),
                page: 1
            })
        );
        assert_eq!(
            classify("www.bilibili.com/video/BV1xx411c7mu/?spm_id_from=333&p=3"),
            Some(LinkKind::Video {
                bvid: "BV1xx411c7mu".to_string(),
                page: 3
            })
        );
        assert_eq!(
            classify("  https://m.bilibili.com/playlist?bvid=BV1ab411c7mu&p=0 "),
            Some(LinkKind::Video {
                bvid: "BV1ab411c7mu".to_string(),
                page: 1
            })
        );
    }

    #[test]
    fn test_classify_live_and_short() {
        assert_eq!(
            classify("https://live.bilibili.com/21452505?from=search"),
            Some(LinkKind::Live {
                room_id: "21452505".to_string()
            })
        );
        assert_eq!(
            classify("B23.TV/AbCdEf"),
            Some(LinkKind::ShortLink {
                url: "https://B23.TV/AbCdEf".to_string()
            })
        );
        assert!(matches!(
            classify("https://b23.tv/"),
            Some(LinkKind::ShortLink { .. })
        ));
    }

    #[test]
    fn test_classify_with_custom_short_hosts() {
        let hosts = ["b23.tv", "bili2233.cn"];
        assert!(matches!(
            classify_with("https://bili2233.cn/xyz", &hosts),
            Some(LinkKind::ShortLink { .. })
        ));
        assert!(classify("https://bili2233.cn/xyz").is_none());
        // 只比较域名，路径里出现 b23.tv 不算
        assert!(classify("https://evil.com/b23.tv/abc").is_none());
        assert!(classify_with("https://b23.tv/abc", &["bili2233.cn"]).is_none());
    }

    #[test]
    fn test_classify_bangumi() {
        assert_eq!(
            classify("https://www.bilibili.com/bangumi/play/ep123456"),
            Some(LinkKind::Bangumi {
                id: "ep123456".to_string()
            })
        );
    }

    #[test]
    fn test_classify_rejects_foreign_hosts() {
        for url in [
            "",
            "   ",
            "https://example.com/video/BV1xx411c7mu",
            "https://evil.com/?u=live.bilibili.com/123",
            "https://www.bilibili.com/read/cv123",
        ] {
            assert!(classify(url).is_none(), "should reject: {}", url);
        }
    }

    #[test]
    fn test_extract_bvid() {
        assert_eq!(
            extract_bvid("https://www.bilibili.com/video/BV1xx411c7mu?p=2").as_deref(),
            Some("BV1xx411c7mu")
        );
        assert_eq!(
            extract_bvid("https://m.bilibili.com/x?bvid=BV1yy411c7mu").as_deref(),
            Some("BV1yy411c7mu")
        );
        assert_eq!(extract_bvid("看这个 BV1zz411c7mu").as_deref(), Some("BV1zz411c7mu"));
        assert_eq!(extract_bvid("no id here"), None);
    }
}
