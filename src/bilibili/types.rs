//! 数据类型

use serde::{Deserialize, Serialize};

/// 识别出的链接类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkKind {
    Video { bvid: String, page: u32 },
    Live { room_id: String },
    ShortLink { url: String },
    Bangumi { id: String },
}

/// B 站接口的通用外壳 `{ code, message, data }`
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoPage {
    pub cid: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub part: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoInfo {
    pub bvid: String,
    #[serde(default)]
    pub title: String,
    pub cid: u64,
    #[serde(default)]
    pub pages: Vec<VideoPage>,
}

impl VideoInfo {
    /// 第 `page` P 的 cid，超出范围时回退到主 cid
    pub fn cid_for_page(&self, page: u32) -> u64 {
        page.checked_sub(1)
            .and_then(|i| self.pages.get(i as usize))
            .map(|p| p.cid)
            .unwrap_or(self.cid)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Durl {
    pub url: String,
    #[serde(default)]
    pub order: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashStream {
    pub id: u32,
    #[serde(rename = "baseUrl", alias = "base_url", default)]
    pub base_url: String,
    #[serde(rename = "backupUrl", alias = "backup_url", default)]
    pub backup_url: Option<Vec<String>>,
    #[serde(default)]
    pub codecs: String,
}

impl DashStream {
    /// baseUrl 为空时取第一个 backupUrl
    pub fn url(&self) -> Option<&str> {
        if !self.base_url.is_empty() {
            return Some(&self.base_url);
        }
        self.backup_url
            .as_ref()
            .and_then(|v| v.first())
            .map(|s| s.as_str())
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Dash {
    #[serde(default)]
    pub video: Vec<DashStream>,
    #[serde(default)]
    pub audio: Option<Vec<DashStream>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayUrlData {
    #[serde(default)]
    pub quality: u32,
    #[serde(default)]
    pub durl: Option<Vec<Durl>>,
    #[serde(default)]
    pub dash: Option<Dash>,
}

impl PlayUrlData {
    pub fn durls(&self) -> &[Durl] {
        self.durl.as_deref().unwrap_or_default()
    }

    pub fn dash_videos(&self) -> &[DashStream] {
        self.dash.as_ref().map(|d| d.video.as_slice()).unwrap_or_default()
    }

    pub fn dash_audios(&self) -> &[DashStream] {
        self.dash
            .as_ref()
            .and_then(|d| d.audio.as_deref())
            .unwrap_or_default()
    }

    /// 选出重定向用的流地址
    ///
    /// DASH 中 id 与 qn 相同的优先，其次是不高于 qn 的最高清晰度，最后是 FLV 第一段。
    pub fn best_stream(&self, qn: u32) -> Option<String> {
        let videos = self.dash_videos();

        if let Some(url) = videos.iter().find(|v| v.id == qn).and_then(|v| v.url()) {
            return Some(url.to_string());
        }

        let fallback = videos
            .iter()
            .filter(|v| v.id <= qn && v.url().is_some())
            .max_by_key(|v| v.id)
            .and_then(|v| v.url());
        if let Some(url) = fallback {
            return Some(url.to_string());
        }

        self.durls()
            .iter()
            .map(|d| d.url.as_str())
            .find(|u| !u.is_empty())
            .map(|u| u.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiveRoomInfo {
    pub room_id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub live_status: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LiveInfoData {
    pub room_info: Option<LiveRoomInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LivePlayData {
    #[serde(default)]
    pub durl: Vec<Durl>,
}

/// 返回给前端的单条结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkItem {
    pub title: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: LinkItemKind,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkItemKind {
    Info,
    Stream,
    Error,
    Original,
}

impl LinkItem {
    pub fn new(
        kind: LinkItemKind,
        title: impl Into<String>,
        url: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            kind,
            description: description.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dash(id: u32, url: &str) -> DashStream {
        DashStream {
            id,
            base_url: url.to_string(),
            backup_url: None,
            codecs: String::new(),
        }
    }

    #[test]
    fn test_best_stream_prefers_exact_qn() {
        let data = PlayUrlData {
            dash: Some(Dash {
                video: vec![dash(80, "a"), dash(64, "b"), dash(32, "c")],
                audio: None,
            }),
            durl: Some(vec![Durl {
                url: "flv".into(),
                order: 1,
            }]),
            ..Default::default()
        };
        assert_eq!(data.best_stream(64).as_deref(), Some("b"));
        assert_eq!(data.best_stream(74).as_deref(), Some("b"));
        assert_eq!(data.best_stream(16).as_deref(), Some("flv"));
    }

    #[test]
    fn test_best_stream_uses_backup_url() {
        let data = PlayUrlData {
            dash: Some(Dash {
                video: vec![DashStream {
                    id: 64,
                    base_url: String::new(),
                    backup_url: Some(vec!["backup".into()]),
                    codecs: String::new(),
                }],
                audio: None,
            }),
            ..Default::default()
        };
        assert_eq!(data.best_stream(64).as_deref(), Some("backup"));
        assert_eq!(PlayUrlData::default().best_stream(64), None);
    }

    #[test]
    fn test_cid_for_page() {
        let info = VideoInfo {
            bvid: "BV1".into(),
            title: String::new(),
            cid: 100,
            pages: vec![
                VideoPage { cid: 100, page: 1, part: "p1".into() },
                VideoPage { cid: 200, page: 2, part: "p2".into() },
            ],
        };
        assert_eq!(info.cid_for_page(2), 200);
        assert_eq!(info.cid_for_page(3), 100);
        assert_eq!(info.cid_for_page(0), 100);
    }

    #[test]
    fn test_link_item_serialization() {
        let item = LinkItem::new(LinkItemKind::Stream, "t", "u", "d");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "stream");
        assert_eq!(json["url"], "u");
    }
}
