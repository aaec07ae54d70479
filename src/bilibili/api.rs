//! B 站公开接口：影片信息、播放地址、直播间

use anyhow::{anyhow, Context, Result};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, REFERER};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::types::{
    ApiResponse, LiveInfoData, LivePlayData, LiveRoomInfo, PlayUrlData, VideoInfo,
};
use crate::config::Config;
use crate::AppState;

/// 清晰度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality {
    pub qn: u32,
    pub name: &'static str,
    pub desc: &'static str,
}

pub const QUALITIES: &[Quality] = &[
    Quality { qn: 16, name: "360P", desc: "流畅" },
    Quality { qn: 32, name: "480P", desc: "清晰" },
    Quality { qn: 64, name: "720P", desc: "高清" },
    Quality { qn: 74, name: "720P60", desc: "高帧率" },
    Quality { qn: 80, name: "1080P", desc: "高清" },
    Quality { qn: 112, name: "1080P+", desc: "高码率" },
    Quality { qn: 116, name: "1080P60", desc: "高帧率" },
    Quality { qn: 120, name: "4K", desc: "超清" },
];

impl Quality {
    pub fn from_qn(qn: u32) -> Option<Quality> {
        QUALITIES.iter().copied().find(|q| q.qn == qn)
    }
}

/// `/api/parse/video` 同时请求的四档清晰度
pub fn video_qualities() -> Vec<Quality> {
    [16, 32, 64, 80]
        .iter()
        .filter_map(|qn| Quality::from_qn(*qn))
        .collect()
}

/// 播放地址的请求方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayMethod {
    /// 带 platform=html5，绕过防盗链
    Html5,
    Standard,
}

impl PlayMethod {
    pub fn name(&self) -> &'static str {
        match self {
            PlayMethod::Html5 => "html5",
            PlayMethod::Standard => "标准",
        }
    }
}

/// 日志用的响应预览，按字符截断
pub(crate) fn preview(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(i, _)| &text[..i])
}

/// 上游返回的 HTTP 状态码（如果错误来自 HTTP 状态）
pub fn upstream_status(err: &anyhow::Error) -> Option<u16> {
    err.chain()
        .find_map(|e| e.downcast_ref::<reqwest::Error>())
        .and_then(|e| e.status())
        .map(|s| s.as_u16())
}

async fn get_json<T: DeserializeOwned>(
    state: &AppState,
    url: &str,
    referer: &str,
    what: &str,
) -> Result<T> {
    debug!("📡 请求 {}: {}", what, url);

    let resp = state
        .client
        .get(url)
        .header(REFERER, referer)
        .header(ACCEPT, "application/json, text/plain, */*")
        .header(ACCEPT_LANGUAGE, "zh-CN,zh;q=0.9,en;q=0.8")
        .send()
        .await?
        .error_for_status()?;

    let text = resp.text().await?;
    debug!("📨 {} 响应: {}", what, preview(&text, 200));

    let res: ApiResponse<T> = serde_json::from_str(&text)
        .with_context(|| format!("解析 {} 响应失败", what))?;

    if res.code != 0 {
        return Err(anyhow!("{} 失败: code={}, message={}", what, res.code, res.message));
    }

    res.data.ok_or_else(|| anyhow!("{} 未返回 data", what))
}

/// 获取影片信息（标题、cid、分P）
pub async fn get_video_info(state: &AppState, bvid: &str) -> Result<VideoInfo> {
    let url = format!(
        "{}/x/web-interface/view?bvid={}",
        state.config.bilibili.api_base,
        urlencoding::encode(bvid)
    );
    let info: VideoInfo = get_json(state, &url, Config::referer(), "view").await?;
    info!("🎬 影片信息: {} cid={} 共 {} P", info.title, info.cid, info.pages.len().max(1));
    Ok(info)
}

/// 获取指定清晰度的播放地址
pub async fn get_play_url(
    state: &AppState,
    bvid: &str,
    cid: u64,
    qn: u32,
    method: PlayMethod,
) -> Result<PlayUrlData> {
    let mut url = format!(
        "{}/x/player/playurl?bvid={}&cid={}&qn={}&fnval=16",
        state.config.bilibili.api_base,
        urlencoding::encode(bvid),
        cid,
        qn
    );
    if method == PlayMethod::Html5 {
        url.push_str("&platform=html5");
    }
    get_json(state, &url, Config::referer(), "playurl").await
}

/// 依次尝试 html5 和标准方式，返回最后一次的错误
pub async fn get_play_url_any(
    state: &AppState,
    bvid: &str,
    cid: u64,
    qn: u32,
) -> Result<PlayUrlData> {
    let mut last_err = None;
    for method in [PlayMethod::Html5, PlayMethod::Standard] {
        match get_play_url(state, bvid, cid, qn, method).await {
            Ok(data) => {
                debug!("✅ qn={} 获取成功 (方法: {})", qn, method.name());
                return Ok(data);
            }
            Err(e) => {
                warn!("⚠️ qn={} 方法 {} 失败: {}", qn, method.name(), e);
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow!("playurl 没有可用的请求方式")))
}

/// 获取直播间信息
pub async fn get_live_info(state: &AppState, room_id: &str) -> Result<LiveRoomInfo> {
    let url = format!(
        "{}/xlive/web-room/v1/index/getInfoByRoom?room_id={}",
        state.config.bilibili.live_api_base,
        urlencoding::encode(room_id)
    );
    let data: LiveInfoData = get_json(state, &url, Config::live_referer(), "getInfoByRoom").await?;
    data.room_info
        .ok_or_else(|| anyhow!("直播间 {} 未返回 room_info", room_id))
}

/// 获取直播流地址
pub async fn get_live_play_url(state: &AppState, room_id: &str) -> Result<Vec<String>> {
    let url = format!(
        "{}/room/v1/Room/playUrl?cid={}&quality=4&platform=web",
        state.config.bilibili.live_api_base,
        urlencoding::encode(room_id)
    );
    let data: LivePlayData = get_json(state, &url, Config::live_referer(), "live playUrl").await?;
    Ok(data
        .durl
        .into_iter()
        .map(|d| d.url)
        .filter(|u| !u.is_empty())
        .collect())
}
