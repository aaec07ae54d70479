//! 生成给前端展示的候选链接列表

use anyhow::Result;
use futures_util::future::join_all;
use std::collections::HashSet;
use tracing::{info, warn};

use super::api::{self, Quality};
use super::redirect::{live_page, original_page};
use super::rewrite;
use super::types::{LinkItem, LinkItemKind, PlayUrlData};
use crate::AppState;

/// 按上游状态码给出提示
pub fn describe_failure(status: Option<u16>) -> String {
    match status {
        Some(403) => "403 禁止访问 - 可能需要登录或该清晰度不可用".to_string(),
        Some(404) => "404 未找到 - 该清晰度不存在".to_string(),
        Some(429) => "429 请求过于频繁 - 请稍后再试".to_string(),
        Some(code) => format!("HTTP {} 错误", code),
        None => "获取失败".to_string(),
    }
}

/// 解析影片的各档清晰度
///
/// `mirror` 为 Some 时把可改写的流地址换成该节点。
pub async fn video_links(
    state: &AppState,
    bvid: &str,
    page: u32,
    mirror: Option<&str>,
) -> Result<Vec<LinkItem>> {
    let info = api::get_video_info(state, bvid).await?;
    let cid = info.cid_for_page(page);
    let page_url = original_page(bvid, page);

    let qualities = api::video_qualities();
    let results = join_all(qualities.iter().map(|q| async move {
        info!("⏳ 正在获取 {} 流地址...", q.name);
        (*q, api::get_play_url_any(state, bvid, cid, q.qn).await)
    }))
    .await;

    let node_note = mirror
        .map(|host| format!("（节点 {}）", host))
        .unwrap_or_default();
    let fix = |url: &str| match mirror {
        Some(host) => rewrite::rewrite_host(url, host),
        None => url.to_string(),
    };

    let mut items = vec![LinkItem::new(
        LinkItemKind::Info,
        "影片标题",
        page_url.clone(),
        info.title.clone(),
    )];
    let mut seen = HashSet::new();

    for (quality, result) in results {
        match result {
            Ok(data) => push_streams(&mut items, &mut seen, &quality, &data, &fix, &node_note),
            Err(e) => {
                let status = api::upstream_status(&e);
                warn!("❌ 获取 {} 失败: {}", quality.name, e);
                items.push(LinkItem::new(
                    LinkItemKind::Info,
                    format!("{} 流地址", quality.name),
                    page_url.clone(),
                    format!("{} {} - {}", quality.name, quality.desc, describe_failure(status)),
                ));
            }
        }
    }

    items.push(LinkItem::new(
        LinkItemKind::Original,
        "原始链接",
        page_url,
        "Bilibili 原始影片链接",
    ));

    Ok(items)
}

fn push_streams(
    items: &mut Vec<LinkItem>,
    seen: &mut HashSet<String>,
    quality: &Quality,
    data: &PlayUrlData,
    fix: &dyn Fn(&str) -> String,
    node_note: &str,
) {
    for durl in data.durls() {
        let url = fix(&durl.url);
        if seen.insert(url.clone()) {
            items.push(LinkItem::new(
                LinkItemKind::Stream,
                format!("{} FLV 流地址", quality.name),
                url,
                format!("直接 FLV 流地址 - {} {}{}", quality.name, quality.desc, node_note),
            ));
        }
    }

    for video in data.dash_videos() {
        let Some(raw) = video.url() else { continue };
        let url = fix(raw);
        if seen.insert(url.clone()) {
            // 上游可能返回比请求档位更高的流，标签按流自身的清晰度
            let actual = api::Quality::from_qn(video.id).unwrap_or(*quality);
            items.push(LinkItem::new(
                LinkItemKind::Stream,
                format!("{} DASH 视频流", actual.name),
                url,
                format!(
                    "直接 DASH 视频流 - {} {} {}{}",
                    actual.name, actual.desc, video.codecs, node_note
                ),
            ));
        }
    }

    for audio in data.dash_audios() {
        let Some(raw) = audio.url() else { continue };
        let url = fix(raw);
        if seen.insert(url.clone()) {
            items.push(LinkItem::new(
                LinkItemKind::Stream,
                "DASH 音频流",
                url,
                format!("直接 DASH 音频流 - 高品质音频{}", node_note),
            ));
        }
    }
}

/// 解析直播间
pub async fn live_links(state: &AppState, room_id: &str) -> Result<Vec<LinkItem>> {
    let room = api::get_live_info(state, room_id).await?;
    let title = if room.title.is_empty() {
        "直播间".to_string()
    } else {
        room.title.clone()
    };

    let mut items = vec![LinkItem::new(
        LinkItemKind::Info,
        "直播标题",
        live_page(room_id),
        title,
    )];

    match api::get_live_play_url(state, room_id).await {
        Ok(urls) => {
            for (i, url) in urls.into_iter().enumerate() {
                items.push(LinkItem::new(
                    LinkItemKind::Stream,
                    format!("直播流地址 {}", i + 1),
                    url,
                    format!("直接直播流地址 - 线路 {}", i + 1),
                ));
            }
        }
        Err(e) => warn!("⚠️ 获取直播流失败 room={}: {}", room_id, e),
    }

    Ok(items)
}
