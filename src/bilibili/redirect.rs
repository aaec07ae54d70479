//! 解析 + 选节点 + 重试，得到最终重定向地址

use anyhow::{anyhow, Result};
use reqwest::header::{RANGE, REFERER};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{api, rewrite};
use crate::config::Config;
use crate::AppState;

/// 解析失败时跳回的原始页面
pub fn original_page(bvid: &str, page: u32) -> String {
    if page > 1 {
        format!("https://www.bilibili.com/video/{}?p={}", bvid, page)
    } else {
        format!("https://www.bilibili.com/video/{}", bvid)
    }
}

pub fn live_page(room_id: &str) -> String {
    format!("https://live.bilibili.com/{}", room_id)
}

/// 带固定间隔重试地解析影片，返回改写节点后的流地址
pub async fn resolve_redirect(state: &AppState, bvid: &str, page: u32, qn: u32) -> Result<String> {
    let nodes = &state.config.nodes;
    let attempts = nodes.retry_attempts.max(1);
    let mut last_err = anyhow!("未进行任何尝试");

    for attempt in 1..=attempts {
        info!("🔄 [{}/{}] 解析 {} P{} qn={}", attempt, attempts, bvid, page, qn);

        match try_resolve(state, bvid, page, qn).await {
            Ok(url) => return Ok(url),
            Err(e) => {
                warn!("⚠️ 第 {} 次解析失败: {}", attempt, e);
                last_err = e;
            }
        }

        if attempt < attempts {
            tokio::time::sleep(Duration::from_millis(nodes.retry_delay_ms)).await;
        }
    }

    Err(last_err.context(format!("{} 次尝试均失败", attempts)))
}

async fn try_resolve(state: &AppState, bvid: &str, page: u32, qn: u32) -> Result<String> {
    let info = api::get_video_info(state, bvid).await?;
    let cid = info.cid_for_page(page);
    let play = api::get_play_url_any(state, bvid, cid, qn).await?;

    let stream = play
        .best_stream(qn)
        .ok_or_else(|| anyhow!("playurl 中没有可用的流地址"))?;

    if !rewrite::is_rewritable(&stream) {
        info!("📎 流地址节点不可改写，直接使用: {:?}", rewrite::host_of(&stream));
        return Ok(stream);
    }

    select_node(state, &stream).await
}

/// 依次尝试候选节点，第一个探测通过的胜出
pub async fn select_node(state: &AppState, stream: &str) -> Result<String> {
    let nodes = &state.config.nodes;
    let candidates = state.nodes.candidates(nodes.strategy);

    for host in &candidates {
        let url = rewrite::rewrite_host(stream, host);

        if !nodes.probe {
            info!("🎯 使用节点 {}（未探测）", host);
            return Ok(url);
        }

        match probe(state, &url).await {
            Ok(()) => {
                state.nodes.record_success(host);
                info!("✅ 节点可用: {}", host);
                return Ok(url);
            }
            Err(e) => {
                state.nodes.record_fail(host);
                warn!("❌ 节点不可用 {}: {}", host, e);
            }
        }
    }

    Err(anyhow!("{} 个节点均不可用", candidates.len()))
}

/// 用 1 字节的 Range 请求确认节点能提供该文件
async fn probe(state: &AppState, url: &str) -> Result<()> {
    debug!("🔍 探测: {}", url);
    let resp = state
        .client
        .get(url)
        .header(RANGE, "bytes=0-0")
        .header(REFERER, Config::referer())
        .timeout(Duration::from_secs(state.config.nodes.probe_timeout_secs))
        .send()
        .await?;

    match resp.status() {
        StatusCode::OK | StatusCode::PARTIAL_CONTENT => Ok(()),
        status => Err(anyhow!("HTTP {}", status)),
    }
}

/// 直播间：取第一条直播流
pub async fn resolve_live_redirect(state: &AppState, room_id: &str) -> Result<String> {
    let urls = api::get_live_play_url(state, room_id).await?;
    urls.into_iter()
        .next()
        .ok_or_else(|| anyhow!("直播间 {} 没有可用的直播流（可能未开播）", room_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_original_page() {
        assert_eq!(
            original_page("BV1xx411c7mu", 1),
            "https://www.bilibili.com/video/BV1xx411c7mu"
        );
        assert_eq!(
            original_page("BV1xx411c7mu", 3),
            "https://www.bilibili.com/video/BV1xx411c7mu?p=3"
        );
        assert_eq!(live_page("123"), "https://live.bilibili.com/123");
    }
}
