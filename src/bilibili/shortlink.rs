//! b23.tv 短链接解析

use anyhow::{anyhow, Context, Result};
use reqwest::header::LOCATION;
use tracing::{debug, info};
use url::Url;

use crate::AppState;

/// 最多跟随的跳转次数
const MAX_HOPS: usize = 5;

/// 解析短链接，返回去掉追踪参数的 B 站完整链接（带进程内缓存）
pub async fn resolve_short_link(state: &AppState, short_url: &str) -> Result<String> {
    let short_url = short_url.trim();

    if let Some(cached) = cached(state, short_url) {
        debug!("🗂️ 短链接缓存命中: {} -> {}", short_url, cached);
        return Ok(cached);
    }

    let mut current = Url::parse(short_url).with_context(|| format!("无效的短链接: {}", short_url))?;

    for hop in 0..MAX_HOPS {
        let resp = state.no_redirect_client.get(current.clone()).send().await?;
        let status = resp.status();

        if !status.is_redirection() {
            return Err(anyhow!("期望重定向响应，但收到状态码: {}", status));
        }

        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| anyhow!("响应中没有找到 Location 头"))?;

        // Location 可能是相对路径
        let next = current
            .join(location)
            .with_context(|| format!("无法解析 Location: {}", location))?;
        debug!("↪️ 第 {} 跳: {}", hop + 1, next);

        if is_bilibili(&next) {
            let full = clean_bilibili_url(next);
            info!("🔗 短链接解析成功: {} -> {}", short_url, full);
            if let Ok(mut cache) = state.short_links.lock() {
                cache.insert(short_url.to_string(), full.clone());
            }
            return Ok(full);
        }

        current = next;
    }

    Err(anyhow!("短链接跳转超过 {} 次仍未到达 B 站页面", MAX_HOPS))
}

fn cached(state: &AppState, short_url: &str) -> Option<String> {
    state
        .short_links
        .lock()
        .ok()
        .and_then(|cache| cache.get(short_url).cloned())
}

fn is_bilibili(url: &Url) -> bool {
    url.host_str()
        .map_or(false, |h| h == "bilibili.com" || h.ends_with(".bilibili.com"))
}

/// 去掉追踪参数，只保留分P
pub fn clean_bilibili_url(mut url: Url) -> String {
    let page = url
        .query_pairs()
        .find(|(k, _)| k == "p")
        .map(|(_, v)| v.into_owned());
    url.set_query(None);
    url.set_fragment(None);
    if let Some(p) = page {
        url.query_pairs_mut().append_pair("p", &p);
    }
    url.to_string()
}
