//! Web 服务器模块

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::bilibili::{
    self, parser,
    redirect::live_page,
    types::{LinkItem, LinkKind},
};
use crate::geoip;
use crate::nodes::NodeSnapshot;
use crate::stats::{Counter, StatsSnapshot};
use crate::AppState;

// 缓存 HTML 模板（避免每次都读取）
static HTML_TEMPLATE: &str = include_str!("../templates/index.html");

#[derive(Debug, Deserialize)]
pub struct IndexQuery {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VideoQuery {
    #[serde(default)]
    pub mirror: Option<String>,
    #[serde(default)]
    pub node: Option<String>,
    /// 分P；非数字或 0 时按第一P处理
    #[serde(default)]
    pub p: Option<String>,
}

impl VideoQuery {
    fn page(&self) -> u32 {
        self.p
            .as_deref()
            .and_then(|p| p.trim().parse::<u32>().ok())
            .filter(|p| *p > 0)
            .unwrap_or(1)
    }
}

#[derive(Debug, Deserialize)]
pub struct ShortLinkQuery {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ParseResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<LinkItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ParseResponse {
    fn ok(data: Vec<LinkItem>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortLinkResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bvid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests: Option<StatsSnapshot>,
    pub nodes: Vec<NodeSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: &'static str,
}

/// 302 跳转
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// 解析失败时的 HTML 页面
pub fn error_page(title: &str, message: &str, public_url: &str) -> Html<String> {
    let example = format!(
        "{}/?url=https://www.bilibili.com/video/BV1xx411c7mu",
        public_url.trim_end_matches('/')
    );
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="zh-CN">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
        body {{ font-family: Arial, sans-serif; background: #1a1a1a; color: #fff; text-align: center; padding: 50px; }}
        .error {{ background: #333; padding: 20px; border-radius: 8px; border: 2px solid #ff4444; }}
    </style>
</head>
<body>
    <div class="error">
        <h1>❌ {title}</h1>
        <p>{message}</p>
        <p>格式：<code>{example}</code></p>
        <a href="/" style="color: #00aef0;">返回首页</a>
    </div>
</body>
</html>"#,
        title = escape_html(title),
        message = escape_html(message),
        example = escape_html(&example),
    ))
}

/// 首页：无参数返回页面，带 `?url=` 时解析并重定向
pub async fn index_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IndexQuery>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
) -> Response {
    let Some(url) = query.url.filter(|u| !u.trim().is_empty()) else {
        return Html(HTML_TEMPLATE).into_response();
    };

    state.stats.hit();

    let ip = geoip::client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
    match ip {
        Some(ip) => info!("📥 主页面解析请求: {} (来自 {})", url, ip),
        None => info!("📥 主页面解析请求: {}", url),
    }
    if let Some(ip) = ip.filter(|_| state.geo.enabled()) {
        log_country(state.clone(), ip);
    }

    let public_url = state.config.web.public_url.as_str();
    let short_hosts = state.config.bilibili.short_link_hosts.as_slice();

    let kind = match parser::classify_with(&url, short_hosts) {
        Some(LinkKind::ShortLink { url: short }) => {
            match bilibili::resolve_short_link(&state, &short).await {
                Ok(full) => {
                    state.stats.incr(Counter::ShortLinkSuccess);
                    match parser::classify_with(&full, short_hosts) {
                        Some(LinkKind::ShortLink { .. }) | None => {
                            return error_page(
                                "解析失败",
                                "无法从解析后的 URL 中提取 BV 号",
                                public_url,
                            )
                            .into_response();
                        }
                        Some(kind) => kind,
                    }
                }
                Err(e) => {
                    state.stats.incr(Counter::ShortLinkFail);
                    warn!("❌ 短链接解析失败: {}", e);
                    return error_page("短链接解析失败", "无法解析 b23.tv 短链接，请稍后再试或使用完整链接", public_url)
                        .into_response();
                }
            }
        }
        Some(kind) => kind,
        None => {
            return error_page("解析失败", "请提供有效的 Bilibili 影片或直播链接", public_url)
                .into_response();
        }
    };

    redirect_for(&state, kind).await
}

/// 归属地查询放到后台，不拖慢重定向
fn log_country(state: Arc<AppState>, ip: IpAddr) {
    tokio::spawn(async move {
        if let Some(country) = state.geo.country(ip).await {
            info!("🌍 请求来源: {} [{}]", ip, country);
        }
    });
}

async fn redirect_for(state: &AppState, kind: LinkKind) -> Response {
    let public_url = state.config.web.public_url.as_str();

    match kind {
        LinkKind::Video { bvid, page } => {
            let qn = state.config.bilibili.redirect_qn;
            match bilibili::resolve_redirect(state, &bvid, page, qn).await {
                Ok(stream) => {
                    state.stats.incr(Counter::RedirectSuccess);
                    info!("↪️ 重定向到流地址: {}", bilibili::host_of(&stream).unwrap_or_default());
                    found(&stream)
                }
                Err(e) => {
                    state.stats.incr(Counter::RedirectFail);
                    error!("❌ 解析失败，重定向到原始页面: {:#}", e);
                    found(&bilibili::original_page(&bvid, page))
                }
            }
        }
        LinkKind::Live { room_id } => match bilibili::resolve_live_redirect(state, &room_id).await {
            Ok(stream) => {
                state.stats.incr(Counter::RedirectSuccess);
                info!("↪️ 重定向到直播流: {}", bilibili::host_of(&stream).unwrap_or_default());
                found(&stream)
            }
            Err(e) => {
                state.stats.incr(Counter::RedirectFail);
                error!("❌ 直播解析失败，重定向到直播间: {:#}", e);
                found(&live_page(&room_id))
            }
        },
        LinkKind::Bangumi { id } => {
            warn!("⚠️ 暂不支持番剧链接: {}", id);
            error_page("暂不支持", "番剧链接暂不支持解析，请使用普通影片链接", public_url).into_response()
        }
        LinkKind::ShortLink { .. } => {
            error_page("解析失败", "短链接未能解析为影片链接", public_url).into_response()
        }
    }
}

fn is_valid_bvid(bvid: &str) -> bool {
    bvid.len() > 2
        && bvid.starts_with("BV")
        && bvid.chars().all(|c| c.is_ascii_alphanumeric())
}

/// 影片解析 API
pub async fn parse_video_handler(
    State(state): State<Arc<AppState>>,
    Path(bvid): Path<String>,
    Query(query): Query<VideoQuery>,
) -> Json<ParseResponse> {
    state.stats.hit();
    state.stats.incr(Counter::Api);

    if !is_valid_bvid(&bvid) {
        warn!("❌ 无效的 BV 号: {}", bvid);
        return Json(ParseResponse::fail(format!("无效的 BV 号: {}", bvid)));
    }

    let mirror = matches!(query.mirror.as_deref(), Some("true" | "1"));
    let node = if mirror {
        let node = query
            .node
            .as_deref()
            .filter(|n| state.nodes.contains(n))
            .unwrap_or(state.config.nodes.mirror_host.as_str())
            .to_string();
        Some(node)
    } else {
        None
    };

    info!("📥 解析影片: {} (节点: {})", bvid, node.as_deref().unwrap_or("原始"));

    match bilibili::video_links(&state, &bvid, query.page(), node.as_deref()).await {
        Ok(items) => Json(ParseResponse::ok(items)),
        Err(e) => {
            error!("❌ 影片解析错误: {:#}", e);
            Json(ParseResponse::fail("获取影片信息失败"))
        }
    }
}

/// 直播解析 API
pub async fn parse_live_handler(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Json<ParseResponse> {
    state.stats.hit();
    state.stats.incr(Counter::Api);

    if room_id.is_empty() || !room_id.chars().all(|c| c.is_ascii_digit()) {
        return Json(ParseResponse::fail(format!("无效的直播间号: {}", room_id)));
    }

    info!("📥 解析直播: {}", room_id);

    match bilibili::live_links(&state, &room_id).await {
        Ok(items) => Json(ParseResponse::ok(items)),
        Err(e) => {
            error!("❌ 直播解析错误: {:#}", e);
            Json(ParseResponse::fail("获取直播信息失败"))
        }
    }
}

/// 短链接解析 API
pub async fn parse_short_link_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ShortLinkQuery>,
) -> Json<ShortLinkResponse> {
    state.stats.hit();
    state.stats.incr(Counter::Api);

    let short_hosts = state.config.bilibili.short_link_hosts.as_slice();
    let Some(LinkKind::ShortLink { url }) = parser::classify_with(&query.url, short_hosts) else {
        return Json(ShortLinkResponse {
            success: false,
            full_url: None,
            bvid: None,
            message: Some("请提供有效的 b23.tv 短链接".to_string()),
        });
    };

    match bilibili::resolve_short_link(&state, &url).await {
        Ok(full) => {
            state.stats.incr(Counter::ShortLinkSuccess);
            Json(ShortLinkResponse {
                success: true,
                bvid: bilibili::extract_bvid(&full),
                full_url: Some(full),
                message: None,
            })
        }
        Err(e) => {
            state.stats.incr(Counter::ShortLinkFail);
            warn!("❌ 短链接解析失败: {}", e);
            Json(ShortLinkResponse {
                success: false,
                full_url: None,
                bvid: None,
                message: Some(format!("无法解析 b23.tv 短链接: {}", e)),
            })
        }
    }
}

/// 计数与节点统计
pub async fn stats_handler(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        success: true,
        requests: state.stats.snapshot(),
        nodes: state.nodes.snapshot(),
    })
}

/// 健康检查端点
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION,
    })
}

/// 创建 Web 路由
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/parse/video/:bvid", get(parse_video_handler))
        .route("/api/parse/live/:room_id", get(parse_live_handler))
        .route("/api/parse/shortlink", get(parse_short_link_handler))
        .route("/api/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
