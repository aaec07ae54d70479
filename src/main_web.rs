//! Web 服务器入口点

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bilibili_relay::{config::Config, web, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bilibili_relay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🚀 Bilibili 解析服务器启动中...");

    // 加载配置（支持环境变量 CONFIG_PATH 或命令行参数）
    let config_path = std::env::var("CONFIG_PATH")
        .ok()
        .or_else(|| std::env::args().nth(1))
        .unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load(&config_path)?;
    if std::path::Path::new(&config_path).exists() {
        tracing::info!("✅ 配置加载完成: {}", config_path);
    } else {
        tracing::info!("✅ 未找到 {}，使用默认配置和环境变量", config_path);
    }

    tracing::info!(
        "🛰️ 节点策略: {:?}，共 {} 个节点，重试 {} 次",
        config.nodes.strategy,
        config.nodes.hosts.len(),
        config.nodes.retry_attempts
    );
    if config.geoip.enabled {
        tracing::info!("🌍 已启用 IP 归属地日志");
    }

    let port = config.web.port;
    let public_url = config.web.public_url.clone();

    // 初始化应用状态
    let state = Arc::new(AppState::new(config)?);
    tracing::info!("✅ HTTP Client 初始化完成");

    let app = web::create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    tracing::info!("🌐 Web 服务器启动在: http://{}", addr);
    tracing::info!("📍 本地地址: http://localhost:{}", port);
    tracing::info!("💡 使用方式: {}/?url=BILIBILI_URL", public_url.trim_end_matches('/'));
    tracing::info!("💚 健康检查: http://localhost:{}/health", port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
