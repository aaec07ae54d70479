use anyhow::{anyhow, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bilibili_relay::bilibili::{self, parser, redirect::live_page, LinkKind};
use bilibili_relay::{config::Config, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bilibili_relay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 用法：bilibili-relay <url> [config_path]
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        return Err(anyhow!(
            "用法: {} <bilibili_url> [config_path]",
            args.first()
                .map(|s| s.as_str())
                .unwrap_or("bilibili-relay")
        ));
    }

    let input = args[1].clone();
    let config_path = std::env::var("CONFIG_PATH")
        .ok()
        .or_else(|| args.get(2).cloned())
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path)?;
    let state = AppState::new(config)?;

    let short_hosts = state.config.bilibili.short_link_hosts.as_slice();
    let mut kind = parser::classify_with(&input, short_hosts)
        .ok_or_else(|| anyhow!("不是有效的 Bilibili 链接: {}", input))?;

    if let LinkKind::ShortLink { url } = &kind {
        let full = bilibili::resolve_short_link(&state, url).await?;
        tracing::info!("🔗 短链接 -> {}", full);
        kind = match parser::classify_with(&full, short_hosts) {
            Some(LinkKind::ShortLink { .. }) | None => {
                return Err(anyhow!("短链接未指向影片或直播: {}", full))
            }
            Some(k) => k,
        };
    }

    let target = match kind {
        LinkKind::Video { bvid, page } => {
            let qn = state.config.bilibili.redirect_qn;
            match bilibili::resolve_redirect(&state, &bvid, page, qn).await {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!("❌ {:#}", e);
                    bilibili::original_page(&bvid, page)
                }
            }
        }
        LinkKind::Live { room_id } => match bilibili::resolve_live_redirect(&state, &room_id).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("❌ {:#}", e);
                live_page(&room_id)
            }
        },
        LinkKind::Bangumi { id } => return Err(anyhow!("暂不支持番剧链接: {}", id)),
        LinkKind::ShortLink { url } => return Err(anyhow!("短链接未能解析: {}", url)),
    };

    println!("{}", target);
    Ok(())
}
