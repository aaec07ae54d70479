//! 应用状态（HTTP client + 进程内计数器）

use anyhow::{anyhow, Result};
use reqwest::{redirect, Client};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::config::Config;
use crate::geoip::GeoLocator;
use crate::nodes::NodePool;
use crate::stats::RequestStats;

pub struct AppState {
    pub config: Config,
    /// 调用 B 站接口、探测节点
    pub client: Client,
    /// 不跟随重定向，用于解析 b23.tv
    pub no_redirect_client: Client,
    pub nodes: NodePool,
    pub stats: RequestStats,
    pub geo: GeoLocator,
    /// 短链接 -> 完整链接
    pub short_links: Mutex<HashMap<String, String>>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        // 空白项会被 NodePool 丢弃，按去重后的结果判断
        let nodes = NodePool::new(config.nodes.hosts.clone());
        if nodes.hosts().is_empty() {
            return Err(anyhow!("节点列表为空，请在 config.toml 的 [nodes] hosts 中至少配置一个节点"));
        }
        if config.nodes.retry_attempts == 0 {
            return Err(anyhow!("retry_attempts 必须大于 0"));
        }

        let timeout = Duration::from_secs(config.bilibili.http_timeout_secs);

        let client = Client::builder()
            .user_agent(Config::browser_ua())
            .timeout(timeout)
            .build()?;

        let no_redirect_client = Client::builder()
            .user_agent(Config::browser_ua())
            .redirect(redirect::Policy::none())
            .timeout(timeout)
            .build()?;

        let geo = GeoLocator::new(config.geoip.clone(), client.clone());

        Ok(Self {
            config,
            client,
            no_redirect_client,
            nodes,
            stats: RequestStats::new(),
            geo,
            short_links: Mutex::new(HashMap::new()),
        })
    }
}
