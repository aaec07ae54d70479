//! 配置文件加载

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub bilibili: BilibiliConfig,
    #[serde(default)]
    pub nodes: NodesConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub geoip: GeoIpConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BilibiliConfig {
    /// 影片接口地址（测试时可指向 mock 服务）
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_live_api_base")]
    pub live_api_base: String,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// `/?url=` 重定向时请求的清晰度
    #[serde(default = "default_redirect_qn")]
    pub redirect_qn: u32,
    /// 视为短链接的域名
    #[serde(default = "default_short_link_hosts")]
    pub short_link_hosts: Vec<String>,
}

impl Default for BilibiliConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            live_api_base: default_live_api_base(),
            http_timeout_secs: default_http_timeout_secs(),
            redirect_qn: default_redirect_qn(),
            short_link_hosts: default_short_link_hosts(),
        }
    }
}

/// 节点选择策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStrategy {
    /// 按成功率排序
    #[default]
    Ranked,
    Random,
    /// 按配置顺序
    Fixed,
}

impl std::str::FromStr for NodeStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ranked" => Ok(Self::Ranked),
            "random" => Ok(Self::Random),
            "fixed" => Ok(Self::Fixed),
            other => Err(anyhow::anyhow!("未知的节点策略: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodesConfig {
    #[serde(default = "default_hosts")]
    pub hosts: Vec<String>,
    /// `mirror=true` 时使用的固定节点
    #[serde(default = "default_mirror_host")]
    pub mirror_host: String,
    #[serde(default)]
    pub strategy: NodeStrategy,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// 改写后是否先用 Range 请求探测节点
    #[serde(default = "default_true")]
    pub probe: bool,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

impl Default for NodesConfig {
    fn default() -> Self {
        Self {
            hosts: default_hosts(),
            mirror_host: default_mirror_host(),
            strategy: NodeStrategy::default(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            probe: true,
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// 错误页中展示用法时使用的对外地址
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            public_url: default_public_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeoIpConfig {
    #[serde(default)]
    pub enabled: bool,
    /// `{ip}` 会被替换成客户端 IP
    #[serde(default = "default_geoip_endpoint")]
    pub endpoint: String,
    /// 单次查询超时，与接口超时分开
    #[serde(default = "default_geoip_timeout_ms")]
    pub timeout_ms: u64,
    /// 缓存条目上限，超出后淘汰最早写入的
    #[serde(default = "default_geoip_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for GeoIpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_geoip_endpoint(),
            timeout_ms: default_geoip_timeout_ms(),
            cache_capacity: default_geoip_cache_capacity(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.bilibili.com".to_string()
}

fn default_live_api_base() -> String {
    "https://api.live.bilibili.com".to_string()
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_redirect_qn() -> u32 {
    64
}

fn default_short_link_hosts() -> Vec<String> {
    vec!["b23.tv".to_string()]
}

fn default_hosts() -> Vec<String> {
    [
        "upos-sz-mirror08c.bilivideo.com",
        "upos-sz-mirrorali.bilivideo.com",
        "upos-sz-mirrorcos.bilivideo.com",
        "upos-sz-mirrorhw.bilivideo.com",
        "upos-sz-mirrorcosov.bilivideo.com",
        "upos-hz-mirrorakam.akamaized.net",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_mirror_host() -> String {
    "upos-sz-mirror08c.bilivideo.com".to_string()
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

fn default_probe_timeout_secs() -> u64 {
    5
}

fn default_port() -> u16 {
    3000
}

fn default_public_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_geoip_endpoint() -> String {
    "http://ip-api.com/json/{ip}?fields=status,countryCode".to_string()
}

fn default_geoip_timeout_ms() -> u64 {
    1500
}

fn default_geoip_cache_capacity() -> usize {
    4096
}

impl Config {
    /// 读取配置文件；文件不存在时使用默认值，最后叠加环境变量
    pub fn load(path: &str) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            let content =
                fs::read_to_string(path).with_context(|| format!("读取配置文件失败: {}", path))?;
            Self::from_toml(&content)?
        } else {
            Config::default()
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("解析配置文件失败")?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("BILIBILI_API_BASE") {
            self.bilibili.api_base = v;
        }
        if let Ok(v) = std::env::var("BILIBILI_LIVE_API_BASE") {
            self.bilibili.live_api_base = v;
        }
        if let Some(qn) = std::env::var("REDIRECT_QN").ok().and_then(|s| s.parse().ok()) {
            self.bilibili.redirect_qn = qn;
        }
        if let Ok(v) = std::env::var("MIRROR_HOST") {
            self.nodes.mirror_host = v;
        }
        if let Some(strategy) = std::env::var("NODE_STRATEGY")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.nodes.strategy = strategy;
        }
        if let Some(port) = std::env::var("PORT").ok().and_then(|s| s.parse().ok()) {
            self.web.port = port;
        }
        if let Ok(v) = std::env::var("PUBLIC_URL") {
            self.web.public_url = v;
        }
        if let Ok(v) = std::env::var("GEOIP_ENABLED") {
            self.geoip.enabled = matches!(v.as_str(), "1" | "true" | "yes");
        }
    }

    pub fn browser_ua() -> &'static str {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
    }

    pub fn referer() -> &'static str {
        "https://www.bilibili.com/"
    }

    pub fn live_referer() -> &'static str {
        "https://live.bilibili.com/"
    }
}
