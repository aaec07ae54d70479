//! 客户端 IP 归属地（仅用于日志）

use axum::http::HeaderMap;
use reqwest::Client;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, SocketAddr};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::GeoIpConfig;

const LAN: &str = "LAN";
const UNKNOWN: &str = "Unknown";

pub struct GeoLocator {
    config: GeoIpConfig,
    client: Client,
    cache: Mutex<GeoCache>,
}

/// 按写入顺序淘汰的定长缓存
#[derive(Default)]
struct GeoCache {
    entries: HashMap<IpAddr, String>,
    order: VecDeque<IpAddr>,
}

impl GeoCache {
    fn get(&self, ip: &IpAddr) -> Option<String> {
        self.entries.get(ip).cloned()
    }

    fn insert(&mut self, ip: IpAddr, country: String, capacity: usize) {
        if capacity == 0 {
            return;
        }
        if self.entries.insert(ip, country).is_none() {
            self.order.push_back(ip);
        }
        while self.order.len() > capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    #[serde(default)]
    status: String,
    #[serde(rename = "countryCode", default)]
    country_code: String,
}

impl GeoLocator {
    pub fn new(config: GeoIpConfig, client: Client) -> Self {
        Self {
            config,
            client,
            cache: Mutex::new(GeoCache::default()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// 查询国家代码；未启用时返回 None，查询失败记为 Unknown
    pub async fn country(&self, ip: IpAddr) -> Option<String> {
        if !self.config.enabled {
            return None;
        }
        if is_local(&ip) {
            return Some(LAN.to_string());
        }
        if let Some(hit) = self.cache.lock().ok().and_then(|c| c.get(&ip)) {
            return Some(hit);
        }

        let country = match self.lookup(ip).await {
            Ok(code) => code,
            Err(e) => {
                warn!("⚠️ IP 归属地查询失败 {}: {}", ip, e);
                UNKNOWN.to_string()
            }
        };

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(ip, country.clone(), self.config.cache_capacity);
        }
        Some(country)
    }

    /// 当前缓存条目数
    pub fn cached(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    async fn lookup(&self, ip: IpAddr) -> anyhow::Result<String> {
        let url = self.config.endpoint.replace("{ip}", &ip.to_string());
        debug!("🌍 查询 IP 归属地: {}", url);

        let res: GeoResponse = self
            .client
            .get(&url)
            .timeout(Duration::from_millis(self.config.timeout_ms))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if res.status == "success" && !res.country_code.is_empty() {
            Ok(res.country_code)
        } else {
            Ok(UNKNOWN.to_string())
        }
    }
}

fn is_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_local(&IpAddr::V4(v4));
            }
            let seg0 = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 唯一本地地址、fe80::/10 链路本地
                || (seg0 & 0xfe00) == 0xfc00
                || (seg0 & 0xffc0) == 0xfe80
        }
    }
}

/// 取客户端 IP：X-Forwarded-For 第一个 > X-Real-IP > 连接地址
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse::<IpAddr>().ok());
    if forwarded.is_some() {
        return forwarded;
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<IpAddr>().ok());
    if real_ip.is_some() {
        return real_ip;
    }

    peer.map(|p| p.ip())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_priority() {
        let peer: SocketAddr = "10.0.0.1:5555".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(peer)), Some(peer.ip()));

        headers.insert("x-real-ip", HeaderValue::from_static("8.8.4.4"));
        assert_eq!(client_ip(&headers, Some(peer)), "8.8.4.4".parse().ok());

        headers.insert("x-forwarded-for", HeaderValue::from_static("1.1.1.1, 10.0.0.2"));
        assert_eq!(client_ip(&headers, Some(peer)), "1.1.1.1".parse().ok());

        headers.insert("x-forwarded-for", HeaderValue::from_static("garbage"));
        assert_eq!(client_ip(&headers, None), "8.8.4.4".parse().ok());
    }

    #[test]
    fn test_is_local() {
        for ip in ["127.0.0.1", "192.168.0.10", "10.1.2.3", "169.254.1.1", "::1", "fd00::1", "fe80::1", "::ffff:192.168.1.1"] {
            assert!(is_local(&ip.parse().unwrap()), "{} should be local", ip);
        }
        for ip in ["8.8.8.8", "2001:4860:4860::8888"] {
            assert!(!is_local(&ip.parse().unwrap()), "{} should be public", ip);
        }
    }

    #[tokio::test]
    async fn test_disabled_and_lan() {
        let locator = GeoLocator::new(GeoIpConfig::default(), Client::new());
        assert_eq!(locator.country("8.8.8.8".parse().unwrap()).await, None);

        let locator = GeoLocator::new(
            GeoIpConfig {
                enabled: true,
                endpoint: "http://127.0.0.1:9/{ip}".to_string(),
                ..GeoIpConfig::default()
            },
            Client::new(),
        );
        assert_eq!(
            locator.country("192.168.0.10".parse().unwrap()).await.as_deref(),
            Some("LAN")
        );
    }

    #[test]
    fn test_cache_evicts_oldest() {
        let mut cache = GeoCache::default();
        let a: IpAddr = "203.0.113.1".parse().unwrap();
        let b: IpAddr = "203.0.113.2".parse().unwrap();
        let c: IpAddr = "203.0.113.3".parse().unwrap();

        cache.insert(a, "JP".to_string(), 2);
        cache.insert(b, "US".to_string(), 2);
        // 重复写入不改变顺序
        cache.insert(a, "JP".to_string(), 2);
        cache.insert(c, "DE".to_string(), 2);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&a), None);
        assert_eq!(cache.get(&b).as_deref(), Some("US"));
        assert_eq!(cache.get(&c).as_deref(), Some("DE"));

        cache.insert(a, "JP".to_string(), 0);
        assert_eq!(cache.get(&a), None);
    }
}
