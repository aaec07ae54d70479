//! CDN 节点池：按节点记录成功/失败次数并排序

use rand::seq::SliceRandom;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::config::NodeStrategy;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NodeStats {
    pub success: u64,
    pub fail: u64,
}

impl NodeStats {
    /// 拉普拉斯平滑后的成功率，没有记录的节点为 0.5
    pub fn score(&self) -> f64 {
        (self.success as f64 + 1.0) / ((self.success + self.fail) as f64 + 2.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    pub host: String,
    pub success: u64,
    pub fail: u64,
    pub score: f64,
}

pub struct NodePool {
    hosts: Vec<String>,
    stats: Mutex<HashMap<String, NodeStats>>,
}

impl NodePool {
    pub fn new(hosts: Vec<String>) -> Self {
        let mut seen = Vec::with_capacity(hosts.len());
        for host in hosts {
            let host = host.trim().to_ascii_lowercase();
            if !host.is_empty() && !seen.contains(&host) {
                seen.push(host);
            }
        }
        Self {
            hosts: seen,
            stats: Mutex::new(HashMap::new()),
        }
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn contains(&self, host: &str) -> bool {
        self.hosts.iter().any(|h| h.eq_ignore_ascii_case(host))
    }

    pub fn record_success(&self, host: &str) {
        self.update(host, |s| s.success += 1);
    }

    pub fn record_fail(&self, host: &str) {
        self.update(host, |s| s.fail += 1);
    }

    fn update(&self, host: &str, f: impl FnOnce(&mut NodeStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            f(stats.entry(host.to_ascii_lowercase()).or_default());
        }
    }

    pub fn stats(&self, host: &str) -> NodeStats {
        self.stats
            .lock()
            .ok()
            .and_then(|s| s.get(&host.to_ascii_lowercase()).copied())
            .unwrap_or_default()
    }

    pub fn score(&self, host: &str) -> f64 {
        self.stats(host).score()
    }

    /// 按策略排好序的候选节点
    pub fn candidates(&self, strategy: NodeStrategy) -> Vec<String> {
        let mut hosts = self.hosts.clone();
        match strategy {
            NodeStrategy::Fixed => {}
            NodeStrategy::Random => hosts.shuffle(&mut rand::thread_rng()),
            NodeStrategy::Ranked => {
                let scores: HashMap<String, f64> =
                    hosts.iter().map(|h| (h.clone(), self.score(h))).collect();
                // 稳定排序，同分保持配置顺序
                hosts.sort_by(|a, b| scores[b].total_cmp(&scores[a]));
            }
        }
        hosts
    }

    pub fn best(&self, strategy: NodeStrategy) -> Option<String> {
        self.candidates(strategy).into_iter().next()
    }

    pub fn snapshot(&self) -> Vec<NodeSnapshot> {
        self.hosts
            .iter()
            .map(|host| {
                let s = self.stats(host);
                NodeSnapshot {
                    host: host.clone(),
                    success: s.success,
                    fail: s.fail,
                    score: s.score(),
                }
            })
            .collect()
    }
}
