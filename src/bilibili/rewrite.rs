//! CDN 节点改写
//!
//! 只替换 URL 中的主机（含端口），路径和签名参数保持原样。

use regex::Regex;
use std::sync::OnceLock;

/// 可改写的 CDN 主机：upos-*.bilivideo.com / upos-*.akamaized.net / cn-*.bilivideo.com / *.bilivideo.cn
///
/// mcdn / PCDN 的 IP 端口节点路径格式不同，不能改写。
fn cdn_host_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(https?://)((?:upos-[a-z0-9-]+\.(?:bilivideo\.com|akamaized\.net))|(?:cn-[a-z0-9-]+\.bilivideo\.com)|(?:[a-z0-9-]+\.bilivideo\.cn))(:\d+)?(/|$)",
        )
        .unwrap()
    })
}

fn authority_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^https?://([^/:?#]+)").unwrap())
}

pub fn is_rewritable(url: &str) -> bool {
    cdn_host_re().is_match(url)
}

/// 把 URL 的主机替换成 `target`，不可改写时原样返回
pub fn rewrite_host(url: &str, target: &str) -> String {
    if !is_rewritable(url) {
        return url.to_string();
    }
    cdn_host_re()
        .replace(url, |caps: &regex::Captures| {
            format!("{}{}{}", &caps[1], target, &caps[4])
        })
        .into_owned()
}

pub fn host_of(url: &str) -> Option<String> {
    authority_re()
        .captures(url)
        .map(|c| c[1].to_ascii_lowercase())
}
