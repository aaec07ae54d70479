//! Bilibili 解析模块

pub mod api;
pub mod links;
pub mod parser;
pub mod redirect;
pub mod rewrite;
pub mod shortlink;
pub mod types;

// 导出常用函数
pub use api::{get_live_info, get_live_play_url, get_play_url, get_play_url_any, get_video_info};
pub use links::{live_links, video_links};
pub use parser::{classify, classify_with, extract_bvid, is_valid_bilibili_url};
pub use redirect::{original_page, resolve_live_redirect, resolve_redirect};
pub use rewrite::{host_of, is_rewritable, rewrite_host};
pub use shortlink::resolve_short_link;
pub use types::{LinkItem, LinkItemKind, LinkKind, PlayUrlData, VideoInfo};
