//! Bilibili 直链解析中转

pub mod bilibili;
pub mod config;
pub mod geoip;
pub mod nodes;
pub mod state;
pub mod stats;
pub mod web;

pub use config::Config;
pub use state::AppState;

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
