//! 进程内请求计数（跨日/跨月自动清零）

use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Mutex;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// `/?url=` 重定向成功
    RedirectSuccess,
    /// 重定向回原页面
    RedirectFail,
    Api,
    ShortLinkSuccess,
    ShortLinkFail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub total: u64,
    pub today: u64,
    pub this_month: u64,
    pub redirect_success: u64,
    pub redirect_fail: u64,
    pub api_requests: u64,
    pub short_link_success: u64,
    pub short_link_fail: u64,
    pub day: NaiveDate,
}

#[derive(Debug)]
struct Inner {
    day: NaiveDate,
    total: u64,
    today: u64,
    this_month: u64,
    redirect_success: u64,
    redirect_fail: u64,
    api_requests: u64,
    short_link_success: u64,
    short_link_fail: u64,
}

impl Inner {
    fn new(day: NaiveDate) -> Self {
        Self {
            day,
            total: 0,
            today: 0,
            this_month: 0,
            redirect_success: 0,
            redirect_fail: 0,
            api_requests: 0,
            short_link_success: 0,
            short_link_fail: 0,
        }
    }

    fn roll(&mut self, now: NaiveDate) {
        if now == self.day {
            return;
        }
        if now.year() != self.day.year() || now.month() != self.day.month() {
            info!("📅 进入新的月份 {}，本月计数清零（上月 {} 次）", now.format("%Y-%m"), self.this_month);
            self.this_month = 0;
        }
        info!("📅 进入新的一天 {}，今日计数清零（昨日 {} 次）", now, self.today);
        self.today = 0;
        self.day = now;
    }
}

pub struct RequestStats {
    inner: Mutex<Inner>,
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestStats {
    pub fn new() -> Self {
        Self::starting_at(Utc::now().date_naive())
    }

    pub fn starting_at(day: NaiveDate) -> Self {
        Self {
            inner: Mutex::new(Inner::new(day)),
        }
    }

    /// 记录一次请求
    pub fn hit(&self) {
        self.hit_on(Utc::now().date_naive());
    }

    pub fn hit_on(&self, now: NaiveDate) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.roll(now);
            inner.total += 1;
            inner.today += 1;
            inner.this_month += 1;
        }
    }

    pub fn incr(&self, counter: Counter) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.roll(Utc::now().date_naive());
            match counter {
                Counter::RedirectSuccess => inner.redirect_success += 1,
                Counter::RedirectFail => inner.redirect_fail += 1,
                Counter::Api => inner.api_requests += 1,
                Counter::ShortLinkSuccess => inner.short_link_success += 1,
                Counter::ShortLinkFail => inner.short_link_fail += 1,
            }
        }
    }

    pub fn snapshot(&self) -> Option<StatsSnapshot> {
        self.snapshot_on(Utc::now().date_naive())
    }

    pub fn snapshot_on(&self, now: NaiveDate) -> Option<StatsSnapshot> {
        let mut inner = self.inner.lock().ok()?;
        inner.roll(now);
        Some(StatsSnapshot {
            total: inner.total,
            today: inner.today,
            this_month: inner.this_month,
            redirect_success: inner.redirect_success,
            redirect_fail: inner.redirect_fail,
            api_requests: inner.api_requests,
            short_link_success: inner.short_link_success,
            short_link_fail: inner.short_link_fail,
            day: inner.day,
        })
    }
}
