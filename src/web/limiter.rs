//! 客户端限流
//!
//! 按客户端 IP 的滑动窗口计数器：估计值 = 上一窗口计数 × 剩余比例 + 当前窗口计数。

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use super::error::ApiError;
use super::types::AppState;
use crate::translation::error::TranslationError;

/// 超过此数量的客户端条目时清理过期窗口
const PURGE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    index: u64,
    current: usize,
    previous: usize,
}

/// 滑动窗口计数限流器
#[derive(Debug)]
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    origin: Instant,
    clients: DashMap<IpAddr, WindowCounter>,
}

impl RateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window: window.max(Duration::from_millis(1)),
            origin: Instant::now(),
            clients: DashMap::new(),
        }
    }

    /// 每分钟 `limit` 次
    pub fn per_minute(limit: usize) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }

    /// 记录一次请求；超限时返回建议的重试等待秒数
    pub fn check(&self, client: IpAddr) -> Result<(), u64> {
        self.check_at(client, Instant::now())
    }

    pub fn check_at(&self, client: IpAddr, now: Instant) -> Result<(), u64> {
        let (index, offset) = self.position(now);

        if self.clients.len() > PURGE_THRESHOLD {
            self.clients.retain(|_, counter| counter.index + 1 >= index);
        }

        let mut counter = self.clients.entry(client).or_insert(WindowCounter {
            index,
            current: 0,
            previous: 0,
        });

        if counter.index != index {
            counter.previous = if counter.index + 1 == index {
                counter.current
            } else {
                0
            };
            counter.current = 0;
            counter.index = index;
        }

        let remaining = 1.0 - offset.as_secs_f64() / self.window.as_secs_f64();
        let estimated = counter.previous as f64 * remaining + counter.current as f64;

        if estimated + 1.0 > self.limit as f64 {
            let retry_after = (self.window - offset).as_secs_f64().ceil() as u64;
            return Err(retry_after.max(1));
        }

        counter.current += 1;
        Ok(())
    }

    /// 当前窗口序号与窗口内偏移
    fn position(&self, now: Instant) -> (u64, Duration) {
        let elapsed = now.saturating_duration_since(self.origin);
        let window_ms = self.window.as_millis().max(1);
        let index = (elapsed.as_millis() / window_ms) as u64;
        let offset = Duration::from_millis((elapsed.as_millis() % window_ms) as u64);
        (index, offset)
    }
}

/// 优先使用 `X-Forwarded-For` 的第一个地址，其次是连接地址
pub fn client_ip(request: &Request) -> IpAddr {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse().ok())
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// 限流中间件
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(limiter) = state.limiter.as_ref() else {
        return next.run(request).await;
    };

    let client = client_ip(&request);
    match limiter.check(client) {
        Ok(()) => next.run(request).await,
        Err(retry_after_secs) => {
            debug!("客户端 {} 超出限流，{} 秒后重试", client, retry_after_secs);
            metrics::counter!("translator_rate_limited_total").increment(1);
            ApiError::from(TranslationError::RateLimitExceeded { retry_after_secs }).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn test_limit_within_window() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let start = limiter.origin;

        for i in 0..3 {
            assert!(limiter.check_at(ip(1), start + Duration::from_secs(i)).is_ok());
        }
        let retry = limiter
            .check_at(ip(1), start + Duration::from_secs(10))
            .unwrap_err();
        assert_eq!(retry, 50);

        // 其他客户端不受影响
        assert!(limiter.check_at(ip(2), start + Duration::from_secs(10)).is_ok());
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_previous_window_is_weighted() {
        let limiter = RateLimiter::new(4, Duration::from_secs(60));
        let start = limiter.origin;

        for _ in 0..4 {
            assert!(limiter.check_at(ip(1), start).is_ok());
        }

        // 下一窗口的前 15 秒，上一窗口仍计 3 次
        let early = start + Duration::from_secs(75);
        assert!(limiter.check_at(ip(1), early).is_ok());
        assert!(limiter.check_at(ip(1), early).is_err());

        // 下一窗口过半，上一窗口只计 2 次
        let late = start + Duration::from_secs(90);
        assert!(limiter.check_at(ip(1), late).is_ok());
        assert!(limiter.check_at(ip(1), late).is_err());
    }

    #[test]
    fn test_idle_client_resets() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let start = limiter.origin;

        assert!(limiter.check_at(ip(1), start).is_ok());
        assert!(limiter.check_at(ip(1), start).is_err());
        assert!(limiter
            .check_at(ip(1), start + Duration::from_secs(300))
            .is_ok());
    }

    #[test]
    fn test_client_ip_prefers_forwarded_header() {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(client_ip(&request), "203.0.113.7".parse::<IpAddr>().unwrap());

        let request = Request::builder()
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(client_ip(&request), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
}
