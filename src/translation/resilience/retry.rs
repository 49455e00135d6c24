//! 指数退避重试策略

use std::fmt;
use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use serde::{Deserialize, Serialize};

/// 重试参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// 总尝试次数（包含首次调用）
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub multiplier: f32,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            multiplier: 2.0,
            max_delay_ms: 4_000,
        }
    }
}

/// 有界指数退避重试
///
/// 每次重试前以 `warn` 级别记录服务名与错误；所有尝试失败后返回最后一次的错误。
/// 不区分错误类型，任何错误都会重试。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    service: String,
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(service: impl Into<String>, config: RetryConfig) -> Self {
        Self {
            service: service.into(),
            config,
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(self.config.base_delay_ms))
            .with_max_delay(Duration::from_millis(self.config.max_delay_ms))
            .with_factor(self.config.multiplier)
            .with_max_times(self.config.max_attempts.saturating_sub(1))
    }

    /// 执行操作，失败时按退避策略重试
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let service = self.service.as_str();

        operation
            .retry(self.backoff())
            .notify(|err: &E, delay: Duration| {
                tracing::warn!(
                    service = service,
                    delay_ms = delay.as_millis() as u64,
                    "{} 调用失败，{}ms 后重试: {}",
                    service,
                    delay.as_millis(),
                    err
                );
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy(attempts: usize) -> RetryPolicy {
        RetryPolicy::new(
            "test",
            RetryConfig {
                max_attempts: attempts,
                base_delay_ms: 1,
                multiplier: 2.0,
                max_delay_ms: 4,
            },
        )
    }

    #[tokio::test]
    async fn test_success_does_not_retry() {
        let calls = &AtomicUsize::new(0);
        let result: Result<u32, String> = fast_policy(3)
            .execute(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            })
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let calls = &AtomicUsize::new(0);
        let result: Result<&str, String> = fast_policy(3)
            .execute(move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err("连接被重置".to_string())
                } else {
                    Ok("ok")
                }
            })
            .await;

        assert_eq!(result, Ok("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_returns_last_error_after_exhaustion() {
        let calls = &AtomicUsize::new(0);
        let result: Result<(), String> = fast_policy(3)
            .execute(move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(format!("失败 #{}", n))
            })
            .await;

        assert_eq!(result, Err("失败 #2".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_single_attempt_policy() {
        let calls = &AtomicUsize::new(0);
        let result: Result<(), String> = fast_policy(1)
            .execute(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("down".to_string())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay_ms, 500);
        assert_eq!(config.max_delay_ms, 4_000);
    }
}
