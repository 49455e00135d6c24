//! 推理准入控制
//!
//! 用计数信号量限制同时进行的推理数量。等待超过时限的请求以
//! [`TranslationError::Overloaded`] 失败，而不是无限排队。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use crate::translation::error::{TranslationError, TranslationResult};

/// 推理槽位凭证，丢弃时自动归还槽位
#[derive(Debug)]
pub struct AdmissionTicket {
    _permit: OwnedSemaphorePermit,
    admitted_at: Instant,
}

impl AdmissionTicket {
    /// 持有槽位的时长
    pub fn held_for(&self) -> Duration {
        self.admitted_at.elapsed()
    }
}

/// 有界并发的准入控制器
#[derive(Debug, Clone)]
pub struct AdmissionController {
    name: String,
    capacity: usize,
    timeout: Duration,
    semaphore: Arc<Semaphore>,
}

impl AdmissionController {
    pub fn new(name: impl Into<String>, capacity: usize, timeout: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            name: name.into(),
            capacity,
            timeout,
            semaphore: Arc::new(Semaphore::new(capacity)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 当前空闲槽位数
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// 在默认时限内申请槽位
    pub async fn acquire(&self) -> TranslationResult<AdmissionTicket> {
        self.acquire_timeout(self.timeout).await
    }

    /// 在指定时限内申请槽位
    pub async fn acquire_timeout(&self, timeout: Duration) -> TranslationResult<AdmissionTicket> {
        let started = Instant::now();
        match tokio::time::timeout(timeout, self.semaphore.clone().acquire_owned()).await {
            Ok(Ok(permit)) => {
                debug!(
                    "[{}] 获得推理槽位, 等待 {:?}, 剩余 {}",
                    self.name,
                    started.elapsed(),
                    self.available()
                );
                Ok(AdmissionTicket {
                    _permit: permit,
                    admitted_at: Instant::now(),
                })
            }
            Ok(Err(_closed)) => Err(TranslationError::InternalError(format!(
                "[{}] 准入信号量已关闭",
                self.name
            ))),
            Err(_elapsed) => {
                warn!("[{}] 等待推理槽位超时 ({:?})", self.name, timeout);
                metrics::counter!("translator_admission_rejections_total", "controller" => self.name.clone())
                    .increment(1);
                Err(TranslationError::Overloaded { waited: timeout })
            }
        }
    }

    /// 显式归还槽位
    pub fn release(&self, ticket: AdmissionTicket) {
        debug!("[{}] 归还推理槽位, 占用 {:?}", self.name, ticket.held_for());
        drop(ticket);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_capacity_is_enforced() {
        let controller = AdmissionController::new("测试", 2, Duration::from_millis(20));
        let first = controller.acquire().await.unwrap();
        let _second = controller.acquire().await.unwrap();
        assert_eq!(controller.available(), 0);

        let err = controller.acquire().await.unwrap_err();
        assert!(matches!(err, TranslationError::Overloaded { waited } if waited == Duration::from_millis(20)));

        controller.release(first);
        assert_eq!(controller.available(), 1);
        assert!(controller.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_ticket_drop_releases_slot() {
        let controller = AdmissionController::new("测试", 1, Duration::from_millis(10));
        {
            let _ticket = controller.acquire().await.unwrap();
            assert_eq!(controller.available(), 0);
        }
        assert_eq!(controller.available(), 1);
    }

    #[tokio::test]
    async fn test_waiter_admitted_when_slot_frees() {
        let controller = AdmissionController::new("测试", 1, Duration::from_secs(5));
        let ticket = controller.acquire().await.unwrap();

        let waiter = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.acquire().await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(ticket);

        assert!(waiter.await.unwrap().is_ok());
        assert_eq!(controller.available(), 1);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let controller = AdmissionController::new("测试", 0, Duration::from_secs(1));
        assert_eq!(controller.capacity(), 1);
    }
}
