//! 熔断器
//!
//! 三态故障隔离：
//! - `Closed`：调用正常通过，统计连续失败次数，达到阈值后打开
//! - `Open`：在重置超时到期前直接拒绝调用，不执行操作
//! - `HalfOpen`：只放行一次试探调用，成功则关闭，失败则重新打开并重置计时
//!
//! 同一后端资源的所有调用方共享一个熔断器实例（`Arc<CircuitBreaker>`），
//! 状态变化会写入 `BreakerStorage`，支持持久化的存储可以让状态在重启后恢复。

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

use crate::translation::storage::backend::CacheBackend;

/// 熔断器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        };
        f.write_str(name)
    }
}

/// 熔断器参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout_secs: u64,
    /// 是否把状态写入缓存后端
    pub persist: bool,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout_secs: 60,
            persist: true,
        }
    }
}

impl BreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.reset_timeout_secs)
    }
}

/// 可持久化的状态快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub failures: u32,
    /// 打开时刻（Unix 毫秒）
    pub opened_at_ms: Option<u64>,
}

/// 熔断器状态存储
#[async_trait]
pub trait BreakerStorage: Send + Sync {
    async fn load(&self, name: &str) -> Option<BreakerSnapshot>;
    async fn save(&self, name: &str, snapshot: &BreakerSnapshot);
}

/// 进程内存储（重启后丢失）
#[derive(Debug, Default)]
pub struct MemoryBreakerStorage {
    snapshots: DashMap<String, BreakerSnapshot>,
}

#[async_trait]
impl BreakerStorage for MemoryBreakerStorage {
    async fn load(&self, name: &str) -> Option<BreakerSnapshot> {
        self.snapshots.get(name).map(|entry| entry.value().clone())
    }

    async fn save(&self, name: &str, snapshot: &BreakerSnapshot) {
        self.snapshots.insert(name.to_string(), snapshot.clone());
    }
}

/// 把快照以 JSON 形式保存在受保护的缓存后端中
///
/// 后端不可用时（通常正是熔断器打开的原因）写入失败只记录日志。
pub struct BackendBreakerStorage {
    backend: Arc<dyn CacheBackend>,
}

impl BackendBreakerStorage {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    fn key(name: &str) -> String {
        format!("circuit_breaker:{}", name)
    }
}

#[async_trait]
impl BreakerStorage for BackendBreakerStorage {
    async fn load(&self, name: &str) -> Option<BreakerSnapshot> {
        match self.backend.get(&Self::key(name)).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    tracing::warn!("熔断器快照解析失败 [{}]: {}", name, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::debug!("读取熔断器快照失败 [{}]: {}", name, e);
                None
            }
        }
    }

    async fn save(&self, name: &str, snapshot: &BreakerSnapshot) {
        let payload = match serde_json::to_vec(snapshot) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("熔断器快照序列化失败 [{}]: {}", name, e);
                return;
            }
        };
        if let Err(e) = self.backend.set(&Self::key(name), &payload, None).await {
            tracing::debug!("保存熔断器快照失败 [{}]: {}", name, e);
        }
    }
}

/// 熔断器调用错误
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// 熔断器打开（或半开试探进行中），操作未执行
    #[error("熔断器 {name} 已打开，拒绝调用")]
    Open { name: String },

    /// 操作本身的错误
    #[error("{0}")]
    Inner(E),
}

impl<E> BreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Permit {
    Normal,
    Trial,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    failures: u32,
    opened_at: Option<Instant>,
    opened_at_wall: Option<SystemTime>,
    trial_in_flight: bool,
}

impl Inner {
    fn snapshot(&self) -> BreakerSnapshot {
        BreakerSnapshot {
            state: self.state,
            failures: self.failures,
            opened_at_ms: self.opened_at_wall.and_then(|t| {
                t.duration_since(UNIX_EPOCH)
                    .ok()
                    .map(|d| d.as_millis() as u64)
            }),
        }
    }

    fn open(&mut self) {
        self.state = BreakerState::Open;
        self.opened_at = Some(Instant::now());
        self.opened_at_wall = Some(SystemTime::now());
        self.trial_in_flight = false;
    }
}

/// 三态熔断器
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
    storage: Option<Arc<dyn BreakerStorage>>,
}

impl CircuitBreaker {
    /// 创建处于关闭状态的熔断器
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failures: 0,
                opened_at: None,
                opened_at_wall: None,
                trial_in_flight: false,
            }),
            storage: None,
        }
    }

    /// 创建熔断器并从存储中恢复上一次保存的状态
    pub async fn restore(
        name: impl Into<String>,
        config: BreakerConfig,
        storage: Arc<dyn BreakerStorage>,
    ) -> Self {
        let mut breaker = Self::new(name, config);

        if let Some(snapshot) = storage.load(&breaker.name).await {
            let mut inner = breaker.lock();
            inner.failures = snapshot.failures;
            if snapshot.state != BreakerState::Closed {
                // 半开是瞬时状态，恢复为打开并沿用原来的打开时刻
                let opened_wall = snapshot
                    .opened_at_ms
                    .map(|ms| UNIX_EPOCH + Duration::from_millis(ms))
                    .unwrap_or_else(SystemTime::now);
                let elapsed = SystemTime::now()
                    .duration_since(opened_wall)
                    .unwrap_or_default();
                let now = Instant::now();
                inner.state = BreakerState::Open;
                inner.opened_at = Some(now.checked_sub(elapsed).unwrap_or(now));
                inner.opened_at_wall = Some(opened_wall);
            }
            drop(inner);
            tracing::info!(
                "恢复熔断器状态 [{}]: {} (失败 {} 次)",
                breaker.name,
                snapshot.state,
                snapshot.failures
            );
        }

        breaker.storage = Some(storage);
        breaker
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// 当前对外可见的状态（打开且已过重置超时视为半开）
    pub fn state(&self) -> BreakerState {
        let inner = self.lock();
        match inner.state {
            BreakerState::Open if self.reset_elapsed(&inner) => BreakerState::HalfOpen,
            state => state,
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failures
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        self.lock().snapshot()
    }

    /// 通过熔断器执行操作
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let permit = self.admit().ok_or_else(|| BreakerError::Open {
            name: self.name.clone(),
        })?;

        let mut guard = TrialGuard {
            breaker: self,
            armed: permit == Permit::Trial,
        };
        let result = operation().await;
        guard.armed = false;

        let transition = match &result {
            Ok(_) => self.on_success(permit),
            Err(e) => self.on_failure(permit, e),
        };
        if let Some(snapshot) = transition {
            self.persist(&snapshot).await;
        }

        result.map_err(BreakerError::Inner)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn reset_elapsed(&self, inner: &Inner) -> bool {
        inner
            .opened_at
            .map(|at| at.elapsed() >= self.config.reset_timeout())
            .unwrap_or(true)
    }

    fn admit(&self) -> Option<Permit> {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => Some(Permit::Normal),
            BreakerState::Open => {
                if self.reset_elapsed(&inner) {
                    inner.state = BreakerState::HalfOpen;
                    inner.trial_in_flight = true;
                    self.record_transition(BreakerState::HalfOpen);
                    tracing::info!("熔断器 [{}] 进入半开状态，放行一次试探调用", self.name);
                    Some(Permit::Trial)
                } else {
                    None
                }
            }
            BreakerState::HalfOpen => {
                if inner.trial_in_flight {
                    None
                } else {
                    inner.trial_in_flight = true;
                    Some(Permit::Trial)
                }
            }
        }
    }

    fn on_success(&self, permit: Permit) -> Option<BreakerSnapshot> {
        let mut inner = self.lock();
        match permit {
            Permit::Trial => {
                inner.state = BreakerState::Closed;
                inner.failures = 0;
                inner.opened_at = None;
                inner.opened_at_wall = None;
                inner.trial_in_flight = false;
                self.record_transition(BreakerState::Closed);
                tracing::info!("熔断器 [{}] 试探成功，恢复关闭状态", self.name);
                Some(inner.snapshot())
            }
            Permit::Normal => {
                if inner.state == BreakerState::Closed {
                    inner.failures = 0;
                }
                None
            }
        }
    }

    fn on_failure<E: fmt::Display>(&self, permit: Permit, error: &E) -> Option<BreakerSnapshot> {
        let mut inner = self.lock();
        inner.failures = inner.failures.saturating_add(1);

        match permit {
            Permit::Trial => {
                inner.open();
                self.record_transition(BreakerState::Open);
                tracing::warn!("熔断器 [{}] 试探失败，重新打开: {}", self.name, error);
                Some(inner.snapshot())
            }
            Permit::Normal => {
                if inner.state == BreakerState::Closed
                    && inner.failures >= self.config.failure_threshold
                {
                    inner.open();
                    self.record_transition(BreakerState::Open);
                    tracing::error!(
                        "熔断器 [{}] 连续失败 {} 次，进入打开状态: {}",
                        self.name,
                        inner.failures,
                        error
                    );
                    Some(inner.snapshot())
                } else {
                    None
                }
            }
        }
    }

    async fn persist(&self, snapshot: &BreakerSnapshot) {
        if let Some(storage) = &self.storage {
            storage.save(&self.name, snapshot).await;
        }
    }

    fn record_transition(&self, to: BreakerState) {
        metrics::counter!(
            "translator_breaker_transitions_total",
            "breaker" => self.name.clone(),
            "to" => to.to_string()
        )
        .increment(1);
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("failures", &self.failure_count())
            .finish()
    }
}

/// 试探调用被取消时释放试探名额
struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut inner = self.breaker.lock();
            inner.trial_in_flight = false;
            tracing::debug!("熔断器 [{}] 试探调用被取消", self.breaker.name);
        }
    }
}
