//! 翻译缓存访问层
//!
//! cache-aside 模式下的键值访问。每个操作都以 `熔断器(重试(操作))` 的方式执行，
//! 熔断器打开时直接跳过重试。所有操作都不向调用方抛出错误：
//! 写入和删除返回是否成功，读取区分命中、未命中和不可用。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::env::parse_duration;
use crate::translation::resilience::{BreakerError, CircuitBreaker, RetryPolicy};
use crate::translation::storage::backend::{BackendError, CacheBackend};

// ============================================================================
// 核心类型
// ============================================================================

/// 缓存键，格式为 `namespace:contentHash`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// 由命名空间和输入文本生成键，文本先去除首尾空白再计算 BLAKE3 摘要
    pub fn new(namespace: &str, text: &str) -> Self {
        let digest = blake3::hash(text.trim().as_bytes());
        Self(format!("{}:{}", namespace, digest.to_hex()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 缓存值
///
/// 文本按原样以 UTF-8 存储；结构化值（JSON 对象或数组）以 JSON 文本存储。
/// 读取时只有 JSON 对象或数组会被还原为 `Json`，其余 UTF-8 内容都作为 `Text` 原样返回。
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Text(String),
    Json(serde_json::Value),
    Bytes(Vec<u8>),
}

impl CacheValue {
    fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            CacheValue::Text(text) => Ok(text.as_bytes().to_vec()),
            CacheValue::Json(value) => serde_json::to_vec(value),
            CacheValue::Bytes(bytes) => Ok(bytes.clone()),
        }
    }

    fn decode(bytes: Vec<u8>) -> Self {
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => return CacheValue::Bytes(e.into_bytes()),
        };

        let trimmed = text.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) {
                return CacheValue::Json(value);
            }
        }
        CacheValue::Text(text)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CacheValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<String> for CacheValue {
    fn from(text: String) -> Self {
        CacheValue::Text(text)
    }
}

impl From<&str> for CacheValue {
    fn from(text: &str) -> Self {
        CacheValue::Text(text.to_string())
    }
}

impl From<serde_json::Value> for CacheValue {
    fn from(value: serde_json::Value) -> Self {
        CacheValue::Json(value)
    }
}

/// 读取结果
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<T> {
    Hit(T),
    Miss,
    /// 后端故障或熔断器打开
    Unavailable,
}

impl<T> CacheLookup<T> {
    pub fn hit(self) -> Option<T> {
        match self {
            CacheLookup::Hit(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }
}

/// 缓存配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// `redis` 或 `memory`
    pub backend: String,
    /// 默认 TTL，时长字符串；非正数或无法解析表示永不过期
    pub ttl: String,
    pub redis: crate::translation::storage::backend::RedisConfig,
    pub retry: crate::translation::resilience::RetryConfig,
    pub breaker: crate::translation::resilience::BreakerConfig,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: "redis".to_string(),
            ttl: "1h".to_string(),
            redis: Default::default(),
            retry: Default::default(),
            breaker: Default::default(),
        }
    }
}

impl CacheSettings {
    pub fn default_ttl(&self) -> Option<Duration> {
        parse_ttl(&self.ttl)
    }
}

/// 解析默认 TTL，非正数或无法解析时返回 `None`（永不过期）
pub fn parse_ttl(spec: &str) -> Option<Duration> {
    match parse_duration(spec) {
        Ok(ttl) if !ttl.is_zero() => Some(ttl),
        Ok(_) => None,
        Err(e) => {
            if !spec.trim().starts_with('-') {
                tracing::warn!("无法解析缓存TTL '{}'，条目将不会过期: {}", spec, e);
            }
            None
        }
    }
}

/// 缓存统计信息
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub failures: AtomicU64,
    pub writes: AtomicU64,
    pub write_failures: AtomicU64,
}

/// 统计快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub failures: u64,
    pub writes: u64,
    pub write_failures: u64,
    pub hit_rate: f64,
}

impl CacheStats {
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let failures = self.failures.load(Ordering::Relaxed);
        let lookups = hits + misses + failures;

        CacheStatsSnapshot {
            hits,
            misses,
            failures,
            writes: self.writes.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
        }
    }
}

// ============================================================================
// 缓存访问器
// ============================================================================

/// 带熔断与重试的缓存访问器
pub struct CacheAccessor {
    backend: Arc<dyn CacheBackend>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    default_ttl: Option<Duration>,
    stats: CacheStats,
}

impl CacheAccessor {
    pub fn new(
        backend: Arc<dyn CacheBackend>,
        breaker: Arc<CircuitBreaker>,
        retry: RetryPolicy,
        default_ttl: Option<Duration>,
    ) -> Self {
        Self {
            backend,
            breaker,
            retry,
            default_ttl: default_ttl.filter(|ttl| !ttl.is_zero()),
            stats: CacheStats::default(),
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn backend_name(&self) -> String {
        self.backend.describe()
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    /// 写入缓存，`ttl` 省略时使用默认 TTL
    pub async fn set(&self, key: &str, value: impl Into<CacheValue>, ttl: Option<Duration>) -> bool {
        let value = value.into();
        let payload = match value.encode() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("缓存值序列化失败 key={}: {}", key, e);
                self.stats.write_failures.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        };
        let ttl = ttl.filter(|ttl| !ttl.is_zero()).or(self.default_ttl);
        let payload = payload.as_slice();

        let result = self
            .guarded(|| async move { self.backend.set(key, payload, ttl).await })
            .await;

        match result {
            Ok(()) => {
                self.stats.writes.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                self.stats.write_failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!("缓存写入失败 key={}: {}", key, e);
                false
            }
        }
    }

    /// 读取缓存，尝试还原结构化值，失败时返回原始内容
    pub async fn get(&self, key: &str) -> CacheLookup<CacheValue> {
        match self.fetch(key).await {
            CacheLookup::Hit(bytes) => CacheLookup::Hit(CacheValue::decode(bytes)),
            CacheLookup::Miss => CacheLookup::Miss,
            CacheLookup::Unavailable => CacheLookup::Unavailable,
        }
    }

    /// 以文本形式读取，不尝试 JSON 解码
    pub async fn get_text(&self, key: &str) -> CacheLookup<String> {
        match self.fetch(key).await {
            CacheLookup::Hit(bytes) => match String::from_utf8(bytes) {
                Ok(text) => CacheLookup::Hit(text),
                Err(e) => {
                    tracing::warn!("缓存内容不是有效的UTF-8，按未命中处理 key={}: {}", key, e);
                    CacheLookup::Miss
                }
            },
            CacheLookup::Miss => CacheLookup::Miss,
            CacheLookup::Unavailable => CacheLookup::Unavailable,
        }
    }

    /// 读取并反序列化为指定类型，解码失败按未命中处理
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> CacheLookup<T> {
        match self.fetch(key).await {
            CacheLookup::Hit(bytes) => match serde_json::from_slice(&bytes) {
                Ok(value) => CacheLookup::Hit(value),
                Err(e) => {
                    tracing::warn!("缓存内容无法解码，按未命中处理 key={}: {}", key, e);
                    CacheLookup::Miss
                }
            },
            CacheLookup::Miss => CacheLookup::Miss,
            CacheLookup::Unavailable => CacheLookup::Unavailable,
        }
    }

    /// 写入可序列化的结构化值
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> bool {
        match serde_json::to_value(value) {
            Ok(value) => self.set(key, CacheValue::Json(value), ttl).await,
            Err(e) => {
                tracing::error!("缓存值序列化失败 key={}: {}", key, e);
                self.stats.write_failures.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub async fn delete(&self, key: &str) -> bool {
        let result = self
            .guarded(|| async move { self.backend.delete(key).await })
            .await;

        match result {
            Ok(existed) => {
                tracing::debug!("删除缓存 key={} existed={}", key, existed);
                true
            }
            Err(e) => {
                tracing::error!("缓存删除失败 key={}: {}", key, e);
                false
            }
        }
    }

    async fn fetch(&self, key: &str) -> CacheLookup<Vec<u8>> {
        let result = self
            .guarded(|| async move { self.backend.get(key).await })
            .await;

        match result {
            Ok(Some(bytes)) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("translator_cache_lookups_total", "result" => "hit").increment(1);
                tracing::debug!("缓存命中 key={}", key);
                CacheLookup::Hit(bytes)
            }
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("translator_cache_lookups_total", "result" => "miss").increment(1);
                tracing::debug!("缓存未命中 key={}", key);
                CacheLookup::Miss
            }
            Err(e) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("translator_cache_lookups_total", "result" => "failure").increment(1);
                tracing::error!("缓存读取失败 key={}: {}", key, e);
                CacheLookup::Unavailable
            }
        }
    }

    async fn guarded<F, Fut, T>(&self, operation: F) -> Result<T, BreakerError<BackendError>>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, BackendError>>,
    {
        self.breaker
            .call(|| self.retry.execute(operation))
            .await
    }
}

impl std::fmt::Debug for CacheAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheAccessor")
            .field("backend", &self.backend.describe())
            .field("breaker", &self.breaker)
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}
