//! 缓存后端
//!
//! `CacheBackend` 只负责字节级的读写删，重试、熔断和序列化都在
//! `CacheAccessor` 中完成。

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::{Client, FromRedisValue};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::OnceCell;

/// 后端错误
#[derive(Debug, Error, Clone)]
pub enum BackendError {
    #[error("缓存连接失败: {0}")]
    Connection(String),

    #[error("缓存操作超时 ({}ms)", .0.as_millis())]
    Timeout(Duration),

    #[error("缓存命令执行失败: {0}")]
    Command(String),
}

impl From<redis::RedisError> for BackendError {
    fn from(error: redis::RedisError) -> Self {
        if error.is_connection_refusal() || error.is_connection_dropped() || error.is_io_error() {
            BackendError::Connection(error.to_string())
        } else {
            BackendError::Command(error.to_string())
        }
    }
}

/// 字节级键值存储
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError>;

    /// `ttl` 为 `None` 时永不过期
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), BackendError>;

    /// 返回键是否存在并被删除
    async fn delete(&self, key: &str) -> Result<bool, BackendError>;

    async fn ping(&self) -> Result<(), BackendError> {
        Ok(())
    }

    /// 用于日志和统计的描述，例如 `redis://127.0.0.1:6379/0`
    fn describe(&self) -> String;
}

// ============================================================================
// 内存后端
// ============================================================================

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|at| Instant::now() >= at)
            .unwrap_or(false)
    }
}

/// 进程内缓存后端，用于开发环境、测试以及无 Redis 的部署
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: DashMap<String, MemoryEntry>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前未过期的条目数
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .map(|e| !e.is_expired())
            .unwrap_or(false)
    }

    /// 清理已过期条目
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before - self.entries.len()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), BackendError> {
        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_vec(),
                expires_at: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, BackendError> {
        Ok(self
            .entries
            .remove(key)
            .map(|(_, entry)| !entry.is_expired())
            .unwrap_or(false))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

// ============================================================================
// Redis 后端
// ============================================================================

/// Redis 连接配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub password: Option<String>,
    /// 单次连接或命令的超时
    pub timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            db: 0,
            password: None,
            timeout_ms: 1_000,
        }
    }
}

impl RedisConfig {
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => format!("redis://:{}@{}:{}/{}", password, self.host, self.port, self.db),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }

    /// 不含密码的地址，可以安全写入日志
    pub fn display_url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

/// Redis 缓存后端
///
/// 连接在首次使用时建立，启动时 Redis 不可用不会阻止服务启动。
pub struct RedisBackend {
    client: Client,
    manager: OnceCell<ConnectionManager>,
    timeout: Duration,
    display_url: String,
}

impl RedisBackend {
    pub fn new(config: &RedisConfig) -> Result<Self, BackendError> {
        let client = Client::open(config.url())?;
        Ok(Self {
            client,
            manager: OnceCell::new(),
            timeout: Duration::from_millis(config.timeout_ms),
            display_url: config.display_url(),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, BackendError> {
        let manager = self
            .manager
            .get_or_try_init(|| async {
                let manager = tokio::time::timeout(self.timeout, self.client.get_connection_manager())
                    .await
                    .map_err(|_| BackendError::Timeout(self.timeout))??;
                tracing::info!("Redis 缓存连接成功: {}", self.display_url);
                Ok::<_, BackendError>(manager)
            })
            .await?;
        Ok(manager.clone())
    }

    async fn query<T: FromRedisValue>(&self, cmd: redis::Cmd) -> Result<T, BackendError> {
        let mut conn = self.connection().await?;
        let value = tokio::time::timeout(self.timeout, cmd.query_async::<_, T>(&mut conn))
            .await
            .map_err(|_| BackendError::Timeout(self.timeout))??;
        Ok(value)
    }
}

impl fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisBackend")
            .field("url", &self.display_url)
            .field("connected", &self.manager.initialized())
            .finish()
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        self.query(cmd).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), BackendError> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl.as_millis().clamp(1, i64::MAX as u128) as u64);
        }
        self.query(cmd).await
    }

    async fn delete(&self, key: &str) -> Result<bool, BackendError> {
        let mut cmd = redis::cmd("DEL");
        cmd.arg(key);
        let removed: i64 = self.query(cmd).await?;
        Ok(removed > 0)
    }

    async fn ping(&self) -> Result<(), BackendError> {
        let _: String = self.query(redis::cmd("PING")).await?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.display_url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_basic_operations() {
        let backend = MemoryBackend::new();

        assert_eq!(backend.get("hello").await.unwrap(), None);
        backend.set("hello", "xin chào".as_bytes(), None).await.unwrap();
        assert_eq!(
            backend.get("hello").await.unwrap(),
            Some("xin chào".as_bytes().to_vec())
        );
        assert_eq!(backend.len(), 1);

        assert!(backend.delete("hello").await.unwrap());
        assert!(!backend.delete("hello").await.unwrap());
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_memory_expiration() {
        let backend = MemoryBackend::new();
        backend
            .set("short", b"value", Some(Duration::from_millis(1)))
            .await
            .unwrap();
        backend.set("forever", b"value", None).await.unwrap();

        std::thread::sleep(Duration::from_millis(10));

        assert_eq!(backend.get("short").await.unwrap(), None);
        assert!(backend.contains_key("forever"));
        assert_eq!(backend.purge_expired(), 0);
    }

    #[tokio::test]
    async fn test_memory_huge_ttl_never_expires() {
        let backend = MemoryBackend::new();
        backend
            .set("huge", b"value", Some(Duration::from_secs(u64::MAX)))
            .await
            .unwrap();

        assert_eq!(backend.get("huge").await.unwrap(), Some(b"value".to_vec()));
    }

    #[test]
    fn test_redis_url() {
        let mut config = RedisConfig::default();
        assert_eq!(config.url(), "redis://127.0.0.1:6379/0");

        config.password = Some("secret".to_string());
        assert_eq!(config.url(), "redis://:secret@127.0.0.1:6379/0");
        assert!(!config.display_url().contains("secret"));
    }

    #[test]
    fn test_redis_backend_is_lazy() {
        // 构造不会建立连接
        let backend = RedisBackend::new(&RedisConfig {
            port: 1,
            ..RedisConfig::default()
        })
        .unwrap();
        assert_eq!(backend.describe(), "redis://127.0.0.1:1/0");
    }
}
