//! 存储模块
//!
//! - `backend`：字节级缓存后端（Redis / 内存）
//! - `cache`：带熔断与重试的缓存访问器
//! - `records`：翻译历史记录存储

pub mod backend;
pub mod cache;
pub mod records;

pub use backend::{BackendError, CacheBackend, MemoryBackend, RedisBackend, RedisConfig};
pub use cache::{
    parse_ttl, CacheAccessor, CacheKey, CacheLookup, CacheSettings, CacheStatsSnapshot,
    CacheValue,
};
#[cfg(feature = "mongodb")]
pub use records::MongoRecordStore;
pub use records::{MemoryRecordStore, RecordError, RecordFilter, RecordStore, TranslationRecord};
