//! 翻译模块
//!
//! 提供完整的翻译功能，采用清晰的模块化架构：
//! - **core**: 引擎、注册表、准入控制与编排
//! - **resilience**: 熔断与重试
//! - **storage**: 缓存和历史记录存储
//! - **languages**: 语言目录与翻译方向
//! - **config**: 配置管理
//! - **error**: 错误处理

// ============================================================================
// 子模块声明
// ============================================================================

/// 配置管理模块
pub mod config;

/// 核心翻译模块
pub mod core;

/// 错误处理模块
pub mod error;

/// 语言目录
pub mod languages;

/// 熔断与重试
pub mod resilience;

/// 存储管理模块
pub mod storage;

// ============================================================================
// 公共API导出
// ============================================================================

pub use config::{ConfigManager, ServiceConfig};
pub use core::{
    normalize, AdmissionController, DetectionOrchestrator, DetectionOutcome, EngineRegistry,
    LanguageDetector, ServiceContext, TranslationOrchestrator, TranslationOutcome, Translator,
};
pub use error::{TranslationError, TranslationResult};
pub use languages::{CapabilityKey, LanguageCatalog, LanguagePair, PairModel};
pub use resilience::{CircuitBreaker, RetryPolicy};
pub use storage::{CacheAccessor, CacheBackend, CacheKey, CacheLookup, CacheValue};
