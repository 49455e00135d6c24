//! # Translator Service
//!
//! 并发受限的翻译与语言检测服务，带有熔断保护的旁路缓存。
//!
//! ## 模块组织
//!
//! - `translation` - 翻译核心、缓存、熔断与配置
//! - `env` - 类型安全的环境变量
//! - `logging` - 日志初始化
//! - `web` - HTTP 服务（可选）

pub mod env;
pub mod logging;
pub mod translation;
#[cfg(feature = "web")]
pub mod web;

pub use translation::{TranslationError, TranslationResult};
