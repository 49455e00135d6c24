//! 翻译系统核心模块
//!
//! ## 架构设计
//!
//! - **引擎层** (`engine.rs`, `detector.rs`): 翻译与语言检测引擎接口及实现
//! - **注册表** (`registry.rs`): 按能力懒加载引擎，保证每个能力只构建一次
//! - **准入控制** (`admission.rs`): 限制同时进行的推理数量
//! - **后处理** (`normalizer.rs`): 对齐译文的结尾标点与大小写
//! - **编排层** (`service.rs`): 组合缓存、准入、引擎与后处理
//! - **上下文** (`context.rs`): 根据配置组装上述组件
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! use translator_service::translation::config::ServiceConfig;
//! use translator_service::translation::core::ServiceContext;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let context = ServiceContext::build(ServiceConfig::default()).await?;
//! let outcome = context
//!     .translation()
//!     .translate(&["Hello.".to_string()], Some("en"), "vi")
//!     .await?;
//! println!("{:?}", outcome.results);
//! # Ok(())
//! # }
//! ```

pub mod admission;
pub mod context;
pub mod detector;
pub mod engine;
pub mod normalizer;
pub mod registry;
pub mod service;

pub use admission::{AdmissionController, AdmissionTicket};
pub use context::ServiceContext;
pub use detector::ScriptDetector;
pub use engine::{
    Detection, InferenceError, LanguageDetector, RemoteDetector, RemoteEngineConfig,
    RemoteTranslator, Translator,
};
pub use normalizer::normalize;
pub use registry::{EngineFactory, EngineRegistry};
pub use service::{
    DetectionOrchestrator, DetectionOutcome, ServiceStats, ServiceStatsSnapshot,
    TranslationOrchestrator, TranslationOutcome,
};
