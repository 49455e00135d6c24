//! 翻译服务统一错误处理
//!
//! 提供结构化错误类型和错误处理机制。缓存层的失败在 `CacheAccessor`
//! 内部被吸收，这里的错误只描述需要向调用方传播的失败。

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// 翻译错误类型
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// 准入控制超时，服务繁忙
    #[error("服务繁忙，请稍后重试 (等待 {}ms 后仍无可用推理槽位)", .waited.as_millis())]
    Overloaded { waited: Duration },

    /// 请求的语言对或检测模型没有注册引擎
    #[error("不支持的能力: {0}")]
    UnsupportedCapability(String),

    /// 引擎构建失败
    #[error("引擎构建失败 [{capability}]: {reason}")]
    ConstructionFailed { capability: String, reason: String },

    /// 缓存不可用
    #[error("缓存不可用: {0}")]
    CacheUnavailable(String),

    /// 输入验证错误
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// 推理引擎执行失败
    #[error("推理失败: {0}")]
    InferenceError(String),

    /// 速率限制错误
    #[error("请求速率过快，请在 {retry_after_secs} 秒后重试")]
    RateLimitExceeded { retry_after_secs: u64 },

    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 超时错误
    #[error("操作超时: {0}")]
    TimeoutError(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl TranslationError {
    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::Overloaded { .. } => ErrorSeverity::Warning,
            TranslationError::UnsupportedCapability(_) => ErrorSeverity::Info,
            TranslationError::ConstructionFailed { .. } => ErrorSeverity::Critical,
            TranslationError::CacheUnavailable(_) => ErrorSeverity::Warning,
            TranslationError::InvalidInput(_) => ErrorSeverity::Info,
            TranslationError::InferenceError(_) => ErrorSeverity::Error,
            TranslationError::RateLimitExceeded { .. } => ErrorSeverity::Warning,
            TranslationError::ConfigError(_) => ErrorSeverity::Critical,
            TranslationError::TimeoutError(_) => ErrorSeverity::Warning,
            TranslationError::SerializationError(_) => ErrorSeverity::Error,
            TranslationError::InternalError(_) => ErrorSeverity::Critical,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslationError::Overloaded { .. } => ErrorCategory::Admission,
            TranslationError::UnsupportedCapability(_) => ErrorCategory::Capability,
            TranslationError::ConstructionFailed { .. } => ErrorCategory::Engine,
            TranslationError::CacheUnavailable(_) => ErrorCategory::Cache,
            TranslationError::InvalidInput(_) => ErrorCategory::Input,
            TranslationError::InferenceError(_) => ErrorCategory::Engine,
            TranslationError::RateLimitExceeded { .. } => ErrorCategory::RateLimit,
            TranslationError::ConfigError(_) => ErrorCategory::Configuration,
            TranslationError::TimeoutError(_) => ErrorCategory::Timeout,
            TranslationError::SerializationError(_) => ErrorCategory::Serialization,
            TranslationError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// 是否属于客户端请求本身的问题（对应 HTTP 4xx）
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TranslationError::UnsupportedCapability(_) | TranslationError::InvalidInput(_)
        )
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(mut self, context: T) -> Self {
        let append = |msg: &mut String| {
            msg.push_str(&format!(" (上下文: {})", context));
        };

        match &mut self {
            TranslationError::UnsupportedCapability(msg)
            | TranslationError::CacheUnavailable(msg)
            | TranslationError::InvalidInput(msg)
            | TranslationError::InferenceError(msg)
            | TranslationError::ConfigError(msg)
            | TranslationError::TimeoutError(msg)
            | TranslationError::SerializationError(msg)
            | TranslationError::InternalError(msg) => append(msg),
            TranslationError::ConstructionFailed { reason, .. } => append(reason),
            TranslationError::Overloaded { .. } | TranslationError::RateLimitExceeded { .. } => {}
        }

        self
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Admission,
    Capability,
    Engine,
    Cache,
    Input,
    RateLimit,
    Configuration,
    Timeout,
    Serialization,
    Internal,
}

impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::InternalError(format!("IO错误: {}", error))
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::SerializationError(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::ConfigError(format!("TOML解析错误: {}", error))
    }
}

impl From<tokio::time::error::Elapsed> for TranslationError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        TranslationError::TimeoutError(format!("异步操作超时: {}", error))
    }
}

impl From<tokio::task::JoinError> for TranslationError {
    fn from(error: tokio::task::JoinError) -> Self {
        if error.is_panic() {
            TranslationError::InferenceError(format!("推理任务崩溃: {}", error))
        } else {
            TranslationError::InternalError(format!("推理任务被取消: {}", error))
        }
    }
}

impl From<crate::env::EnvError> for TranslationError {
    fn from(error: crate::env::EnvError) -> Self {
        TranslationError::ConfigError(error.to_string())
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录错误
    pub fn log_error(error: &TranslationError) {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!("请求被拒绝: {}", error),
            ErrorSeverity::Warning => tracing::warn!("翻译警告: {}", error),
            ErrorSeverity::Error => tracing::error!("翻译错误: {}", error),
            ErrorSeverity::Critical => tracing::error!("翻译严重错误: {}", error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overloaded_is_warning() {
        let err = TranslationError::Overloaded {
            waited: Duration::from_secs(5),
        };
        assert_eq!(err.severity(), ErrorSeverity::Warning);
        assert_eq!(err.category(), ErrorCategory::Admission);
        assert!(err.to_string().contains("5000ms"));
    }

    #[test]
    fn test_client_errors() {
        assert!(TranslationError::InvalidInput("x".into()).is_client_error());
        assert!(TranslationError::UnsupportedCapability("en2de".into()).is_client_error());
        assert!(!TranslationError::InferenceError("boom".into()).is_client_error());
    }

    #[test]
    fn test_with_context() {
        let err = TranslationError::ConstructionFailed {
            capability: "en2vi".into(),
            reason: "模型不存在".into(),
        }
        .with_context("启动预热");
        assert!(err.to_string().contains("上下文: 启动预热"));
        assert!(err.to_string().contains("en2vi"));
    }
}
