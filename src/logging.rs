//! 日志初始化
//!
//! `RUST_LOG` 优先于配置中的日志级别。

use tracing_subscriber::{fmt, EnvFilter};

use crate::translation::error::{TranslationError, TranslationResult};

/// 初始化全局 tracing 订阅器
///
/// `format` 取值 `pretty`、`compact`、`json`，未知值按 `pretty` 处理。
/// 重复调用会返回错误。
pub fn init_tracing(level: &str, format: &str) -> TranslationResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{level},tower_http=info,hyper=warn,redis=warn,mongodb=warn",
            level = level
        ))
    });

    let result = match format {
        "json" => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init(),
        "compact" => fmt()
            .compact()
            .with_env_filter(filter)
            .with_target(false)
            .try_init(),
        _ => fmt().with_env_filter(filter).with_target(false).try_init(),
    };

    result.map_err(|e| TranslationError::InternalError(format!("日志初始化失败: {}", e)))
}
