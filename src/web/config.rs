//! Web 服务器配置
//!
//! 从 `ServiceConfig` 派生监听地址、路由前缀和限流参数

use crate::translation::config::{RateLimitConfig, ServiceConfig};
use crate::translation::error::{TranslationError, TranslationResult};

/// Web 服务器配置
#[derive(Debug, Clone, PartialEq)]
pub struct WebConfig {
    /// 绑定地址
    pub bind_addr: String,
    /// 端口
    pub port: u16,
    /// 路由前缀，例如 `/api/v0`
    pub prefix: String,
    pub rate_limit: RateLimitConfig,
}

impl WebConfig {
    pub fn from_service_config(config: &ServiceConfig) -> Self {
        Self {
            bind_addr: config.api.host.clone(),
            port: config.api.port,
            prefix: config.api.prefix(),
            rate_limit: config.rate_limit.clone(),
        }
    }

    /// 监听地址
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.bind_addr.is_empty() {
            return Err(TranslationError::ConfigError("绑定地址不能为空".to_string()));
        }

        if !self.prefix.starts_with('/') || self.prefix.ends_with('/') {
            return Err(TranslationError::ConfigError(format!(
                "路由前缀必须以 '/' 开头且不以 '/' 结尾: '{}'",
                self.prefix
            )));
        }

        if self.rate_limit.enabled && self.rate_limit.requests_per_minute == 0 {
            return Err(TranslationError::ConfigError("启用限流时每分钟请求数不能为0".to_string()));
        }

        Ok(())
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self::from_service_config(&ServiceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_service_config() {
        let mut service = ServiceConfig::default();
        service.api.host = "0.0.0.0".to_string();
        service.api.port = 9000;

        let config = WebConfig::from_service_config(&service);
        assert_eq!(config.listen_address(), "0.0.0.0:9000");
        assert_eq!(config.prefix, service.api.prefix());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_prefix() {
        let config = WebConfig {
            prefix: "/api/".to_string(),
            ..WebConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
