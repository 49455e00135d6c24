//! 配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::translation::core::engine::RemoteEngineConfig;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::languages::{default_pair_models, PairModel};
use crate::translation::storage::cache::CacheSettings;

/// HTTP 服务配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub name: String,
    pub version: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
    /// `pretty`、`compact` 或 `json`
    pub log_format: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            name: constants::DEFAULT_SERVICE_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            host: constants::DEFAULT_HOST.to_string(),
            port: constants::DEFAULT_PORT,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl ApiConfig {
    /// 路由前缀，例如 `/api/v0`
    pub fn prefix(&self) -> String {
        let major = self.version.split('.').next().unwrap_or("0");
        format!("/api/v{}", major)
    }
}

/// 推理准入配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    pub translation_capacity: usize,
    pub translation_timeout_ms: u64,
    pub detection_capacity: usize,
    pub detection_timeout_ms: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            translation_capacity: constants::DEFAULT_CAPACITY,
            translation_timeout_ms: constants::DEFAULT_TRANSLATION_TIMEOUT_MS,
            detection_capacity: constants::DEFAULT_CAPACITY,
            detection_timeout_ms: constants::DEFAULT_DETECTION_TIMEOUT_MS,
        }
    }
}

impl AdmissionConfig {
    pub fn translation_timeout(&self) -> Duration {
        Duration::from_millis(self.translation_timeout_ms)
    }

    pub fn detection_timeout(&self) -> Duration {
        Duration::from_millis(self.detection_timeout_ms)
    }
}

/// 语言检测器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    /// 本地字符集检测
    Script,
    /// 远程模型服务
    Remote,
}

/// 推理引擎配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub endpoint: String,
    pub request_timeout_secs: u64,
    /// 启动时构建全部引擎，任何一个失败则启动失败
    pub eager: bool,
    pub detector: DetectorKind,
    pub detector_model: String,
    pub detection_top_k: usize,
    pub pairs: Vec<PairModel>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: constants::DEFAULT_INFERENCE_URL.to_string(),
            request_timeout_secs: constants::DEFAULT_INFERENCE_TIMEOUT_SECS,
            eager: true,
            detector: DetectorKind::Script,
            detector_model: constants::DEFAULT_DETECTOR_MODEL.to_string(),
            detection_top_k: 3,
            pairs: default_pair_models(),
        }
    }
}

impl EngineConfig {
    pub fn remote(&self) -> RemoteEngineConfig {
        RemoteEngineConfig {
            endpoint: self.endpoint.clone(),
            request_timeout_secs: self.request_timeout_secs,
        }
    }
}

/// 客户端限流配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_minute: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: constants::DEFAULT_REQUESTS_PER_MINUTE,
        }
    }
}

/// 历史记录存储类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordBackendKind {
    Memory,
    Mongodb,
}

/// 历史记录配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordConfig {
    pub enabled: bool,
    pub backend: RecordBackendKind,
    pub uri: String,
    pub database: String,
    pub collection: String,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: RecordBackendKind::Memory,
            uri: constants::DEFAULT_MONGODB_URI.to_string(),
            database: constants::DEFAULT_RECORD_DATABASE.to_string(),
            collection: constants::DEFAULT_RECORD_COLLECTION.to_string(),
        }
    }
}

/// 服务完整配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub api: ApiConfig,
    pub admission: AdmissionConfig,
    pub cache: CacheSettings,
    pub engines: EngineConfig,
    pub rate_limit: RateLimitConfig,
    pub records: RecordConfig,
}

impl ServiceConfig {
    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.admission.translation_capacity == 0 || self.admission.detection_capacity == 0 {
            return Err(TranslationError::ConfigError("推理并发数不能为0".to_string()));
        }

        if self.admission.translation_timeout_ms == 0 || self.admission.detection_timeout_ms == 0 {
            return Err(TranslationError::ConfigError("准入等待时间必须大于0".to_string()));
        }

        if !matches!(self.cache.backend.as_str(), "redis" | "memory") {
            return Err(TranslationError::ConfigError(format!(
                "未知的缓存后端 '{}'，可选: redis, memory",
                self.cache.backend
            )));
        }

        if self.cache.retry.max_attempts == 0 {
            return Err(TranslationError::ConfigError("缓存重试次数至少为1".to_string()));
        }

        if self.cache.breaker.failure_threshold == 0 {
            return Err(TranslationError::ConfigError("熔断阈值不能为0".to_string()));
        }

        if self.engines.pairs.is_empty() {
            return Err(TranslationError::ConfigError("至少需要配置一个翻译方向".to_string()));
        }

        if let Some(pair) = self
            .engines
            .pairs
            .iter()
            .find(|pair| pair.source == pair.target || pair.model.trim().is_empty())
        {
            return Err(TranslationError::ConfigError(format!(
                "无效的翻译方向 {}→{} (模型: '{}')",
                pair.source, pair.target, pair.model
            )));
        }

        if self.rate_limit.enabled && self.rate_limit.requests_per_minute == 0 {
            return Err(TranslationError::ConfigError("启用限流时每分钟请求数不能为0".to_string()));
        }

        if self.records.enabled
            && self.records.backend == RecordBackendKind::Mongodb
            && !cfg!(feature = "mongodb")
        {
            return Err(TranslationError::ConfigError(
                "历史记录配置为 mongodb，但未启用 mongodb 特性".to_string(),
            ));
        }

        Ok(())
    }

    /// 应用环境变量覆盖，仅处理显式设置的变量
    pub fn apply_env_overrides(&mut self) -> TranslationResult<()> {
        use crate::env::{admission, cache, core, engines, records, server, EnvVar};

        if let Some(level) = core::LogLevel::get_set() {
            self.api.log_level = level?;
        }
        if let Some(format) = core::LogFormat::get_set() {
            self.api.log_format = format?;
        }

        // HTTP 服务
        if let Some(host) = server::Host::get_set() {
            self.api.host = host?;
        }
        if let Some(port) = server::Port::get_set() {
            self.api.port = port?;
        }
        if let Some(limit) = server::RateLimitPerMinute::get_set() {
            self.rate_limit.requests_per_minute = limit?;
        }

        // 缓存
        if let Some(backend) = cache::Backend::get_set() {
            self.cache.backend = backend?;
        }
        if let Some(host) = cache::Host::get_set() {
            self.cache.redis.host = host?;
        }
        if let Some(port) = cache::Port::get_set() {
            self.cache.redis.port = port?;
        }
        if let Some(ttl) = cache::Ttl::get_set() {
            self.cache.ttl = ttl?;
        }

        // 推理准入
        if let Some(capacity) = admission::TranslationCapacity::get_set() {
            self.admission.translation_capacity = capacity?;
        }
        if let Some(timeout) = admission::TranslationTimeout::get_set() {
            self.admission.translation_timeout_ms = timeout?.as_millis() as u64;
        }
        if let Some(capacity) = admission::DetectionCapacity::get_set() {
            self.admission.detection_capacity = capacity?;
        }
        if let Some(timeout) = admission::DetectionTimeout::get_set() {
            self.admission.detection_timeout_ms = timeout?.as_millis() as u64;
        }

        // 推理引擎
        if let Some(endpoint) = engines::Endpoint::get_set() {
            self.engines.endpoint = endpoint?;
            tracing::info!("环境变量覆盖推理服务地址: {}", self.engines.endpoint);
        }
        if let Some(eager) = engines::Eager::get_set() {
            self.engines.eager = eager?;
        }
        if let Some(detector) = engines::Detector::get_set() {
            self.engines.detector = match detector?.as_str() {
                "remote" => DetectorKind::Remote,
                _ => DetectorKind::Script,
            };
        }

        // 历史记录
        if let Some(enabled) = records::Enabled::get_set() {
            self.records.enabled = enabled?;
        }
        if let Some(uri) = records::MongoUri::get_set() {
            self.records.uri = uri?;
            self.records.backend = RecordBackendKind::Mongodb;
        }

        Ok(())
    }
}

/// 配置管理器
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: ServiceConfig,
    source: Option<String>,
}

impl ConfigManager {
    /// 按默认搜索路径加载配置，并应用环境变量覆盖
    pub fn load() -> TranslationResult<Self> {
        Self::load_dotenv();

        let (config, source) = match Self::find_config_file() {
            Some(path) => {
                tracing::info!("加载配置文件: {}", path);
                (Self::read_file(&path)?, Some(path))
            }
            None => {
                tracing::info!("未找到配置文件，使用默认配置");
                (ServiceConfig::default(), None)
            }
        };

        Self::finish(config, source)
    }

    /// 从指定文件加载配置，并应用环境变量覆盖
    pub fn from_file(path: &str) -> TranslationResult<Self> {
        Self::load_dotenv();
        let expanded = shellexpand::tilde(path).to_string();
        let config = Self::read_file(&expanded)?;
        Self::finish(config, Some(expanded))
    }

    /// 直接使用给定配置，不读取文件和环境变量
    pub fn from_config(config: ServiceConfig) -> TranslationResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            source: None,
        })
    }

    fn finish(mut config: ServiceConfig, source: Option<String>) -> TranslationResult<Self> {
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(Self { config, source })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn into_config(self) -> ServiceConfig {
        self.config
    }

    /// 配置文件路径，使用默认配置时为 `None`
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    fn find_config_file() -> Option<String> {
        constants::CONFIG_PATHS
            .iter()
            .map(|path| shellexpand::tilde(path).to_string())
            .find(|path| Path::new(path).exists())
    }

    fn read_file(path: &str) -> TranslationResult<ServiceConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TranslationError::ConfigError(format!("读取配置文件失败 {}: {}", path, e)))?;

        if path.ends_with(".json") {
            serde_json::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析JSON配置失败: {}", e)))
        } else {
            toml::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析TOML配置失败: {}", e)))
        }
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env.development", ".env.production", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: &str) -> TranslationResult<()> {
        let content = toml::to_string_pretty(&ServiceConfig::default())
            .map_err(|e| TranslationError::ConfigError(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TranslationError::ConfigError(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.admission.translation_capacity, 5);
        assert_eq!(config.admission.translation_timeout(), Duration::from_secs(5));
        assert_eq!(config.admission.detection_timeout(), Duration::from_secs(10));
        assert_eq!(config.rate_limit.requests_per_minute, 50);
        assert_eq!(config.engines.pairs.len(), 6);
    }

    #[test]
    fn test_api_prefix_uses_major_version() {
        let api = ApiConfig {
            version: "2.3.1".to_string(),
            ..Default::default()
        };
        assert_eq!(api.prefix(), "/api/v2");
    }

    #[test]
    fn test_validation_errors() {
        let mut config = ServiceConfig::default();
        config.admission.translation_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.cache.backend = "memcached".to_string();
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.engines.pairs.push(PairModel::new("en", "en", "noop"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [api]
            port = 9090

            [cache]
            backend = "memory"
            ttl = "30m"

            [[engines.pairs]]
            source = "en"
            target = "vi"
            model = "VietAI/envit5-translation"
            input_prefix = "en: "
            output_prefix = "vi: "
            "#,
        )
        .unwrap();

        assert_eq!(config.api.port, 9090);
        assert_eq!(config.api.host, "127.0.0.1");
        assert_eq!(config.cache.default_ttl(), Some(Duration::from_secs(1800)));
        assert_eq!(config.engines.pairs.len(), 1);
        assert_eq!(config.engines.pairs[0].input_prefix, "en: ");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_example_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("translator.toml");
        let path = path.to_str().unwrap();

        ConfigManager::generate_example_config(path).unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        let parsed: ServiceConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed, ServiceConfig::default());
    }
}
