//! 服务配置管理模块
//!
//! 配置来源的优先级：环境变量 > 配置文件 > 默认值

pub mod manager;

// 重新导出主要类型
pub use manager::{
    AdmissionConfig, ApiConfig, ConfigManager, DetectorKind, EngineConfig, RateLimitConfig,
    RecordBackendKind, RecordConfig, ServiceConfig,
};

/// 配置常量
pub mod constants {
    // 服务
    pub const DEFAULT_SERVICE_NAME: &str = "translator-service";
    pub const DEFAULT_HOST: &str = "127.0.0.1";
    pub const DEFAULT_PORT: u16 = 8080;

    // 推理准入
    pub const DEFAULT_CAPACITY: usize = 5;
    pub const DEFAULT_TRANSLATION_TIMEOUT_MS: u64 = 5_000;
    pub const DEFAULT_DETECTION_TIMEOUT_MS: u64 = 10_000;

    // 推理服务
    pub const DEFAULT_INFERENCE_URL: &str = "http://127.0.0.1:8000";
    pub const DEFAULT_INFERENCE_TIMEOUT_SECS: u64 = 60;
    pub const DEFAULT_DETECTOR_MODEL: &str = "papluca/xlm-roberta-base-language-detection";

    // 限流
    pub const DEFAULT_REQUESTS_PER_MINUTE: usize = 50;

    // 历史记录
    pub const DEFAULT_MONGODB_URI: &str = "mongodb://localhost:27017";
    pub const DEFAULT_RECORD_DATABASE: &str = "translator";
    pub const DEFAULT_RECORD_COLLECTION: &str = "translations";

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "translator.toml",
        "config.toml",
        ".translator.toml",
        "~/.config/translator/config.toml",
        "/etc/translator/config.toml",
    ];
}

/// 是否存在可用的配置文件
pub fn config_file_exists() -> bool {
    constants::CONFIG_PATHS
        .iter()
        .any(|path| std::path::Path::new(shellexpand::tilde(path).as_ref()).exists())
}
