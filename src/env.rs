//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量管理。所有变量使用 `TRANSLATOR_` 前缀，
//! 由 `ConfigManager` 在加载配置文件之后作为覆盖层应用。

use std::env;
use std::fmt;
use std::time::Duration;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    /// 仅在变量被显式设置时返回值，解析失败同样作为错误返回
    fn get_set() -> Option<EnvResult<T>> {
        env::var(Self::NAME).ok().map(|value| Self::parse(&value))
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 应用运行模式
    pub struct Mode;
    impl EnvVar<String> for Mode {
        const NAME: &'static str = "TRANSLATOR_ENV";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Application mode: development, production";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("development".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "development" | "dev" => Ok("development".to_string()),
                "production" | "prod" => Ok("production".to_string()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("Invalid mode '{}'. Use: development, production", value),
                }),
            }
        }
    }

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "TRANSLATOR_LOG_LEVEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }

    /// 日志输出格式
    pub struct LogFormat;
    impl EnvVar<String> for LogFormat {
        const NAME: &'static str = "TRANSLATOR_LOG_FORMAT";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Log format: pretty, compact, json";

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "pretty" | "compact" | "json" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("Invalid log format '{}'. Use: pretty, compact, json", value),
                }),
            }
        }
    }
}

/// HTTP 服务相关环境变量
pub mod server {
    use super::*;

    /// 绑定地址
    pub struct Host;
    impl EnvVar<String> for Host {
        const NAME: &'static str = "TRANSLATOR_HOST";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Server bind address";

        fn parse(value: &str) -> EnvResult<String> {
            let addr = value.trim();
            if addr.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Bind address cannot be empty".to_string(),
                });
            }
            Ok(addr.to_string())
        }
    }

    /// 端口
    pub struct Port;
    impl EnvVar<u16> for Port {
        const NAME: &'static str = "TRANSLATOR_PORT";
        const DEFAULT: Option<u16> = Some(8080);
        const DESCRIPTION: &'static str = "Server port";

        fn parse(value: &str) -> EnvResult<u16> {
            value.trim().parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: "Must be a valid port number (1-65535)".to_string(),
            })
        }
    }

    /// 每个客户端每分钟允许的请求数
    pub struct RateLimitPerMinute;
    impl EnvVar<usize> for RateLimitPerMinute {
        const NAME: &'static str = "TRANSLATOR_RATE_LIMIT_PER_MINUTE";
        const DEFAULT: Option<usize> = Some(50);
        const DESCRIPTION: &'static str = "Requests per minute allowed for each client address";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 100_000)
        }
    }
}

/// 缓存相关环境变量
pub mod cache {
    use super::*;

    /// 缓存后端
    pub struct Backend;
    impl EnvVar<String> for Backend {
        const NAME: &'static str = "TRANSLATOR_CACHE_BACKEND";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Cache backend: redis, memory";

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "redis" | "memory" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("Invalid cache backend '{}'. Use: redis, memory", value),
                }),
            }
        }
    }

    /// Redis 主机
    pub struct Host;
    impl EnvVar<String> for Host {
        const NAME: &'static str = "TRANSLATOR_REDIS_HOST";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Redis host";

        fn parse(value: &str) -> EnvResult<String> {
            Ok(value.trim().to_string())
        }
    }

    /// Redis 端口
    pub struct Port;
    impl EnvVar<u16> for Port {
        const NAME: &'static str = "TRANSLATOR_REDIS_PORT";
        const DEFAULT: Option<u16> = Some(6379);
        const DESCRIPTION: &'static str = "Redis port";

        fn parse(value: &str) -> EnvResult<u16> {
            value.trim().parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: "Must be a valid port number (1-65535)".to_string(),
            })
        }
    }

    /// 默认TTL（时长字符串，非正数或无法解析时表示永不过期）
    pub struct Ttl;
    impl EnvVar<String> for Ttl {
        const NAME: &'static str = "TRANSLATOR_CACHE_TTL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str =
            "Default cache TTL as a duration string (e.g. 3600, 1h, 1h30m); non-positive disables expiry";

        fn parse(value: &str) -> EnvResult<String> {
            Ok(value.trim().to_string())
        }
    }
}

/// 准入控制相关环境变量
pub mod admission {
    use super::*;

    /// 翻译并发推理上限
    pub struct TranslationCapacity;
    impl EnvVar<usize> for TranslationCapacity {
        const NAME: &'static str = "TRANSLATOR_TRANSLATION_CAPACITY";
        const DEFAULT: Option<usize> = Some(5);
        const DESCRIPTION: &'static str = "Maximum concurrent translation inferences";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 1024)
        }
    }

    /// 翻译准入等待超时
    pub struct TranslationTimeout;
    impl EnvVar<Duration> for TranslationTimeout {
        const NAME: &'static str = "TRANSLATOR_TRANSLATION_TIMEOUT";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(5));
        const DESCRIPTION: &'static str = "Admission wait timeout for translation (e.g. 5s, 500ms)";

        fn parse(value: &str) -> EnvResult<Duration> {
            parse_duration(value).map_err(|message| EnvError {
                variable: Self::NAME.to_string(),
                message,
            })
        }
    }

    /// 检测并发推理上限
    pub struct DetectionCapacity;
    impl EnvVar<usize> for DetectionCapacity {
        const NAME: &'static str = "TRANSLATOR_DETECTION_CAPACITY";
        const DEFAULT: Option<usize> = Some(5);
        const DESCRIPTION: &'static str = "Maximum concurrent detection inferences";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 1024)
        }
    }

    /// 检测准入等待超时
    pub struct DetectionTimeout;
    impl EnvVar<Duration> for DetectionTimeout {
        const NAME: &'static str = "TRANSLATOR_DETECTION_TIMEOUT";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(10));
        const DESCRIPTION: &'static str = "Admission wait timeout for detection (e.g. 10s)";

        fn parse(value: &str) -> EnvResult<Duration> {
            parse_duration(value).map_err(|message| EnvError {
                variable: Self::NAME.to_string(),
                message,
            })
        }
    }
}

/// 推理引擎相关环境变量
pub mod engines {
    use super::*;

    /// 推理服务地址
    pub struct Endpoint;
    impl EnvVar<String> for Endpoint {
        const NAME: &'static str = "TRANSLATOR_INFERENCE_URL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Base URL of the model inference server";

        fn parse(value: &str) -> EnvResult<String> {
            let url = value.trim().trim_end_matches('/');
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "URL must start with http:// or https://".to_string(),
                });
            }
            Ok(url.to_string())
        }
    }

    /// 启动时预加载所有引擎
    pub struct Eager;
    impl EnvVar<bool> for Eager {
        const NAME: &'static str = "TRANSLATOR_EAGER_ENGINES";
        const DEFAULT: Option<bool> = Some(true);
        const DESCRIPTION: &'static str = "Construct every registered engine at startup";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 语言检测器类型
    pub struct Detector;
    impl EnvVar<String> for Detector {
        const NAME: &'static str = "TRANSLATOR_DETECTOR";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Language detector: script, remote";

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "script" | "remote" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("Invalid detector '{}'. Use: script, remote", value),
                }),
            }
        }
    }
}

/// 翻译记录存储相关环境变量
pub mod records {
    use super::*;

    /// 记录翻译历史
    pub struct Enabled;
    impl EnvVar<bool> for Enabled {
        const NAME: &'static str = "TRANSLATOR_HISTORY_ENABLED";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Persist translation history records";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// MongoDB 连接字符串
    pub struct MongoUri;
    impl EnvVar<String> for MongoUri {
        const NAME: &'static str = "TRANSLATOR_MONGODB_URI";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "MongoDB connection string for translation history";

        fn parse(value: &str) -> EnvResult<String> {
            let uri = value.trim();
            if !uri.starts_with("mongodb://") && !uri.starts_with("mongodb+srv://") {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Must start with mongodb:// or mongodb+srv://".to_string(),
                });
            }
            Ok(uri.to_string())
        }
    }
}

/// 辅助函数
fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!(
                "Invalid boolean value '{}'. Use: true/false, 1/0, yes/no, on/off, enabled/disabled",
                value
            ),
        }),
    }
}

fn parse_positive_usize(value: &str, var_name: &str, min: usize, max: usize) -> EnvResult<usize> {
    let num: usize = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid positive number".to_string(),
    })?;

    if num < min {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is below minimum {}", num, min),
        });
    }

    if num > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {}", num, max),
        });
    }

    Ok(num)
}

/// 解析时长字符串
///
/// 支持纯数字（秒）以及由 `ms`/`s`/`m`/`h`/`d`/`w` 单位组成的序列，
/// 例如 `"90"`、`"500ms"`、`"1h30m"`、`"2d"`。允许前导负号，
/// 负值以 `Err` 返回，由调用方决定如何处理。
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let spec = value.trim();
    if spec.is_empty() {
        return Err("Duration cannot be empty".to_string());
    }
    if spec.starts_with('-') {
        return Err(format!("Duration '{}' is negative", spec));
    }

    if let Ok(secs) = spec.parse::<f64>() {
        if !secs.is_finite() || secs < 0.0 {
            return Err(format!("Invalid duration '{}'", spec));
        }
        return Duration::try_from_secs_f64(secs)
            .map_err(|_| format!("Duration '{}' is out of range", spec));
    }

    let mut total = Duration::ZERO;
    let mut rest = spec;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("Missing unit in duration '{}'", spec))?;
        if digits == 0 {
            return Err(format!("Invalid duration '{}'", spec));
        }
        let amount: f64 = rest[..digits]
            .parse()
            .map_err(|_| format!("Invalid number in duration '{}'", spec))?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let unit = rest[..unit_len].trim();
        rest = rest[unit_len..].trim_start();

        let factor = match unit {
            "ms" => 0.001,
            "s" | "sec" | "secs" => 1.0,
            "m" | "min" | "mins" => 60.0,
            "h" | "hr" | "hrs" => 3600.0,
            "d" | "day" | "days" => 86_400.0,
            "w" | "week" | "weeks" => 604_800.0,
            other => return Err(format!("Unknown duration unit '{}' in '{}'", other, spec)),
        };
        let part = Duration::try_from_secs_f64(amount * factor)
            .map_err(|_| format!("Duration '{}' is out of range", spec))?;
        total = total
            .checked_add(part)
            .ok_or_else(|| format!("Duration '{}' is out of range", spec))?;
    }

    Ok(total)
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    fn line<T: fmt::Debug>(name: &str, description: &str, default: Option<T>) -> String {
        format!("- `{}`: {} (default: {:?})\n", name, description, default)
    }

    let mut docs = String::new();
    docs.push_str("# Environment Variables\n\n");

    docs.push_str("## Core\n\n");
    docs.push_str(&line(core::Mode::NAME, core::Mode::DESCRIPTION, core::Mode::DEFAULT));
    docs.push_str(&line(core::LogLevel::NAME, core::LogLevel::DESCRIPTION, core::LogLevel::DEFAULT));
    docs.push_str(&line(core::LogFormat::NAME, core::LogFormat::DESCRIPTION, core::LogFormat::DEFAULT));

    docs.push_str("\n## Server\n\n");
    docs.push_str(&line(server::Host::NAME, server::Host::DESCRIPTION, server::Host::DEFAULT));
    docs.push_str(&line(server::Port::NAME, server::Port::DESCRIPTION, server::Port::DEFAULT));
    docs.push_str(&line(
        server::RateLimitPerMinute::NAME,
        server::RateLimitPerMinute::DESCRIPTION,
        server::RateLimitPerMinute::DEFAULT,
    ));

    docs.push_str("\n## Cache\n\n");
    docs.push_str(&line(cache::Backend::NAME, cache::Backend::DESCRIPTION, cache::Backend::DEFAULT));
    docs.push_str(&line(cache::Host::NAME, cache::Host::DESCRIPTION, cache::Host::DEFAULT));
    docs.push_str(&line(cache::Port::NAME, cache::Port::DESCRIPTION, cache::Port::DEFAULT));
    docs.push_str(&line(cache::Ttl::NAME, cache::Ttl::DESCRIPTION, cache::Ttl::DEFAULT));

    docs.push_str("\n## Admission\n\n");
    docs.push_str(&line(
        admission::TranslationCapacity::NAME,
        admission::TranslationCapacity::DESCRIPTION,
        admission::TranslationCapacity::DEFAULT,
    ));
    docs.push_str(&line(
        admission::TranslationTimeout::NAME,
        admission::TranslationTimeout::DESCRIPTION,
        admission::TranslationTimeout::DEFAULT,
    ));
    docs.push_str(&line(
        admission::DetectionCapacity::NAME,
        admission::DetectionCapacity::DESCRIPTION,
        admission::DetectionCapacity::DEFAULT,
    ));
    docs.push_str(&line(
        admission::DetectionTimeout::NAME,
        admission::DetectionTimeout::DESCRIPTION,
        admission::DetectionTimeout::DEFAULT,
    ));

    docs.push_str("\n## Engines\n\n");
    docs.push_str(&line(engines::Endpoint::NAME, engines::Endpoint::DESCRIPTION, engines::Endpoint::DEFAULT));
    docs.push_str(&line(engines::Eager::NAME, engines::Eager::DESCRIPTION, engines::Eager::DEFAULT));
    docs.push_str(&line(engines::Detector::NAME, engines::Detector::DESCRIPTION, engines::Detector::DEFAULT));

    docs.push_str("\n## History\n\n");
    docs.push_str(&line(records::Enabled::NAME, records::Enabled::DESCRIPTION, records::Enabled::DEFAULT));
    docs.push_str(&line(records::MongoUri::NAME, records::MongoUri::DESCRIPTION, records::MongoUri::DEFAULT));

    docs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_mode_parsing() {
        assert_eq!(core::Mode::parse("dev").unwrap(), "development");
        assert_eq!(core::Mode::parse("PRODUCTION").unwrap(), "production");
        assert!(core::Mode::parse("staging").is_err());
    }

    #[test]
    fn test_boolean_parsing() {
        assert!(engines::Eager::parse("true").unwrap());
        assert!(engines::Eager::parse("YES").unwrap());
        assert!(!engines::Eager::parse("off").unwrap());
        assert!(engines::Eager::parse("maybe").is_err());
    }

    #[test]
    fn test_numeric_validation() {
        assert_eq!(admission::TranslationCapacity::parse("5").unwrap(), 5);
        assert!(admission::TranslationCapacity::parse("0").is_err());
        assert!(admission::TranslationCapacity::parse("many").is_err());
    }

    #[test]
    fn test_url_validation() {
        assert_eq!(
            engines::Endpoint::parse("http://localhost:8000/").unwrap(),
            "http://localhost:8000"
        );
        assert!(engines::Endpoint::parse("localhost:8000").is_err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("3600").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("2d").unwrap(), Duration::from_secs(172_800));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert!(parse_duration("-5").is_err());
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("10 fortnights").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn test_parse_duration_rejects_overflow() {
        assert!(parse_duration("1e300").is_err());
        assert!(parse_duration("99999999999999999999d").is_err());
        assert!(parse_duration("400000000000w400000000000w").is_err());
    }

    #[test]
    fn test_env_docs_lists_variables() {
        let docs = generate_env_docs();
        assert!(docs.contains("TRANSLATOR_CACHE_TTL"));
        assert!(docs.contains("TRANSLATOR_TRANSLATION_CAPACITY"));
    }
}
