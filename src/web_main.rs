//! Web 服务器主程序入口

#[cfg(feature = "web")]
use std::sync::Arc;

#[cfg(feature = "web")]
use clap::Parser;
#[cfg(feature = "web")]
use translator_service::env::{core as env_core, generate_env_docs, EnvVar};
#[cfg(feature = "web")]
use translator_service::logging::init_tracing;
#[cfg(feature = "web")]
use translator_service::translation::config::ConfigManager;
#[cfg(feature = "web")]
use translator_service::translation::core::ServiceContext;
#[cfg(feature = "web")]
use translator_service::web::{WebConfig, WebServer};

/// 翻译与语言检测 HTTP 服务
#[cfg(feature = "web")]
#[derive(Parser, Debug)]
#[command(name = "translator-server", version, about)]
struct Cli {
    /// 配置文件路径，省略时按默认路径搜索
    #[arg(short, long, env = "TRANSLATOR_CONFIG")]
    config: Option<String>,

    /// 绑定地址，覆盖配置文件
    #[arg(short, long)]
    bind: Option<String>,

    /// 端口，覆盖配置文件
    #[arg(short, long)]
    port: Option<u16>,

    /// 只加载并验证配置，然后退出
    #[arg(long)]
    check_config: bool,

    /// 打印环境变量说明，然后退出
    #[arg(long)]
    env_docs: bool,

    /// 把默认配置写入指定文件，然后退出
    #[arg(long, value_name = "PATH")]
    generate_config: Option<String>,
}

#[cfg(feature = "web")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.env_docs {
        print!("{}", generate_env_docs());
        return Ok(());
    }

    if let Some(path) = &cli.generate_config {
        ConfigManager::generate_example_config(path)?;
        println!("已生成示例配置: {}", path);
        return Ok(());
    }

    let manager = match &cli.config {
        Some(path) => ConfigManager::from_file(path),
        None => ConfigManager::load(),
    };
    let manager = match manager {
        Ok(manager) => manager,
        Err(e) => {
            eprintln!("配置无效: {}", e);
            std::process::exit(1);
        }
    };

    let source = manager.source().unwrap_or("<默认配置>").to_string();
    let mut config = manager.into_config();
    if let Some(bind) = cli.bind {
        config.api.host = bind;
    }
    if let Some(port) = cli.port {
        config.api.port = port;
    }

    let web_config = WebConfig::from_service_config(&config);
    if let Err(e) = web_config.validate() {
        eprintln!("配置无效: {}", e);
        std::process::exit(1);
    }

    if cli.check_config {
        println!("配置有效: {}", source);
        println!("  监听地址: {}{}", web_config.listen_address(), web_config.prefix);
        println!("  缓存后端: {}", config.cache.backend);
        println!("  翻译方向: {} 个", config.engines.pairs.len());
        return Ok(());
    }

    // 生产模式且未显式指定格式时输出 JSON 日志
    let log_format = if env_core::LogFormat::get_set().is_none() && env_core::Mode::get()? == "production" {
        "json".to_string()
    } else {
        config.api.log_format.clone()
    };
    init_tracing(&config.api.log_level, &log_format)?;

    tracing::info!(
        "启动 {} v{} (配置: {})",
        config.api.name,
        config.api.version,
        source
    );

    let context = Arc::new(ServiceContext::build(config).await?);
    let server = WebServer::new(context, web_config);
    server.start().await?;

    Ok(())
}

#[cfg(not(feature = "web"))]
fn main() {
    eprintln!("Error: Web feature not enabled. Please compile with --features web");
    std::process::exit(1);
}
