//! Web 服务器模块
//!
//! 通过 HTTP 暴露翻译、语言检测和服务状态接口

pub mod config;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod routes;
pub mod types;

pub use config::*;
pub use error::ApiError;
pub use limiter::RateLimiter;
pub use routes::*;
pub use types::*;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::translation::core::ServiceContext;
use crate::translation::error::{TranslationError, TranslationResult};

/// Web 服务器
pub struct WebServer {
    config: WebConfig,
    context: Arc<ServiceContext>,
}

impl WebServer {
    /// 创建新的 Web 服务器
    pub fn new(context: Arc<ServiceContext>, config: WebConfig) -> Self {
        Self { config, context }
    }

    pub fn config(&self) -> &WebConfig {
        &self.config
    }

    /// 启动 Web 服务器，收到 Ctrl+C 后优雅退出
    pub async fn start(&self) -> TranslationResult<()> {
        self.config.validate()?;

        let state = Arc::new(AppState::new(self.context.clone()));
        let app = create_router(state, &self.config);

        let address = self.config.listen_address();
        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .map_err(|e| TranslationError::ConfigError(format!("无法绑定 {}: {}", address, e)))?;

        info!(
            "Web 服务启动: http://{}{}",
            address, self.config.prefix
        );

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| TranslationError::InternalError(format!("服务器错误: {}", e)))?;

        info!("Web 服务已停止");
        Ok(())
    }
}

/// 创建路由器
pub fn create_router(state: Arc<AppState>, config: &WebConfig) -> Router {
    Router::new()
        .nest(&config.prefix, create_routes(&state))
        .with_state(state)
        .layer(middleware::from_fn(log_requests))
        .layer(CorsLayer::permissive())
}

/// 记录每个请求的方法、路径、状态码和耗时
async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let query = request.uri().query().unwrap_or_default().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let process_time_ms = (started.elapsed().as_secs_f64() * 100_000.0).round() / 100.0;
    if response.status().is_server_error() {
        warn!(%method, %path, %query, status, process_time_ms, "HTTP 请求失败");
    } else {
        debug!(%method, %path, %query, status, process_time_ms, "HTTP 请求");
    }

    response
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("无法监听退出信号: {}", e);
        std::future::pending::<()>().await;
    }
    info!("收到退出信号，正在关闭服务");
}
