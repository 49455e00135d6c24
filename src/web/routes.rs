//! Web 路由配置

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::web::handlers::api::{
    detect_language, get_cache_stats, health_check, list_languages, translate,
    translation_history,
};
use crate::web::limiter::rate_limit;
use crate::web::types::AppState;

/// 创建 API 路由，路径相对于版本前缀
///
/// 翻译和检测接口受限流保护，其余接口不计入限额。
pub fn create_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let limited = Router::new()
        .route("/translate", post(translate))
        .route("/translate/", post(translate))
        .route("/detect", post(detect_language))
        .route("/detect/", post(detect_language))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .route("/health-check", get(health_check))
        .route("/health-check/", get(health_check))
        .route("/languages", get(list_languages))
        .route("/cache/stats", get(get_cache_stats))
        .route("/translate/history", get(translation_history))
        .merge(limited)
}
