//! 缓存与服务状态API处理器

use std::sync::Arc;

use axum::{extract::State, response::Json};

use crate::web::types::{AppState, CacheStatsResponse};

/// 获取缓存、熔断器与编排器统计信息
pub async fn get_cache_stats(State(state): State<Arc<AppState>>) -> Json<CacheStatsResponse> {
    let context = &state.context;
    let cache = context.cache();
    let breaker = cache.breaker();

    Json(CacheStatsResponse {
        backend: cache.backend_name(),
        breaker_state: breaker.state(),
        breaker_failures: breaker.failure_count(),
        default_ttl_secs: cache.default_ttl().map(|ttl| ttl.as_secs()),
        cache: cache.stats(),
        translation: context.translation().stats(),
        detection: context.detection().stats(),
        translation_slots_available: context.translation().admission().available(),
        detection_slots_available: context.detection().admission().available(),
        uptime_secs: context.uptime().as_secs(),
    })
}
