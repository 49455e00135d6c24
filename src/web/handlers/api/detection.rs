//! 语言检测API处理器

use std::sync::Arc;

use axum::{
    extract::{Json as ExtractJson, State},
    response::Json,
};

use crate::web::error::ApiError;
use crate::web::types::{format_elapsed, AppState, DetectRequest, DetectResponse};

/// 检测一批文本的语言，文本会被合并后整体检测
pub async fn detect_language(
    State(state): State<Arc<AppState>>,
    ExtractJson(request): ExtractJson<DetectRequest>,
) -> Result<Json<DetectResponse>, ApiError> {
    let outcome = state.context.detection().detect(&request.texts).await?;

    Ok(Json(DetectResponse {
        detected_lang: outcome.language,
        candidates: outcome.detected,
        cached: outcome.cached,
        time: format_elapsed(outcome.elapsed),
    }))
}
