//! 翻译API处理器

use std::sync::Arc;

use axum::{
    extract::{Json as ExtractJson, State},
    response::Json,
};

use crate::web::error::ApiError;
use crate::web::types::{format_elapsed, AppState, TranslateRequest, TranslateResponse};

/// 批量翻译文本
///
/// 结果与 `texts` 一一对应；`src_lang` 省略时自动检测。
pub async fn translate(
    State(state): State<Arc<AppState>>,
    ExtractJson(request): ExtractJson<TranslateRequest>,
) -> Result<Json<TranslateResponse>, ApiError> {
    tracing::debug!(
        "收到翻译请求: {} 条, {:?}→{}",
        request.texts.len(),
        request.src_lang,
        request.tgt_lang
    );

    let outcome = state
        .context
        .translation()
        .translate(&request.texts, request.src_lang.as_deref(), &request.tgt_lang)
        .await?;

    state.context.record_translation(&request.texts, &outcome);

    Ok(Json(TranslateResponse {
        time: format_elapsed(outcome.elapsed),
        results: outcome.results,
        src_lang: outcome.src_lang,
        tgt_lang: outcome.tgt_lang,
        cache_hits: outcome.cache_hits,
        device: outcome.device,
    }))
}
