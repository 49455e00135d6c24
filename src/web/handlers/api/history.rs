//! 翻译历史API处理器

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::Json,
};

use crate::translation::error::TranslationError;
use crate::translation::storage::records::RecordFilter;
use crate::web::error::ApiError;
use crate::web::types::{AppState, HistoryQuery, HistoryResponse};

const DEFAULT_HISTORY_LIMIT: usize = 20;
const MAX_HISTORY_LIMIT: usize = 200;

/// 查询最近的翻译记录，按时间倒序
pub async fn translation_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let Some(store) = state.context.records() else {
        return Err(ApiError::NotFound("翻译历史未启用".to_string()));
    };

    let filter = RecordFilter {
        src_lang: query.src_lang,
        tgt_lang: query.tgt_lang,
        limit: Some(
            query
                .limit
                .unwrap_or(DEFAULT_HISTORY_LIMIT)
                .clamp(1, MAX_HISTORY_LIMIT),
        ),
    };

    let records = store
        .fetch_many(&filter)
        .await
        .map_err(|e| TranslationError::InternalError(format!("查询翻译历史失败: {}", e)))?;

    Ok(Json(HistoryResponse {
        total: records.len(),
        records,
    }))
}
