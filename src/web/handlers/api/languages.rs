//! 语言目录API处理器

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{extract::State, response::Json};

use crate::web::types::{AppState, LanguagesResponse};

/// 列出已配置的翻译方向及相关语言的显示名称
pub async fn list_languages(State(state): State<Arc<AppState>>) -> Json<LanguagesResponse> {
    let catalog = state.context.catalog();
    let pairs = catalog.supported_languages();

    let names: BTreeMap<String, String> = pairs
        .iter()
        .flat_map(|(source, targets)| std::iter::once(source).chain(targets))
        .map(|code| (code.clone(), catalog.display_name(code).to_string()))
        .collect();

    Json(LanguagesResponse { names, pairs })
}
