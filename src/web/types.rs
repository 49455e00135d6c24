//! Web 服务相关的数据类型定义

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::limiter::RateLimiter;
use crate::translation::core::{Detection, ServiceContext, ServiceStatsSnapshot};
use crate::translation::resilience::BreakerState;
use crate::translation::storage::cache::CacheStatsSnapshot;
use crate::translation::storage::records::TranslationRecord;

/// 应用状态
#[derive(Debug, Clone)]
pub struct AppState {
    pub context: Arc<ServiceContext>,
    /// 未启用限流时为 `None`
    pub limiter: Option<Arc<RateLimiter>>,
}

impl AppState {
    pub fn new(context: Arc<ServiceContext>) -> Self {
        let rate_limit = &context.config().rate_limit;
        let limiter = rate_limit
            .enabled
            .then(|| Arc::new(RateLimiter::per_minute(rate_limit.requests_per_minute)));

        Self { context, limiter }
    }
}

/// 处理耗时，例如 `0.12s`
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.2}s", elapsed.as_secs_f64())
}

// ============================================================================
// 翻译
// ============================================================================

/// 翻译请求
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranslateRequest {
    pub texts: Vec<String>,
    /// 为空时自动检测
    #[serde(default)]
    pub src_lang: Option<String>,
    pub tgt_lang: String,
}

/// 翻译响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateResponse {
    pub results: Vec<String>,
    pub time: String,
    pub src_lang: String,
    pub tgt_lang: String,
    pub cache_hits: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

// ============================================================================
// 语言检测
// ============================================================================

/// 语言检测请求
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DetectRequest {
    pub texts: Vec<String>,
}

/// 语言检测响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectResponse {
    pub detected_lang: String,
    pub candidates: Vec<Detection>,
    pub cached: bool,
    pub time: String,
}

// ============================================================================
// 语言目录
// ============================================================================

/// 支持的语言与翻译方向
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguagesResponse {
    /// 语言代码到显示名称
    pub names: BTreeMap<String, String>,
    /// 源语言到可用目标语言
    pub pairs: BTreeMap<String, Vec<String>>,
}

// ============================================================================
// 缓存与服务状态
// ============================================================================

/// 缓存统计响应
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsResponse {
    pub backend: String,
    pub breaker_state: BreakerState,
    pub breaker_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_ttl_secs: Option<u64>,
    pub cache: CacheStatsSnapshot,
    pub translation: ServiceStatsSnapshot,
    pub detection: ServiceStatsSnapshot,
    pub translation_slots_available: usize,
    pub detection_slots_available: usize,
    pub uptime_secs: u64,
}

// ============================================================================
// 翻译历史
// ============================================================================

/// 历史查询参数
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub src_lang: Option<String>,
    pub tgt_lang: Option<String>,
    pub limit: Option<usize>,
}

/// 历史查询响应
#[derive(Debug, Clone, Serialize)]
pub struct HistoryResponse {
    pub total: usize,
    pub records: Vec<TranslationRecord>,
}
