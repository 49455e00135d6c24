//! 健康检查

use axum::response::Json;

/// 健康检查，服务可接受请求时返回 `"OK"`
pub async fn health_check() -> Json<&'static str> {
    Json("OK")
}
