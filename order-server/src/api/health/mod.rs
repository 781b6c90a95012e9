//! 健康检查路由
//!
//! | 路径 | 方法 | 说明 | 认证 |
//! |------|------|------|------|
//! | /health | GET | 健康检查 + 存储统计 | 无 |
//!
//! ```json
//! {
//!   "status": "healthy",
//!   "version": "0.1.0",
//!   "epoch": "0b6c...",
//!   "uptime_seconds": 42,
//!   "storage": { "user_count": 3, "order_count": 10, ... }
//! }
//! ```

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use std::time::SystemTime;

use crate::core::ServerState;
use crate::orders::storage::StorageStats;

/// 健康检查路由 - 公共路由 (无需认证)
pub fn router() -> Router<ServerState> {
    Router::new().route("/health", get(health))
}

#[derive(Serialize)]
pub struct HealthResponse {
    /// healthy | degraded
    status: &'static str,
    version: &'static str,
    /// 本次启动的实例标识
    epoch: String,
    uptime_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    storage: Option<StorageStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

// 服务器启动时间 (懒加载静态变量)
static START_TIME: std::sync::OnceLock<SystemTime> = std::sync::OnceLock::new();

fn get_uptime_seconds() -> u64 {
    let start = START_TIME.get_or_init(SystemTime::now);
    SystemTime::now()
        .duration_since(*start)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    let (status, storage, message) = match state.storage.get_stats() {
        Ok(stats) => ("healthy", Some(stats), None),
        Err(e) => ("degraded", None, Some(format!("Storage error: {}", e))),
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        epoch: state.orders.epoch().to_string(),
        uptime_seconds: get_uptime_seconds(),
        storage,
        message,
    })
}
