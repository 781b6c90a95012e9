//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查 (无需认证)
//! - [`orders`] - 订单工作流与查询接口

pub mod health;
pub mod orders;

// Re-export common types for handlers
pub use crate::utils::{ApiResponse, AppResult};
