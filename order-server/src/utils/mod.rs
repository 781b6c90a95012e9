//! 工具模块
//!
//! - [`logger`]: 日志初始化
//! - [`report`]: 后台失败上报

pub mod logger;
pub mod report;

pub use report::report_error;
pub use shared::error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
