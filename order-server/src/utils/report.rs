//! 错误上报
//!
//! 后台任务（通知投递、对账、超时提醒）中的失败不会返回给任何调用者，
//! 统一通过 `error_report` target 上报，便于日志系统单独收集。

use std::fmt::Display;

/// Report a failure that has no caller to return to
pub fn report_error(context: &str, order_id: Option<i64>, error: &dyn Display) {
    tracing::error!(
        target: "error_report",
        context,
        order_id,
        error = %error,
        "Background operation failed"
    );
}
