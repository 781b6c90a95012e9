//! Order Server - 车辆维修订单平台服务端
//!
//! # 架构概述
//!
//! 司机/客户提交维修订单，所在区域的师傅接单 (扣除预留费用)、报价，
//! 客户确认后进入维修，最终完成或取消。
//!
//! - **订单引擎** (`orders`): 状态机、创建流程、可见性规则、后台对账
//! - **存储** (`orders/storage`): 嵌入式 redb，每次状态变更一个写事务
//! - **认证** (`auth`): JWT Bearer 令牌
//! - **通知** (`notify`): 状态变更后异步投递
//! - **HTTP API** (`api`): RESTful API 接口
//!
//! # 模块结构
//!
//! ```text
//! order-server/src/
//! ├── core/          # 配置、状态、错误、后台任务
//! ├── auth/          # JWT 认证
//! ├── services/      # 路由组装、HTTP 中间件
//! ├── api/           # HTTP 路由和处理器
//! ├── utils/         # 日志、错误上报
//! ├── notify/        # 通知队列与投递
//! └── orders/        # 订单工作流
//! ```

pub mod api;
pub mod auth;
pub mod core;
pub mod notify;
pub mod orders;
pub mod services;
pub mod utils;

// Re-export 公共类型
pub use auth::{CurrentUser, JwtService};
pub use core::{Config, Server, ServerState};
pub use orders::{OrderStorage, OrdersManager};
pub use utils::{AppError, AppResult};

// Re-export unified error types from shared
pub use utils::{ApiResponse, ErrorCategory, ErrorCode};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

// Security logging macro - 支持 tracing 格式说明符
#[macro_export]
macro_rules! security_log {
    ($level:expr, $event:expr, $($key:ident = $value:expr),*) => {
        tracing::info!(
            target: "security",
            level = $level,
            event = $event,
            $($key = $value),*
        );
    };
}

/// 准备运行环境: 工作目录、日志目录、日志系统
///
/// 返回的 guard 需要在进程生命周期内保持存活。
pub fn setup_environment(
    config: &Config,
) -> core::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let log_dir = config.log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let guard = init_logger_with_file(
        Some(&config.log_level),
        config.log_json,
        log_dir.to_str(),
    );
    Ok(guard)
}

pub fn print_banner() {
    println!(
        r#"
  ___          _
 / _ \ _ __ __| | ___ _ __ ___
| | | | '__/ _` |/ _ \ '__/ __|
| |_| | | | (_| |  __/ |  \__ \
 \___/|_|  \__,_|\___|_|  |___/
    "#
    );
}
