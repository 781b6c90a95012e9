use crate::auth::JwtConfig;
use crate::orders::{SweepPolicy, WorkflowSettings};
use rust_decimal::Decimal;
use shared::util::{DAY_MS, HOUR_MS, MINUTE_MS};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// 服务器配置 - 订单服务的所有配置项
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./data | 工作目录 (数据库、日志) |
/// | HTTP_PORT | 8080 | HTTP 服务端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_JSON | false | JSON 日志 |
/// | APP_URL | http://localhost:3000 | 通知链接的前端地址 |
/// | RESERVATION_FEE | 2000 | 接单预留费用 |
/// | STALE_CREATED_HOURS | 48 | CREATED 超时取消阈值 |
/// | STALE_IN_PROGRESS_DAYS | 31 | 进行中订单自动完成阈值 |
/// | AGING_ALERT_MINUTES | 15 | 未接单提醒阈值 |
/// | SWEEP_INTERVAL_SECS | 300 | 对账间隔 |
/// | AGING_SCAN_INTERVAL_SECS | 60 | 超时提醒扫描间隔 |
/// | ADMIN_EMAIL | admin@localhost | 系统管理员邮箱 |
/// | ADMIN_NAME | System | 系统管理员名称 |
///
/// JWT 相关变量见 [`JwtConfig`]。
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/orders HTTP_PORT=9000 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库和日志
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,
    pub log_level: String,
    pub log_json: bool,
    /// 访问链接的前端地址
    pub app_url: String,
    /// 接单时从师傅余额扣除的费用
    pub reservation_fee: Decimal,
    pub stale_created_hours: i64,
    pub stale_in_progress_days: i64,
    pub aging_alert_minutes: i64,
    pub sweep_interval_secs: u64,
    pub aging_scan_interval_secs: u64,
    /// 后台任务使用的系统管理员身份
    pub admin_email: String,
    pub admin_name: String,
    /// JWT 认证配置
    pub jwt: JwtConfig,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置或无法解析，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".into()),
            http_port: env_or("HTTP_PORT", 8080),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json: env_or("LOG_JSON", false),
            app_url: std::env::var("APP_URL").unwrap_or_else(|_| "http://localhost:3000".into()),
            reservation_fee: env_or(
                "RESERVATION_FEE",
                WorkflowSettings::default().reservation_fee,
            ),
            stale_created_hours: env_or("STALE_CREATED_HOURS", 48),
            stale_in_progress_days: env_or("STALE_IN_PROGRESS_DAYS", 31),
            aging_alert_minutes: env_or("AGING_ALERT_MINUTES", 15),
            sweep_interval_secs: env_or("SWEEP_INTERVAL_SECS", 300),
            aging_scan_interval_secs: env_or("AGING_SCAN_INTERVAL_SECS", 60),
            admin_email: std::env::var("ADMIN_EMAIL")
                .unwrap_or_else(|_| "admin@localhost".into()),
            admin_name: std::env::var("ADMIN_NAME").unwrap_or_else(|_| "System".into()),
            jwt: JwtConfig::default(),
        }
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("orders.redb")
    }

    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    pub fn workflow_settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            reservation_fee: self.reservation_fee,
        }
    }

    pub fn sweep_policy(&self) -> SweepPolicy {
        SweepPolicy {
            stale_created_ms: self.stale_created_hours * HOUR_MS,
            stale_in_progress_ms: self.stale_in_progress_days * DAY_MS,
            interval: Duration::from_secs(self.sweep_interval_secs),
        }
    }

    pub fn aging_threshold_ms(&self) -> i64 {
        self.aging_alert_minutes * MINUTE_MS
    }

    pub fn aging_scan_interval(&self) -> Duration {
        Duration::from_secs(self.aging_scan_interval_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
