//! 后台任务管理
//!
//! 统一管理所有后台任务的注册、启动和关闭。
//!
//! # 任务类型
//!
//! - [`TaskKind::Worker`] - 长期后台工作者 (通知投递)
//! - [`TaskKind::Periodic`] - 定时任务 (对账、超时提醒)

use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// 任务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// 长期后台工作者
    Worker,
    /// 定时任务
    Periodic,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Worker => write!(f, "Worker"),
            TaskKind::Periodic => write!(f, "Periodic"),
        }
    }
}

struct RegisteredTask {
    name: &'static str,
    kind: TaskKind,
    handle: JoinHandle<()>,
}

/// 后台任务管理器
///
/// ```ignore
/// let mut tasks = BackgroundTasks::new();
/// let token = tasks.shutdown_token();
/// tasks.spawn("order_sweeper", TaskKind::Periodic, sweeper.run());
/// tasks.shutdown().await;
/// ```
pub struct BackgroundTasks {
    tasks: Vec<RegisteredTask>,
    /// 全局取消令牌
    shutdown: CancellationToken,
}

fn panic_message(panic_info: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// 获取取消令牌（用于任务内部监听 shutdown 信号）
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// 注册并启动一个后台任务
    ///
    /// 任务会被包装以捕获 panic。在 shutdown 之前退出的任务记录为异常。
    pub fn spawn<F>(&mut self, name: &'static str, kind: TaskKind, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let token = self.shutdown.clone();
        let wrapped_future = async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(()) if token.is_cancelled() => {
                    tracing::debug!(task = %name, kind = %kind, "Background task stopped");
                }
                Ok(()) => {
                    tracing::warn!(task = %name, kind = %kind, "Background task completed unexpectedly");
                }
                Err(panic_info) => {
                    tracing::error!(
                        task = %name,
                        kind = %kind,
                        panic = %panic_message(panic_info.as_ref()),
                        "Background task panicked"
                    );
                }
            }
        };

        let handle = tokio::spawn(wrapped_future);
        tracing::debug!(task = %name, kind = %kind, "Registered background task");
        self.tasks.push(RegisteredTask { name, kind, handle });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// 打印任务摘要
    pub fn log_summary(&self) {
        let worker = self
            .tasks
            .iter()
            .filter(|t| t.kind == TaskKind::Worker)
            .count();
        tracing::info!(
            "Background tasks registered: {} total (Worker: {}, Periodic: {})",
            self.tasks.len(),
            worker,
            self.tasks.len() - worker
        );
    }

    /// 返回已经退出的任务数量
    pub fn finished_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.handle.is_finished()).count()
    }

    /// Graceful shutdown - 取消所有任务并等待完成
    pub async fn shutdown(self) {
        tracing::info!("Shutting down {} background tasks...", self.tasks.len());
        self.shutdown.cancel();

        for task in self.tasks {
            match task.handle.await {
                Ok(()) => tracing::debug!(task = %task.name, "Task completed"),
                Err(e) if e.is_cancelled() => tracing::debug!(task = %task.name, "Task cancelled"),
                Err(e) => tracing::error!(task = %task.name, error = ?e, "Task join failed"),
            }
        }

        tracing::info!("All background tasks stopped");
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}
