//! 订单对账调度器
//!
//! 周期扫描卡住的订单并通过正常的工作流入口强制迁移：
//! - CREATED 超过阈值 → `cancel_order`
//! - CALCULATING / REVIEWING / ACCEPTED 超过阈值 → `complete_order`
//!
//! 以系统管理员身份执行；单个订单失败只上报，不中断本轮扫描。

use super::manager::OrdersManager;
use crate::utils::report_error;
use shared::models::Actor;
use shared::order::OrderStatus;
use shared::util::now_millis;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Comment attached to sweep cancellations
pub const STALE_CREATED_COMMENT: &str = "Order not processed within 48 hours";

/// Sweep thresholds
#[derive(Debug, Clone, Copy)]
pub struct SweepPolicy {
    pub stale_created_ms: i64,
    pub stale_in_progress_ms: i64,
    pub interval: Duration,
}

/// One sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub cancelled: usize,
    pub completed: usize,
    pub failed: usize,
}

/// 对账调度器
///
/// 注册为 `TaskKind::Periodic`。
pub struct OrderSweeper {
    orders: Arc<OrdersManager>,
    system: Actor,
    policy: SweepPolicy,
    shutdown: CancellationToken,
}

impl OrderSweeper {
    pub fn new(
        orders: Arc<OrdersManager>,
        system: Actor,
        policy: SweepPolicy,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            orders,
            system,
            policy,
            shutdown,
        }
    }

    /// 主循环
    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.policy.interval.as_secs(),
            "Order sweeper started"
        );
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.policy.interval) => {}
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Order sweeper received shutdown signal");
                    return;
                }
            }
            let report = self.sweep_once(now_millis());
            if report != SweepReport::default() {
                tracing::info!(
                    cancelled = report.cancelled,
                    completed = report.completed,
                    failed = report.failed,
                    "Order sweep finished"
                );
            }
        }
    }

    /// Run one pass as of `now`
    pub fn sweep_once(&self, now: i64) -> SweepReport {
        let mut report = SweepReport::default();
        let orders = match self.orders.storage().get_all_orders() {
            Ok(orders) => orders,
            Err(e) => {
                report_error("sweep.load", None, &e);
                return report;
            }
        };

        for order in orders {
            let age = now - order.last_status_update_time;
            match order.status {
                OrderStatus::Created if age > self.policy.stale_created_ms => {
                    match self.orders.cancel_order(
                        &self.system,
                        order.id,
                        Some(STALE_CREATED_COMMENT.to_string()),
                    ) {
                        Ok(_) => report.cancelled += 1,
                        Err(e) => {
                            report_error("sweep.cancel", Some(order.id), &e);
                            report.failed += 1;
                        }
                    }
                }
                status if status.is_in_progress() && age > self.policy.stale_in_progress_ms => {
                    match self.orders.complete_order(&self.system, order.id) {
                        Ok(_) => report.completed += 1,
                        Err(e) => {
                            report_error("sweep.complete", Some(order.id), &e);
                            report.failed += 1;
                        }
                    }
                }
                _ => {}
            }
        }
        report
    }
}
