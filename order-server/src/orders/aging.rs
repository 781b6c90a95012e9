//! Aging alerts for orders nobody picked up

use super::storage::{AgingAlert, OrderStorage, StorageResult};
use crate::notify::{Notification, Notifier};
use crate::utils::report_error;
use shared::order::OrderStatus;
use shared::util::{MINUTE_MS, now_millis};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// 订单超时提醒
///
/// CREATED 状态超过阈值的订单向管理员发送一次提醒；已发送的记录在
/// `aging_alerts` 表中，重复扫描不会再次通知。
pub struct AgingAlertScheduler {
    storage: OrderStorage,
    notifier: Notifier,
    threshold_ms: i64,
    interval: Duration,
    shutdown: CancellationToken,
}

impl AgingAlertScheduler {
    pub fn new(
        storage: OrderStorage,
        notifier: Notifier,
        threshold_ms: i64,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            storage,
            notifier,
            threshold_ms,
            interval,
            shutdown,
        }
    }

    pub async fn run(self) {
        tracing::info!(
            threshold_minutes = self.threshold_ms / MINUTE_MS,
            "Aging alert scheduler started"
        );
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Aging alert scheduler received shutdown signal");
                    return;
                }
            }
            if let Err(e) = self.scan_once(now_millis()) {
                report_error("aging.scan", None, &e);
            }
        }
    }

    /// Alert on every overdue CREATED order not alerted yet. Returns the
    /// number of alerts sent.
    pub fn scan_once(&self, now: i64) -> StorageResult<usize> {
        let mut sent = 0;
        for order in self.storage.get_all_orders()? {
            // 以进入 CREATED 的时间计算 (退回的订单重新计时)
            if order.status != OrderStatus::Created
                || now - order.last_status_update_time <= self.threshold_ms
            {
                continue;
            }
            if self.storage.get_aging_alert(order.id)?.is_some() {
                continue;
            }

            let alert = AgingAlert {
                order_id: order.id,
                status_update_time: order.last_status_update_time,
                sent_at: now,
            };
            let recorded = self
                .storage
                .transact(|txn| self.storage.record_aging_alert(txn, &alert))?;
            if recorded {
                tracing::info!(order_id = order.id, "Order aging alert raised");
                self.notifier.send(Notification::OrderAging {
                    order_id: order.id,
                    minutes: self.threshold_ms / MINUTE_MS,
                });
                sent += 1;
            }
        }
        Ok(sent)
    }
}
