//! OrdersManager - 订单工作流引擎
//!
//! 每个入口都显式接收调用者身份 [`Actor`]，不依赖任何请求上下文。
//!
//! # Transition Flow
//!
//! ```text
//! transition(actor, order_id)
//!     ├─ 1. Begin write transaction (redb single writer)
//!     ├─ 2. Load order (OrderNotFound)
//!     ├─ 3. Caller check (Forbidden)
//!     ├─ 4. State check (Conflict)
//!     ├─ 5. Balance / master bookkeeping
//!     ├─ 6. Persist order + append status change row
//!     ├─ 7. Commit transaction
//!     └─ 8. Enqueue notification (after commit, never blocks)
//! ```

mod create;
mod error;
mod query;
mod vehicles;

pub use error::*;

use super::machine::{OrderStateMachine, Transition};
use super::storage::{OrderStorage, STATUS_CHANGE_SEQ};
use crate::auth::CredentialIssuer;
use crate::notify::{Notification, Notifier, message};
use redb::WriteTransaction;
use rust_decimal::Decimal;
use shared::models::{Actor, User};
use shared::order::{Order, OrderStatus, OrderStatusChange};
use shared::util::now_millis;
use std::sync::Arc;

/// Default reservation fee debited on `start_calculation`
pub const DEFAULT_RESERVATION_FEE: i64 = 2000;

/// Tunables of the workflow
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub reservation_fee: Decimal,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            reservation_fee: Decimal::from(DEFAULT_RESERVATION_FEE),
        }
    }
}

/// OrdersManager for order creation, transitions and queries
///
/// The `epoch` field is a unique identifier generated on each startup.
pub struct OrdersManager {
    storage: OrderStorage,
    notifier: Notifier,
    issuer: Arc<dyn CredentialIssuer>,
    settings: WorkflowSettings,
    epoch: String,
}

impl std::fmt::Debug for OrdersManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrdersManager")
            .field("storage", &"<OrderStorage>")
            .field("settings", &self.settings)
            .field("epoch", &self.epoch)
            .finish()
    }
}

impl OrdersManager {
    pub fn new(
        storage: OrderStorage,
        notifier: Notifier,
        issuer: Arc<dyn CredentialIssuer>,
        settings: WorkflowSettings,
    ) -> Self {
        let epoch = uuid::Uuid::new_v4().to_string();
        tracing::info!(epoch = %epoch, fee = %settings.reservation_fee, "OrdersManager started with new epoch");
        Self {
            storage,
            notifier,
            issuer,
            settings,
            epoch,
        }
    }

    pub fn storage(&self) -> &OrderStorage {
        &self.storage
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Server instance epoch
    pub fn epoch(&self) -> &str {
        &self.epoch
    }

    // ========== Transaction helpers ==========

    fn load_order_txn(&self, txn: &WriteTransaction, order_id: i64) -> OrderResult<Order> {
        self.storage
            .get_order_txn(txn, order_id)?
            .ok_or(OrderError::OrderNotFound(order_id))
    }

    fn load_user_txn(&self, txn: &WriteTransaction, user_id: i64) -> OrderResult<User> {
        self.storage
            .get_user_txn(txn, user_id)?
            .ok_or(OrderError::UserNotFound(user_id))
    }

    /// Set status + timestamp, persist the order and append its audit row
    #[allow(clippy::too_many_arguments)]
    fn record_transition(
        &self,
        txn: &WriteTransaction,
        order: &mut Order,
        to: OrderStatus,
        actor: &Actor,
        master_id: Option<i64>,
        comment: Option<String>,
        now: i64,
    ) -> OrderResult<()> {
        order.status = to;
        order.last_status_update_time = now;
        self.storage.store_order(txn, order)?;

        let change = OrderStatusChange {
            id: self.storage.next_id_txn(txn, STATUS_CHANGE_SEQ)?,
            order_id: order.id,
            status: to,
            updated_at: now,
            updated_by: actor.user_id,
            master_id,
            comment,
        };
        self.storage.append_status_change(txn, &change)?;
        Ok(())
    }

    /// Release the attached master: refund the fee and, when returning the
    /// order to CREATED, block that master from taking it again.
    ///
    /// Shared by decline and cancel so the refund happens exactly once.
    fn remove_master_and_refund(
        &self,
        txn: &WriteTransaction,
        order: &mut Order,
        target: OrderStatus,
        actor: &Actor,
        comment: Option<String>,
        now: i64,
    ) -> OrderResult<Option<i64>> {
        let released = order.master_id;
        if target == OrderStatus::Created && released.is_none() {
            return Err(OrderError::NoMaster(order.id));
        }

        if let Some(master_id) = released {
            if target == OrderStatus::Created {
                order.declined_master_ids.insert(master_id);
            }
            let mut master = self.storage.get_user_txn(txn, master_id)?.ok_or_else(|| {
                OrderError::Inconsistency(format!(
                    "order {} references missing master {}",
                    order.id, master_id
                ))
            })?;
            master.balance += self.settings.reservation_fee;
            self.storage.store_user(txn, &master)?;
            order.master_id = None;
        }

        self.record_transition(txn, order, target, actor, released, comment, now)?;
        Ok(released)
    }

    fn notify_status(&self, order_id: i64, recipients: Vec<i64>, text: String) {
        if recipients.is_empty() {
            return;
        }
        self.notifier.send(Notification::StatusChanged {
            order_id,
            recipients,
            text,
        });
    }

    // ========== Transitions ==========

    /// CREATED → CALCULATING: the calling master takes the order and pays the
    /// reservation fee
    pub fn start_calculation(&self, actor: &Actor, order_id: i64) -> OrderResult<Order> {
        let now = now_millis();
        let fee = self.settings.reservation_fee;

        let order = self.storage.transact(|txn| -> OrderResult<Order> {
            let mut order = self.load_order_txn(txn, order_id)?;
            OrderStateMachine::authorize(Transition::StartCalculation, actor, &order)?;

            let mut master = self.load_user_txn(txn, actor.user_id)?;
            // 没有地址的师傅同样视为外区域
            let region_id = self.storage.user_region_txn(txn, &master)?;
            if region_id != Some(order.region_id) {
                return Err(OrderError::ForeignRegion { order_id });
            }
            if order.has_declined(master.id) {
                return Err(OrderError::MasterDeclined {
                    order_id,
                    master_id: master.id,
                });
            }

            let to = OrderStateMachine::check_state(Transition::StartCalculation, &order)?;
            if master.balance < fee {
                return Err(OrderError::InsufficientBalance {
                    required: fee,
                    available: master.balance,
                });
            }

            master.balance -= fee;
            self.storage.store_user(txn, &master)?;
            order.master_id = Some(master.id);
            self.record_transition(txn, &mut order, to, actor, Some(master.id), None, now)?;
            Ok(order)
        })?;

        tracing::info!(order_id, master_id = actor.user_id, fee = %fee, "Order taken into calculation");
        Ok(order)
    }

    /// CALCULATING → REVIEWING
    pub fn send_for_confirmation(&self, actor: &Actor, order_id: i64) -> OrderResult<Order> {
        let now = now_millis();
        let order = self.storage.transact(|txn| -> OrderResult<Order> {
            let mut order = self.load_order_txn(txn, order_id)?;
            OrderStateMachine::authorize(Transition::SendForConfirmation, actor, &order)?;
            let to = OrderStateMachine::check_state(Transition::SendForConfirmation, &order)?;
            let master_id = order.master_id;
            self.record_transition(txn, &mut order, to, actor, master_id, None, now)?;
            Ok(order)
        })?;

        tracing::info!(order_id, master_id = actor.user_id, "Order sent for confirmation");
        let mut recipients: Vec<i64> = order.customer_id.into_iter().collect();
        recipients.push(order.driver_id);
        self.notify_status(order_id, recipients, message::sent_for_confirmation(order_id));
        Ok(order)
    }

    /// REVIEWING → ACCEPTED
    pub fn accept_by_customer(&self, actor: &Actor, order_id: i64) -> OrderResult<Order> {
        let now = now_millis();
        let order = self.storage.transact(|txn| -> OrderResult<Order> {
            let mut order = self.load_order_txn(txn, order_id)?;
            OrderStateMachine::authorize(Transition::AcceptByCustomer, actor, &order)?;
            let to = OrderStateMachine::check_state(Transition::AcceptByCustomer, &order)?;
            let Some(master_id) = order.master_id else {
                return Err(OrderError::Inconsistency(format!(
                    "order {} is {} without a master",
                    order_id, order.status
                )));
            };
            self.record_transition(txn, &mut order, to, actor, Some(master_id), None, now)?;
            Ok(order)
        })?;

        tracing::info!(order_id, customer_id = actor.user_id, "Order accepted by customer");
        let master: Vec<i64> = order.master_id.into_iter().collect();
        self.notify_status(order_id, master, message::accepted_by_customer(order_id));
        Ok(order)
    }

    /// Any non-terminal state → COMPLETED
    pub fn complete_order(&self, actor: &Actor, order_id: i64) -> OrderResult<Order> {
        let now = now_millis();
        let order = self.storage.transact(|txn| -> OrderResult<Order> {
            let mut order = self.load_order_txn(txn, order_id)?;
            OrderStateMachine::authorize(Transition::Complete, actor, &order)?;
            let to = OrderStateMachine::check_state(Transition::Complete, &order)?;
            let master_id = order.master_id;
            self.record_transition(txn, &mut order, to, actor, master_id, None, now)?;
            Ok(order)
        })?;

        tracing::info!(order_id, user_id = actor.user_id, role = %actor.role, "Order completed");

        let by_master = order.master_id == Some(actor.user_id);
        let recipients: Vec<i64> = [order.customer_id, Some(order.driver_id), order.master_id]
            .into_iter()
            .flatten()
            .filter(|id| *id != actor.user_id)
            .collect();
        let text = if by_master {
            message::completed_by_master(order_id)
        } else {
            message::completed_by_client(order_id)
        };
        self.notify_status(order_id, recipients, text);
        Ok(order)
    }

    /// Master releases the order: back to CREATED, fee refunded, master
    /// recorded as declined
    pub fn decline_order_master(
        &self,
        actor: &Actor,
        order_id: i64,
        comment: Option<String>,
    ) -> OrderResult<Order> {
        let now = now_millis();
        let (order, released) = self.storage.transact(|txn| -> OrderResult<(Order, Option<i64>)> {
            let mut order = self.load_order_txn(txn, order_id)?;
            OrderStateMachine::authorize(Transition::Decline, actor, &order)?;
            let to = OrderStateMachine::check_state(Transition::Decline, &order)?;
            let released =
                self.remove_master_and_refund(txn, &mut order, to, actor, comment, now)?;
            Ok((order, released))
        })?;

        tracing::info!(order_id, master_id = ?released, "Master declined order");
        Ok(order)
    }

    /// Any non-terminal state → CANCEL, refunding an attached master
    pub fn cancel_order(
        &self,
        actor: &Actor,
        order_id: i64,
        comment: Option<String>,
    ) -> OrderResult<Order> {
        let now = now_millis();
        let (order, released) = self.storage.transact(|txn| -> OrderResult<(Order, Option<i64>)> {
            let mut order = self.load_order_txn(txn, order_id)?;
            OrderStateMachine::authorize(Transition::Cancel, actor, &order)?;
            let to = OrderStateMachine::check_state(Transition::Cancel, &order)?;
            let released =
                self.remove_master_and_refund(txn, &mut order, to, actor, comment, now)?;
            Ok((order, released))
        })?;

        tracing::info!(order_id, user_id = actor.user_id, released_master = ?released, "Order cancelled");
        Ok(order)
    }
}

#[cfg(test)]
mod tests;
