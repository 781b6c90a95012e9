//! Order aggregate and its audit trail

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ============================================================================
// Status
// ============================================================================

/// 订单状态
///
/// `CREATED → CALCULATING → REVIEWING → ACCEPTED → COMPLETED`, plus `CANCEL`
/// from any non-terminal state. `COMPLETED` and `CANCEL` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// 新订单，等待维修站接单
    Created,
    /// 维修站已接单，正在报价
    Calculating,
    /// 报价已发送，等待客户确认
    Reviewing,
    /// 客户已确认
    Accepted,
    /// 已完成
    Completed,
    /// 已取消
    Cancel,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Created,
        OrderStatus::Calculating,
        OrderStatus::Reviewing,
        OrderStatus::Accepted,
        OrderStatus::Completed,
        OrderStatus::Cancel,
    ];

    /// List ordering rank: most actionable first
    pub const fn priority(&self) -> u8 {
        match self {
            OrderStatus::Created => 1,
            OrderStatus::Calculating => 2,
            OrderStatus::Reviewing => 3,
            OrderStatus::Accepted => 4,
            OrderStatus::Completed => 5,
            OrderStatus::Cancel => 6,
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancel)
    }

    /// States in which a master is attached
    pub const fn is_in_progress(&self) -> bool {
        matches!(
            self,
            OrderStatus::Calculating | OrderStatus::Reviewing | OrderStatus::Accepted
        )
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::Calculating => "CALCULATING",
            OrderStatus::Reviewing => "REVIEWING",
            OrderStatus::Accepted => "ACCEPTED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancel => "CANCEL",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Order
// ============================================================================

/// Order aggregate root
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: i64,
    /// Client-supplied idempotency token
    pub guarantee_uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<i64>,
    pub driver_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_id: Option<i64>,
    pub vehicle_ids: Vec<i64>,
    pub address_id: i64,
    /// Region of `address_id`; the address is never edited after creation
    pub region_id: i64,
    pub status: OrderStatus,
    pub created_at: i64,
    pub last_status_update_time: i64,
    /// Masters who released this order; append-only
    #[serde(default)]
    pub declined_master_ids: BTreeSet<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
    #[serde(default)]
    pub need_evacuator: bool,
    #[serde(default)]
    pub need_mobile_team: bool,
}

impl Order {
    pub fn has_declined(&self, master_id: i64) -> bool {
        self.declined_master_ids.contains(&master_id)
    }

    /// Caller is attached as customer, driver or master
    pub fn is_participant(&self, user_id: i64) -> bool {
        self.customer_id == Some(user_id)
            || self.driver_id == user_id
            || self.master_id == Some(user_id)
    }
}

/// 状态变更记录 (只追加，不修改)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderStatusChange {
    pub id: i64,
    pub order_id: i64,
    pub status: OrderStatus,
    pub updated_at: i64,
    pub updated_by: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        let mut statuses = OrderStatus::ALL.to_vec();
        statuses.reverse();
        statuses.sort_by_key(|s| s.priority());
        assert_eq!(statuses, OrderStatus::ALL.to_vec());
    }

    #[test]
    fn test_terminal_and_progress() {
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Cancel.is_terminal());
        assert!(!OrderStatus::Accepted.is_terminal());
        assert!(OrderStatus::Reviewing.is_in_progress());
        assert!(!OrderStatus::Created.is_in_progress());
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Cancel).unwrap(),
            "\"CANCEL\""
        );
        let status: OrderStatus = serde_json::from_str("\"CALCULATING\"").unwrap();
        assert_eq!(status, OrderStatus::Calculating);
    }

    #[test]
    fn test_declined_set_roundtrips_as_array() {
        let json = serde_json::json!({
            "id": 1,
            "guarantee_uuid": "g",
            "driver_id": 2,
            "vehicle_ids": [],
            "address_id": 3,
            "region_id": 5,
            "status": "CREATED",
            "created_at": 0,
            "last_status_update_time": 0,
            "declined_master_ids": [9, 7, 9]
        });
        let order: Order = serde_json::from_value(json).unwrap();
        assert!(order.has_declined(7));
        assert!(order.has_declined(9));
        assert_eq!(order.declined_master_ids.len(), 2);
        assert!(!order.need_evacuator);
    }
}
