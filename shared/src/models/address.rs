//! Region / Address Model

use serde::{Deserialize, Serialize};

/// 地区
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Region {
    pub id: i64,
    pub name: String,
}

/// 地址 (每个订单独立创建，不共享)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    pub id: i64,
    pub region_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
}
