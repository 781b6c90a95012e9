//! User Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 用户角色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// 平台管理员
    Admin,
    /// 维修站 (master)
    Master,
    /// 车队客户
    Customer,
    /// 司机
    Driver,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::Master => "MASTER",
            UserRole::Customer => "CUSTOMER",
            UserRole::Driver => "DRIVER",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(UserRole::Admin),
            "MASTER" => Ok(UserRole::Master),
            "CUSTOMER" => Ok(UserRole::Customer),
            "DRIVER" => Ok(UserRole::Driver),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// User record
///
/// Drivers created anonymously by order creation are ordinary users with
/// role `DRIVER` and no email.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub role: UserRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Master balance; reservation fees are debited from and refunded to it
    pub balance: Decimal,
    /// Registered address (masters are region-scoped through it)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_id: Option<i64>,
    /// Linked chat ids for push notifications
    #[serde(default)]
    pub notification_chats: Vec<i64>,
    pub registration_date: i64,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Identity of the caller, passed explicitly into every core entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub role: UserRole,
}

impl Actor {
    pub fn new(user_id: i64, role: UserRole) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serde() {
        assert_eq!(
            serde_json::to_string(&UserRole::Master).unwrap(),
            "\"MASTER\""
        );
        let role: UserRole = serde_json::from_str("\"DRIVER\"").unwrap();
        assert_eq!(role, UserRole::Driver);
        assert_eq!("CUSTOMER".parse::<UserRole>(), Ok(UserRole::Customer));
        assert!("GUEST".parse::<UserRole>().is_err());
    }
}
