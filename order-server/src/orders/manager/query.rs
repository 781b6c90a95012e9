//! Read side: single order, lists, audit trail, vehicle history

use super::{OrderError, OrderResult, OrdersManager};
use crate::orders::access::{check_order_access, matches_list, sort_orders};
use shared::models::{Actor, UserRole};
use shared::order::{GetOrdersRequest, Order, OrderStatusChange};

impl OrdersManager {
    /// Region of a calling master; `None` for other roles
    fn caller_region(&self, actor: &Actor) -> OrderResult<Option<i64>> {
        if actor.role != UserRole::Master {
            return Ok(None);
        }
        let user = self
            .storage
            .get_user(actor.user_id)?
            .ok_or(OrderError::UserNotFound(actor.user_id))?;
        Ok(self.storage.user_region(&user)?)
    }

    pub fn get_order(&self, actor: &Actor, order_id: i64) -> OrderResult<Order> {
        let order = self
            .storage
            .get_order(order_id)?
            .ok_or(OrderError::OrderNotFound(order_id))?;
        let region = self.caller_region(actor)?;
        check_order_access(actor, region, &order)?;
        Ok(order)
    }

    /// Orders visible to `actor`, most actionable first
    pub fn get_orders(&self, actor: &Actor, req: &GetOrdersRequest) -> OrderResult<Vec<Order>> {
        let region = self.caller_region(actor)?;
        let mut orders: Vec<Order> = self
            .storage
            .get_all_orders()?
            .into_iter()
            .filter(|order| matches_list(actor, region, req, order))
            .collect();
        sort_orders(&mut orders);
        if let Some(limit) = req.limit {
            orders.truncate(limit);
        }
        Ok(orders)
    }

    /// Audit trail of an order, behind the same gate as the order itself
    pub fn get_status_changes(
        &self,
        actor: &Actor,
        order_id: i64,
    ) -> OrderResult<Vec<OrderStatusChange>> {
        self.get_order(actor, order_id)?;
        Ok(self.storage.get_status_changes(order_id)?)
    }

    /// Orders referencing a vehicle that `actor` may see
    pub fn get_vehicle_orders(&self, actor: &Actor, vehicle_id: i64) -> OrderResult<Vec<Order>> {
        if self.storage.get_vehicle(vehicle_id)?.is_none() {
            return Err(OrderError::VehicleNotFound(vehicle_id));
        }
        let region = self.caller_region(actor)?;
        let mut orders: Vec<Order> = self
            .storage
            .get_vehicle_orders(vehicle_id)?
            .into_iter()
            .filter(|order| check_order_access(actor, region, order).is_ok())
            .collect();
        sort_orders(&mut orders);
        Ok(orders)
    }
}
