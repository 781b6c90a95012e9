//! Order visibility rules
//!
//! Pure functions of (caller, caller region, order). The manager resolves the
//! caller's region once and asks these predicates; nothing here touches
//! storage.

use super::manager::{OrderError, OrderResult};
use shared::models::{Actor, UserRole};
use shared::order::{GetOrdersRequest, Order, OrderStatus};
use std::cmp::Reverse;

/// Single-order visibility
///
/// - ADMIN: always
/// - MASTER: needs a region; never after declining; never when another
///   master holds the order; a foreign-region order only when already
///   assigned to the caller
/// - CUSTOMER / DRIVER: only when attached to the order
pub fn check_order_access(
    actor: &Actor,
    caller_region: Option<i64>,
    order: &Order,
) -> OrderResult<()> {
    let uid = actor.user_id;
    match actor.role {
        UserRole::Admin => Ok(()),
        UserRole::Master => {
            let Some(region_id) = caller_region else {
                return Err(OrderError::Inconsistency(format!(
                    "master {} has no region",
                    uid
                )));
            };
            if order.has_declined(uid) {
                return Err(OrderError::MasterDeclined {
                    order_id: order.id,
                    master_id: uid,
                });
            }
            match order.master_id {
                Some(master_id) if master_id == uid => Ok(()),
                Some(_) => Err(OrderError::Forbidden(format!(
                    "order {} is taken by another master",
                    order.id
                ))),
                None if order.region_id != region_id => {
                    Err(OrderError::ForeignRegion { order_id: order.id })
                }
                None => Ok(()),
            }
        }
        UserRole::Customer | UserRole::Driver => {
            if order.customer_id == Some(uid) || order.driver_id == uid {
                Ok(())
            } else {
                Err(OrderError::Forbidden(format!(
                    "{} {} is not attached to order {}",
                    actor.role, uid, order.id
                )))
            }
        }
    }
}

fn status_allowed(statuses: Option<&[OrderStatus]>, status: OrderStatus) -> bool {
    statuses.is_none_or(|list| list.is_empty() || list.contains(&status))
}

/// List membership by role
///
/// Masters see their own orders plus unassigned CREATED orders of their
/// region. A status filter without CREATED narrows to own orders only.
pub fn matches_list(
    actor: &Actor,
    caller_region: Option<i64>,
    req: &GetOrdersRequest,
    order: &Order,
) -> bool {
    let uid = actor.user_id;
    let statuses = req.statuses.as_deref().filter(|s| !s.is_empty());

    if let Some(vehicle_id) = req.vehicle_id
        && !order.vehicle_ids.contains(&vehicle_id)
    {
        return false;
    }

    match actor.role {
        UserRole::Admin => {
            let party = |filter: Option<i64>, value: Option<i64>| {
                filter.is_none_or(|id| value == Some(id))
            };
            status_allowed(statuses, order.status)
                && party(req.master_id, order.master_id)
                && party(req.customer_id, order.customer_id)
                && party(req.driver_id, Some(order.driver_id))
                && req
                    .region_ids
                    .as_deref()
                    .filter(|ids| !ids.is_empty())
                    .is_none_or(|ids| ids.contains(&order.region_id))
                && req.user_id.is_none_or(|id| order.is_participant(id))
        }
        UserRole::Master => {
            let own = order.master_id == Some(uid);
            let open_in_region = order.status == OrderStatus::Created
                && order.master_id.is_none()
                && caller_region == Some(order.region_id)
                && !order.has_declined(uid);
            match statuses {
                None => own || open_in_region,
                Some(list) if list.contains(&OrderStatus::Created) => {
                    (own && list.contains(&order.status)) || open_in_region
                }
                Some(list) => own && list.contains(&order.status),
            }
        }
        UserRole::Customer | UserRole::Driver => {
            (order.customer_id == Some(uid) || order.driver_id == uid)
                && status_allowed(statuses, order.status)
        }
    }
}

/// Fixed list ordering: status priority, then newest first
pub fn sort_orders(orders: &mut [Order]) {
    orders.sort_by_key(|o| (o.status.priority(), Reverse(o.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    const REGION: i64 = 5;
    const FOREIGN: i64 = 6;

    fn order(id: i64, status: OrderStatus, master: Option<i64>, region_id: i64) -> Order {
        Order {
            id,
            guarantee_uuid: format!("g-{id}"),
            customer_id: Some(10),
            driver_id: 20,
            master_id: master,
            vehicle_ids: vec![100],
            address_id: 1,
            region_id,
            status,
            created_at: 0,
            last_status_update_time: 0,
            declined_master_ids: BTreeSet::new(),
            description: None,
            notes: None,
            urgency: None,
            need_evacuator: false,
            need_mobile_team: false,
        }
    }

    fn master(id: i64) -> Actor {
        Actor::new(id, UserRole::Master)
    }

    #[test]
    fn test_admin_sees_everything() {
        let admin = Actor::new(1, UserRole::Admin);
        let o = order(1, OrderStatus::Accepted, Some(30), FOREIGN);
        assert!(check_order_access(&admin, None, &o).is_ok());
    }

    #[test]
    fn test_master_without_region_is_internal() {
        let o = order(1, OrderStatus::Created, None, REGION);
        let err = check_order_access(&master(30), None, &o).unwrap_err();
        assert!(matches!(err, OrderError::Inconsistency(_)));
    }

    #[test]
    fn test_master_region_rules() {
        let created_here = order(1, OrderStatus::Created, None, REGION);
        let created_foreign = order(2, OrderStatus::Created, None, FOREIGN);
        let mine_foreign = order(3, OrderStatus::Calculating, Some(30), FOREIGN);
        let taken = order(4, OrderStatus::Calculating, Some(31), REGION);

        assert!(check_order_access(&master(30), Some(REGION), &created_here).is_ok());
        assert!(matches!(
            check_order_access(&master(30), Some(REGION), &created_foreign),
            Err(OrderError::ForeignRegion { order_id: 2 })
        ));
        // assignment identity wins over region mismatch
        assert!(check_order_access(&master(30), Some(REGION), &mine_foreign).is_ok());
        assert!(
            check_order_access(&master(30), Some(REGION), &taken)
                .unwrap_err()
                .is_forbidden()
        );
    }

    #[test]
    fn test_declined_master_is_denied() {
        let mut o = order(1, OrderStatus::Created, None, REGION);
        o.declined_master_ids.insert(30);
        assert!(matches!(
            check_order_access(&master(30), Some(REGION), &o),
            Err(OrderError::MasterDeclined { .. })
        ));
        assert!(check_order_access(&master(31), Some(REGION), &o).is_ok());
    }

    #[test]
    fn test_customer_and_driver_need_attachment() {
        let o = order(1, OrderStatus::Reviewing, Some(30), REGION);
        assert!(check_order_access(&Actor::new(10, UserRole::Customer), None, &o).is_ok());
        assert!(check_order_access(&Actor::new(20, UserRole::Driver), None, &o).is_ok());
        assert!(check_order_access(&Actor::new(11, UserRole::Customer), None, &o).is_err());
    }

    #[test]
    fn test_master_list_union() {
        let orders = [
            order(1, OrderStatus::Created, None, REGION),
            order(2, OrderStatus::Created, None, FOREIGN),
            order(3, OrderStatus::Reviewing, Some(30), FOREIGN),
            order(4, OrderStatus::Reviewing, Some(31), REGION),
            order(5, OrderStatus::Completed, Some(30), REGION),
        ];
        let visible = |req: &GetOrdersRequest| -> Vec<i64> {
            orders
                .iter()
                .filter(|o| matches_list(&master(30), Some(REGION), req, o))
                .map(|o| o.id)
                .collect()
        };

        assert_eq!(visible(&GetOrdersRequest::default()), vec![1, 3, 5]);

        let with_created = GetOrdersRequest {
            statuses: Some(vec![OrderStatus::Created, OrderStatus::Reviewing]),
            ..Default::default()
        };
        assert_eq!(visible(&with_created), vec![1, 3]);

        let own_only = GetOrdersRequest {
            statuses: Some(vec![OrderStatus::Completed]),
            ..Default::default()
        };
        assert_eq!(visible(&own_only), vec![5]);
    }

    #[test]
    fn test_admin_filters() {
        let admin = Actor::new(1, UserRole::Admin);
        let a = order(1, OrderStatus::Created, None, REGION);
        let b = order(2, OrderStatus::Accepted, Some(30), FOREIGN);

        let by_master = GetOrdersRequest {
            master_id: Some(30),
            ..Default::default()
        };
        assert!(!matches_list(&admin, None, &by_master, &a));
        assert!(matches_list(&admin, None, &by_master, &b));

        let by_region = GetOrdersRequest {
            region_ids: Some(vec![REGION]),
            ..Default::default()
        };
        assert!(matches_list(&admin, None, &by_region, &a));
        assert!(!matches_list(&admin, None, &by_region, &b));

        let by_user = GetOrdersRequest {
            user_id: Some(20),
            vehicle_id: Some(100),
            ..Default::default()
        };
        assert!(matches_list(&admin, None, &by_user, &a));
    }

    #[test]
    fn test_sort_by_priority_then_recency() {
        let mut orders = vec![
            order(1, OrderStatus::Cancel, None, REGION),
            order(2, OrderStatus::Created, None, REGION),
            order(3, OrderStatus::Accepted, Some(30), REGION),
            order(4, OrderStatus::Created, None, REGION),
            order(5, OrderStatus::Calculating, Some(30), REGION),
        ];
        sort_orders(&mut orders);
        let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![4, 2, 5, 3, 1]);
    }
}
