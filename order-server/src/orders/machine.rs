//! Order state machine
//!
//! The full (transition, caller, state) matrix lives in [`TransitionRule`]
//! so it can be reviewed and tested in one place. The manager asks
//! [`OrderStateMachine::authorize`] who may call, then
//! [`OrderStateMachine::check_state`] what the current state permits; both
//! must pass.
//!
//! | Transition | From | To | Caller |
//! |---|---|---|---|
//! | start_calculation | CREATED | CALCULATING | any MASTER (region/declined checked by manager) |
//! | send_for_confirmation | CALCULATING | REVIEWING | assigned master |
//! | accept_by_customer | REVIEWING | ACCEPTED | order customer |
//! | complete | any non-terminal | COMPLETED | customer, driver, assigned master, admin |
//! | decline | CALCULATING, REVIEWING, ACCEPTED | CREATED | assigned master, admin |
//! | cancel | any non-terminal | CANCEL | order customer, admin (never a master) |

use super::manager::OrderError;
use shared::models::{Actor, UserRole};
use shared::order::{Order, OrderStatus};
use std::fmt;

const NON_TERMINAL: &[OrderStatus] = &[
    OrderStatus::Created,
    OrderStatus::Calculating,
    OrderStatus::Reviewing,
    OrderStatus::Accepted,
];

const WITH_MASTER: &[OrderStatus] = &[
    OrderStatus::Calculating,
    OrderStatus::Reviewing,
    OrderStatus::Accepted,
];

/// Workflow transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    StartCalculation,
    SendForConfirmation,
    AcceptByCustomer,
    Complete,
    /// 指派的师傅或管理员可在任何挂有师傅的状态下退回 (包括 REVIEWING/ACCEPTED)
    Decline,
    Cancel,
}

impl Transition {
    pub const ALL: [Transition; 6] = [
        Transition::StartCalculation,
        Transition::SendForConfirmation,
        Transition::AcceptByCustomer,
        Transition::Complete,
        Transition::Decline,
        Transition::Cancel,
    ];

    pub fn rule(&self) -> TransitionRule {
        match self {
            Transition::StartCalculation => TransitionRule {
                from: &[OrderStatus::Created],
                to: OrderStatus::Calculating,
                caller: CallerRule::AnyMaster,
            },
            Transition::SendForConfirmation => TransitionRule {
                from: &[OrderStatus::Calculating],
                to: OrderStatus::Reviewing,
                caller: CallerRule::AssignedMaster,
            },
            Transition::AcceptByCustomer => TransitionRule {
                from: &[OrderStatus::Reviewing],
                to: OrderStatus::Accepted,
                caller: CallerRule::OrderCustomer,
            },
            Transition::Complete => TransitionRule {
                from: NON_TERMINAL,
                to: OrderStatus::Completed,
                caller: CallerRule::ParticipantOrAdmin,
            },
            Transition::Decline => TransitionRule {
                from: WITH_MASTER,
                to: OrderStatus::Created,
                caller: CallerRule::AssignedMasterOrAdmin,
            },
            Transition::Cancel => TransitionRule {
                from: NON_TERMINAL,
                to: OrderStatus::Cancel,
                caller: CallerRule::CustomerOrAdmin,
            },
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Transition::StartCalculation => "start_calculation",
            Transition::SendForConfirmation => "send_for_confirmation",
            Transition::AcceptByCustomer => "accept_by_customer",
            Transition::Complete => "complete_order",
            Transition::Decline => "decline_order_master",
            Transition::Cancel => "cancel_order",
        };
        f.write_str(name)
    }
}

/// Who may trigger a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerRule {
    /// Any caller with role MASTER
    AnyMaster,
    /// Only `order.master`
    AssignedMaster,
    /// Only `order.customer`
    OrderCustomer,
    /// `order.customer`, `order.driver`, `order.master`, or an admin
    ParticipantOrAdmin,
    /// `order.master` or an admin
    AssignedMasterOrAdmin,
    /// `order.customer` or an admin; masters never
    CustomerOrAdmin,
}

#[derive(Debug, Clone, Copy)]
pub struct TransitionRule {
    pub from: &'static [OrderStatus],
    pub to: OrderStatus,
    pub caller: CallerRule,
}

pub struct OrderStateMachine;

impl OrderStateMachine {
    /// Whether `actor` may trigger `transition` on `order`, ignoring state
    pub fn is_allowed_caller(transition: Transition, actor: &Actor, order: &Order) -> bool {
        let uid = actor.user_id;
        match transition.rule().caller {
            CallerRule::AnyMaster => actor.role == UserRole::Master,
            CallerRule::AssignedMaster => {
                actor.role == UserRole::Master && order.master_id == Some(uid)
            }
            CallerRule::OrderCustomer => order.customer_id == Some(uid),
            CallerRule::ParticipantOrAdmin => actor.is_admin() || order.is_participant(uid),
            CallerRule::AssignedMasterOrAdmin => actor.is_admin() || order.master_id == Some(uid),
            CallerRule::CustomerOrAdmin => {
                actor.role != UserRole::Master
                    && (actor.is_admin() || order.customer_id == Some(uid))
            }
        }
    }

    /// Caller check; fails with a Forbidden-class error
    pub fn authorize(transition: Transition, actor: &Actor, order: &Order) -> Result<(), OrderError> {
        if Self::is_allowed_caller(transition, actor, order) {
            Ok(())
        } else {
            Err(OrderError::Forbidden(format!(
                "{} {} may not {} on order {}",
                actor.role, actor.user_id, transition, order.id
            )))
        }
    }

    /// State check; returns the target status or a Conflict-class error
    pub fn check_state(transition: Transition, order: &Order) -> Result<OrderStatus, OrderError> {
        let rule = transition.rule();
        if rule.from.contains(&order.status) {
            return Ok(rule.to);
        }
        if order.status.is_terminal() {
            return Err(OrderError::Terminal {
                order_id: order.id,
                status: order.status,
            });
        }
        if transition == Transition::Decline {
            return Err(OrderError::NoMaster(order.id));
        }
        Err(OrderError::StatusConflict {
            order_id: order.id,
            status: order.status,
            expected: rule
                .from
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join("|"),
        })
    }

    /// Transitions `actor` could trigger on `order` right now
    pub fn available(actor: &Actor, order: &Order) -> Vec<Transition> {
        Transition::ALL
            .into_iter()
            .filter(|t| Self::is_allowed_caller(*t, actor, order))
            .filter(|t| Self::check_state(*t, order).is_ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    const CUSTOMER: i64 = 10;
    const DRIVER: i64 = 20;
    const MASTER: i64 = 30;
    const OTHER_MASTER: i64 = 31;
    const ADMIN: i64 = 1;

    fn order(status: OrderStatus, master: Option<i64>) -> Order {
        Order {
            id: 100,
            guarantee_uuid: "g".into(),
            customer_id: Some(CUSTOMER),
            driver_id: DRIVER,
            master_id: master,
            vehicle_ids: vec![],
            address_id: 1,
            region_id: 5,
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

    fn actor(id: i64, role: UserRole) -> Actor {
        Actor::new(id, role)
    }

    #[test]
    fn test_happy_path_targets() {
        let o = order(OrderStatus::Created, None);
        assert_eq!(
            OrderStateMachine::check_state(Transition::StartCalculation, &o).unwrap(),
            OrderStatus::Calculating
        );
        let o = order(OrderStatus::Calculating, Some(MASTER));
        assert_eq!(
            OrderStateMachine::check_state(Transition::SendForConfirmation, &o).unwrap(),
            OrderStatus::Reviewing
        );
        let o = order(OrderStatus::Reviewing, Some(MASTER));
        assert_eq!(
            OrderStateMachine::check_state(Transition::AcceptByCustomer, &o).unwrap(),
            OrderStatus::Accepted
        );
        let o = order(OrderStatus::Accepted, Some(MASTER));
        assert_eq!(
            OrderStateMachine::check_state(Transition::Complete, &o).unwrap(),
            OrderStatus::Completed
        );
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        for status in [OrderStatus::Completed, OrderStatus::Cancel] {
            let o = order(status, None);
            for t in Transition::ALL {
                let err = OrderStateMachine::check_state(t, &o).unwrap_err();
                assert!(matches!(err, OrderError::Terminal { .. }), "{t} from {status}");
            }
        }
    }

    #[test]
    fn test_start_calculation_requires_created() {
        let o = order(OrderStatus::Calculating, Some(OTHER_MASTER));
        let err = OrderStateMachine::check_state(Transition::StartCalculation, &o).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_decline_without_master_is_conflict() {
        let o = order(OrderStatus::Created, None);
        let err = OrderStateMachine::check_state(Transition::Decline, &o).unwrap_err();
        assert!(matches!(err, OrderError::NoMaster(100)));
    }

    #[test]
    fn test_decline_from_every_state_with_master() {
        for status in [
            OrderStatus::Calculating,
            OrderStatus::Reviewing,
            OrderStatus::Accepted,
        ] {
            let o = order(status, Some(MASTER));
            assert_eq!(
                OrderStateMachine::check_state(Transition::Decline, &o).unwrap(),
                OrderStatus::Created
            );
            let decline = |a: Actor| OrderStateMachine::authorize(Transition::Decline, &a, &o);
            assert!(decline(actor(MASTER, UserRole::Master)).is_ok());
            assert!(decline(actor(ADMIN, UserRole::Admin)).is_ok());
            assert!(decline(actor(OTHER_MASTER, UserRole::Master)).unwrap_err().is_forbidden());
        }
    }

    #[test]
    fn test_caller_matrix() {
        let o = order(OrderStatus::Reviewing, Some(MASTER));
        let customer = actor(CUSTOMER, UserRole::Customer);
        let driver = actor(DRIVER, UserRole::Driver);
        let master = actor(MASTER, UserRole::Master);
        let other = actor(OTHER_MASTER, UserRole::Master);
        let admin = actor(ADMIN, UserRole::Admin);

        let allowed = |t, a: &Actor| OrderStateMachine::is_allowed_caller(t, a, &o);

        assert!(allowed(Transition::StartCalculation, &other));
        assert!(!allowed(Transition::StartCalculation, &customer));

        assert!(allowed(Transition::SendForConfirmation, &master));
        assert!(!allowed(Transition::SendForConfirmation, &other));
        assert!(!allowed(Transition::SendForConfirmation, &admin));

        assert!(allowed(Transition::AcceptByCustomer, &customer));
        assert!(!allowed(Transition::AcceptByCustomer, &driver));
        assert!(!allowed(Transition::AcceptByCustomer, &master));

        for a in [&customer, &driver, &master, &admin] {
            assert!(allowed(Transition::Complete, a));
        }
        assert!(!allowed(Transition::Complete, &other));

        assert!(allowed(Transition::Decline, &master));
        assert!(allowed(Transition::Decline, &admin));
        assert!(!allowed(Transition::Decline, &customer));
        assert!(!allowed(Transition::Decline, &other));

        assert!(allowed(Transition::Cancel, &customer));
        assert!(allowed(Transition::Cancel, &admin));
        assert!(!allowed(Transition::Cancel, &master));
        assert!(!allowed(Transition::Cancel, &driver));
    }

    #[test]
    fn test_authorize_is_forbidden_class() {
        let o = order(OrderStatus::Calculating, Some(MASTER));
        let err = OrderStateMachine::authorize(
            Transition::SendForConfirmation,
            &actor(OTHER_MASTER, UserRole::Master),
            &o,
        )
        .unwrap_err();
        assert!(err.is_forbidden());
    }

    #[test]
    fn test_available_transitions() {
        let o = order(OrderStatus::Calculating, Some(MASTER));
        let got = OrderStateMachine::available(&actor(MASTER, UserRole::Master), &o);
        assert_eq!(
            got,
            vec![
                Transition::SendForConfirmation,
                Transition::Complete,
                Transition::Decline
            ]
        );
        let got = OrderStateMachine::available(&actor(CUSTOMER, UserRole::Customer), &o);
        assert_eq!(got, vec![Transition::Complete, Transition::Cancel]);
    }
}
