//! Order subsystem
//!
//! - [`storage`]: redb entity store
//! - [`machine`]: transition table
//! - [`access`]: visibility predicates
//! - [`manager`]: creation, transitions and queries
//! - [`sweeper`] / [`aging`]: background reconciliation

pub mod access;
pub mod aging;
pub mod machine;
pub mod manager;
pub mod storage;
pub mod sweeper;

pub use aging::AgingAlertScheduler;
pub use machine::{OrderStateMachine, Transition};
pub use manager::{OrderError, OrderResult, OrdersManager, WorkflowSettings};
pub use storage::{OrderStorage, StorageError};
pub use sweeper::{OrderSweeper, SweepPolicy, SweepReport};
