//! Directory models: users, regions, addresses, vehicles

pub mod address;
pub mod user;
pub mod vehicle;

pub use address::{Address, Region};
pub use user::{Actor, User, UserRole};
pub use vehicle::{Vehicle, VehicleType};
