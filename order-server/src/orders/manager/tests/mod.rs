use super::*;
use crate::auth::{JwtConfig, JwtService};
use crate::notify::NotificationReceiver;
use crate::orders::storage::{ADDRESS_SEQ, USER_SEQ};
use shared::models::{Address, Region, UserRole, VehicleType};
use shared::order::{CreateOrderRequest, VehicleInput};

const REGION: i64 = 5;
const FOREIGN_REGION: i64 = 6;

fn test_jwt() -> JwtService {
    JwtService::with_config(JwtConfig {
        secret: "test-secret-key-that-is-long-enough-for-hs256".into(),
        expiration_minutes: 60,
        issuer: "order-server".into(),
        audience: "order-clients".into(),
    })
}

fn fee() -> Decimal {
    Decimal::from(DEFAULT_RESERVATION_FEE)
}

/// Manager on an in-memory store with regions 5 and 6
fn create_test_manager() -> (OrdersManager, NotificationReceiver) {
    let storage = OrderStorage::open_in_memory().unwrap();
    storage
        .transact(|txn| -> crate::orders::storage::StorageResult<()> {
            storage.store_region(txn, &Region { id: REGION, name: "North".into() })?;
            storage.store_region(txn, &Region { id: FOREIGN_REGION, name: "South".into() })
        })
        .unwrap();
    let (notifier, rx) = Notifier::channel();
    let manager = OrdersManager::new(
        storage,
        notifier,
        Arc::new(test_jwt()),
        WorkflowSettings::default(),
    );
    (manager, rx)
}

/// Register a user, optionally with an address in `region`
fn add_user(manager: &OrdersManager, role: UserRole, region: Option<i64>, balance: i64) -> Actor {
    let storage = manager.storage();
    let id = storage
        .transact(|txn| -> crate::orders::storage::StorageResult<i64> {
            let address_id = match region {
                Some(region_id) => {
                    let address = Address {
                        id: storage.next_id_txn(txn, ADDRESS_SEQ)?,
                        region_id,
                        city: None,
                        street: None,
                    };
                    storage.store_address(txn, &address)?;
                    Some(address.id)
                }
                None => None,
            };
            let user = User {
                id: storage.next_id_txn(txn, USER_SEQ)?,
                role,
                name: None,
                email: None,
                phone: None,
                balance: Decimal::from(balance),
                address_id,
                notification_chats: vec![],
                registration_date: 0,
            };
            storage.store_user(txn, &user)?;
            Ok(user.id)
        })
        .unwrap();
    Actor::new(id, role)
}

fn add_master(manager: &OrdersManager, region: i64, balance: i64) -> Actor {
    add_user(manager, UserRole::Master, Some(region), balance)
}

fn balance(manager: &OrdersManager, user_id: i64) -> Decimal {
    manager.storage().get_user(user_id).unwrap().unwrap().balance
}

fn order_of(manager: &OrdersManager, order_id: i64) -> Order {
    manager.storage().get_order(order_id).unwrap().unwrap()
}

fn truck(brand: &str, vin: Option<&str>, number: Option<&str>) -> VehicleInput {
    VehicleInput {
        id: None,
        vehicle_type: VehicleType::Truck,
        brand: Some(brand.into()),
        model: None,
        vin: vin.map(String::from),
        number: number.map(String::from),
    }
}

fn create_request(guarantee: &str) -> CreateOrderRequest {
    CreateOrderRequest {
        guarantee_uuid: guarantee.into(),
        driver_phone: Some("+79990001122".into()),
        region_id: REGION,
        city: Some("Tver".into()),
        description: Some("Engine stalls".into()),
        ..Default::default()
    }
}

/// Anonymous order in region 5; returns the order id
fn create_order(manager: &OrdersManager, guarantee: &str) -> i64 {
    manager
        .create_order(None, create_request(guarantee))
        .unwrap()
        .order_id
}

fn drain(rx: &mut NotificationReceiver) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}

mod test_concurrency;
mod test_create;
