//! Order creation flow

use super::{OrderError, OrderResult, OrdersManager};
use crate::notify::Notification;
use crate::orders::storage::{ADDRESS_SEQ, ORDER_SEQ, STATUS_CHANGE_SEQ, USER_SEQ, VEHICLE_SEQ};
use redb::WriteTransaction;
use rust_decimal::Decimal;
use shared::models::{Actor, Address, User, UserRole, Vehicle};
use shared::order::{
    CreateOrderRequest, CreateOrderResponse, Order, OrderStatus, OrderStatusChange, VehicleInput,
};
use shared::util::now_millis;
use std::collections::BTreeSet;
use validator::Validate;

/// Result of the creation transaction
struct Created {
    order: Order,
    driver: User,
    /// Order already existed for this guarantee token
    replay: bool,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

impl OrdersManager {
    /// Create an order, or return the existing one for a repeated guarantee
    /// token.
    ///
    /// `caller` is `None` for anonymous submissions; the response then carries
    /// a one-time credential for the driver.
    pub fn create_order(
        &self,
        caller: Option<&Actor>,
        req: CreateOrderRequest,
    ) -> OrderResult<CreateOrderResponse> {
        req.validate()
            .map_err(|e| OrderError::Validation(e.to_string()))?;
        let now = now_millis();

        let created = self.storage.transact(|txn| -> OrderResult<Created> {
            if let Some(existing_id) = self
                .storage
                .find_order_by_guarantee_txn(txn, &req.guarantee_uuid)?
            {
                let order = self.load_order_txn(txn, existing_id)?;
                let driver = self.load_user_txn(txn, order.driver_id)?;
                return Ok(Created {
                    order,
                    driver,
                    replay: true,
                });
            }

            let driver = self.resolve_driver_txn(txn, caller, &req, now)?;
            let customer_id = caller
                .filter(|a| a.role == UserRole::Customer)
                .map(|a| a.user_id);

            if self.storage.get_region_txn(txn, req.region_id)?.is_none() {
                return Err(OrderError::RegionNotFound(req.region_id));
            }
            let address = Address {
                id: self.storage.next_id_txn(txn, ADDRESS_SEQ)?,
                region_id: req.region_id,
                city: non_blank(&req.city),
                street: non_blank(&req.street),
            };
            self.storage.store_address(txn, &address)?;

            let mut vehicle_ids = Vec::with_capacity(req.vehicles.len());
            for input in &req.vehicles {
                let vehicle_id = self.resolve_vehicle_txn(txn, input, customer_id, driver.id)?;
                if !vehicle_ids.contains(&vehicle_id) {
                    vehicle_ids.push(vehicle_id);
                }
            }

            let order = Order {
                id: self.storage.next_id_txn(txn, ORDER_SEQ)?,
                guarantee_uuid: req.guarantee_uuid.clone(),
                customer_id,
                driver_id: driver.id,
                master_id: None,
                vehicle_ids,
                address_id: address.id,
                region_id: address.region_id,
                status: OrderStatus::Created,
                created_at: now,
                last_status_update_time: now,
                declined_master_ids: BTreeSet::new(),
                description: non_blank(&req.description),
                notes: non_blank(&req.notes),
                urgency: non_blank(&req.urgency),
                need_evacuator: req.need_evacuator,
                need_mobile_team: req.need_mobile_team,
            };
            self.storage.store_order(txn, &order)?;
            self.storage
                .index_guarantee(txn, &order.guarantee_uuid, order.id)?;

            let change = OrderStatusChange {
                id: self.storage.next_id_txn(txn, STATUS_CHANGE_SEQ)?,
                order_id: order.id,
                status: OrderStatus::Created,
                updated_at: now,
                updated_by: caller.map(|a| a.user_id).unwrap_or(driver.id),
                master_id: None,
                comment: None,
            };
            self.storage.append_status_change(txn, &change)?;

            Ok(Created {
                order,
                driver,
                replay: false,
            })
        })?;

        let driver_token = match caller {
            Some(_) => None,
            None => Some(
                self.issuer
                    .issue_access_token(&created.driver)
                    .map_err(|e| OrderError::Credential(e.to_string()))?,
            ),
        };

        if created.replay {
            tracing::info!(
                order_id = created.order.id,
                guarantee_uuid = %created.order.guarantee_uuid,
                "Duplicate create request, returning existing order"
            );
        } else {
            tracing::info!(
                order_id = created.order.id,
                driver_id = created.driver.id,
                region_id = created.order.region_id,
                vehicles = created.order.vehicle_ids.len(),
                "Order created"
            );
            self.notifier.send(Notification::OrderCreated {
                order_id: created.order.id,
            });
        }

        Ok(CreateOrderResponse {
            order_id: created.order.id,
            driver_id: created.driver.id,
            driver_token,
        })
    }

    /// Driver of a new order: the authenticated driver, else a driver found
    /// or created by phone
    fn resolve_driver_txn(
        &self,
        txn: &WriteTransaction,
        caller: Option<&Actor>,
        req: &CreateOrderRequest,
        now: i64,
    ) -> OrderResult<User> {
        let phone = non_blank(&req.driver_phone);
        let name = non_blank(&req.driver_name);
        let email = non_blank(&req.driver_email);

        if let Some(actor) = caller.filter(|a| a.role == UserRole::Driver) {
            let mut driver = self.load_user_txn(txn, actor.user_id)?;
            if phone.is_some() {
                driver.phone = phone;
            }
            if name.is_some() {
                driver.name = name;
            }
            if email.is_some() {
                driver.email = email;
            }
            self.storage.store_user(txn, &driver)?;
            return Ok(driver);
        }

        let phone = phone.ok_or(OrderError::DriverRequired)?;
        if let Some(mut driver) = self.storage.find_driver_by_phone_txn(txn, &phone)? {
            if driver.name.is_none() && name.is_some() {
                driver.name = name;
                self.storage.store_user(txn, &driver)?;
            }
            return Ok(driver);
        }

        let driver = User {
            id: self.storage.next_id_txn(txn, USER_SEQ)?,
            role: UserRole::Driver,
            name,
            email,
            phone: Some(phone),
            balance: Decimal::ZERO,
            address_id: None,
            notification_chats: Vec::new(),
            registration_date: now,
        };
        self.storage.store_user(txn, &driver)?;
        tracing::debug!(driver_id = driver.id, "Anonymous driver registered");
        Ok(driver)
    }

    /// Existing vehicle by id (following a merge), or a new record run
    /// through the duplicate merge
    fn resolve_vehicle_txn(
        &self,
        txn: &WriteTransaction,
        input: &VehicleInput,
        customer_id: Option<i64>,
        driver_id: i64,
    ) -> OrderResult<i64> {
        if let Some(vehicle_id) = input.id {
            return self.canonical_vehicle_txn(txn, vehicle_id);
        }

        let vehicle = Vehicle {
            id: self.storage.next_id_txn(txn, VEHICLE_SEQ)?,
            vehicle_type: input.vehicle_type,
            brand: non_blank(&input.brand),
            model: non_blank(&input.model),
            vin: non_blank(&input.vin),
            number: non_blank(&input.number),
            customer_id,
            driver_id: Some(driver_id),
            is_merged: false,
            merged_to: None,
        };
        self.storage.store_vehicle(txn, &vehicle)?;
        self.merge_duplicate_txn(txn, vehicle)
    }

    /// Follow `merged_to` until a live record
    fn canonical_vehicle_txn(&self, txn: &WriteTransaction, vehicle_id: i64) -> OrderResult<i64> {
        let mut vehicle = self
            .storage
            .get_vehicle_txn(txn, vehicle_id)?
            .ok_or(OrderError::VehicleNotFound(vehicle_id))?;
        let mut seen = vec![vehicle.id];
        while vehicle.is_merged {
            let Some(next_id) = vehicle.merged_to else {
                break;
            };
            if seen.contains(&next_id) {
                return Err(OrderError::Inconsistency(format!(
                    "vehicle merge cycle at {}",
                    next_id
                )));
            }
            vehicle = self.storage.get_vehicle_txn(txn, next_id)?.ok_or_else(|| {
                OrderError::Inconsistency(format!("merged vehicle {} vanished", next_id))
            })?;
            seen.push(vehicle.id);
        }
        Ok(vehicle.id)
    }
}
