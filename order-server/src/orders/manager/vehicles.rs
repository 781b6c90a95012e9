//! Vehicle correction and duplicate merge

use super::{OrderError, OrderResult, OrdersManager};
use redb::WriteTransaction;
use shared::models::{Actor, Vehicle};
use shared::order::UpdateOrderVehicleRequest;
use validator::Validate;

fn set_if_present(slot: &mut Option<String>, value: &Option<String>) {
    if let Some(v) = value.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        *slot = Some(v.to_string());
    }
}

impl OrdersManager {
    /// Merge `vehicle` into an existing record with the same VIN or plate
    /// number, if there is one. Returns the canonical id.
    ///
    /// Absorbing fields, marking the duplicate and repointing orders all
    /// happen in the caller's transaction.
    pub(super) fn merge_duplicate_txn(
        &self,
        txn: &WriteTransaction,
        vehicle: Vehicle,
    ) -> OrderResult<i64> {
        let Some(mut canonical) = self.storage.find_vehicle_duplicate_txn(
            txn,
            vehicle.vin.as_deref(),
            vehicle.number.as_deref(),
            vehicle.id,
        )?
        else {
            return Ok(vehicle.id);
        };

        canonical.absorb(&vehicle);
        self.storage.store_vehicle(txn, &canonical)?;

        let duplicate = Vehicle {
            is_merged: true,
            merged_to: Some(canonical.id),
            ..vehicle
        };
        self.storage.store_vehicle(txn, &duplicate)?;

        // 早先合并到 duplicate 的记录直接指向 canonical
        for mut earlier in self.storage.get_vehicles_merged_into_txn(txn, duplicate.id)? {
            earlier.merged_to = Some(canonical.id);
            self.storage.store_vehicle(txn, &earlier)?;
        }

        let orders = self.storage.get_vehicle_orders_txn(txn, duplicate.id)?;
        let repointed = orders.len();
        for mut order in orders {
            let mut ids = Vec::with_capacity(order.vehicle_ids.len());
            for id in order.vehicle_ids.iter().copied() {
                let id = if id == duplicate.id { canonical.id } else { id };
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            order.vehicle_ids = ids;
            self.storage.store_order(txn, &order)?;
        }
        self.storage.clear_vehicle_orders_txn(txn, duplicate.id)?;

        tracing::info!(
            duplicate_id = duplicate.id,
            canonical_id = canonical.id,
            repointed_orders = repointed,
            "Vehicle merged into existing record"
        );
        Ok(canonical.id)
    }

    /// Correct a vehicle attached to an order, then merge it with any
    /// existing record it now duplicates
    pub fn update_order_vehicle(
        &self,
        actor: &Actor,
        req: UpdateOrderVehicleRequest,
    ) -> OrderResult<Vehicle> {
        req.validate()
            .map_err(|e| OrderError::Validation(e.to_string()))?;

        let vehicle = self.storage.transact(|txn| -> OrderResult<Vehicle> {
            let order = self.load_order_txn(txn, req.order_id)?;
            if !actor.is_admin() && !order.is_participant(actor.user_id) {
                return Err(OrderError::Forbidden(format!(
                    "{} {} is not attached to order {}",
                    actor.role, actor.user_id, order.id
                )));
            }
            if !order.vehicle_ids.contains(&req.vehicle_id) {
                return Err(OrderError::VehicleNotFound(req.vehicle_id));
            }

            let mut vehicle = self
                .storage
                .get_vehicle_txn(txn, req.vehicle_id)?
                .ok_or(OrderError::VehicleNotFound(req.vehicle_id))?;
            if let Some(vehicle_type) = req.vehicle_type {
                vehicle.vehicle_type = vehicle_type;
            }
            set_if_present(&mut vehicle.brand, &req.brand);
            set_if_present(&mut vehicle.model, &req.model);
            set_if_present(&mut vehicle.vin, &req.vin);
            set_if_present(&mut vehicle.number, &req.number);
            self.storage.store_vehicle(txn, &vehicle)?;

            let canonical_id = self.merge_duplicate_txn(txn, vehicle)?;
            self.storage
                .get_vehicle_txn(txn, canonical_id)?
                .ok_or_else(|| {
                    OrderError::Inconsistency(format!("merged vehicle {} vanished", canonical_id))
                })
        })?;

        tracing::info!(
            order_id = req.order_id,
            vehicle_id = vehicle.id,
            user_id = actor.user_id,
            "Order vehicle updated"
        );
        Ok(vehicle)
    }
}
