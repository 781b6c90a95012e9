//! redb-based entity store for the order subsystem
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `users` | `user_id` | `User` | Users (masters, customers, drivers, admins) |
//! | `regions` | `region_id` | `Region` | Region directory |
//! | `addresses` | `address_id` | `Address` | Order / user addresses |
//! | `vehicles` | `vehicle_id` | `Vehicle` | Vehicles, including merged duplicates |
//! | `orders` | `order_id` | `Order` | Order aggregate |
//! | `status_changes` | `(order_id, change_id)` | `OrderStatusChange` | Audit trail (append-only) |
//! | `guarantee_index` | `guarantee_uuid` | `order_id` | Idempotent creation |
//! | `driver_phone_index` | normalized phone | `user_id` | Driver lookup on anonymous creation |
//! | `vehicle_orders` | `(vehicle_id, order_id)` | `()` | Orders referencing a vehicle |
//! | `aging_alerts` | `order_id` | `AgingAlert` | One aging alert per order |
//! | `sequences` | entity name | `i64` | Id generators |
//!
//! # Atomicity
//!
//! redb admits a single write transaction at a time. Every workflow
//! transition runs its precondition reads and all of its writes inside one
//! [`OrderStorage::transact`] call, so concurrent transitions on the same
//! order are serialized and a failed transition leaves nothing behind.

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::models::{Address, Region, User, UserRole, Vehicle};
use shared::order::{Order, OrderStatusChange};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

type JsonTable = TableDefinition<'static, i64, &'static [u8]>;

const USERS_TABLE: JsonTable = TableDefinition::new("users");
const REGIONS_TABLE: JsonTable = TableDefinition::new("regions");
const ADDRESSES_TABLE: JsonTable = TableDefinition::new("addresses");
const VEHICLES_TABLE: JsonTable = TableDefinition::new("vehicles");
const ORDERS_TABLE: JsonTable = TableDefinition::new("orders");
const AGING_ALERTS_TABLE: JsonTable = TableDefinition::new("aging_alerts");

/// key = (order_id, change_id); change ids grow monotonically so a range
/// scan returns an order's history in commit order
const STATUS_CHANGES_TABLE: TableDefinition<(i64, i64), &[u8]> =
    TableDefinition::new("status_changes");

/// key = guarantee_uuid, value = order_id
const GUARANTEE_INDEX_TABLE: TableDefinition<&str, i64> = TableDefinition::new("guarantee_index");

/// key = trimmed lowercase phone, value = driver user_id
const DRIVER_PHONE_INDEX_TABLE: TableDefinition<&str, i64> =
    TableDefinition::new("driver_phone_index");

/// key = (vehicle_id, order_id). Entries may outlive a repoint; readers
/// re-check `Order::vehicle_ids`.
const VEHICLE_ORDERS_TABLE: TableDefinition<(i64, i64), ()> = TableDefinition::new("vehicle_orders");

/// key = entity name, value = last issued id
const SEQUENCE_TABLE: TableDefinition<&str, i64> = TableDefinition::new("sequences");

pub const USER_SEQ: &str = "users";
pub const REGION_SEQ: &str = "regions";
pub const ADDRESS_SEQ: &str = "addresses";
pub const VEHICLE_SEQ: &str = "vehicles";
pub const ORDER_SEQ: &str = "orders";
pub const STATUS_CHANGE_SEQ: &str = "status_changes";

/// Record of an aging alert already sent for an order
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct AgingAlert {
    pub order_id: i64,
    /// `last_status_update_time` of the order when the alert fired
    pub status_update_time: i64,
    pub sent_at: i64,
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Storage statistics
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StorageStats {
    pub user_count: u64,
    pub order_count: u64,
    pub vehicle_count: u64,
    pub status_change_count: u64,
}

// ========== Row helpers ==========

fn load_row<T, Tb>(table: &Tb, id: i64) -> StorageResult<Option<T>>
where
    T: DeserializeOwned,
    Tb: ReadableTable<i64, &'static [u8]>,
{
    match table.get(id)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

fn scan_rows<T, Tb>(table: &Tb) -> StorageResult<Vec<T>>
where
    T: DeserializeOwned,
    Tb: ReadableTable<i64, &'static [u8]>,
{
    let mut rows = Vec::new();
    for result in table.iter()? {
        let (_key, value) = result?;
        rows.push(serde_json::from_slice(value.value())?);
    }
    Ok(rows)
}

fn save_row<T: Serialize>(
    txn: &WriteTransaction,
    def: JsonTable,
    id: i64,
    row: &T,
) -> StorageResult<()> {
    let mut table = txn.open_table(def)?;
    let value = serde_json::to_vec(row)?;
    table.insert(id, value.as_slice())?;
    Ok(())
}

fn phone_key(phone: &str) -> String {
    phone.trim().to_lowercase()
}

fn same_text(a: &Option<String>, b: &str) -> bool {
    a.as_deref()
        .is_some_and(|v| v.trim().eq_ignore_ascii_case(b.trim()))
}

/// Entity store backed by redb
#[derive(Clone)]
pub struct OrderStorage {
    db: Arc<Database>,
}

impl OrderStorage {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS_TABLE)?;
            let _ = write_txn.open_table(REGIONS_TABLE)?;
            let _ = write_txn.open_table(ADDRESSES_TABLE)?;
            let _ = write_txn.open_table(VEHICLES_TABLE)?;
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(AGING_ALERTS_TABLE)?;
            let _ = write_txn.open_table(STATUS_CHANGES_TABLE)?;
            let _ = write_txn.open_table(GUARANTEE_INDEX_TABLE)?;
            let _ = write_txn.open_table(SEQUENCE_TABLE)?;
            let _ = write_txn.open_table(DRIVER_PHONE_INDEX_TABLE)?;
            let _ = write_txn.open_table(VEHICLE_ORDERS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    /// Run `f` inside one write transaction.
    ///
    /// Commits when `f` returns `Ok`, aborts otherwise. Never call this
    /// from inside another `transact` closure: redb has a single writer.
    pub fn transact<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&WriteTransaction) -> Result<T, E>,
        E: From<StorageError>,
    {
        let txn = self.begin_write()?;
        match f(&txn) {
            Ok(value) => {
                txn.commit().map_err(StorageError::from)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort_err) = txn.abort() {
                    tracing::warn!(error = %abort_err, "Failed to abort write transaction");
                }
                Err(e)
            }
        }
    }

    // ========== Sequence Operations ==========

    /// Issue the next id for an entity (within transaction)
    pub fn next_id_txn(&self, txn: &WriteTransaction, entity: &str) -> StorageResult<i64> {
        let mut table = txn.open_table(SEQUENCE_TABLE)?;
        let current = table.get(entity)?.map(|guard| guard.value()).unwrap_or(0);
        let next = current + 1;
        table.insert(entity, next)?;
        Ok(next)
    }

    // ========== Users ==========

    pub fn get_user(&self, user_id: i64) -> StorageResult<Option<User>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS_TABLE)?;
        load_row(&table, user_id)
    }

    pub fn get_user_txn(&self, txn: &WriteTransaction, user_id: i64) -> StorageResult<Option<User>> {
        let table = txn.open_table(USERS_TABLE)?;
        load_row(&table, user_id)
    }

    pub fn store_user(&self, txn: &WriteTransaction, user: &User) -> StorageResult<()> {
        save_row(txn, USERS_TABLE, user.id, user)?;
        if user.role == UserRole::Driver
            && let Some(phone) = user.phone.as_deref().filter(|p| !p.trim().is_empty())
        {
            let mut index = txn.open_table(DRIVER_PHONE_INDEX_TABLE)?;
            index.insert(phone_key(phone).as_str(), user.id)?;
        }
        Ok(())
    }

    pub fn get_all_users(&self) -> StorageResult<Vec<User>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS_TABLE)?;
        scan_rows(&table)
    }

    pub fn get_users_by_role(&self, role: UserRole) -> StorageResult<Vec<User>> {
        Ok(self
            .get_all_users()?
            .into_iter()
            .filter(|u| u.role == role)
            .collect())
    }

    /// Find an existing driver by phone (within transaction)
    pub fn find_driver_by_phone_txn(
        &self,
        txn: &WriteTransaction,
        phone: &str,
    ) -> StorageResult<Option<User>> {
        let user_id = {
            let index = txn.open_table(DRIVER_PHONE_INDEX_TABLE)?;
            index.get(phone_key(phone).as_str())?.map(|guard| guard.value())
        };
        let Some(user_id) = user_id else {
            return Ok(None);
        };
        // 索引项可能已过期 (司机更换了电话)
        Ok(self
            .get_user_txn(txn, user_id)?
            .filter(|u| u.role == UserRole::Driver && same_text(&u.phone, phone)))
    }

    /// Find a user by email (within transaction)
    pub fn find_user_by_email_txn(
        &self,
        txn: &WriteTransaction,
        email: &str,
    ) -> StorageResult<Option<User>> {
        let table = txn.open_table(USERS_TABLE)?;
        let users: Vec<User> = scan_rows(&table)?;
        Ok(users.into_iter().find(|u| same_text(&u.email, email)))
    }

    // ========== Regions / Addresses ==========

    pub fn get_region(&self, region_id: i64) -> StorageResult<Option<Region>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(REGIONS_TABLE)?;
        load_row(&table, region_id)
    }

    pub fn get_region_txn(
        &self,
        txn: &WriteTransaction,
        region_id: i64,
    ) -> StorageResult<Option<Region>> {
        let table = txn.open_table(REGIONS_TABLE)?;
        load_row(&table, region_id)
    }

    pub fn store_region(&self, txn: &WriteTransaction, region: &Region) -> StorageResult<()> {
        save_row(txn, REGIONS_TABLE, region.id, region)
    }

    pub fn get_address(&self, address_id: i64) -> StorageResult<Option<Address>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ADDRESSES_TABLE)?;
        load_row(&table, address_id)
    }

    pub fn get_address_txn(
        &self,
        txn: &WriteTransaction,
        address_id: i64,
    ) -> StorageResult<Option<Address>> {
        let table = txn.open_table(ADDRESSES_TABLE)?;
        load_row(&table, address_id)
    }

    pub fn store_address(&self, txn: &WriteTransaction, address: &Address) -> StorageResult<()> {
        save_row(txn, ADDRESSES_TABLE, address.id, address)
    }

    /// Region of a user's registered address
    pub fn user_region(&self, user: &User) -> StorageResult<Option<i64>> {
        match user.address_id {
            Some(address_id) => Ok(self.get_address(address_id)?.map(|a| a.region_id)),
            None => Ok(None),
        }
    }

    /// Region of a user's registered address (within transaction)
    pub fn user_region_txn(&self, txn: &WriteTransaction, user: &User) -> StorageResult<Option<i64>> {
        match user.address_id {
            Some(address_id) => Ok(self
                .get_address_txn(txn, address_id)?
                .map(|a| a.region_id)),
            None => Ok(None),
        }
    }

    // ========== Vehicles ==========

    pub fn get_vehicle(&self, vehicle_id: i64) -> StorageResult<Option<Vehicle>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(VEHICLES_TABLE)?;
        load_row(&table, vehicle_id)
    }

    pub fn get_vehicle_txn(
        &self,
        txn: &WriteTransaction,
        vehicle_id: i64,
    ) -> StorageResult<Option<Vehicle>> {
        let table = txn.open_table(VEHICLES_TABLE)?;
        load_row(&table, vehicle_id)
    }

    pub fn store_vehicle(&self, txn: &WriteTransaction, vehicle: &Vehicle) -> StorageResult<()> {
        save_row(txn, VEHICLES_TABLE, vehicle.id, vehicle)
    }

    /// Merged records whose `merged_to` is `vehicle_id`
    pub fn get_vehicles_merged_into_txn(
        &self,
        txn: &WriteTransaction,
        vehicle_id: i64,
    ) -> StorageResult<Vec<Vehicle>> {
        let table = txn.open_table(VEHICLES_TABLE)?;
        let vehicles: Vec<Vehicle> = scan_rows(&table)?;
        Ok(vehicles
            .into_iter()
            .filter(|v| v.is_merged && v.merged_to == Some(vehicle_id))
            .collect())
    }

    /// Find a live (not merged) vehicle with the same VIN, else the same
    /// plate number, other than `exclude_id`
    pub fn find_vehicle_duplicate_txn(
        &self,
        txn: &WriteTransaction,
        vin: Option<&str>,
        number: Option<&str>,
        exclude_id: i64,
    ) -> StorageResult<Option<Vehicle>> {
        let table = txn.open_table(VEHICLES_TABLE)?;
        let candidates: Vec<Vehicle> = scan_rows(&table)?;
        let live = || {
            candidates
                .iter()
                .filter(move |v| v.id != exclude_id && !v.is_merged)
        };

        if let Some(vin) = vin.filter(|s| !s.trim().is_empty())
            && let Some(found) = live().find(|v| same_text(&v.vin, vin))
        {
            return Ok(Some(found.clone()));
        }
        if let Some(number) = number.filter(|s| !s.trim().is_empty())
            && let Some(found) = live().find(|v| same_text(&v.number, number))
        {
            return Ok(Some(found.clone()));
        }
        Ok(None)
    }

    // ========== Orders ==========

    pub fn get_order(&self, order_id: i64) -> StorageResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        load_row(&table, order_id)
    }

    pub fn get_order_txn(&self, txn: &WriteTransaction, order_id: i64) -> StorageResult<Option<Order>> {
        let table = txn.open_table(ORDERS_TABLE)?;
        load_row(&table, order_id)
    }

    pub fn store_order(&self, txn: &WriteTransaction, order: &Order) -> StorageResult<()> {
        save_row(txn, ORDERS_TABLE, order.id, order)?;
        let mut index = txn.open_table(VEHICLE_ORDERS_TABLE)?;
        for vehicle_id in &order.vehicle_ids {
            index.insert((*vehicle_id, order.id), ())?;
        }
        Ok(())
    }

    pub fn get_all_orders(&self) -> StorageResult<Vec<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        scan_rows(&table)
    }

    /// Orders that currently reference `vehicle_id`
    pub fn get_vehicle_orders(&self, vehicle_id: i64) -> StorageResult<Vec<Order>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(VEHICLE_ORDERS_TABLE)?;
        let orders = read_txn.open_table(ORDERS_TABLE)?;

        let mut found = Vec::new();
        for result in index.range((vehicle_id, i64::MIN)..=(vehicle_id, i64::MAX))? {
            let (key, _) = result?;
            let (_, order_id) = key.value();
            if let Some(order) = load_row::<Order, _>(&orders, order_id)?
                && order.vehicle_ids.contains(&vehicle_id)
            {
                found.push(order);
            }
        }
        Ok(found)
    }

    /// Same as [`Self::get_vehicle_orders`], within a write transaction
    pub fn get_vehicle_orders_txn(
        &self,
        txn: &WriteTransaction,
        vehicle_id: i64,
    ) -> StorageResult<Vec<Order>> {
        let order_ids: Vec<i64> = {
            let index = txn.open_table(VEHICLE_ORDERS_TABLE)?;
            let mut ids = Vec::new();
            for result in index.range((vehicle_id, i64::MIN)..=(vehicle_id, i64::MAX))? {
                let (key, _) = result?;
                ids.push(key.value().1);
            }
            ids
        };

        let mut found = Vec::with_capacity(order_ids.len());
        for order_id in order_ids {
            if let Some(order) = self.get_order_txn(txn, order_id)?
                && order.vehicle_ids.contains(&vehicle_id)
            {
                found.push(order);
            }
        }
        Ok(found)
    }

    /// Drop the index entries of `vehicle_id` (after a merge repointed them)
    pub fn clear_vehicle_orders_txn(
        &self,
        txn: &WriteTransaction,
        vehicle_id: i64,
    ) -> StorageResult<()> {
        let mut index = txn.open_table(VEHICLE_ORDERS_TABLE)?;
        let keys: Vec<(i64, i64)> = {
            let mut keys = Vec::new();
            for result in index.range((vehicle_id, i64::MIN)..=(vehicle_id, i64::MAX))? {
                let (key, _) = result?;
                keys.push(key.value());
            }
            keys
        };
        for key in keys {
            index.remove(key)?;
        }
        Ok(())
    }

    // ========== Idempotency ==========

    pub fn find_order_by_guarantee_txn(
        &self,
        txn: &WriteTransaction,
        guarantee_uuid: &str,
    ) -> StorageResult<Option<i64>> {
        let table = txn.open_table(GUARANTEE_INDEX_TABLE)?;
        Ok(table.get(guarantee_uuid)?.map(|guard| guard.value()))
    }

    pub fn index_guarantee(
        &self,
        txn: &WriteTransaction,
        guarantee_uuid: &str,
        order_id: i64,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(GUARANTEE_INDEX_TABLE)?;
        table.insert(guarantee_uuid, order_id)?;
        Ok(())
    }

    // ========== Status changes ==========

    pub fn append_status_change(
        &self,
        txn: &WriteTransaction,
        change: &OrderStatusChange,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(STATUS_CHANGES_TABLE)?;
        let value = serde_json::to_vec(change)?;
        table.insert((change.order_id, change.id), value.as_slice())?;
        Ok(())
    }

    /// Audit trail of an order in commit order
    pub fn get_status_changes(&self, order_id: i64) -> StorageResult<Vec<OrderStatusChange>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(STATUS_CHANGES_TABLE)?;

        let mut changes = Vec::new();
        for result in table.range((order_id, i64::MIN)..=(order_id, i64::MAX))? {
            let (_key, value) = result?;
            let change: OrderStatusChange = serde_json::from_slice(value.value())?;
            changes.push(change);
        }
        Ok(changes)
    }

    // ========== Aging alerts ==========

    pub fn get_aging_alert(&self, order_id: i64) -> StorageResult<Option<AgingAlert>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(AGING_ALERTS_TABLE)?;
        load_row(&table, order_id)
    }

    /// Record an alert unless one exists. Returns `true` when newly recorded.
    pub fn record_aging_alert(
        &self,
        txn: &WriteTransaction,
        alert: &AgingAlert,
    ) -> StorageResult<bool> {
        let exists = {
            let table = txn.open_table(AGING_ALERTS_TABLE)?;
            table.get(alert.order_id)?.is_some()
        };
        if exists {
            return Ok(false);
        }
        save_row(txn, AGING_ALERTS_TABLE, alert.order_id, alert)?;
        Ok(true)
    }

    // ========== Statistics ==========

    pub fn get_stats(&self) -> StorageResult<StorageStats> {
        let read_txn = self.db.begin_read()?;
        Ok(StorageStats {
            user_count: read_txn.open_table(USERS_TABLE)?.len()?,
            order_count: read_txn.open_table(ORDERS_TABLE)?.len()?,
            vehicle_count: read_txn.open_table(VEHICLES_TABLE)?.len()?,
            status_change_count: read_txn.open_table(STATUS_CHANGES_TABLE)?.len()?,
        })
    }
}
