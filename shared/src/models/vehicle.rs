//! Vehicle Model
//!
//! Vehicles are shared across orders. Duplicates entered with the same VIN or
//! plate number are soft-merged into a canonical record (`is_merged` +
//! `merged_to`).

use serde::{Deserialize, Serialize};

/// 车辆类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleType {
    /// 牵引车
    #[default]
    Truck,
    /// 挂车
    Trailer,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vehicle {
    pub id: i64,
    pub vehicle_type: VehicleType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vin: Option<String>,
    /// 车牌号
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<i64>,
    #[serde(default)]
    pub is_merged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_to: Option<i64>,
}

impl Vehicle {
    /// Fill every empty field from `other`; fields already set are kept.
    pub fn absorb(&mut self, other: &Vehicle) {
        fn fill<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if slot.is_none() {
                slot.clone_from(value);
            }
        }
        fill(&mut self.brand, &other.brand);
        fill(&mut self.model, &other.model);
        fill(&mut self.vin, &other.vin);
        fill(&mut self.number, &other.number);
        fill(&mut self.customer_id, &other.customer_id);
        fill(&mut self.driver_id, &other.driver_id);
    }
}
