//! Notification texts and access links

use shared::models::{Address, Region, Vehicle, VehicleType};
use shared::order::Order;

/// One-time access link opening an order as `user_id`
pub fn access_link(app_url: &str, user_id: i64, token: &str, order_id: i64) -> String {
    format!(
        "{}?userId={}&accessToken={}&orderId={}",
        app_url.trim_end_matches('/'),
        user_id,
        token,
        order_id
    )
}

/// Summary sent to region masters and admins when an order is created
pub fn order_created(
    order: &Order,
    region: Option<&Region>,
    address: Option<&Address>,
    vehicles: &[Vehicle],
) -> String {
    let mut lines = vec![format!("New order #{}", order.id)];

    let mut place = Vec::new();
    if let Some(region) = region {
        place.push(region.name.clone());
    }
    if let Some(city) = address.and_then(|a| a.city.as_deref()) {
        place.push(city.to_string());
    }
    if !place.is_empty() {
        lines.push(format!("Location: {}", place.join(", ")));
    }

    for vehicle in vehicles {
        let line = match vehicle.vehicle_type {
            VehicleType::Truck => {
                let name = [vehicle.brand.as_deref(), vehicle.model.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("Truck: {}", if name.is_empty() { "-" } else { &name })
            }
            VehicleType::Trailer => {
                format!("Trailer: {}", vehicle.model.as_deref().unwrap_or("-"))
            }
        };
        lines.push(line);
    }

    if let Some(description) = order.description.as_deref() {
        lines.push(format!("Problem: {}", description));
    }
    if order.need_evacuator {
        lines.push("Evacuator required".to_string());
    }
    if order.need_mobile_team {
        lines.push("Mobile team required".to_string());
    }
    if let Some(urgency) = order.urgency.as_deref() {
        lines.push(format!("Urgency: {}", urgency));
    }

    lines.join("\n")
}

pub fn sent_for_confirmation(order_id: i64) -> String {
    format!("Order #{}: the master sent the estimate for your confirmation", order_id)
}

pub fn accepted_by_customer(order_id: i64) -> String {
    format!("Order #{}: the customer accepted the estimate", order_id)
}

pub fn completed_by_master(order_id: i64) -> String {
    format!("Order #{} was completed by the master", order_id)
}

pub fn completed_by_client(order_id: i64) -> String {
    format!("Order #{} was completed by the customer", order_id)
}

pub fn order_aging(order_id: i64, minutes: i64) -> String {
    format!(
        "Order #{} has been waiting in CREATED for more than {} minutes",
        order_id, minutes
    )
}
