//! Order API Module
//!
//! Thin HTTP layer over [`OrdersManager`](crate::orders::OrdersManager):
//! every handler turns the bearer credential into an explicit `Actor`.
//!
//! | 路径 | 方法 | 说明 | 认证 |
//! |------|------|------|------|
//! | /orders/create | POST | 创建订单 (幂等) | 可选 |
//! | /orders/{id}/start_calculation_by_master | GET | 师傅接单 | 是 |
//! | /orders/{id}/decline_order_master | POST | 师傅放弃订单 | 是 |
//! | /orders/{id}/send_for_confirmation_by_master | GET | 提交报价 | 是 |
//! | /orders/{id}/accept_by_customer | GET | 客户确认 | 是 |
//! | /orders/{id}/complete_order | GET | 完成订单 | 是 |
//! | /orders/{id}/cancel_order | POST | 取消订单 | 是 |
//! | /orders/orders | POST | 订单列表 | 是 |
//! | /orders/{id} | GET | 订单详情 | 是 |
//! | /orders/order-status-changes/{id} | GET | 状态变更记录 | 是 |
//! | /orders/transport | POST | 修正车辆信息 | 是 |
//! | /orders/transport/{id} | GET | 车辆历史订单 | 是 |

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

/// Order router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/orders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/create", post(handler::create))
        // Workflow transitions
        .route(
            "/{id}/start_calculation_by_master",
            get(handler::start_calculation),
        )
        .route("/{id}/decline_order_master", post(handler::decline))
        .route(
            "/{id}/send_for_confirmation_by_master",
            get(handler::send_for_confirmation),
        )
        .route("/{id}/accept_by_customer", get(handler::accept_by_customer))
        .route("/{id}/complete_order", get(handler::complete))
        .route("/{id}/cancel_order", post(handler::cancel))
        // Queries
        .route("/orders", post(handler::list))
        .route("/{id}", get(handler::get_by_id))
        .route("/order-status-changes/{id}", get(handler::status_changes))
        // Vehicles
        .route("/transport", post(handler::update_vehicle))
        .route("/transport/{id}", get(handler::vehicle_orders))
}
