//! Notification delivery worker

use super::gateway::NotificationGateway;
use super::message;
use super::{Notification, NotificationReceiver};
use crate::auth::CredentialIssuer;
use crate::orders::storage::{OrderStorage, StorageResult};
use crate::utils::report_error;
use shared::models::{User, UserRole};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Outcome of delivering one notification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
    /// Known-benign failures (blocked / forbidden), not reported
    pub benign: usize,
}

/// Resolved message: text plus the users who should receive it
struct Outgoing {
    order_id: i64,
    text: String,
    recipients: Vec<User>,
}

/// 后台通知投递
///
/// 每个接收人独立投递：一个接收人失败不会影响其他接收人。
pub struct NotificationWorker {
    storage: OrderStorage,
    gateway: Arc<dyn NotificationGateway>,
    issuer: Arc<dyn CredentialIssuer>,
    app_url: String,
}

impl NotificationWorker {
    pub fn new(
        storage: OrderStorage,
        gateway: Arc<dyn NotificationGateway>,
        issuer: Arc<dyn CredentialIssuer>,
        app_url: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            gateway,
            issuer,
            app_url: app_url.into(),
        }
    }

    /// Consume the channel until it closes or shutdown is requested
    pub async fn run(self, mut rx: NotificationReceiver, shutdown: CancellationToken) {
        tracing::info!("Notification worker started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Notification worker received shutdown signal");
                    break;
                }
                next = rx.recv() => match next {
                    Some(notification) => {
                        let report = self.deliver(notification).await;
                        tracing::debug!(
                            sent = report.sent,
                            failed = report.failed,
                            benign = report.benign,
                            "Notification delivered"
                        );
                    }
                    None => {
                        tracing::info!("Notification channel closed");
                        break;
                    }
                }
            }
        }
    }

    /// Deliver one notification to every resolved recipient
    pub async fn deliver(&self, notification: Notification) -> DeliveryReport {
        let order_id = notification.order_id();
        let outgoing = match self.resolve(notification) {
            Ok(Some(outgoing)) => outgoing,
            Ok(None) => {
                tracing::warn!(order_id, "Notification target order not found, skipped");
                return DeliveryReport::default();
            }
            Err(e) => {
                report_error("notification.resolve", Some(order_id), &e);
                return DeliveryReport::default();
            }
        };

        let mut report = DeliveryReport::default();
        for user in &outgoing.recipients {
            if user.notification_chats.is_empty() {
                continue;
            }
            let link = match self.issuer.issue_access_token(user) {
                Ok(token) => message::access_link(&self.app_url, user.id, &token, outgoing.order_id),
                Err(e) => {
                    report_error("notification.credential", Some(outgoing.order_id), &e);
                    report.failed += 1;
                    continue;
                }
            };
            for chat_id in &user.notification_chats {
                match self.gateway.send(*chat_id, &outgoing.text, Some(&link)).await {
                    Ok(()) => report.sent += 1,
                    Err(e) if e.is_benign() => {
                        tracing::debug!(chat_id, user_id = user.id, error = %e, "Recipient unreachable");
                        report.benign += 1;
                    }
                    Err(e) => {
                        report_error("notification.send", Some(outgoing.order_id), &e);
                        report.failed += 1;
                    }
                }
            }
        }
        report
    }

    fn resolve(&self, notification: Notification) -> StorageResult<Option<Outgoing>> {
        match notification {
            Notification::OrderCreated { order_id } => {
                let Some(order) = self.storage.get_order(order_id)? else {
                    return Ok(None);
                };
                let region = self.storage.get_region(order.region_id)?;
                let address = self.storage.get_address(order.address_id)?;
                let mut vehicles = Vec::with_capacity(order.vehicle_ids.len());
                for vehicle_id in &order.vehicle_ids {
                    if let Some(vehicle) = self.storage.get_vehicle(*vehicle_id)? {
                        vehicles.push(vehicle);
                    }
                }

                let mut recipients = Vec::new();
                for user in self.storage.get_all_users()? {
                    let wanted = match user.role {
                        UserRole::Admin => true,
                        UserRole::Master => {
                            !order.has_declined(user.id)
                                && self.storage.user_region(&user)? == Some(order.region_id)
                        }
                        _ => false,
                    };
                    if wanted {
                        recipients.push(user);
                    }
                }

                Ok(Some(Outgoing {
                    order_id,
                    text: message::order_created(
                        &order,
                        region.as_ref(),
                        address.as_ref(),
                        &vehicles,
                    ),
                    recipients,
                }))
            }
            Notification::StatusChanged {
                order_id,
                recipients,
                text,
            } => {
                let mut users = Vec::with_capacity(recipients.len());
                for user_id in recipients {
                    match self.storage.get_user(user_id)? {
                        Some(user) => users.push(user),
                        None => tracing::warn!(order_id, user_id, "Notification recipient not found"),
                    }
                }
                Ok(Some(Outgoing {
                    order_id,
                    text,
                    recipients: users,
                }))
            }
            Notification::OrderAging { order_id, minutes } => Ok(Some(Outgoing {
                order_id,
                text: message::order_aging(order_id, minutes),
                recipients: self.storage.get_users_by_role(UserRole::Admin)?,
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtError;
    use crate::notify::DeliveryError;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use shared::models::{Address, Region, Vehicle, VehicleType};
    use shared::order::{Order, OrderStatus};
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    struct FixedIssuer;

    impl CredentialIssuer for FixedIssuer {
        fn issue_access_token(&self, user: &User) -> Result<String, JwtError> {
            Ok(format!("token-{}", user.id))
        }
    }

    /// Records deliveries; chat 666 fails hard, chat 403 is blocked
    #[derive(Default)]
    struct RecordingGateway {
        sent: Mutex<Vec<(i64, String, Option<String>)>>,
    }

    #[async_trait]
    impl NotificationGateway for RecordingGateway {
        async fn send(
            &self,
            chat_id: i64,
            text: &str,
            link: Option<&str>,
        ) -> Result<(), DeliveryError> {
            match chat_id {
                666 => Err(DeliveryError::Transport("connection reset".into())),
                403 => Err(DeliveryError::Blocked),
                _ => {
                    self.sent
                        .lock()
                        .unwrap()
                        .push((chat_id, text.to_string(), link.map(String::from)));
                    Ok(())
                }
            }
        }
    }

    fn user(id: i64, role: UserRole, address_id: Option<i64>, chats: Vec<i64>) -> User {
        User {
            id,
            role,
            name: None,
            email: None,
            phone: None,
            balance: Decimal::ZERO,
            address_id,
            notification_chats: chats,
            registration_date: 0,
        }
    }

    fn seed(storage: &OrderStorage) {
        storage
            .transact(|txn| -> StorageResult<()> {
                storage.store_region(txn, &Region { id: 5, name: "North".into() })?;
                storage.store_region(txn, &Region { id: 6, name: "South".into() })?;
                for (id, region_id) in [(1, 5), (2, 6), (3, 5)] {
                    storage.store_address(
                        txn,
                        &Address {
                            id,
                            region_id,
                            city: Some("Town".into()),
                            street: None,
                        },
                    )?;
                }
                storage.store_user(txn, &user(10, UserRole::Admin, None, vec![100]))?;
                // master in region 5 with one working and one failing chat
                storage.store_user(txn, &user(20, UserRole::Master, Some(1), vec![200, 666]))?;
                // master in a foreign region
                storage.store_user(txn, &user(21, UserRole::Master, Some(2), vec![210]))?;
                // master in region 5 who blocked the bot
                storage.store_user(txn, &user(22, UserRole::Master, Some(1), vec![403]))?;
                storage.store_user(txn, &user(30, UserRole::Driver, None, vec![300]))?;
                storage.store_vehicle(
                    txn,
                    &Vehicle {
                        id: 1,
                        vehicle_type: VehicleType::Truck,
                        brand: Some("Volvo".into()),
                        model: None,
                        vin: None,
                        number: None,
                        customer_id: None,
                        driver_id: Some(30),
                        is_merged: false,
                        merged_to: None,
                    },
                )?;
                storage.store_order(
                    txn,
                    &Order {
                        id: 7,
                        guarantee_uuid: "g".into(),
                        customer_id: None,
                        driver_id: 30,
                        master_id: None,
                        vehicle_ids: vec![1],
                        address_id: 3,
                        region_id: 5,
                        status: OrderStatus::Created,
                        created_at: 0,
                        last_status_update_time: 0,
                        declined_master_ids: BTreeSet::new(),
                        description: None,
                        notes: None,
                        urgency: None,
                        need_evacuator: false,
                        need_mobile_team: false,
                    },
                )
            })
            .unwrap();
    }

    fn worker(storage: OrderStorage, gateway: Arc<RecordingGateway>) -> NotificationWorker {
        NotificationWorker::new(storage, gateway, Arc::new(FixedIssuer), "https://app.test")
    }

    #[tokio::test]
    async fn test_order_created_fan_out_isolates_failures() {
        let storage = OrderStorage::open_in_memory().unwrap();
        seed(&storage);
        let gateway = Arc::new(RecordingGateway::default());
        let worker = worker(storage, gateway.clone());

        let report = worker.deliver(Notification::OrderCreated { order_id: 7 }).await;
        assert_eq!(
            report,
            DeliveryReport {
                sent: 2,
                failed: 1,
                benign: 1
            }
        );

        let sent = gateway.sent.lock().unwrap();
        let chats: Vec<i64> = sent.iter().map(|(chat, _, _)| *chat).collect();
        assert!(chats.contains(&100));
        assert!(chats.contains(&200));
        assert!(!chats.contains(&210), "foreign-region master must not be notified");
        assert!(!chats.contains(&300));

        let (_, text, link) = sent.iter().find(|(chat, _, _)| *chat == 200).unwrap();
        assert!(text.contains("Truck: Volvo"));
        assert_eq!(
            link.as_deref(),
            Some("https://app.test?userId=20&accessToken=token-20&orderId=7")
        );
    }

    #[tokio::test]
    async fn test_status_change_goes_to_listed_recipients() {
        let storage = OrderStorage::open_in_memory().unwrap();
        seed(&storage);
        let gateway = Arc::new(RecordingGateway::default());
        let worker = worker(storage, gateway.clone());

        let report = worker
            .deliver(Notification::StatusChanged {
                order_id: 7,
                recipients: vec![30, 999],
                text: message::completed_by_master(7),
            })
            .await;
        assert_eq!(report.sent, 1);
        assert_eq!(gateway.sent.lock().unwrap()[0].0, 300);
    }

    #[tokio::test]
    async fn test_missing_order_is_skipped() {
        let storage = OrderStorage::open_in_memory().unwrap();
        let gateway = Arc::new(RecordingGateway::default());
        let worker = worker(storage, gateway);
        let report = worker.deliver(Notification::OrderCreated { order_id: 1 }).await;
        assert_eq!(report, DeliveryReport::default());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let storage = OrderStorage::open_in_memory().unwrap();
        let gateway = Arc::new(RecordingGateway::default());
        let (_notifier, rx) = crate::notify::Notifier::channel();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(worker(storage, gateway).run(rx, shutdown.clone()));
        shutdown.cancel();
        handle.await.unwrap();
    }
}
