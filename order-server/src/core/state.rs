use std::path::PathBuf;
use std::sync::Arc;

use rust_decimal::Decimal;
use shared::models::{Actor, User, UserRole};
use shared::util::now_millis;
use tokio::sync::Mutex;

use crate::auth::JwtService;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::{Config, Result};
use crate::notify::{LogGateway, NotificationReceiver, NotificationWorker, Notifier};
use crate::orders::storage::USER_SEQ;
use crate::orders::{AgingAlertScheduler, OrderStorage, OrderSweeper, OrdersManager, StorageError};

/// 服务器状态 - 持有所有服务的共享引用
///
/// 使用 Arc 实现浅拷贝，作为 axum 的 State 在所有处理器间共享。
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | storage | OrderStorage | redb 实体存储 |
/// | orders | Arc<OrdersManager> | 订单工作流引擎 |
/// | jwt_service | Arc<JwtService> | JWT 认证服务 |
/// | system_admin | Actor | 后台任务使用的管理员身份 |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub storage: OrderStorage,
    pub orders: Arc<OrdersManager>,
    pub jwt_service: Arc<JwtService>,
    pub system_admin: Actor,
    /// 通知接收端，启动后台任务时取走
    pending_notifications: Arc<Mutex<Option<NotificationReceiver>>>,
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("work_dir", &self.config.work_dir)
            .field("orders", &self.orders)
            .field("system_admin", &self.system_admin)
            .finish()
    }
}

impl ServerState {
    /// 初始化服务器状态
    ///
    /// 创建工作目录，打开数据库，确保系统管理员存在。
    pub async fn initialize(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.work_dir)?;
        let db_path = config.database_path();
        let storage = OrderStorage::open(&db_path)?;
        tracing::info!(path = %db_path.display(), "Order database opened");
        Self::with_storage(config.clone(), storage)
    }

    /// 使用已打开的存储构建状态
    pub fn with_storage(config: Config, storage: OrderStorage) -> Result<Self> {
        let system_admin = ensure_system_admin(&storage, &config)?;
        let jwt_service = Arc::new(JwtService::with_config(config.jwt.clone()));
        let (notifier, receiver) = Notifier::channel();
        let orders = Arc::new(OrdersManager::new(
            storage.clone(),
            notifier,
            jwt_service.clone(),
            config.workflow_settings(),
        ));

        Ok(Self {
            config,
            storage,
            orders,
            jwt_service,
            system_admin,
            pending_notifications: Arc::new(Mutex::new(Some(receiver))),
        })
    }

    /// 启动后台任务
    ///
    /// - 通知投递 (Worker)
    /// - 订单对账 (Periodic)
    /// - 超时提醒 (Periodic)
    pub async fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();

        match self.pending_notifications.lock().await.take() {
            Some(receiver) => {
                let worker = NotificationWorker::new(
                    self.storage.clone(),
                    Arc::new(LogGateway),
                    self.jwt_service.clone(),
                    self.config.app_url.clone(),
                );
                let token = tasks.shutdown_token();
                tasks.spawn(
                    "notification_worker",
                    TaskKind::Worker,
                    worker.run(receiver, token),
                );
            }
            None => tracing::warn!("Notification worker already started"),
        }

        let sweeper = OrderSweeper::new(
            self.orders.clone(),
            self.system_admin,
            self.config.sweep_policy(),
            tasks.shutdown_token(),
        );
        tasks.spawn("order_sweeper", TaskKind::Periodic, sweeper.run());

        let aging = AgingAlertScheduler::new(
            self.storage.clone(),
            self.orders.notifier().clone(),
            self.config.aging_threshold_ms(),
            self.config.aging_scan_interval(),
            tasks.shutdown_token(),
        );
        tasks.spawn("aging_alerts", TaskKind::Periodic, aging.run());

        tasks.log_summary();
        tasks
    }

    pub fn jwt_service(&self) -> &JwtService {
        &self.jwt_service
    }

    pub fn orders(&self) -> &OrdersManager {
        &self.orders
    }

    pub fn work_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.work_dir)
    }
}

/// 查找或创建系统管理员
fn ensure_system_admin(storage: &OrderStorage, config: &Config) -> Result<Actor> {
    let admin = storage.transact(|txn| -> std::result::Result<User, StorageError> {
        if let Some(user) = storage.find_user_by_email_txn(txn, &config.admin_email)? {
            return Ok(user);
        }
        let user = User {
            id: storage.next_id_txn(txn, USER_SEQ)?,
            role: UserRole::Admin,
            name: Some(config.admin_name.clone()),
            email: Some(config.admin_email.clone()),
            phone: None,
            balance: Decimal::ZERO,
            address_id: None,
            notification_chats: Vec::new(),
            registration_date: now_millis(),
        };
        storage.store_user(txn, &user)?;
        tracing::info!(user_id = user.id, email = %config.admin_email, "System admin created");
        Ok(user)
    })?;

    if admin.role != UserRole::Admin {
        return Err(crate::core::ServerError::Config(format!(
            "ADMIN_EMAIL {} belongs to a {} account",
            config.admin_email, admin.role
        )));
    }
    Ok(Actor::new(admin.id, UserRole::Admin))
}
