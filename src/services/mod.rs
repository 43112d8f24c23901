pub mod auth;
pub mod chore;
pub mod database;
pub mod group;
pub mod ledger;
pub mod notification;
pub mod preferences;
pub mod push;
pub mod realtime;

// 重新导出常用类型
pub use auth::AuthService;
pub use chore::ChoreService;
pub use database::{Database, PaginatedResult};
pub use group::GroupService;
pub use ledger::LedgerService;
pub use notification::NotificationService;
pub use preferences::PreferencesService;
pub use push::PushService;
pub use realtime::RealtimeService;
