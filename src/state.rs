use crate::{
    config::Config,
    services::{
        auth::AuthService,
        chore::ChoreService,
        database::Database,
        group::GroupService,
        ledger::LedgerService,
        notification::NotificationService,
        preferences::PreferencesService,
        realtime::RealtimeService,
    },
};

/// 应用程序的共享状态
/// 包含所有服务和配置的引用
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// 数据库连接
    pub db: Database,

    /// 认证服务
    pub auth_service: AuthService,

    /// 群组成员关系服务
    pub group_service: GroupService,

    /// 账本引擎
    pub ledger_service: LedgerService,

    /// 通知管线
    pub notification_service: NotificationService,

    /// 通知偏好服务
    pub preferences_service: PreferencesService,

    /// 实时连接注册表
    pub realtime_service: RealtimeService,

    /// 家务服务
    pub chore_service: ChoreService,
}

impl AppState {
    /// 检查是否为生产环境
    pub fn is_production(&self) -> bool {
        self.config.is_production()
    }

    /// 检查是否为开发环境
    pub fn is_development(&self) -> bool {
        self.config.is_development()
    }
}
