use serde::{Deserialize, Serialize};

use crate::capabilities::{StorageKey, StorageResult};
use crate::model::{NotificationId, ReportId, ReportStatus, Secret, UserRole};
use crate::reports::{ReportDraft, ReportPatch};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    // Lifecycle
    AppStarted,

    // Auth
    LoginRequested {
        email: String,
        password: Secret,
        role_hint: UserRole,
    },
    RegisterRequested {
        name: String,
        email: String,
        password: Secret,
    },
    LogoutRequested,

    // Reports
    CreateReportRequested(Box<ReportDraft>),
    UpdateReportRequested {
        id: ReportId,
        patch: Box<ReportPatch>,
    },
    SetStatusRequested {
        id: ReportId,
        status: ReportStatus,
    },
    WithdrawReportRequested {
        id: ReportId,
    },
    MarkDuplicateRequested {
        id: ReportId,
        original_id: ReportId,
    },
    MarkFalseRequested {
        id: ReportId,
    },

    // Notification inbox
    NotificationReadRequested {
        id: NotificationId,
    },
    AllNotificationsReadRequested,
    NotificationDismissed {
        id: NotificationId,
    },
    NotificationsCleared,

    // UI
    ToastDismissed,

    // Capability responses
    StorageLoaded {
        key: StorageKey,
        result: StorageResult,
    },
    PersistCompleted {
        key: StorageKey,
        result: StorageResult,
    },
}

impl Event {
    /// Stable name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AppStarted => "app_started",
            Self::LoginRequested { .. } => "login_requested",
            Self::RegisterRequested { .. } => "register_requested",
            Self::LogoutRequested => "logout_requested",
            Self::CreateReportRequested(_) => "create_report_requested",
            Self::UpdateReportRequested { .. } => "update_report_requested",
            Self::SetStatusRequested { .. } => "set_status_requested",
            Self::WithdrawReportRequested { .. } => "withdraw_report_requested",
            Self::MarkDuplicateRequested { .. } => "mark_duplicate_requested",
            Self::MarkFalseRequested { .. } => "mark_false_requested",
            Self::NotificationReadRequested { .. } => "notification_read_requested",
            Self::AllNotificationsReadRequested => "all_notifications_read_requested",
            Self::NotificationDismissed { .. } => "notification_dismissed",
            Self::NotificationsCleared => "notifications_cleared",
            Self::ToastDismissed => "toast_dismissed",
            Self::StorageLoaded { .. } => "storage_loaded",
            Self::PersistCompleted { .. } => "persist_completed",
        }
    }
}
