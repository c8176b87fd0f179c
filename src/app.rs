//! The Crux app: event dispatch, persistence write-back and view building.
//!
//! Control flow for every mutating operation: validate through the owning
//! store, persist the whole collection through the storage capability, drop a
//! notification into the acting user's inbox, and surface a transient toast.
//! Failures become toasts; no failure is fatal.

use tracing::{debug, warn};

use crate::capabilities::{Capabilities, StorageKey, StorageOutput, StorageResult};
use crate::event::Event;
use crate::model::{
    Model, Notification, NotificationKind, Principal, ReportStatus, ReportType, Toast, UnixTimeMs,
    User,
};
use crate::reports::ReportPatch;
use crate::{AppError, ErrorKind, AVG_RESOLUTION_TIME_DAYS};

use serde::{Deserialize, Serialize};

/// Startup keys requested during hydration.
const STARTUP_KEYS: [StorageKey; 3] = [StorageKey::Session, StorageKey::Users, StorageKey::Reports];

fn now_ms() -> UnixTimeMs {
    let ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64);
    UnixTimeMs(ms)
}

#[derive(Default)]
pub struct App;

impl App {
    fn persist(model: &Model, caps: &Capabilities, key: StorageKey) {
        let snapshot = match &key {
            StorageKey::Session => model.identity.session_json(),
            StorageKey::Users => model.identity.users_json(),
            StorageKey::Reports => model.reports.snapshot_json(),
            StorageKey::Notifications(_) => model.notifications.snapshot_json(),
        };
        match snapshot {
            Ok(bytes) => {
                let event_key = key.clone();
                caps.storage.save(&key, bytes, move |result| Event::PersistCompleted {
                    key: event_key,
                    result,
                });
            }
            Err(e) => warn!(key = %key.raw(), error = %e, "snapshot serialization failed"),
        }
    }

    fn persist_notifications(model: &Model, caps: &Capabilities) {
        let Some(user_id) = model.notifications.user_id() else {
            return;
        };
        match StorageKey::notifications(user_id) {
            Ok(key) => Self::persist(model, caps, key),
            Err(e) => warn!(error = %e, "invalid notifications key"),
        }
    }

    fn load_notifications(user_id: &crate::model::UserId, caps: &Capabilities) {
        match StorageKey::notifications(user_id) {
            Ok(key) => {
                let event_key = key.clone();
                caps.storage.load(&key, move |result| Event::StorageLoaded {
                    key: event_key,
                    result,
                });
            }
            Err(e) => warn!(error = %e, "invalid notifications key"),
        }
    }

    fn require_principal(model: &mut Model) -> Option<Principal> {
        let principal = model.identity.principal();
        if principal.is_none() {
            let err = AppError::new(ErrorKind::Unauthenticated, "no active session");
            model.active_toast = Some(Toast::error("Not Signed In", err.user_facing_message()));
        }
        principal
    }

    fn fail(model: &mut Model, title: &str, err: impl Into<AppError>) {
        let err = err.into();
        debug!(code = err.code(), "operation rejected: {err}");
        model.active_toast = Some(Toast::error(title, err.user_facing_message()));
    }

    /// Inbox entry plus matching toast after a successful operation.
    fn acknowledge(
        model: &mut Model,
        caps: &Capabilities,
        title: &str,
        message: &str,
        kind: NotificationKind,
    ) {
        model
            .notifications
            .add(title, message, kind, now_ms());
        Self::persist_notifications(model, caps);
        model.active_toast = Some(Toast {
            title: title.to_owned(),
            description: message.to_owned(),
            kind,
        });
    }

    fn hydrate_from(model: &mut Model, caps: &Capabilities, key: &StorageKey, result: StorageResult) {
        let bytes = match result {
            Ok(StorageOutput::Loaded(bytes)) => bytes,
            Ok(other) => {
                warn!(key = %key.raw(), ?other, "unexpected storage output");
                None
            }
            Err(e) => {
                warn!(key = %key.raw(), error = %e, "storage load failed");
                None
            }
        };

        if let Some(bytes) = bytes {
            let outcome = match key {
                StorageKey::Session => model.identity.hydrate_session(&bytes),
                StorageKey::Users => model.identity.hydrate_users(&bytes),
                StorageKey::Reports => model.reports.hydrate_json(&bytes),
                StorageKey::Notifications(user_id) => {
                    // Only accept the inbox that belongs to the current user;
                    // a stale response after logout/login is dropped. Items
                    // added while the load was in flight are merged, not
                    // overwritten, and the merged inbox is written back.
                    if model.notifications.user_id() == Some(user_id) {
                        match model.notifications.merge_json(&bytes) {
                            Ok(added) => {
                                if added {
                                    Self::persist_notifications(model, caps);
                                }
                                Ok(())
                            }
                            Err(e) => Err(e),
                        }
                    } else {
                        Ok(())
                    }
                }
            };
            if let Err(e) = outcome {
                warn!(key = %key.raw(), error = %e, "corrupt snapshot ignored");
            }
        }

        // A restored session brings that user's inbox with it.
        if matches!(key, StorageKey::Session) {
            if let Some(user) = model.identity.current_user() {
                let user_id = user.id.clone();
                model.notifications.switch_user(Some(user_id.clone()));
                Self::load_notifications(&user_id, caps);
            }
        }

        if STARTUP_KEYS.contains(key) && model.pending_hydration > 0 {
            model.pending_hydration -= 1;
            if model.pending_hydration == 0 {
                model.hydrated = true;
                debug!("hydration complete");
            }
        }
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        debug!(event = event.name(), "update");

        match event {
            Event::AppStarted => {
                model.hydrated = false;
                model.pending_hydration = STARTUP_KEYS.len() as u8;
                for key in STARTUP_KEYS {
                    let event_key = key.clone();
                    caps.storage.load(&key, move |result| Event::StorageLoaded {
                        key: event_key,
                        result,
                    });
                }
            }

            Event::StorageLoaded { key, result } => {
                Self::hydrate_from(model, caps, &key, result);
            }

            Event::PersistCompleted { key, result } => {
                if let Err(e) = result {
                    warn!(key = %key.raw(), error = %e, "persist failed");
                    Self::fail(model, "Save Failed", e);
                }
            }

            Event::LoginRequested {
                email,
                password,
                role_hint,
            } => match model.identity.login(&email, &password, role_hint) {
                Ok(user) => {
                    Self::persist(model, caps, StorageKey::Session);
                    model.notifications.switch_user(Some(user.id.clone()));
                    Self::load_notifications(&user.id, caps);
                    model.active_toast = Some(Toast::success(
                        "Login Successful",
                        format!("Welcome back, {}!", user.name),
                    ));
                }
                Err(e) => Self::fail(model, "Login Failed", e),
            },

            Event::RegisterRequested {
                name,
                email,
                password,
            } => match model.identity.register(&name, &email, password) {
                Ok(user) => {
                    Self::persist(model, caps, StorageKey::Users);
                    Self::persist(model, caps, StorageKey::Session);
                    model.notifications.switch_user(Some(user.id.clone()));
                    Self::acknowledge(
                        model,
                        caps,
                        "Welcome to CivicFix",
                        "Your account has been created.",
                        NotificationKind::Success,
                    );
                }
                Err(e) => Self::fail(model, "Registration Failed", e),
            },

            Event::LogoutRequested => {
                if model.identity.logout().is_some() {
                    let key = StorageKey::Session;
                    let event_key = key.clone();
                    caps.storage.remove(&key, move |result| Event::PersistCompleted {
                        key: event_key,
                        result,
                    });
                }
                model.notifications.switch_user(None);
            }

            Event::CreateReportRequested(draft) => {
                if let Some(principal) = Self::require_principal(model) {
                    match model.reports.create(&principal, *draft, now_ms()) {
                        Ok(_) => {
                            Self::persist(model, caps, StorageKey::Reports);
                            Self::acknowledge(
                                model,
                                caps,
                                "Report Submitted",
                                "Your report has been submitted successfully.",
                                NotificationKind::Success,
                            );
                        }
                        Err(e) => Self::fail(model, "Submission Failed", e),
                    }
                }
            }

            Event::UpdateReportRequested { id, patch } => {
                if let Some(principal) = Self::require_principal(model) {
                    match model.reports.update(&principal, &id, *patch, now_ms()) {
                        Ok(_) => {
                            Self::persist(model, caps, StorageKey::Reports);
                            Self::acknowledge(
                                model,
                                caps,
                                "Report Updated",
                                "The report has been updated.",
                                NotificationKind::Info,
                            );
                        }
                        Err(e) => Self::fail(model, "Update Failed", e),
                    }
                }
            }

            Event::SetStatusRequested { id, status } => {
                if let Some(principal) = Self::require_principal(model) {
                    match model
                        .reports
                        .update(&principal, &id, ReportPatch::status(status), now_ms())
                    {
                        Ok(report) => {
                            Self::persist(model, caps, StorageKey::Reports);
                            Self::acknowledge(
                                model,
                                caps,
                                "Status Updated",
                                &format!(
                                    "The report is now marked as {}.",
                                    report.status.label()
                                ),
                                NotificationKind::Info,
                            );
                        }
                        Err(e) => Self::fail(model, "Status Update Failed", e),
                    }
                }
            }

            Event::WithdrawReportRequested { id } => {
                if let Some(principal) = Self::require_principal(model) {
                    match model.reports.withdraw(&principal, &id, now_ms()) {
                        Ok(_) => {
                            Self::persist(model, caps, StorageKey::Reports);
                            Self::acknowledge(
                                model,
                                caps,
                                "Report Withdrawn",
                                "Your report has been successfully withdrawn.",
                                NotificationKind::Success,
                            );
                        }
                        Err(e) => Self::fail(model, "Withdrawal Failed", e),
                    }
                }
            }

            Event::MarkDuplicateRequested { id, original_id } => {
                if let Some(principal) = Self::require_principal(model) {
                    match model
                        .reports
                        .mark_duplicate(&principal, &id, &original_id, now_ms())
                    {
                        Ok(_) => {
                            Self::persist(model, caps, StorageKey::Reports);
                            Self::acknowledge(
                                model,
                                caps,
                                "Report Marked as Duplicate",
                                "The report has been marked as a duplicate and withdrawn.",
                                NotificationKind::Info,
                            );
                        }
                        Err(e) => Self::fail(model, "Operation Failed", e),
                    }
                }
            }

            Event::MarkFalseRequested { id } => {
                if let Some(principal) = Self::require_principal(model) {
                    match model.reports.mark_false(&principal, &id, now_ms()) {
                        Ok(_) => {
                            Self::persist(model, caps, StorageKey::Reports);
                            Self::acknowledge(
                                model,
                                caps,
                                "Report Marked as False",
                                "The report has been marked as false and withdrawn.",
                                NotificationKind::Warning,
                            );
                        }
                        Err(e) => Self::fail(model, "Operation Failed", e),
                    }
                }
            }

            Event::NotificationReadRequested { id } => {
                if model.notifications.mark_read(&id) {
                    Self::persist_notifications(model, caps);
                }
            }

            Event::AllNotificationsReadRequested => {
                model.notifications.mark_all_read();
                Self::persist_notifications(model, caps);
            }

            Event::NotificationDismissed { id } => {
                if model.notifications.remove(&id) {
                    Self::persist_notifications(model, caps);
                }
            }

            Event::NotificationsCleared => {
                model.notifications.clear_all();
                Self::persist_notifications(model, caps);
            }

            Event::ToastDismissed => {
                model.active_toast = None;
            }
        }

        caps.render.render();
    }

    fn view(&self, model: &Model) -> ViewModel {
        let session = model.identity.current_user().cloned();
        let my_id = session.as_ref().map(|u| u.id.clone());

        let markers = model
            .reports
            .all()
            .iter()
            .filter_map(|r| {
                r.status.marker_color().map(|color| MapMarker {
                    id: r.id.as_str().to_owned(),
                    lat: r.location.coordinate.lat(),
                    lng: r.location.coordinate.lng(),
                    color: color.to_owned(),
                    report_type: r.report_type,
                    status: r.status,
                })
            })
            .collect();

        let reports: Vec<ReportListItem> = model
            .reports
            .all()
            .iter()
            .map(|r| ReportListItem {
                id: r.id.as_str().to_owned(),
                report_type: r.report_type,
                type_label: r.report_type.label().to_owned(),
                description: r.description.clone(),
                address: r.location.address.clone(),
                status: r.status,
                status_label: r.status.label().to_owned(),
                is_mine: my_id.as_ref() == Some(&r.user_id),
                is_duplicate: r.is_duplicate(),
                is_false: r.is_false(),
                original_report_id: r.original_report_id().map(|id| id.as_str().to_owned()),
                created_at: r.created_at,
                updated_at: r.updated_at,
            })
            .collect();

        let my_reports = reports.iter().filter(|r| r.is_mine).cloned().collect();

        ViewModel {
            is_authenticated: model.identity.is_authenticated(),
            is_admin: model.identity.is_admin(),
            session,
            hydrated: model.hydrated,
            markers,
            reports,
            my_reports,
            notifications: model.notifications.items().to_vec(),
            unread_count: model.notifications.unread_count(),
            active_toast: model.active_toast.clone(),
        }
    }
}

/// One map pin per active report, colored by status.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MapMarker {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    pub color: String,
    pub report_type: ReportType,
    pub status: ReportStatus,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ReportListItem {
    pub id: String,
    pub report_type: ReportType,
    pub type_label: String,
    pub description: String,
    pub address: String,
    pub status: ReportStatus,
    pub status_label: String,
    pub is_mine: bool,
    pub is_duplicate: bool,
    pub is_false: bool,
    pub original_report_id: Option<String>,
    pub created_at: UnixTimeMs,
    pub updated_at: UnixTimeMs,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ViewModel {
    pub session: Option<User>,
    pub is_authenticated: bool,
    pub is_admin: bool,
    pub hydrated: bool,
    pub markers: Vec<MapMarker>,
    pub reports: Vec<ReportListItem>,
    pub my_reports: Vec<ReportListItem>,
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
    pub active_toast: Option<Toast>,
}

/// Ad hoc plain-text summary generated on demand for the admin dashboard.
/// Not a durable artifact.
#[must_use]
pub fn performance_summary(model: &Model) -> String {
    let reports = model.reports.all();
    let count_status =
        |status: ReportStatus| reports.iter().filter(|r| r.status == status).count();

    let mut summary = String::from("CivicFix Performance Summary\n");
    summary.push_str(&format!("Total reports: {}\n\n", reports.len()));

    summary.push_str("By status:\n");
    for status in [
        ReportStatus::Pending,
        ReportStatus::InProgress,
        ReportStatus::Resolved,
        ReportStatus::Withdrawn,
    ] {
        summary.push_str(&format!("  {}: {}\n", status.label(), count_status(status)));
    }

    summary.push_str("\nBy type:\n");
    for report_type in ReportType::ALL {
        let count = reports
            .iter()
            .filter(|r| r.report_type == report_type)
            .count();
        summary.push_str(&format!("  {}: {}\n", report_type.label(), count));
    }

    summary.push_str(&format!(
        "\nAverage resolution time: {AVG_RESOLUTION_TIME_DAYS} days\n"
    ));
    summary
}
