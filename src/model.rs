use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identity::IdentityStore;
use crate::notifications::NotificationStore;
use crate::reports::ReportStore;

// --- Secret wrapper: redacts Debug output ---

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

// --- Typed IDs ---

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

typed_id!(ReportId);
typed_id!(UserId);
typed_id!(NotificationId);

/// Explicit timestamp unit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct UnixTimeMs(pub u64);

// --- Coordinate: validated, NaN-safe ---

#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct Coordinate {
    lat: f64,
    lng: f64,
}

// No Eq: InvalidCoordinate carries f64 payloads.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("invalid coordinate: lat={0}, lng={1}")]
    InvalidCoordinate(f64, f64),
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },
    #[error("{field} too long ({len} > {max})")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, ValidationError> {
        if !lat.is_finite()
            || !lng.is_finite()
            || !(-90.0..=90.0).contains(&lat)
            || !(-180.0..=180.0).contains(&lng)
        {
            return Err(ValidationError::InvalidCoordinate(lat, lng));
        }
        Ok(Self { lat, lng })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }
}

impl PartialEq for Coordinate {
    fn eq(&self, other: &Self) -> bool {
        self.lat.to_bits() == other.lat.to_bits() && self.lng.to_bits() == other.lng.to_bits()
    }
}

impl Eq for Coordinate {}

/// A map coordinate plus its human-readable label. The address is produced by
/// the shell's reverse geocoder; when unavailable the raw-coordinate fallback
/// is used instead.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub coordinate: Coordinate,
    pub address: String,
}

impl Location {
    pub fn new(coordinate: Coordinate, address: impl Into<String>) -> Self {
        Self {
            coordinate,
            address: address.into(),
        }
    }

    /// Raw-coordinate label used when reverse geocoding is unavailable.
    pub fn from_coordinate(coordinate: Coordinate) -> Self {
        Self {
            address: format!(
                "Latitude: {}, Longitude: {}",
                coordinate.lat(),
                coordinate.lng()
            ),
            coordinate,
        }
    }
}

// --- Report domain ---

#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ReportType {
    Pothole,
    StreetLight,
    Graffiti,
    Garbage,
    Sidewalk,
    TrafficSign,
    Other,
}

impl ReportType {
    pub const ALL: [ReportType; 7] = [
        Self::Pothole,
        Self::StreetLight,
        Self::Graffiti,
        Self::Garbage,
        Self::Sidewalk,
        Self::TrafficSign,
        Self::Other,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Pothole => "Pothole",
            Self::StreetLight => "Street Light",
            Self::Graffiti => "Graffiti",
            Self::Garbage => "Garbage",
            Self::Sidewalk => "Sidewalk",
            Self::TrafficSign => "Traffic Sign",
            Self::Other => "Other",
        }
    }
}

#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ReportStatus {
    Pending,
    InProgress,
    Resolved,
    Withdrawn,
}

impl ReportStatus {
    /// Permitted next statuses. `Withdrawn` is terminal: the only entries are
    /// owner withdrawal and admin moderation, never a plain status change.
    pub fn valid_transitions(self) -> &'static [ReportStatus] {
        match self {
            Self::Pending => &[Self::InProgress, Self::Resolved, Self::Withdrawn],
            Self::InProgress => &[Self::Pending, Self::Resolved],
            Self::Resolved => &[Self::Pending, Self::InProgress],
            Self::Withdrawn => &[],
        }
    }

    pub fn can_transition_to(self, next: ReportStatus) -> bool {
        self.valid_transitions().contains(&next)
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Withdrawn)
    }

    /// An active report is still in consideration and shows up on the map.
    pub const fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Map marker color for this status. Withdrawn reports have no marker.
    pub const fn marker_color(self) -> Option<&'static str> {
        match self {
            Self::Pending => Some("red"),
            Self::InProgress => Some("yellow"),
            Self::Resolved => Some("green"),
            Self::Withdrawn => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In Progress",
            Self::Resolved => "Resolved",
            Self::Withdrawn => "Withdrawn",
        }
    }
}

/// Why a report left active consideration. A report carries at most one
/// reason; holding it as a single enum makes the duplicate/false/user flags
/// mutually exclusive by construction.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum WithdrawalReason {
    UserInitiated,
    Duplicate { original: ReportId },
    FalseReport,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Report {
    pub id: ReportId,
    pub user_id: UserId,
    pub report_type: ReportType,
    pub description: String,
    pub location: Location,
    pub status: ReportStatus,
    /// Opaque blob references (URLs or blob ids) produced by the shell.
    pub images: Vec<String>,
    pub created_at: UnixTimeMs,
    pub updated_at: UnixTimeMs,
    /// `Some` iff `status == Withdrawn`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawal: Option<WithdrawalReason>,
}

impl Report {
    pub fn is_duplicate(&self) -> bool {
        matches!(self.withdrawal, Some(WithdrawalReason::Duplicate { .. }))
    }

    pub fn is_false(&self) -> bool {
        matches!(self.withdrawal, Some(WithdrawalReason::FalseReport))
    }

    pub fn original_report_id(&self) -> Option<&ReportId> {
        match &self.withdrawal {
            Some(WithdrawalReason::Duplicate { original }) => Some(original),
            _ => None,
        }
    }

    /// Refresh `updated_at`, keeping it strictly increasing even when two
    /// mutations land within the same millisecond.
    pub(crate) fn touch(&mut self, now: UnixTimeMs) {
        self.updated_at = UnixTimeMs(now.0.max(self.updated_at.0 + 1));
    }
}

// --- Users & principals ---

#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum UserRole {
    Citizen,
    Admin,
}

/// The session-facing view of a user. Never carries the password.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

/// Durable registered-user record. The password is held verbatim (there is no
/// real credential verification in this app) but stays out of Debug output.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub password: Secret,
}

impl UserRecord {
    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// The acting identity behind a store operation. Every mutating report
/// operation authorizes against this rather than trusting the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub role: UserRole,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn owns(&self, report: &Report) -> bool {
        self.user_id == report.user_id
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            role: user.role,
        }
    }
}

// --- Notifications ---

#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub read: bool,
    pub created_at: UnixTimeMs,
}

/// Transient UI acknowledgment handed to the shell's toast presenter.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Toast {
    pub title: String,
    pub description: String,
    pub kind: NotificationKind,
}

impl Toast {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            kind: NotificationKind::Success,
        }
    }

    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            kind: NotificationKind::Info,
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            kind: NotificationKind::Error,
        }
    }
}

// --- Root model ---

/// Root application state: the three service-object stores plus transient UI
/// state. Constructed once at process start; hydrated from storage by the
/// `AppStarted` flow.
#[derive(Default)]
pub struct Model {
    pub identity: IdentityStore,
    pub reports: ReportStore,
    pub notifications: NotificationStore,

    /// True once the three startup keys have been answered by the shell.
    pub hydrated: bool,
    /// Startup keys still awaiting a shell response.
    pub(crate) pending_hydration: u8,
    pub active_toast: Option<Toast>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_rejects_nan_and_out_of_range() {
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::INFINITY).is_err());
        assert!(Coordinate::new(91.0, 0.0).is_err());
        assert!(Coordinate::new(0.0, -181.0).is_err());
        assert!(Coordinate::new(43.6532, -79.3832).is_ok());
        assert!(Coordinate::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn coordinate_errors_carry_the_offending_values() {
        assert_eq!(
            Coordinate::new(91.0, 10.0).unwrap_err(),
            ValidationError::InvalidCoordinate(91.0, 10.0)
        );
    }

    #[test]
    fn fallback_address_spells_out_raw_coordinates() {
        let loc = Location::from_coordinate(Coordinate::new(12.5, -7.25).unwrap());
        assert_eq!(loc.address, "Latitude: 12.5, Longitude: -7.25");
    }

    #[test]
    fn secret_debug_is_redacted() {
        let s = Secret::new("hunter2");
        assert_eq!(format!("{s:?}"), "[REDACTED]");
    }

    #[test]
    fn withdrawn_is_terminal() {
        assert!(ReportStatus::Withdrawn.valid_transitions().is_empty());
        assert!(ReportStatus::Withdrawn.is_terminal());
        assert!(ReportStatus::Withdrawn.marker_color().is_none());
    }

    #[test]
    fn active_statuses_move_freely_between_each_other() {
        use ReportStatus::*;
        for from in [Pending, InProgress, Resolved] {
            for to in [Pending, InProgress, Resolved] {
                if from != to {
                    assert!(from.can_transition_to(to), "{from:?} -> {to:?}");
                }
            }
        }
        assert!(!InProgress.can_transition_to(Withdrawn));
        assert!(!Resolved.can_transition_to(Withdrawn));
    }

    #[test]
    fn report_type_round_trips_kebab_case() {
        let json = serde_json::to_string(&ReportType::StreetLight).unwrap();
        assert_eq!(json, "\"street-light\"");
        let back: ReportType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ReportType::StreetLight);
    }

    #[test]
    fn touch_is_strictly_monotonic() {
        let mut report = Report {
            id: ReportId::new("r1"),
            user_id: UserId::new("u1"),
            report_type: ReportType::Pothole,
            description: "x".into(),
            location: Location::from_coordinate(Coordinate::new(0.0, 0.0).unwrap()),
            status: ReportStatus::Pending,
            images: vec![],
            created_at: UnixTimeMs(100),
            updated_at: UnixTimeMs(100),
            withdrawal: None,
        };
        report.touch(UnixTimeMs(100));
        assert_eq!(report.updated_at, UnixTimeMs(101));
        report.touch(UnixTimeMs(500));
        assert_eq!(report.updated_at, UnixTimeMs(500));
    }
}
