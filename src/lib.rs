#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod app;
pub mod capabilities;
pub mod event;
pub mod identity;
pub mod model;
pub mod notifications;
pub mod reports;

use serde::{Deserialize, Serialize};

pub use app::{App, MapMarker, ReportListItem, ViewModel};
pub use capabilities::{Capabilities, Effect};
pub use event::Event;
pub use model::Model;

/// Flat-earth degrees-to-kilometers factor used by the nearby query.
/// Acceptable at city scale; documented approximation, not a bug.
pub const DEGREES_TO_KM: f64 = 111.0;

pub const MAX_DESCRIPTION_LEN: usize = 4096;

/// Static figure quoted by the performance summary; there is no real
/// resolution-time tracking in this app.
pub const AVG_RESOLUTION_TIME_DAYS: f64 = 3.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    InvalidTransition,
    PermissionDenied,
    Unauthenticated,
    InvalidCredentials,
    DuplicateEmail,
    Validation,
    Storage,
    Serialization,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::PermissionDenied => "FORBIDDEN",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::DuplicateEmail => "DUPLICATE_EMAIL",
            Self::Validation => "VALIDATION_ERROR",
            Self::Storage => "STORAGE_ERROR",
            Self::Serialization => "SERIALIZATION_ERROR",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

/// Crate-level error surfaced to the shell. Callers branch on `kind`, never
/// on message text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::NotFound => "The requested report could not be found.".into(),
            ErrorKind::InvalidTransition => self.message.clone(),
            ErrorKind::PermissionDenied => {
                "You don't have permission to perform this action.".into()
            }
            ErrorKind::Unauthenticated => "Please sign in to continue.".into(),
            ErrorKind::InvalidCredentials | ErrorKind::DuplicateEmail => self.message.clone(),
            ErrorKind::Validation => self.message.clone(),
            ErrorKind::Storage => {
                "Unable to save data locally. Please free up some storage space.".into()
            }
            ErrorKind::Serialization => {
                "A data error occurred. Please contact support if this persists.".into()
            }
            ErrorKind::Internal => "An unexpected error occurred. Please try again.".into(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<reports::ReportError> for AppError {
    fn from(e: reports::ReportError) -> Self {
        use reports::ReportError;
        let kind = match &e {
            ReportError::NotFound { .. } => ErrorKind::NotFound,
            ReportError::InvalidTransition { .. } | ReportError::EditLocked { .. } => {
                ErrorKind::InvalidTransition
            }
            ReportError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            ReportError::DuplicateOfSelf { .. } | ReportError::DuplicateChain { .. } => {
                ErrorKind::Validation
            }
            ReportError::Validation(_) => ErrorKind::Validation,
        };
        Self::new(kind, e.to_string())
    }
}

impl From<identity::IdentityError> for AppError {
    fn from(e: identity::IdentityError) -> Self {
        use identity::IdentityError;
        let kind = match &e {
            IdentityError::InvalidCredentials => ErrorKind::InvalidCredentials,
            IdentityError::DuplicateEmail { .. } => ErrorKind::DuplicateEmail,
            IdentityError::InvalidRegistration => ErrorKind::Validation,
        };
        Self::new(kind, e.to_string())
    }
}

impl From<capabilities::StorageError> for AppError {
    fn from(e: capabilities::StorageError) -> Self {
        Self::new(ErrorKind::Storage, e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorKind::Serialization, e.to_string())
    }
}
