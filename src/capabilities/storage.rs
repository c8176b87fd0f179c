//! Key-value storage capability.
//!
//! The shell owns the actual store (browser `localStorage` or a mobile
//! equivalent); the core describes what to read or write through
//! [`StorageOperation`] and receives [`StorageResult`] back. The persisted
//! layout is fixed: `user` (session), `users` (registered-user table),
//! `reports` (whole report collection) and `notifications_<userId>` (per-user
//! inbox), each JSON-encoded.

use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::UserId;

pub const MAX_KEY_LENGTH: usize = 256;
pub const MAX_VALUE_SIZE: usize = 5 * 1024 * 1024;

const SESSION_KEY: &str = "user";
const USERS_KEY: &str = "users";
const REPORTS_KEY: &str = "reports";
const NOTIFICATIONS_PREFIX: &str = "notifications_";

/// The fixed key layout. `raw()` yields the literal storage key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageKey {
    Session,
    Users,
    Reports,
    Notifications(UserId),
}

impl StorageKey {
    pub fn notifications(user_id: &UserId) -> Result<Self, StorageError> {
        validate_key_segment(user_id.as_str())?;
        Ok(Self::Notifications(user_id.clone()))
    }

    pub fn raw(&self) -> String {
        match self {
            Self::Session => SESSION_KEY.to_owned(),
            Self::Users => USERS_KEY.to_owned(),
            Self::Reports => REPORTS_KEY.to_owned(),
            Self::Notifications(user_id) => format!("{NOTIFICATIONS_PREFIX}{user_id}"),
        }
    }
}

fn validate_key_segment(segment: &str) -> Result<(), StorageError> {
    if segment.trim().is_empty() {
        return Err(StorageError::InvalidKey {
            key: segment.to_owned(),
            reason: "key segment cannot be empty".to_owned(),
        });
    }
    if segment.len() + NOTIFICATIONS_PREFIX.len() > MAX_KEY_LENGTH {
        return Err(StorageError::InvalidKey {
            key: segment.chars().take(50).collect(),
            reason: format!("key exceeds maximum length of {MAX_KEY_LENGTH} bytes"),
        });
    }
    if segment.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(StorageError::InvalidKey {
            key: segment.to_owned(),
            reason: "key contains invalid characters".to_owned(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", content = "data")]
pub enum StorageOperation {
    Load { key: String },
    Save { key: String, value: Vec<u8> },
    Remove { key: String },
}

impl Operation for StorageOperation {
    type Output = StorageResult;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum StorageOutput {
    /// `None` when the key has never been written.
    Loaded(Option<Vec<u8>>),
    Saved,
    Removed { existed: bool },
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum StorageError {
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("value too large: {size} bytes exceeds maximum of {max} bytes")]
    ValueTooLarge { size: usize, max: usize },

    #[error("quota exceeded: {used}/{limit} bytes")]
    QuotaExceeded { used: u64, limit: u64 },

    #[error("storage error: {message} (retryable: {retryable})")]
    Backend { message: String, retryable: bool },
}

impl StorageError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend { retryable: true, .. })
    }
}

pub type StorageResult = Result<StorageOutput, StorageError>;

pub struct Storage<Ev> {
    context: CapabilityContext<StorageOperation, Ev>,
}

impl<Ev> Capability<Ev> for Storage<Ev> {
    type Operation = StorageOperation;
    type MappedSelf<MappedEv> = Storage<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Storage::new(self.context.map_event(f))
    }
}

impl<Ev> Storage<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<StorageOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn load<F>(&self, key: &StorageKey, make_event: F)
    where
        F: FnOnce(StorageResult) -> Ev + Send + 'static,
    {
        let context = self.context.clone();
        let key = key.raw();
        self.context.spawn(async move {
            let result = context
                .request_from_shell(StorageOperation::Load { key })
                .await;
            context.update_app(make_event(result));
        });
    }

    pub fn save<F>(&self, key: &StorageKey, value: Vec<u8>, make_event: F)
    where
        F: FnOnce(StorageResult) -> Ev + Send + 'static,
    {
        if value.len() > MAX_VALUE_SIZE {
            self.context.update_app(make_event(Err(StorageError::ValueTooLarge {
                size: value.len(),
                max: MAX_VALUE_SIZE,
            })));
            return;
        }
        let context = self.context.clone();
        let key = key.raw();
        self.context.spawn(async move {
            let result = context
                .request_from_shell(StorageOperation::Save { key, value })
                .await;
            context.update_app(make_event(result));
        });
    }

    pub fn remove<F>(&self, key: &StorageKey, make_event: F)
    where
        F: FnOnce(StorageResult) -> Ev + Send + 'static,
    {
        let context = self.context.clone();
        let key = key.raw();
        self.context.spawn(async move {
            let result = context
                .request_from_shell(StorageOperation::Remove { key })
                .await;
            context.update_app(make_event(result));
        });
    }
}
