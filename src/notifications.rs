//! Per-user notification inbox.
//!
//! Append-only sink fed by the update loop after a report operation succeeds.
//! The inbox is partitioned by user id in storage (`notifications_<userId>`)
//! and swapped out whenever the session user changes.

use tracing::debug;

use crate::model::{Notification, NotificationId, NotificationKind, UnixTimeMs, UserId};

#[derive(Default)]
pub struct NotificationStore {
    user_id: Option<UserId>,
    items: Vec<Notification>,
}

impl NotificationStore {
    /// Point the inbox at a new user. Any previous user's items are dropped
    /// from memory; they stay under that user's storage key.
    pub fn switch_user(&mut self, user_id: Option<UserId>) {
        if self.user_id != user_id {
            self.user_id = user_id;
            self.items.clear();
        }
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.read).count()
    }

    /// Prepend a new unread notification so the newest shows first.
    pub fn add(
        &mut self,
        title: impl Into<String>,
        message: impl Into<String>,
        kind: NotificationKind,
        now: UnixTimeMs,
    ) -> &Notification {
        let notification = Notification {
            id: NotificationId::generate(),
            title: title.into(),
            message: message.into(),
            kind,
            read: false,
            created_at: now,
        };
        debug!(id = %notification.id, "notification added");
        self.items.insert(0, notification);
        &self.items[0]
    }

    pub fn mark_read(&mut self, id: &NotificationId) -> bool {
        match self.items.iter_mut().find(|n| &n.id == id) {
            Some(n) => {
                n.read = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_read(&mut self) {
        for n in &mut self.items {
            n.read = true;
        }
    }

    pub fn remove(&mut self, id: &NotificationId) -> bool {
        let before = self.items.len();
        self.items.retain(|n| &n.id != id);
        self.items.len() != before
    }

    pub fn clear_all(&mut self) {
        self.items.clear();
    }

    // --- Persistence snapshot ---

    pub fn snapshot_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.items)
    }

    pub fn hydrate_json(&mut self, bytes: &[u8]) -> Result<(), serde_json::Error> {
        self.items = serde_json::from_slice(bytes)?;
        Ok(())
    }

    /// Fold a stored snapshot into the in-memory inbox. The load resolves
    /// asynchronously, so items added in the meantime stay in front and the
    /// stored items they do not already cover are appended. Returns whether
    /// the snapshot contributed anything.
    pub fn merge_json(&mut self, bytes: &[u8]) -> Result<bool, serde_json::Error> {
        let stored: Vec<Notification> = serde_json::from_slice(bytes)?;
        let before = self.items.len();
        for notification in stored {
            if !self.items.iter().any(|n| n.id == notification.id) {
                self.items.push(notification);
            }
        }
        Ok(self.items.len() != before)
    }
}
