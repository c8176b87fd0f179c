//! Session principal and the durable registered-users table.
//!
//! Credentials are not cryptographically verified anywhere in this app (an
//! explicit non-goal); login requires a non-empty password and a registered
//! email, and takes the role from the stored record rather than trusting the
//! caller's hint.

use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{Principal, Secret, User, UserId, UserRecord, UserRole};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("an account with this email already exists")]
    DuplicateEmail { email: String },

    #[error("invalid registration details")]
    InvalidRegistration,
}

#[derive(Default)]
pub struct IdentityStore {
    session: Option<User>,
    users: Vec<UserRecord>,
}

impl IdentityStore {
    pub fn current_user(&self) -> Option<&User> {
        self.session.as_ref()
    }

    pub fn principal(&self) -> Option<Principal> {
        self.session.as_ref().map(Principal::from)
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_admin(&self) -> bool {
        matches!(&self.session, Some(user) if user.role == UserRole::Admin)
    }

    pub fn registered_count(&self) -> usize {
        self.users.len()
    }

    /// Look up the registered user by email and open a session. The stored
    /// record's role is authoritative; an admin `role_hint` against a citizen
    /// record is treated as bad credentials rather than an escalation path.
    pub fn login(
        &mut self,
        email: &str,
        password: &Secret,
        role_hint: UserRole,
    ) -> Result<User, IdentityError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(IdentityError::InvalidCredentials);
        }

        let record = self
            .users
            .iter()
            .find(|u| u.email == email)
            .ok_or(IdentityError::InvalidCredentials)?;

        if role_hint == UserRole::Admin && record.role != UserRole::Admin {
            warn!(email, "admin login attempted against citizen record");
            return Err(IdentityError::InvalidCredentials);
        }

        let user = record.to_user();
        debug!(user_id = %user.id, role = ?user.role, "login");
        self.session = Some(user.clone());
        Ok(user)
    }

    /// Append a new citizen record and log it in. Fails without touching the
    /// table when the email is already registered.
    pub fn register(
        &mut self,
        name: &str,
        email: &str,
        password: Secret,
    ) -> Result<User, IdentityError> {
        if name.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
            return Err(IdentityError::InvalidRegistration);
        }
        if self.users.iter().any(|u| u.email == email) {
            return Err(IdentityError::DuplicateEmail {
                email: email.to_owned(),
            });
        }

        let record = UserRecord {
            id: UserId::generate(),
            name: name.trim().to_owned(),
            email: email.to_owned(),
            role: UserRole::Citizen,
            password,
        };
        let user = record.to_user();
        debug!(user_id = %user.id, "registered");

        self.users.push(record);
        self.session = Some(user.clone());
        Ok(user)
    }

    pub fn logout(&mut self) -> Option<User> {
        let user = self.session.take();
        if let Some(user) = &user {
            debug!(user_id = %user.id, "logout");
        }
        user
    }

    // --- Persistence snapshots: session and table live under separate keys ---

    pub fn session_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.session)
    }

    pub fn users_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.users)
    }

    pub fn hydrate_session(&mut self, bytes: &[u8]) -> Result<(), serde_json::Error> {
        self.session = serde_json::from_slice(bytes)?;
        Ok(())
    }

    pub fn hydrate_users(&mut self, bytes: &[u8]) -> Result<(), serde_json::Error> {
        self.users = serde_json::from_slice(bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(email: &str, id: &str, role: UserRole) -> IdentityStore {
        let mut store = IdentityStore::default();
        store.users.push(UserRecord {
            id: UserId::new(id),
            name: "A".into(),
            email: email.into(),
            role,
            password: Secret::new("pw"),
        });
        store
    }

    #[test]
    fn login_matches_registered_email() {
        let mut store = store_with("a@b.com", "u1", UserRole::Citizen);
        let user = store
            .login("a@b.com", &Secret::new("x"), UserRole::Citizen)
            .unwrap();
        assert_eq!(user.id, UserId::new("u1"));
        assert!(store.is_authenticated());
        assert!(!store.is_admin());
    }

    #[test]
    fn login_unregistered_email_fails() {
        let mut store = store_with("a@b.com", "u1", UserRole::Citizen);
        let err = store
            .login("nobody@b.com", &Secret::new("x"), UserRole::Citizen)
            .unwrap_err();
        assert_eq!(err, IdentityError::InvalidCredentials);
        assert!(!store.is_authenticated());
    }

    #[test]
    fn login_rejects_empty_fields() {
        let mut store = store_with("a@b.com", "u1", UserRole::Citizen);
        assert!(store
            .login("", &Secret::new("x"), UserRole::Citizen)
            .is_err());
        assert!(store
            .login("a@b.com", &Secret::new(""), UserRole::Citizen)
            .is_err());
    }

    #[test]
    fn admin_hint_does_not_escalate_citizen_record() {
        let mut store = store_with("a@b.com", "u1", UserRole::Citizen);
        let err = store
            .login("a@b.com", &Secret::new("x"), UserRole::Admin)
            .unwrap_err();
        assert_eq!(err, IdentityError::InvalidCredentials);
    }

    #[test]
    fn admin_record_logs_in_as_admin() {
        let mut store = store_with("ops@city.gov", "adm", UserRole::Admin);
        store
            .login("ops@city.gov", &Secret::new("x"), UserRole::Admin)
            .unwrap();
        assert!(store.is_admin());
    }

    #[test]
    fn register_appends_and_logs_in_as_citizen() {
        let mut store = IdentityStore::default();
        let user = store
            .register("Ada", "ada@b.com", Secret::new("pw"))
            .unwrap();
        assert_eq!(user.role, UserRole::Citizen);
        assert_eq!(store.registered_count(), 1);
        assert_eq!(store.current_user(), Some(&user));
    }

    #[test]
    fn duplicate_email_leaves_table_unchanged() {
        let mut store = store_with("a@b.com", "u1", UserRole::Citizen);
        let before = store.registered_count();
        let err = store
            .register("B", "a@b.com", Secret::new("pw"))
            .unwrap_err();
        assert!(matches!(err, IdentityError::DuplicateEmail { .. }));
        assert_eq!(store.registered_count(), before);
    }

    #[test]
    fn logout_clears_session() {
        let mut store = store_with("a@b.com", "u1", UserRole::Citizen);
        store
            .login("a@b.com", &Secret::new("x"), UserRole::Citizen)
            .unwrap();
        assert!(store.logout().is_some());
        assert!(!store.is_authenticated());
        assert!(store.principal().is_none());
    }

    #[test]
    fn snapshots_round_trip() {
        let mut store = store_with("a@b.com", "u1", UserRole::Citizen);
        store
            .login("a@b.com", &Secret::new("x"), UserRole::Citizen)
            .unwrap();

        let session = store.session_json().unwrap();
        let users = store.users_json().unwrap();

        let mut restored = IdentityStore::default();
        restored.hydrate_session(&session).unwrap();
        restored.hydrate_users(&users).unwrap();
        assert_eq!(restored.current_user(), store.current_user());
        assert_eq!(restored.registered_count(), 1);
    }
}
