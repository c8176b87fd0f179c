//! The authoritative report collection and its lifecycle state machine.
//!
//! Every mutating operation takes the acting [`Principal`] and performs its
//! own authorization; callers get a tagged [`ReportError`] instead of relying
//! on UI-layer discipline. The store is the sole writer of the collection;
//! consumers read through `all`, `get` and the derived query helpers.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::model::{
    Location, Principal, Report, ReportId, ReportStatus, ReportType, UnixTimeMs, UserId,
    ValidationError, WithdrawalReason,
};
use crate::{DEGREES_TO_KM, MAX_DESCRIPTION_LEN};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReportError {
    #[error("report {id} not found")]
    NotFound { id: ReportId },

    #[error("report {id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        id: ReportId,
        from: ReportStatus,
        to: ReportStatus,
    },

    #[error("not permitted to {action} this report")]
    PermissionDenied { action: &'static str },

    #[error("report {id} is {status:?} and can no longer be edited")]
    EditLocked { id: ReportId, status: ReportStatus },

    #[error("report {id} cannot be a duplicate of itself")]
    DuplicateOfSelf { id: ReportId },

    #[error("report {original} is itself a duplicate and cannot be an original")]
    DuplicateChain { original: ReportId },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Input for `create`. The owner and timestamps are filled in by the store.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ReportDraft {
    pub report_type: ReportType,
    pub description: String,
    pub location: Location,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Partial update for `update`. Absent fields are left untouched.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct ReportPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_type: Option<ReportType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ReportStatus>,
}

impl ReportPatch {
    pub fn status(status: ReportStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    fn touches_descriptive_fields(&self) -> bool {
        self.report_type.is_some()
            || self.description.is_some()
            || self.location.is_some()
            || self.images.is_some()
    }
}

#[derive(Default)]
pub struct ReportStore {
    reports: Vec<Report>,
}

impl ReportStore {
    pub fn all(&self) -> &[Report] {
        &self.reports
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn get(&self, id: &ReportId) -> Option<&Report> {
        self.reports.iter().find(|r| &r.id == id)
    }

    /// The given user's reports, a pure function of (collection, id).
    pub fn user_reports(&self, user_id: &UserId) -> Vec<&Report> {
        self.reports.iter().filter(|r| &r.user_id == user_id).collect()
    }

    /// Reports within `radius_km` of the query point, using a planar
    /// degrees-to-km approximation (1 degree is roughly 111 km). Fine at city
    /// scale; do not use for anything geodesic.
    pub fn nearby(&self, lat: f64, lng: f64, radius_km: f64) -> Vec<&Report> {
        self.reports
            .iter()
            .filter(|r| {
                let dlat = r.location.coordinate.lat() - lat;
                let dlng = r.location.coordinate.lng() - lng;
                let distance_km = (dlat * dlat + dlng * dlng).sqrt() * DEGREES_TO_KM;
                distance_km <= radius_km
            })
            .collect()
    }

    /// Reports eligible to serve as an original when flagging `id` as a
    /// duplicate: pending or in-progress, and not the report itself.
    pub fn duplicate_candidates(&self, id: &ReportId) -> Vec<&Report> {
        self.reports
            .iter()
            .filter(|r| {
                &r.id != id
                    && matches!(r.status, ReportStatus::Pending | ReportStatus::InProgress)
            })
            .collect()
    }

    pub fn create(
        &mut self,
        principal: &Principal,
        draft: ReportDraft,
        now: UnixTimeMs,
    ) -> Result<Report, ReportError> {
        let description = draft.description.trim();
        if description.is_empty() {
            return Err(ValidationError::Empty {
                field: "description",
            }
            .into());
        }
        if description.len() > MAX_DESCRIPTION_LEN {
            return Err(ValidationError::TooLong {
                field: "description",
                len: description.len(),
                max: MAX_DESCRIPTION_LEN,
            }
            .into());
        }

        let report = Report {
            id: ReportId::generate(),
            user_id: principal.user_id.clone(),
            report_type: draft.report_type,
            description: description.to_owned(),
            location: draft.location,
            status: ReportStatus::Pending,
            images: draft.images,
            created_at: now,
            updated_at: now,
            withdrawal: None,
        };

        debug!(id = %report.id, type_ = ?report.report_type, "report created");
        self.reports.push(report.clone());
        Ok(report)
    }

    /// Merge `patch` into an existing report. Descriptive fields (type,
    /// description, location, images) are only editable while the report is
    /// still pending; status changes are admin territory and must follow the
    /// transition table. `Withdrawn` is never reachable through this path.
    pub fn update(
        &mut self,
        principal: &Principal,
        id: &ReportId,
        patch: ReportPatch,
        now: UnixTimeMs,
    ) -> Result<Report, ReportError> {
        let report = self
            .reports
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| ReportError::NotFound { id: id.clone() })?;

        if !principal.owns(report) && !principal.is_admin() {
            return Err(ReportError::PermissionDenied { action: "edit" });
        }

        if patch.touches_descriptive_fields() && report.status != ReportStatus::Pending {
            return Err(ReportError::EditLocked {
                id: id.clone(),
                status: report.status,
            });
        }

        // Validate the whole patch before touching the report, so a rejected
        // update leaves it exactly as it was.
        let next_status = match patch.status {
            Some(next) if next != report.status => {
                if !principal.is_admin() {
                    return Err(ReportError::PermissionDenied {
                        action: "change the status of",
                    });
                }
                // Withdrawal has its own entry points with their own rules.
                if next == ReportStatus::Withdrawn || !report.status.can_transition_to(next) {
                    return Err(ReportError::InvalidTransition {
                        id: id.clone(),
                        from: report.status,
                        to: next,
                    });
                }
                Some(next)
            }
            _ => None,
        };

        let description = match patch.description {
            Some(description) => {
                let description = description.trim();
                if description.is_empty() {
                    return Err(ValidationError::Empty {
                        field: "description",
                    }
                    .into());
                }
                if description.len() > MAX_DESCRIPTION_LEN {
                    return Err(ValidationError::TooLong {
                        field: "description",
                        len: description.len(),
                        max: MAX_DESCRIPTION_LEN,
                    }
                    .into());
                }
                Some(description.to_owned())
            }
            None => None,
        };

        if let Some(next) = next_status {
            report.status = next;
        }
        if let Some(report_type) = patch.report_type {
            report.report_type = report_type;
        }
        if let Some(description) = description {
            report.description = description;
        }
        if let Some(location) = patch.location {
            report.location = location;
        }
        if let Some(images) = patch.images {
            report.images = images;
        }

        report.touch(now);
        debug!(id = %report.id, status = ?report.status, "report updated");
        Ok(report.clone())
    }

    /// Citizen withdrawal: only the owner (or an admin) may withdraw, and only
    /// while the report is still pending. Irreversible.
    pub fn withdraw(
        &mut self,
        principal: &Principal,
        id: &ReportId,
        now: UnixTimeMs,
    ) -> Result<Report, ReportError> {
        let report = self
            .reports
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| ReportError::NotFound { id: id.clone() })?;

        if !principal.owns(report) && !principal.is_admin() {
            return Err(ReportError::PermissionDenied { action: "withdraw" });
        }

        if report.status != ReportStatus::Pending {
            return Err(ReportError::InvalidTransition {
                id: id.clone(),
                from: report.status,
                to: ReportStatus::Withdrawn,
            });
        }

        report.status = ReportStatus::Withdrawn;
        report.withdrawal = Some(WithdrawalReason::UserInitiated);
        report.touch(now);
        debug!(id = %report.id, "report withdrawn");
        Ok(report.clone())
    }

    /// Admin moderation: link a report to a pre-existing original and withdraw
    /// it. The original may carry any status but must not itself be a
    /// duplicate, so chains of duplicates cannot form.
    pub fn mark_duplicate(
        &mut self,
        principal: &Principal,
        id: &ReportId,
        original_id: &ReportId,
        now: UnixTimeMs,
    ) -> Result<Report, ReportError> {
        if !principal.is_admin() {
            return Err(ReportError::PermissionDenied { action: "moderate" });
        }
        if id == original_id {
            return Err(ReportError::DuplicateOfSelf { id: id.clone() });
        }

        let original = self
            .get(original_id)
            .ok_or_else(|| ReportError::NotFound {
                id: original_id.clone(),
            })?;
        if original.is_duplicate() {
            return Err(ReportError::DuplicateChain {
                original: original_id.clone(),
            });
        }

        let report = self
            .reports
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| ReportError::NotFound { id: id.clone() })?;

        if report.status.is_terminal() {
            return Err(ReportError::InvalidTransition {
                id: id.clone(),
                from: report.status,
                to: ReportStatus::Withdrawn,
            });
        }

        report.status = ReportStatus::Withdrawn;
        report.withdrawal = Some(WithdrawalReason::Duplicate {
            original: original_id.clone(),
        });
        report.touch(now);
        debug!(id = %report.id, original = %original_id, "report marked duplicate");
        Ok(report.clone())
    }

    /// Admin moderation: flag a report as illegitimate and withdraw it. Any
    /// prior active status is accepted, including resolved.
    pub fn mark_false(
        &mut self,
        principal: &Principal,
        id: &ReportId,
        now: UnixTimeMs,
    ) -> Result<Report, ReportError> {
        if !principal.is_admin() {
            return Err(ReportError::PermissionDenied { action: "moderate" });
        }

        let report = self
            .reports
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| ReportError::NotFound { id: id.clone() })?;

        if report.status.is_terminal() {
            return Err(ReportError::InvalidTransition {
                id: id.clone(),
                from: report.status,
                to: ReportStatus::Withdrawn,
            });
        }

        report.status = ReportStatus::Withdrawn;
        report.withdrawal = Some(WithdrawalReason::FalseReport);
        report.touch(now);
        debug!(id = %report.id, "report marked false");
        Ok(report.clone())
    }

    // --- Persistence snapshot ---

    pub fn snapshot_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.reports)
    }

    pub fn hydrate_json(&mut self, bytes: &[u8]) -> Result<(), serde_json::Error> {
        self.reports = serde_json::from_slice(bytes)?;
        Ok(())
    }
}


#[cfg(test)]
mod props {
    use super::*;
    use crate::model::{Coordinate, UserRole};
    use proptest::prelude::*;

    fn arb_coord() -> impl Strategy<Value = (f64, f64)> {
        (-89.0..89.0f64, -179.0..179.0f64)
    }

    proptest! {
        // Widening the radius never drops a previously matched report.
        #[test]
        fn nearby_is_monotonic_in_radius(
            (lat, lng) in arb_coord(),
            (qlat, qlng) in arb_coord(),
            r1 in 0.0..500.0f64,
            r2 in 0.0..500.0f64,
        ) {
            let mut store = ReportStore::default();
            let principal = Principal { user_id: UserId::new("u1"), role: UserRole::Citizen };
            store.create(
                &principal,
                ReportDraft {
                    report_type: ReportType::Other,
                    description: "x".into(),
                    location: Location::from_coordinate(Coordinate::new(lat, lng).unwrap()),
                    images: vec![],
                },
                UnixTimeMs(0),
            ).unwrap();

            let (small, large) = if r1 <= r2 { (r1, r2) } else { (r2, r1) };
            if !store.nearby(qlat, qlng, small).is_empty() {
                prop_assert!(!store.nearby(qlat, qlng, large).is_empty());
            }
        }

        // No sequence of admin status changes ever escapes Withdrawn or
        // produces a withdrawal reason without the Withdrawn status.
        #[test]
        fn status_and_reason_stay_consistent(steps in proptest::collection::vec(0..3usize, 1..20)) {
            let owner = Principal { user_id: UserId::new("u1"), role: UserRole::Citizen };
            let admin = Principal { user_id: UserId::new("a1"), role: UserRole::Admin };
            let mut store = ReportStore::default();
            let report = store.create(
                &owner,
                ReportDraft {
                    report_type: ReportType::Garbage,
                    description: "overflowing bin".into(),
                    location: Location::from_coordinate(Coordinate::new(0.0, 0.0).unwrap()),
                    images: vec![],
                },
                UnixTimeMs(0),
            ).unwrap();

            let statuses = [ReportStatus::Pending, ReportStatus::InProgress, ReportStatus::Resolved];
            for (i, step) in steps.iter().enumerate() {
                let _ = store.update(
                    &admin,
                    &report.id,
                    ReportPatch::status(statuses[*step]),
                    UnixTimeMs(i as u64),
                );
                let r = store.get(&report.id).unwrap();
                prop_assert_eq!(r.withdrawal.is_some(), r.status == ReportStatus::Withdrawn);
            }

            let _ = store.mark_false(&admin, &report.id, UnixTimeMs(1_000));
            let r = store.get(&report.id).unwrap();
            prop_assert_eq!(r.status, ReportStatus::Withdrawn);
            for (i, step) in steps.iter().enumerate() {
                prop_assert!(store.update(
                    &admin,
                    &report.id,
                    ReportPatch::status(statuses[*step]),
                    UnixTimeMs(2_000 + i as u64),
                ).is_err());
            }
        }
    }
}
