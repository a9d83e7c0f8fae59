// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assignment resolver.
//!
//! Matches staff to a booking slot. Every listed staff member is checked for
//! overlapping work in input order and the first conflict aborts the whole
//! batch. The same checks are repeated as guards inside the store
//! transaction, so two concurrent calls cannot both win the same slot.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tidyhq_core::{
    Assignment, AssignmentRole, Booking, BookingId, BookingStatus, BookingStore, ChangeSet, Clock,
    EntityKind, JobId, ScheduleGuard, StaffId, StatusChange, TidyError, find_conflict,
};
use tracing::info;

use crate::lifecycle::load_team;
use crate::notifications::{Composer, TeamMember};

/// Actor recorded in status history when an assignment confirms a booking.
pub const ASSIGNMENT_ACTOR: &str = "assignment";

/// Per-call options for [`AssignmentResolver::assign`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignOptions {
    /// Announce the team to the customer. `None` falls back to the configured default.
    #[serde(default)]
    pub notify_customer: Option<bool>,
}

/// Result of a successful assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentOutcome {
    pub booking: Booking,
    /// The booking's full team after the change, lead first.
    pub assignments: Vec<Assignment>,
    /// The booking moved from `pending` to `confirmed`.
    pub confirmed: bool,
    pub job_ids: Vec<JobId>,
}

/// Assigns and unassigns staff.
pub struct AssignmentResolver<S: ?Sized> {
    store: Arc<S>,
    composer: Arc<Composer>,
    clock: Arc<dyn Clock>,
    notify_customer_default: bool,
}

impl<S: BookingStore + ?Sized> AssignmentResolver<S> {
    pub fn new(
        store: Arc<S>,
        composer: Arc<Composer>,
        clock: Arc<dyn Clock>,
        notify_customer_default: bool,
    ) -> Self {
        Self {
            store,
            composer,
            clock,
            notify_customer_default,
        }
    }

    async fn open_booking(&self, booking_id: &BookingId) -> Result<Booking, TidyError> {
        let booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| TidyError::not_found(EntityKind::Booking, booking_id.0.clone()))?;
        if booking.status.is_terminal() {
            return Err(TidyError::BookingTerminal {
                booking_id: booking_id.clone(),
                status: booking.status,
            });
        }
        Ok(booking)
    }

    /// Assigns `staff_ids` to the booking.
    ///
    /// With [`AssignmentRole::Lead`] the first listed staff member becomes
    /// lead and the rest assistants; any other current lead is demoted.
    pub async fn assign(
        &self,
        booking_id: &BookingId,
        staff_ids: &[StaffId],
        role: AssignmentRole,
        options: AssignOptions,
    ) -> Result<AssignmentOutcome, TidyError> {
        if staff_ids.is_empty() {
            return Err(TidyError::Validation("at least one staff member is required".into()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = staff_ids.iter().find(|id| !seen.insert(*id)) {
            return Err(TidyError::Validation(format!("staff member {dup} is listed twice")));
        }

        let booking = self.open_booking(booking_id).await?;
        let window = booking.window();
        let (from, to) = window.lookup_dates();

        let mut requested = Vec::with_capacity(staff_ids.len());
        for (index, staff_id) in staff_ids.iter().enumerate() {
            let staff = self
                .store
                .get_staff(staff_id)
                .await?
                .ok_or_else(|| TidyError::not_found(EntityKind::Staff, staff_id.0.clone()))?;
            if !staff.active {
                return Err(TidyError::Validation(format!(
                    "staff member {staff_id} is inactive"
                )));
            }
            let schedule = self.store.staff_schedule(staff_id, from, to).await?;
            if let Some(hit) = find_conflict(booking_id, &window, &schedule) {
                return Err(TidyError::ScheduleConflict {
                    staff_id: staff_id.clone(),
                    booking_id: booking_id.clone(),
                    conflicting_booking: hit.assignment.booking_id.clone(),
                });
            }
            let member_role = match role {
                AssignmentRole::Lead if index == 0 => AssignmentRole::Lead,
                _ => AssignmentRole::Assistant,
            };
            requested.push(TeamMember {
                staff,
                role: member_role,
            });
        }

        let now = self.clock.now();
        let current = load_team(self.store.as_ref(), booking_id).await?;
        let gains_lead = requested.iter().any(|m| m.role == AssignmentRole::Lead);

        let mut upserts: Vec<Assignment> = requested
            .iter()
            .map(|m| Assignment {
                booking_id: booking_id.clone(),
                staff_id: m.staff.id.clone(),
                role: m.role,
                assigned_at: now,
            })
            .collect();
        if gains_lead {
            for member in &current {
                let listed = staff_ids.contains(&member.staff.id);
                if member.role == AssignmentRole::Lead && !listed {
                    upserts.push(Assignment {
                        booking_id: booking_id.clone(),
                        staff_id: member.staff.id.clone(),
                        role: AssignmentRole::Assistant,
                        assigned_at: now,
                    });
                }
            }
        }

        let confirms = gains_lead && booking.status == BookingStatus::Pending;
        let status = confirms.then(|| StatusChange {
            booking_id: booking_id.clone(),
            from: BookingStatus::Pending,
            to: BookingStatus::Confirmed,
            actor: ASSIGNMENT_ACTOR.to_string(),
            reason: None,
        });

        let mut jobs = Vec::new();
        for member in &requested {
            let already = current.iter().any(|c| c.staff.id == member.staff.id);
            if !already {
                jobs.extend(self.composer.staff_assignment(&booking, member));
            }
        }
        if options.notify_customer.unwrap_or(self.notify_customer_default) {
            let team = merged_team(&current, &requested, gains_lead);
            jobs.extend(self.composer.team_announcement(&booking, &team));
        }

        let guards = requested
            .iter()
            .map(|m| ScheduleGuard {
                staff_id: m.staff.id.clone(),
                booking_id: booking_id.clone(),
                window,
            })
            .collect();

        let receipt = self
            .store
            .commit(
                ChangeSet {
                    status,
                    guards,
                    upserts,
                    removals: Vec::new(),
                    jobs,
                },
                now,
            )
            .await?;

        info!(
            %booking_id,
            staff = ?staff_ids.iter().map(|s| s.0.as_str()).collect::<Vec<_>>(),
            %role,
            confirmed = confirms,
            jobs = receipt.job_ids.len(),
            "staff assigned"
        );

        let booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| TidyError::not_found(EntityKind::Booking, booking_id.0.clone()))?;
        let assignments = self.store.assignments_for_booking(booking_id).await?;
        Ok(AssignmentOutcome {
            booking,
            assignments,
            confirmed: confirms,
            job_ids: receipt.job_ids,
        })
    }

    /// Removes one assignment. The booking status is left as it is.
    pub async fn unassign(
        &self,
        booking_id: &BookingId,
        staff_id: &StaffId,
    ) -> Result<Vec<Assignment>, TidyError> {
        self.open_booking(booking_id).await?;
        let current = self.store.assignments_for_booking(booking_id).await?;
        if !current.iter().any(|a| a.staff_id == *staff_id) {
            return Err(TidyError::not_found(
                EntityKind::Assignment,
                format!("{booking_id}/{staff_id}"),
            ));
        }
        self.store
            .commit(
                ChangeSet {
                    removals: vec![(booking_id.clone(), staff_id.clone())],
                    ..Default::default()
                },
                self.clock.now(),
            )
            .await?;
        info!(%booking_id, %staff_id, "staff unassigned");
        self.store.assignments_for_booking(booking_id).await
    }
}

/// The team as it will look after the upserts land, lead first.
fn merged_team(current: &[TeamMember], requested: &[TeamMember], gains_lead: bool) -> Vec<TeamMember> {
    let mut team: Vec<TeamMember> = current
        .iter()
        .filter(|c| !requested.iter().any(|r| r.staff.id == c.staff.id))
        .cloned()
        .map(|mut c| {
            if gains_lead {
                c.role = AssignmentRole::Assistant;
            }
            c
        })
        .collect();
    team.extend(requested.iter().cloned());
    team.sort_by_key(|m| m.role != AssignmentRole::Lead);
    team
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidyhq_config::model::NotificationsConfig;
    use tidyhq_core::{JobFilter, JobQueue};
    use tidyhq_test_utils::fixtures::{booking, staff, t0};
    use tidyhq_test_utils::{InMemoryStore, ManualClock};

    async fn resolver(notify_default: bool) -> (Arc<InMemoryStore>, AssignmentResolver<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        for (id, name) in [("S1", "Ana"), ("S2", "Bo"), ("S3", "Cy")] {
            store.upsert_staff(&staff(id, name)).await.unwrap();
        }
        store
            .insert_booking(&booking("B1", "2026-05-02", "09:00", 180))
            .await
            .unwrap();
        let composer = Arc::new(Composer::new(NotificationsConfig::default(), 5));
        let resolver = AssignmentResolver::new(
            store.clone(),
            composer,
            Arc::new(ManualClock::new(t0())),
            notify_default,
        );
        (store, resolver)
    }

    fn ids(raw: &[&str]) -> Vec<StaffId> {
        raw.iter().map(|s| StaffId((*s).into())).collect()
    }

    #[tokio::test]
    async fn first_listed_becomes_lead_rest_assist() {
        let (_, resolver) = resolver(false).await;
        let outcome = resolver
            .assign(&"B1".into(), &ids(&["S1", "S2"]), AssignmentRole::Lead, AssignOptions::default())
            .await
            .unwrap();
        let roles: Vec<(String, AssignmentRole)> = outcome
            .assignments
            .iter()
            .map(|a| (a.staff_id.0.clone(), a.role))
            .collect();
        assert_eq!(
            roles,
            vec![
                ("S1".to_string(), AssignmentRole::Lead),
                ("S2".to_string(), AssignmentRole::Assistant)
            ]
        );
        assert!(outcome.confirmed);
        assert_eq!(outcome.job_ids.len(), 2);
    }

    #[tokio::test]
    async fn assistants_alone_do_not_confirm() {
        let (_, resolver) = resolver(false).await;
        let outcome = resolver
            .assign(&"B1".into(), &ids(&["S2"]), AssignmentRole::Assistant, AssignOptions::default())
            .await
            .unwrap();
        assert!(!outcome.confirmed);
        assert_eq!(outcome.booking.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn new_lead_demotes_old_lead() {
        let (store, resolver) = resolver(false).await;
        resolver
            .assign(&"B1".into(), &ids(&["S1"]), AssignmentRole::Lead, AssignOptions::default())
            .await
            .unwrap();
        let outcome = resolver
            .assign(&"B1".into(), &ids(&["S2"]), AssignmentRole::Lead, AssignOptions::default())
            .await
            .unwrap();
        assert!(!outcome.confirmed, "already confirmed");
        assert_eq!(outcome.assignments[0].staff_id.0, "S2");
        assert_eq!(outcome.assignments[0].role, AssignmentRole::Lead);
        assert_eq!(outcome.assignments[1].role, AssignmentRole::Assistant);
        assert_eq!(store.status_history(&"B1".into()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reassigning_updates_role_without_new_staff_job() {
        let (store, resolver) = resolver(false).await;
        resolver
            .assign(&"B1".into(), &ids(&["S1"]), AssignmentRole::Assistant, AssignOptions::default())
            .await
            .unwrap();
        let outcome = resolver
            .assign(&"B1".into(), &ids(&["S1"]), AssignmentRole::Lead, AssignOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.assignments.len(), 1);
        assert_eq!(outcome.assignments[0].role, AssignmentRole::Lead);
        assert!(outcome.job_ids.is_empty());
        assert!(outcome.confirmed);
        assert_eq!(store.list_jobs(&JobFilter::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn customer_announcement_follows_option_then_default() {
        let (store, resolver) = resolver(true).await;
        let outcome = resolver
            .assign(&"B1".into(), &ids(&["S1"]), AssignmentRole::Lead, AssignOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.job_ids.len(), 2);
        let customer_jobs = store
            .list_jobs(&JobFilter::default())
            .await
            .unwrap()
            .into_iter()
            .filter(|j| j.payload.recipient == "dana@example.com")
            .count();
        assert_eq!(customer_jobs, 1);

        let outcome = resolver
            .assign(
                &"B1".into(),
                &ids(&["S2"]),
                AssignmentRole::Assistant,
                AssignOptions {
                    notify_customer: Some(false),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.job_ids.len(), 1);
    }

    #[tokio::test]
    async fn input_validation() {
        let (_, resolver) = resolver(false).await;
        let b1: BookingId = "B1".into();
        let err = resolver
            .assign(&b1, &[], AssignmentRole::Lead, AssignOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TidyError::Validation(_)));

        let err = resolver
            .assign(&b1, &ids(&["S1", "S1"]), AssignmentRole::Lead, AssignOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("listed twice"));

        let err = resolver
            .assign(&b1, &ids(&["S9"]), AssignmentRole::Lead, AssignOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TidyError::NotFound { entity: EntityKind::Staff, .. }));
    }

    #[tokio::test]
    async fn inactive_staff_is_refused() {
        let (store, resolver) = resolver(false).await;
        let mut gone = staff("S4", "Dee");
        gone.active = false;
        store.upsert_staff(&gone).await.unwrap();
        let err = resolver
            .assign(&"B1".into(), &ids(&["S4"]), AssignmentRole::Lead, AssignOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("inactive"));
    }

    #[tokio::test]
    async fn unassign_keeps_status() {
        let (_, resolver) = resolver(false).await;
        resolver
            .assign(&"B1".into(), &ids(&["S1", "S2"]), AssignmentRole::Lead, AssignOptions::default())
            .await
            .unwrap();
        let remaining = resolver.unassign(&"B1".into(), &"S1".into()).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].staff_id.0, "S2");

        let err = resolver.unassign(&"B1".into(), &"S1".into()).await.unwrap_err();
        assert!(matches!(err, TidyError::NotFound { entity: EntityKind::Assignment, .. }));
    }

    #[test]
    fn merged_team_puts_lead_first() {
        let member = |id: &str, role| TeamMember {
            staff: staff(id, id),
            role,
        };
        let current = [member("S1", AssignmentRole::Lead), member("S3", AssignmentRole::Assistant)];
        let requested = [member("S2", AssignmentRole::Lead)];
        let team = merged_team(&current, &requested, true);
        let view: Vec<(&str, AssignmentRole)> =
            team.iter().map(|m| (m.staff.id.0.as_str(), m.role)).collect();
        assert_eq!(
            view,
            vec![
                ("S2", AssignmentRole::Lead),
                ("S1", AssignmentRole::Assistant),
                ("S3", AssignmentRole::Assistant)
            ]
        );
    }
}
