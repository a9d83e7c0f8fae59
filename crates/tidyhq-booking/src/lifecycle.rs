// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Booking state machine.
//!
//! `pending -> confirmed -> completed`, with `cancelled` reachable from
//! `pending` or `confirmed`. Completed and cancelled bookings are terminal.
//! A transition writes the new status, a history record, and its
//! notification jobs in one change set, conditional on the status read.

use std::sync::Arc;

use tidyhq_core::{
    Booking, BookingId, BookingStatus, BookingStore, ChangeSet, Clock, EntityKind, StatusChange,
    TidyError,
};
use tracing::{debug, info};

use crate::notifications::{Composer, TeamMember};

/// Rejects any move that is not an edge of the status graph.
pub fn check_transition(
    booking_id: &BookingId,
    from: BookingStatus,
    to: BookingStatus,
) -> Result<(), TidyError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(TidyError::InvalidTransition {
            booking_id: booking_id.clone(),
            from,
            to,
        })
    }
}

/// Loads the booking's team, lead first. Assignments whose staff record is gone are skipped.
pub(crate) async fn load_team<S: BookingStore + ?Sized>(
    store: &S,
    booking_id: &BookingId,
) -> Result<Vec<TeamMember>, TidyError> {
    let mut team = Vec::new();
    for assignment in store.assignments_for_booking(booking_id).await? {
        match store.get_staff(&assignment.staff_id).await? {
            Some(staff) => team.push(TeamMember {
                staff,
                role: assignment.role,
            }),
            None => debug!(staff_id = %assignment.staff_id, %booking_id, "assigned staff record missing"),
        }
    }
    Ok(team)
}

/// Applies status transitions.
pub struct StateMachine<S: ?Sized> {
    store: Arc<S>,
    composer: Arc<Composer>,
    clock: Arc<dyn Clock>,
}

impl<S: BookingStore + ?Sized> StateMachine<S> {
    pub fn new(store: Arc<S>, composer: Arc<Composer>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            composer,
            clock,
        }
    }

    /// Moves `booking_id` to `target` and enqueues the notifications the move implies.
    pub async fn transition(
        &self,
        booking_id: &BookingId,
        target: BookingStatus,
        actor: &str,
        reason: Option<&str>,
    ) -> Result<Booking, TidyError> {
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());
        let booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| TidyError::not_found(EntityKind::Booking, booking_id.0.clone()))?;
        check_transition(booking_id, booking.status, target)?;

        let team = load_team(self.store.as_ref(), booking_id).await?;
        let jobs = self.composer.for_transition(&booking, target, &team, reason);
        let job_count = jobs.len();
        let changes = ChangeSet {
            status: Some(StatusChange {
                booking_id: booking_id.clone(),
                from: booking.status,
                to: target,
                actor: actor.to_string(),
                reason: reason.map(str::to_string),
            }),
            jobs,
            ..Default::default()
        };
        self.store.commit(changes, self.clock.now()).await?;

        info!(
            %booking_id,
            from = %booking.status,
            to = %target,
            actor,
            jobs = job_count,
            "booking status changed"
        );
        self.store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| TidyError::not_found(EntityKind::Booking, booking_id.0.clone()))
    }

    /// Applies [`transition`](Self::transition) to each id independently, in order.
    pub async fn transition_many(
        &self,
        booking_ids: &[BookingId],
        target: BookingStatus,
        actor: &str,
        reason: Option<&str>,
    ) -> Vec<(BookingId, Result<Booking, TidyError>)> {
        let mut results = Vec::with_capacity(booking_ids.len());
        for booking_id in booking_ids {
            let result = self.transition(booking_id, target, actor, reason).await;
            results.push((booking_id.clone(), result));
        }
        results
    }
}
