//! Bulk write actions over merged appointments.
//!
//! A unified appointment can span several underlying entries; every
//! constituent id's write is attempted independently and the caller gets
//! success/failure counts, never an all-or-nothing result. Any success
//! applies the matching optimistic override and publishes the domain
//! event, so the UI reflects the action before the server catches up.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::Serialize;

use crate::events::DomainEvent;
use crate::feed::{EntryAction, QueueBackend};
use crate::models::{EntryStatus, PaymentStatus, UnifiedAppointment};
use crate::overrides::{OverrideError, OverridePatch};
use crate::scheduler::RefreshScheduler;

/// Outcome of one bulk action across constituent entries.
#[derive(Debug, Clone, Serialize)]
pub struct BulkOutcome {
    pub succeeded: usize,
    pub failed: usize,
    pub failed_ids: Vec<String>,
}

impl BulkOutcome {
    pub fn any_succeeded(&self) -> bool {
        self.succeeded > 0
    }
}

/// Attempt `action` for every id independently.
pub async fn run_bulk<B: QueueBackend>(
    backend: &B,
    ids: &BTreeSet<String>,
    action: EntryAction,
) -> BulkOutcome {
    let mut outcome = BulkOutcome {
        succeeded: 0,
        failed: 0,
        failed_ids: Vec::new(),
    };
    for id in ids {
        match backend.entry_action(id, action).await {
            Ok(()) => outcome.succeeded += 1,
            Err(e) => {
                tracing::warn!(entry_id = %id, ?action, error = %e, "Bulk action failed for entry");
                outcome.failed += 1;
                outcome.failed_ids.push(id.clone());
            }
        }
    }
    outcome
}

impl<B: QueueBackend> RefreshScheduler<B> {
    async fn bulk_with_override(
        &self,
        appt: &UnifiedAppointment,
        action: EntryAction,
        patch: OverridePatch,
        ttl: Duration,
        event: DomainEvent,
    ) -> Result<BulkOutcome, OverrideError> {
        let outcome = run_bulk(self.backend(), &appt.entry_ids, action).await;
        if outcome.any_succeeded() {
            self.apply_optimistic_override(&appt.primary_id, &patch, ttl)?;
            self.bus().publish(event);
        }
        Ok(outcome)
    }

    /// Mark every constituent entry paid. Partial success still moves the
    /// patient to paid/queued locally.
    pub async fn pay_appointment(
        &self,
        appt: &UnifiedAppointment,
        ttl: Duration,
    ) -> Result<BulkOutcome, OverrideError> {
        let patch = OverridePatch {
            status: Some(EntryStatus::Queued),
            payment_status: Some(PaymentStatus::Paid),
        };
        self.bulk_with_override(appt, EntryAction::MarkPaid, patch, ttl, DomainEvent::PaymentCompleted)
            .await
    }

    /// Call the patient in.
    pub async fn start_visit(
        &self,
        appt: &UnifiedAppointment,
        ttl: Duration,
    ) -> Result<BulkOutcome, OverrideError> {
        let patch = OverridePatch::status(EntryStatus::InVisit);
        self.bulk_with_override(appt, EntryAction::StartVisit, patch, ttl, DomainEvent::VisitStarted)
            .await
    }

    /// Finish the visit.
    pub async fn complete_visit(
        &self,
        appt: &UnifiedAppointment,
        ttl: Duration,
    ) -> Result<BulkOutcome, OverrideError> {
        let patch = OverridePatch::status(EntryStatus::Completed);
        self.bulk_with_override(
            appt,
            EntryAction::CompleteVisit,
            patch,
            ttl,
            DomainEvent::StatusChanged,
        )
        .await
    }

    /// Cancel every underlying registration of a merged appointment.
    pub async fn cancel_appointment(
        &self,
        appt: &UnifiedAppointment,
        ttl: Duration,
    ) -> Result<BulkOutcome, OverrideError> {
        let patch = OverridePatch::status(EntryStatus::Cancelled);
        self.bulk_with_override(appt, EntryAction::Cancel, patch, ttl, DomainEvent::StatusChanged)
            .await
    }
}
