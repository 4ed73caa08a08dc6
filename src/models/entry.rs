use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{ApprovalStatus, DiscountMode, EntryStatus, PaymentStatus, RecordKind};

/// One service reference carried by a registration (code + display name).
///
/// Value equality (code + name + price) drives service de-duplication
/// when entries merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRef {
    pub code: String,
    pub name: String,
    /// Price in so'm, when the backend sends one.
    pub price: Option<u64>,
}

impl ServiceRef {
    /// Canonical short code for display in the aggregate view: the first
    /// code-like token, uppercased. Free-text names are never shown raw.
    pub fn canonical_code(&self) -> Option<String> {
        let token = self.code.split_whitespace().next()?;
        let trimmed = token.trim_matches(|c: char| !c.is_alphanumeric() && c != '-');
        if trimmed.is_empty() {
            return None;
        }
        Some(trimmed.to_uppercase())
    }
}

/// One record as received from the backend, scoped to one specialty queue
/// on one day. Built by the feed normalizer, immutable afterwards, and
/// discarded once folded into a `UnifiedAppointment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawQueueEntry {
    pub id: String,
    pub kind: RecordKind,
    pub patient_id: Option<String>,
    pub patient_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub services: Vec<ServiceRef>,
    /// Specialty the entry was booked under (may be absent for QR check-ins).
    pub specialty_tag: Option<String>,
    /// Tag of the specialty queue that grouped this entry in the feed.
    pub queue_tag: String,
    /// Queue entry time, when the backend tracks it separately.
    pub queued_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Server-assigned, department-local display number.
    pub number: u32,
    pub status: EntryStatus,
    pub payment_status: PaymentStatus,
    pub discount_mode: DiscountMode,
    pub approval_status: ApprovalStatus,
}

impl RawQueueEntry {
    /// Earliest available arrival time: queue entry time over created-at.
    pub fn arrival_time(&self) -> DateTime<Utc> {
        self.queued_at.unwrap_or(self.created_at)
    }
}
