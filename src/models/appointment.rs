use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::classifier::DepartmentBucket;

use super::enums::{
    ApprovalStatus, AssignmentSource, DiscountMode, EntryStatus, PaymentStatus, RecordKind,
};
use super::entry::ServiceRef;

/// One patient's registration within one department bucket on one day.
/// Embedded by value in `UnifiedAppointment`; never shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentAssignment {
    /// Raw tag of the specialty queue this registration arrived under.
    pub department_tag: String,
    /// Resolved bucket; `None` when the tag is generic or unknown.
    pub bucket: Option<DepartmentBucket>,
    /// Server-assigned, department-local display number. Never recomputed.
    pub number: u32,
    pub status: EntryStatus,
    pub source: AssignmentSource,
    pub service_label: Option<String>,
}

impl DepartmentAssignment {
    /// Identity used for union-by-department: the bucket when the tag
    /// resolved, otherwise the normalized raw tag. Two tags mapping onto
    /// the same bucket ("cardio", "kardiologiya") share one key.
    pub fn dept_key(&self) -> String {
        match self.bucket {
            Some(bucket) => bucket.as_str().to_string(),
            None => self.department_tag.trim().to_lowercase(),
        }
    }
}

/// The merged, display-ready record for one patient on one day.
///
/// Holds the union of department-tagged queue assignments (at most one per
/// department), the union of services, and one authoritative
/// status/payment/discount state chosen by the merge priority rule.
/// Replaced wholesale on every refresh cycle — never patched incrementally
/// from the server, only overlaid locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedAppointment {
    /// Representative entry id.
    pub primary_id: String,
    /// Every underlying entry id, for bulk actions (cancel-all, pay-all).
    pub entry_ids: BTreeSet<String>,
    pub day: NaiveDate,
    pub patient_id: Option<String>,
    pub patient_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub specialty_tag: Option<String>,
    pub assignments: Vec<DepartmentAssignment>,
    pub services: Vec<ServiceRef>,
    pub status: EntryStatus,
    pub payment_status: PaymentStatus,
    pub discount_mode: DiscountMode,
    pub approval_status: ApprovalStatus,
    /// Kind of the record this state last came from.
    pub last_record_kind: RecordKind,
    pub queued_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Display number for the currently active department view. Filled by
    /// the numbering assigner, absent until then.
    pub display_number: Option<u32>,
}

impl UnifiedAppointment {
    /// Empty shell with sane defaults; fields are filled by the merger.
    pub fn blank(primary_id: &str, day: NaiveDate) -> Self {
        Self {
            primary_id: primary_id.to_string(),
            entry_ids: BTreeSet::from([primary_id.to_string()]),
            day,
            patient_id: None,
            patient_name: String::new(),
            phone: None,
            address: None,
            specialty_tag: None,
            assignments: Vec::new(),
            services: Vec::new(),
            status: EntryStatus::Waiting,
            payment_status: PaymentStatus::Pending,
            discount_mode: DiscountMode::None,
            approval_status: ApprovalStatus::NotRequired,
            last_record_kind: RecordKind::WalkIn,
            queued_at: None,
            created_at: DateTime::<Utc>::MIN_UTC,
            display_number: None,
        }
    }

    /// Aggregate cost over the deduplicated service set.
    pub fn total_cost(&self) -> u64 {
        self.services.iter().filter_map(|s| s.price).sum()
    }

    /// Earliest available arrival time: queue entry time over created-at.
    pub fn arrival_time(&self) -> DateTime<Utc> {
        self.queued_at.unwrap_or(self.created_at)
    }

    /// Canonical short codes for the aggregate view — one vocabulary
    /// everywhere, never raw free-text service names.
    pub fn service_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self
            .services
            .iter()
            .filter_map(ServiceRef::canonical_code)
            .collect();
        codes.dedup();
        codes
    }
}
