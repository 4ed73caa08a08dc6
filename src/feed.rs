//! Queue Feed Ingestor — fetches "queues for day D" from the backend and
//! normalizes the per-specialty-grouped payload into flat raw entries.
//!
//! Parsing is defensive per entry: one malformed record is skipped and
//! logged, never aborting the whole cycle. Entries arriving without an id
//! get a synthesized one so they can at least stand alone downstream.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    ApprovalStatus, DiscountMode, EntryStatus, PaymentStatus, RawQueueEntry, RecordKind,
    ServiceRef,
};

// ═══════════════════════════════════════════════════════════════════════════
// Error taxonomy
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Error, Debug)]
pub enum FeedError {
    /// Transient: fetch failure or timeout. Keep the last good list, mark
    /// freshness stale, retry on the next scheduled tick — never loop.
    #[error("Network error: {0}")]
    Network(String),

    /// 401-equivalent. Surfaced as a distinct state; no silent recovery.
    #[error("Authentication expired")]
    AuthExpired,

    #[error("Backend returned HTTP {status}")]
    Status { status: u16 },

    #[error("Malformed payload: {0}")]
    Malformed(String),
}

impl FeedError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Status { .. })
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthExpired)
    }

    fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::AuthExpired,
            _ => Self::Status { status },
        }
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return Self::from_status(status.as_u16());
        }
        if e.is_decode() {
            return Self::Malformed(e.to_string());
        }
        Self::Network(e.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Wire types
// ═══════════════════════════════════════════════════════════════════════════

/// Grouped-by-department payload of `GET queues-for-day`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueFeedPayload {
    pub date: NaiveDate,
    #[serde(default)]
    pub queues: Vec<SpecialtyQueuePayload>,
}

/// One specialty queue group. Entries stay as raw JSON so a malformed
/// record can be skipped individually.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialtyQueuePayload {
    pub department_tag: String,
    #[serde(default)]
    pub specialist_name: Option<String>,
    #[serde(default)]
    pub entries: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawEntryPayload {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    kind: Option<RecordKind>,
    #[serde(default)]
    patient_id: Option<String>,
    #[serde(default)]
    patient_name: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    services: Vec<ServiceRef>,
    #[serde(default)]
    specialty_tag: Option<String>,
    #[serde(default)]
    queued_at: Option<DateTime<Utc>>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    number: Option<u32>,
    #[serde(default)]
    status: Option<EntryStatus>,
    #[serde(default)]
    payment_status: Option<PaymentStatus>,
    #[serde(default)]
    discount_mode: Option<DiscountMode>,
    #[serde(default)]
    approval_status: Option<ApprovalStatus>,
}

/// Patient demographics, used to enrich entries lacking a denormalized
/// name/phone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientPayload {
    pub id: String,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Normalization
// ═══════════════════════════════════════════════════════════════════════════

/// Flatten the grouped payload into raw entries. The group's department
/// tag stamps each entry's queue tag; malformed entries are skipped with
/// a warning.
pub fn normalize_payload(payload: &QueueFeedPayload) -> Vec<RawQueueEntry> {
    let mut out = Vec::new();
    for group in &payload.queues {
        for value in &group.entries {
            let parsed: RawEntryPayload = match serde_json::from_value(value.clone()) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(
                        department = %group.department_tag,
                        error = %e,
                        "Skipping malformed queue entry"
                    );
                    continue;
                }
            };
            out.push(normalize_entry(parsed, &group.department_tag));
        }
    }
    out
}

fn normalize_entry(p: RawEntryPayload, department_tag: &str) -> RawQueueEntry {
    RawQueueEntry {
        id: p
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        kind: p.kind.unwrap_or(RecordKind::WalkIn),
        patient_id: p.patient_id.filter(|v| !v.trim().is_empty()),
        patient_name: p.patient_name.unwrap_or_default(),
        phone: p.phone.filter(|v| !v.trim().is_empty()),
        address: p.address,
        services: p.services,
        specialty_tag: p.specialty_tag,
        queue_tag: department_tag.to_string(),
        queued_at: p.queued_at,
        created_at: p.created_at.unwrap_or_else(Utc::now),
        number: p.number.unwrap_or(0),
        status: p.status.unwrap_or(EntryStatus::Waiting),
        payment_status: p.payment_status.unwrap_or(PaymentStatus::Pending),
        discount_mode: p.discount_mode.unwrap_or(DiscountMode::None),
        approval_status: p.approval_status.unwrap_or(ApprovalStatus::NotRequired),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Backend seam
// ═══════════════════════════════════════════════════════════════════════════

/// Write actions the surrounding UI can trigger per entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryAction {
    MarkPaid,
    StartVisit,
    CompleteVisit,
    Cancel,
}

impl EntryAction {
    fn path_segment(&self) -> &'static str {
        match self {
            Self::MarkPaid => "pay",
            Self::StartVisit => "start",
            Self::CompleteVisit => "complete",
            Self::Cancel => "cancel",
        }
    }
}

/// What the scheduler and the bulk-action layer need from the backend.
/// `QueueFeedClient` is the real implementation; tests substitute stubs.
pub trait QueueBackend: Send + Sync {
    fn ingest_day(
        &self,
        date: NaiveDate,
    ) -> impl std::future::Future<Output = Result<Vec<RawQueueEntry>, FeedError>> + Send;

    fn entry_action(
        &self,
        entry_id: &str,
        action: EntryAction,
    ) -> impl std::future::Future<Output = Result<(), FeedError>> + Send;
}

// ═══════════════════════════════════════════════════════════════════════════
// QueueFeedClient
// ═══════════════════════════════════════════════════════════════════════════

/// HTTP client for the clinic backend's queue endpoints.
pub struct QueueFeedClient {
    base_url: String,
    client: reqwest::Client,
}

impl QueueFeedClient {
    /// Create a client pointing at the backend.
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, FeedError> {
        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(FeedError::AuthExpired);
        }
        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    /// `GET queues-for-day(date)`.
    pub async fn fetch_day(&self, date: NaiveDate) -> Result<QueueFeedPayload, FeedError> {
        let url = format!("{}/queues?date={}", self.base_url, date);
        let response = Self::check(self.client.get(&url).send().await?).await?;
        let payload = response
            .json::<QueueFeedPayload>()
            .await
            .map_err(|e| FeedError::Malformed(e.to_string()))?;
        Ok(payload)
    }

    /// `GET patient(id)` demographics.
    pub async fn fetch_patient(&self, id: &str) -> Result<PatientPayload, FeedError> {
        let url = format!("{}/patients/{}", self.base_url, id);
        let response = Self::check(self.client.get(&url).send().await?).await?;
        let payload = response
            .json::<PatientPayload>()
            .await
            .map_err(|e| FeedError::Malformed(e.to_string()))?;
        Ok(payload)
    }

    /// Fill missing name/phone from the patient endpoint. Best-effort:
    /// a failed lookup leaves the entry as-is.
    async fn enrich_entries(&self, entries: &mut [RawQueueEntry]) {
        for entry in entries.iter_mut() {
            let needs_name = entry.patient_name.trim().is_empty();
            let needs_phone = entry.phone.is_none();
            let Some(pid) = entry.patient_id.clone() else {
                continue;
            };
            if !needs_name && !needs_phone {
                continue;
            }
            match self.fetch_patient(&pid).await {
                Ok(patient) => {
                    if needs_name {
                        entry.patient_name = patient.full_name;
                    }
                    if needs_phone {
                        entry.phone = patient.phone;
                    }
                    if entry.address.is_none() {
                        entry.address = patient.address;
                    }
                }
                Err(e) => {
                    tracing::warn!(patient_id = %pid, error = %e, "Patient enrichment failed");
                }
            }
        }
    }
}

impl QueueBackend for QueueFeedClient {
    /// Fetch + normalize + enrich one day's entries.
    async fn ingest_day(&self, date: NaiveDate) -> Result<Vec<RawQueueEntry>, FeedError> {
        let payload = self.fetch_day(date).await?;
        let mut entries = normalize_payload(&payload);
        self.enrich_entries(&mut entries).await;
        tracing::debug!(date = %date, count = entries.len(), "Ingested queue feed");
        Ok(entries)
    }

    async fn entry_action(&self, entry_id: &str, action: EntryAction) -> Result<(), FeedError> {
        let url = format!(
            "{}/entries/{}/{}",
            self.base_url,
            entry_id,
            action.path_segment()
        );
        Self::check(self.client.post(&url).send().await?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(entries: Vec<serde_json::Value>) -> QueueFeedPayload {
        QueueFeedPayload {
            date: "2024-06-01".parse().unwrap(),
            queues: vec![SpecialtyQueuePayload {
                department_tag: "kardiologiya".into(),
                specialist_name: Some("Dr. Rahimova".into()),
                entries,
            }],
        }
    }

    #[test]
    fn malformed_entry_is_skipped_not_fatal() {
        let p = payload(vec![
            json!({"id": "e1", "patient_name": "Aziza", "number": 3}),
            json!({"id": "e2", "number": "not-a-number"}),
            json!({"id": "e3", "patient_name": "Bobur", "number": 4}),
        ]);
        let entries = normalize_payload(&p);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "e1");
        assert_eq!(entries[1].id, "e3");
    }

    #[test]
    fn group_tag_stamps_each_entry() {
        let p = payload(vec![json!({"id": "e1", "patient_name": "Aziza"})]);
        let entries = normalize_payload(&p);
        assert_eq!(entries[0].queue_tag, "kardiologiya");
    }

    #[test]
    fn missing_id_is_synthesized() {
        let p = payload(vec![json!({"patient_name": "Aziza"})]);
        let entries = normalize_payload(&p);
        assert!(!entries[0].id.is_empty());
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let p = payload(vec![json!({"id": "e1"})]);
        let entries = normalize_payload(&p);
        let e = &entries[0];
        assert_eq!(e.kind, RecordKind::WalkIn);
        assert_eq!(e.status, EntryStatus::Waiting);
        assert_eq!(e.payment_status, PaymentStatus::Pending);
        assert_eq!(e.discount_mode, DiscountMode::None);
        assert_eq!(e.number, 0);
    }

    #[test]
    fn full_entry_parses_typed_fields() {
        let p = payload(vec![json!({
            "id": "e1",
            "kind": "online_registration",
            "patient_id": "p7",
            "patient_name": "Aziza Karimova",
            "phone": "+998901234567",
            "services": [{"code": "K-101", "name": "Kardiolog konsultatsiyasi", "price": 150000}],
            "queued_at": "2024-06-01T08:00:00Z",
            "created_at": "2024-06-01T07:55:00Z",
            "number": 3,
            "status": "waiting",
            "payment_status": "pending",
            "discount_mode": "benefit",
            "approval_status": "approved"
        })]);
        let entries = normalize_payload(&p);
        let e = &entries[0];
        assert_eq!(e.kind, RecordKind::OnlineRegistration);
        assert_eq!(e.services.len(), 1);
        assert_eq!(e.services[0].price, Some(150_000));
        assert_eq!(e.discount_mode, DiscountMode::Benefit);
        assert_eq!(e.approval_status, ApprovalStatus::Approved);
    }

    #[test]
    fn auth_statuses_map_to_auth_expired() {
        assert!(FeedError::from_status(401).is_auth());
        assert!(FeedError::from_status(403).is_auth());
        assert!(FeedError::from_status(500).is_transient());
    }

    #[test]
    fn empty_queue_groups_are_fine() {
        let p = QueueFeedPayload {
            date: "2024-06-01".parse().unwrap(),
            queues: vec![],
        };
        assert!(normalize_payload(&p).is_empty());
    }
}
