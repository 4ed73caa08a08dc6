//! Identity Resolver — deduplication keys for raw queue entries.
//!
//! The key is opaque, scoped to one clinic day, never persisted, and
//! recomputed on every fetch. The priority order (patient id, phone,
//! name, entry id) mirrors the backend's own dedup ordering; the client
//! reconciles data the backend may have partially deduplicated already,
//! and a mismatched ordering shows up as duplicate rows.
//!
//! Known limitation: two family members booking with a shared household
//! phone merge incorrectly once one side lacks its patient id. Rule 1
//! keeps entries apart whenever both ids are present; the phone-only
//! case needs a disambiguation rule (name similarity) before it can be
//! relied on.

use chrono::NaiveDate;

use crate::models::{RawQueueEntry, UnifiedAppointment};

/// Opaque per-day dedup key. Compare for equality only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Strip everything but digits. Empty result means "no usable phone".
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Trim + lowercase for name comparison.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Resolve the dedup key for one entry. Strict priority, first match wins:
/// patient id, normalized phone, normalized name, entry id (stands alone).
pub fn resolve_key(entry: &RawQueueEntry, day: NaiveDate) -> IdentityKey {
    if let Some(pid) = entry.patient_id.as_deref().filter(|p| !p.trim().is_empty()) {
        return IdentityKey(format!("{day}|pid:{}", pid.trim()));
    }
    if let Some(phone) = entry.phone.as_deref() {
        let digits = normalize_phone(phone);
        if !digits.is_empty() {
            return IdentityKey(format!("{day}|tel:{digits}"));
        }
    }
    let name = normalize_name(&entry.patient_name);
    if !name.is_empty() {
        return IdentityKey(format!("{day}|nom:{name}"));
    }
    IdentityKey(format!("{day}|ent:{}", entry.id))
}

/// Same resolution over an already-unified appointment, used by the
/// cross-department fold pass. Must stay in lockstep with [`resolve_key`].
pub fn resolve_appointment_key(appt: &UnifiedAppointment, day: NaiveDate) -> IdentityKey {
    if let Some(pid) = appt.patient_id.as_deref().filter(|p| !p.trim().is_empty()) {
        return IdentityKey(format!("{day}|pid:{}", pid.trim()));
    }
    if let Some(phone) = appt.phone.as_deref() {
        let digits = normalize_phone(phone);
        if !digits.is_empty() {
            return IdentityKey(format!("{day}|tel:{digits}"));
        }
    }
    let name = normalize_name(&appt.patient_name);
    if !name.is_empty() {
        return IdentityKey(format!("{day}|nom:{name}"));
    }
    IdentityKey(format!("{day}|ent:{}", appt.primary_id))
}
