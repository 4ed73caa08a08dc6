//! Entry Merger — folds raw per-specialty entries into unified,
//! cross-department appointments.
//!
//! Two explicit passes over immutable input, both using the same
//! combining function:
//! 1. per-department: keyed by identity + department, collapses duplicate
//!    registrations inside one specialty queue (desk double-clicks);
//! 2. cross-department: keyed by identity alone, unites one patient's
//!    registrations across specialties into a single record.
//!
//! The combining function is associative and commutative with respect to
//! the department-assignment set, the union fields, and the authoritative
//! status — fold order within a refresh cycle does not change the result.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::classifier;
use crate::identity;
use crate::models::{
    ApprovalStatus, DepartmentAssignment, DiscountMode, RawQueueEntry, UnifiedAppointment,
};

// ═══════════════════════════════════════════════════════════════════════════
// Entry → UnifiedAppointment
// ═══════════════════════════════════════════════════════════════════════════

/// Lift one raw entry into a single-assignment unified appointment.
pub fn unify_entry(entry: &RawQueueEntry, day: NaiveDate) -> UnifiedAppointment {
    let mut appt = UnifiedAppointment::blank(&entry.id, day);
    appt.patient_id = entry
        .patient_id
        .clone()
        .filter(|p| !p.trim().is_empty());
    appt.patient_name = entry.patient_name.clone();
    appt.phone = entry.phone.clone();
    appt.address = entry.address.clone();
    appt.specialty_tag = entry.specialty_tag.clone();
    appt.assignments = vec![DepartmentAssignment {
        department_tag: entry.queue_tag.clone(),
        bucket: classifier::classify_tag(&entry.queue_tag),
        number: entry.number,
        status: entry.status,
        source: entry.kind.source(),
        service_label: entry.services.first().map(|s| s.name.clone()),
    }];
    for svc in &entry.services {
        if !appt.services.contains(svc) {
            appt.services.push(svc.clone());
        }
    }
    appt.status = entry.status;
    appt.payment_status = entry.payment_status;
    appt.discount_mode = entry.discount_mode;
    appt.approval_status = entry.approval_status;
    appt.last_record_kind = entry.kind;
    appt.queued_at = entry.queued_at;
    appt.created_at = entry.created_at;
    appt
}

// ═══════════════════════════════════════════════════════════════════════════
// Priority score + merge
// ═══════════════════════════════════════════════════════════════════════════

/// How complete one side's information is. The higher-scoring side supplies
/// the authoritative status/payment/discount/approval fields.
pub fn priority_score(appt: &UnifiedAppointment) -> u32 {
    let mut score = 0u32;
    match appt.discount_mode {
        DiscountMode::AllFree if appt.approval_status == ApprovalStatus::Approved => score += 1000,
        DiscountMode::AllFree => score += 600,
        DiscountMode::Benefit if appt.approval_status == ApprovalStatus::Approved => score += 400,
        _ => {}
    }
    score += 10 * appt.services.len() as u32;
    score += 5 * appt.assignments.len() as u32;
    score
}

/// True when `a`'s authoritative fields should win over `b`'s.
/// Score decides; an exact tie falls back to the smaller primary id so the
/// outcome never depends on argument order.
fn wins(a: &UnifiedAppointment, b: &UnifiedAppointment) -> bool {
    match priority_score(a).cmp(&priority_score(b)) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => a.primary_id <= b.primary_id,
    }
}

/// Combine two appointments that resolved to the same identity.
///
/// Assignments union by department identity — a department never shows two
/// numbers for one patient, so a second assignment for an already-present
/// department is dropped, not summed. Services and constituent entry ids
/// union by value.
pub fn merge(existing: UnifiedAppointment, incoming: UnifiedAppointment) -> UnifiedAppointment {
    let existing_wins = wins(&existing, &incoming);

    let mut out = existing.clone();

    // Authoritative state from the more complete side.
    let winner = if existing_wins { &existing } else { &incoming };
    out.primary_id = winner.primary_id.clone();
    out.status = winner.status;
    out.payment_status = winner.payment_status;
    out.discount_mode = winner.discount_mode;
    out.approval_status = winner.approval_status;
    out.last_record_kind = winner.last_record_kind;

    // Union of constituent entry ids — bulk actions must reach every
    // underlying record.
    out.entry_ids.extend(incoming.entry_ids.iter().cloned());

    // Union of assignments, first-seen wins per department.
    for assignment in &incoming.assignments {
        let key = assignment.dept_key();
        if !out.assignments.iter().any(|a| a.dept_key() == key) {
            out.assignments.push(assignment.clone());
        }
    }

    // Union of services by value.
    for svc in &incoming.services {
        if !out.services.contains(svc) {
            out.services.push(svc.clone());
        }
    }

    // Descriptive fields: keep the first non-empty value.
    if out.patient_id.is_none() {
        out.patient_id = incoming.patient_id.clone();
    }
    if out.phone.is_none() {
        out.phone = incoming.phone.clone();
    }
    if out.address.is_none() {
        out.address = incoming.address.clone();
    }
    if out.specialty_tag.is_none() {
        out.specialty_tag = incoming.specialty_tag.clone();
    }
    if out.patient_name.trim().is_empty() {
        out.patient_name = incoming.patient_name.clone();
    }

    // Earliest arrival wins, so numbering stays stable across merges.
    out.queued_at = match (out.queued_at, incoming.queued_at) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
    out.created_at = out.created_at.min(incoming.created_at);

    out
}

// ═══════════════════════════════════════════════════════════════════════════
// Fold passes
// ═══════════════════════════════════════════════════════════════════════════

fn fold_by_key(
    appts: impl IntoIterator<Item = (String, UnifiedAppointment)>,
) -> Vec<UnifiedAppointment> {
    let mut order: Vec<String> = Vec::new();
    let mut by_key: HashMap<String, UnifiedAppointment> = HashMap::new();
    for (key, appt) in appts {
        match by_key.remove(&key) {
            Some(existing) => {
                by_key.insert(key, merge(existing, appt));
            }
            None => {
                order.push(key.clone());
                by_key.insert(key, appt);
            }
        }
    }
    order
        .into_iter()
        .filter_map(|key| by_key.remove(&key))
        .collect()
}

fn entry_dept_key(entry: &RawQueueEntry) -> String {
    match classifier::classify_tag(&entry.queue_tag) {
        Some(bucket) => bucket.as_str().to_string(),
        None => entry.queue_tag.trim().to_lowercase(),
    }
}

/// Pass 1: one appointment per patient per department. Duplicate
/// registrations inside one specialty queue collapse here.
pub fn fold_per_department(entries: &[RawQueueEntry], day: NaiveDate) -> Vec<UnifiedAppointment> {
    fold_by_key(entries.iter().map(|entry| {
        let key = format!(
            "{}#{}",
            identity::resolve_key(entry, day).as_str(),
            entry_dept_key(entry)
        );
        (key, unify_entry(entry, day))
    }))
}

/// Pass 2: one appointment per patient, departments united.
pub fn fold_across_departments(
    appts: Vec<UnifiedAppointment>,
    day: NaiveDate,
) -> Vec<UnifiedAppointment> {
    fold_by_key(appts.into_iter().map(|appt| {
        let key = identity::resolve_appointment_key(&appt, day);
        (key.as_str().to_string(), appt)
    }))
}

/// Both passes over a frozen snapshot of ingested entries.
pub fn reconcile(entries: &[RawQueueEntry], day: NaiveDate) -> Vec<UnifiedAppointment> {
    fold_across_departments(fold_per_department(entries, day), day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::DepartmentBucket;
    use crate::models::{
        ApprovalStatus, DiscountMode, EntryStatus, PaymentStatus, RecordKind, ServiceRef,
    };

    fn day() -> NaiveDate {
        "2024-06-01".parse().unwrap()
    }

    fn entry(id: &str, queue_tag: &str) -> RawQueueEntry {
        RawQueueEntry {
            id: id.into(),
            kind: RecordKind::OnlineRegistration,
            patient_id: None,
            patient_name: "Aziza Karimova".into(),
            phone: Some("+998901234567".into()),
            address: None,
            services: vec![],
            specialty_tag: None,
            queue_tag: queue_tag.into(),
            queued_at: None,
            created_at: "2024-06-01T08:00:00Z".parse().unwrap(),
            number: 1,
            status: EntryStatus::Waiting,
            payment_status: PaymentStatus::Pending,
            discount_mode: DiscountMode::None,
            approval_status: ApprovalStatus::NotRequired,
        }
    }

    fn svc(code: &str, name: &str) -> ServiceRef {
        ServiceRef {
            code: code.into(),
            name: name.into(),
            price: Some(100_000),
        }
    }

    #[test]
    fn multi_department_qr_checkin_yields_one_record() {
        // Same phone, different entry ids, different specialty queues.
        let mut cardio = entry("e1", "kardiologiya");
        cardio.services = vec![svc("K-101", "Kardiolog konsultatsiyasi")];
        cardio.number = 3;
        let mut dental = entry("e2", "stomatologiya");
        dental.services = vec![svc("S-20", "Stomatolog ko'rigi")];
        dental.number = 7;

        let unified = reconcile(&[cardio, dental], day());
        assert_eq!(unified.len(), 1);
        let appt = &unified[0];
        assert_eq!(appt.assignments.len(), 2);
        assert_eq!(appt.services.len(), 2);
        assert_eq!(appt.entry_ids.len(), 2);

        let buckets: Vec<_> = appt.assignments.iter().map(|a| a.bucket).collect();
        assert!(buckets.contains(&Some(DepartmentBucket::Cardiology)));
        assert!(buckets.contains(&Some(DepartmentBucket::Dental)));
    }

    #[test]
    fn duplicate_desk_registration_grows_ids_not_assignments() {
        // UI double-click: same patient id, same department, twice.
        let mut first = entry("e1", "kardiologiya");
        first.patient_id = Some("p7".into());
        first.number = 3;
        let mut second = entry("e2", "kardiologiya");
        second.patient_id = Some("p7".into());
        second.number = 9; // server handed out a second number; we keep the first

        let unified = reconcile(&[first, second], day());
        assert_eq!(unified.len(), 1);
        assert_eq!(unified[0].assignments.len(), 1);
        assert_eq!(unified[0].assignments[0].number, 3);
        assert_eq!(unified[0].entry_ids.len(), 2);
    }

    #[test]
    fn merge_with_self_is_idempotent() {
        let mut e = entry("e1", "kardiologiya");
        e.services = vec![svc("K-101", "Konsultatsiya")];
        let a = unify_entry(&e, day());
        let merged = merge(a.clone(), a.clone());
        assert_eq!(merged.assignments, a.assignments);
        assert_eq!(merged.services, a.services);
        assert_eq!(merged.entry_ids, a.entry_ids);
    }

    #[test]
    fn merge_is_commutative_over_set_and_status() {
        let mut cheap = unify_entry(&entry("e1", "kardiologiya"), day());
        cheap.payment_status = PaymentStatus::Pending;

        let mut rich = unify_entry(&entry("e2", "stomatologiya"), day());
        rich.services = vec![svc("S-20", "Ko'rik"), svc("S-21", "Plomba")];
        rich.discount_mode = DiscountMode::AllFree;
        rich.approval_status = ApprovalStatus::Approved;
        rich.payment_status = PaymentStatus::Free;

        let ab = merge(cheap.clone(), rich.clone());
        let ba = merge(rich, cheap);

        let keys = |a: &UnifiedAppointment| {
            let mut k: Vec<String> = a.assignments.iter().map(|x| x.dept_key()).collect();
            k.sort();
            k
        };
        assert_eq!(keys(&ab), keys(&ba));
        assert_eq!(ab.payment_status, ba.payment_status);
        assert_eq!(ab.discount_mode, ba.discount_mode);
        assert_eq!(ab.entry_ids, ba.entry_ids);
        // The approved all-free side carried the authoritative state.
        assert_eq!(ab.payment_status, PaymentStatus::Free);
    }

    #[test]
    fn approved_all_free_outranks_service_count() {
        let mut many = unify_entry(&entry("e1", "kardiologiya"), day());
        many.services = (0..20)
            .map(|i| svc(&format!("K-{i}"), &format!("Xizmat {i}")))
            .collect();

        let mut free = unify_entry(&entry("e2", "kardiologiya"), day());
        free.discount_mode = DiscountMode::AllFree;
        free.approval_status = ApprovalStatus::Approved;

        assert!(priority_score(&free) > priority_score(&many));
    }

    #[test]
    fn pending_all_free_outranks_approved_benefit() {
        let mut pending = unify_entry(&entry("e1", "kardiologiya"), day());
        pending.discount_mode = DiscountMode::AllFree;
        pending.approval_status = ApprovalStatus::Pending;

        let mut benefit = unify_entry(&entry("e2", "kardiologiya"), day());
        benefit.discount_mode = DiscountMode::Benefit;
        benefit.approval_status = ApprovalStatus::Approved;

        assert!(priority_score(&pending) > priority_score(&benefit));
    }

    #[test]
    fn fold_order_does_not_change_result() {
        let mut a = entry("e1", "kardiologiya");
        a.services = vec![svc("K-101", "Konsultatsiya")];
        let b = entry("e2", "stomatologiya");
        let mut c = entry("e3", "kardiologiya");
        c.patient_id = Some("p9".into());
        c.phone = Some("+998911112233".into());
        c.patient_name = "Bobur Aliyev".into();

        let forward = reconcile(&[a.clone(), b.clone(), c.clone()], day());
        let backward = reconcile(&[c, b, a], day());

        assert_eq!(forward.len(), backward.len());
        let set = |v: &[UnifiedAppointment]| {
            let mut ids: Vec<_> = v
                .iter()
                .map(|x| {
                    let mut keys: Vec<String> =
                        x.assignments.iter().map(|a| a.dept_key()).collect();
                    keys.sort();
                    (x.entry_ids.clone(), keys)
                })
                .collect();
            ids.sort();
            ids
        };
        assert_eq!(set(&forward), set(&backward));
    }

    #[test]
    fn tag_synonyms_do_not_duplicate_a_department() {
        // "cardio" and "kardiologiya" resolve to the same bucket, so only
        // the first-seen number survives.
        let mut first = entry("e1", "kardiologiya");
        first.number = 3;
        let mut second = entry("e2", "cardio");
        second.number = 11;

        let unified = reconcile(&[first, second], day());
        assert_eq!(unified.len(), 1);
        assert_eq!(unified[0].assignments.len(), 1);
        assert_eq!(unified[0].assignments[0].number, 3);
    }

    #[test]
    fn earliest_arrival_survives_merge() {
        let mut early = entry("e1", "kardiologiya");
        early.queued_at = Some("2024-06-01T07:00:00Z".parse().unwrap());
        let mut late = entry("e2", "stomatologiya");
        late.queued_at = Some("2024-06-01T09:00:00Z".parse().unwrap());

        let unified = reconcile(&[late, early], day());
        assert_eq!(unified.len(), 1);
        assert_eq!(
            unified[0].queued_at,
            Some("2024-06-01T07:00:00Z".parse().unwrap())
        );
    }
}
