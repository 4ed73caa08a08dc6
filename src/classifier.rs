//! Department Classifier — service codes, specialty tags and queue tags
//! resolved to one department bucket.
//!
//! The taxonomy is data, not branching code: an exact-code table plus a
//! small ordered rule list of prefix patterns. The ECG family and the
//! echocardiography family are deliberately disjoint rule sets — both
//! arrive under the "cardiology" specialty tag, but an EKG code must
//! never land in the same bucket as a cardiology consultation.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::UnifiedAppointment;

/// Fixed set of clinical service categories partitioning the unified queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepartmentBucket {
    Cardiology,
    FunctionalDiagnostics,
    Dermatology,
    Dental,
    Laboratory,
    Procedures,
}

impl DepartmentBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cardiology => "cardiology",
            Self::FunctionalDiagnostics => "functional_diagnostics",
            Self::Dermatology => "dermatology",
            Self::Dental => "dental",
            Self::Laboratory => "laboratory",
            Self::Procedures => "procedures",
        }
    }
}

impl std::fmt::Display for DepartmentBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Service-code taxonomy
// ═══════════════════════════════════════════════════════════════════════════

/// Exact code stems. Checked before the prefix rules.
const EXACT_CODES: &[(&str, DepartmentBucket)] = &[
    ("EKG", DepartmentBucket::FunctionalDiagnostics),
    ("ECG", DepartmentBucket::FunctionalDiagnostics),
    ("EXOKG", DepartmentBucket::Cardiology),
    ("ECHO", DepartmentBucket::Cardiology),
];

/// Ordered prefix rules. The ECG family sits first so that no broader
/// pattern can swallow it.
static PREFIX_RULES: LazyLock<Vec<(Regex, DepartmentBucket)>> = LazyLock::new(|| {
    [
        // Functional diagnostics: EKG-01, EKG3, ...
        (r"^E[KC]G[-_0-9]", DepartmentBucket::FunctionalDiagnostics),
        // Echocardiography reads in cardiology, but is its own family.
        (r"^(EXOKG|ECHO|EXO-)", DepartmentBucket::Cardiology),
        // Cardiology consultations: K-101, K12, KARD...
        (r"^K[-0-9]", DepartmentBucket::Cardiology),
        (r"^KARD", DepartmentBucket::Cardiology),
        // Dental: S-20, STOM...
        (r"^S[-0-9]", DepartmentBucket::Dental),
        (r"^STOM", DepartmentBucket::Dental),
        // Dermatology consultations: D-3, DERM...
        (r"^D[-0-9]", DepartmentBucket::Dermatology),
        (r"^DERM", DepartmentBucket::Dermatology),
        // Laboratory: L-7, LAB...
        (r"^L[-0-9]", DepartmentBucket::Laboratory),
        (r"^LAB", DepartmentBucket::Laboratory),
        // Procedures / cosmetology: physiotherapy and derm procedures.
        (r"^P[-0-9]", DepartmentBucket::Procedures),
        (r"^(FIZIO|KOSM|PROC)", DepartmentBucket::Procedures),
    ]
    .into_iter()
    .map(|(pat, bucket)| (Regex::new(pat).expect("static rule pattern"), bucket))
    .collect()
});

/// Classify one service code. Unknown codes return `None` — the entry is
/// excluded from every specific department view but kept in the aggregate.
pub fn classify_code(code: &str) -> Option<DepartmentBucket> {
    let normalized = code.trim().to_uppercase();
    if normalized.is_empty() {
        return None;
    }
    let stem = normalized.split_whitespace().next().unwrap_or(&normalized);
    if let Some((_, bucket)) = EXACT_CODES.iter().find(|(c, _)| *c == stem) {
        return Some(*bucket);
    }
    PREFIX_RULES
        .iter()
        .find(|(re, _)| re.is_match(stem))
        .map(|(_, bucket)| *bucket)
}

/// Classify a specialty or queue tag. Generic tags ("general", "umumiy")
/// return `None`.
pub fn classify_tag(tag: &str) -> Option<DepartmentBucket> {
    match tag.trim().to_lowercase().as_str() {
        "cardiology" | "cardio" | "kardiologiya" | "kardio" => {
            Some(DepartmentBucket::Cardiology)
        }
        "ekg" | "ecg" | "functional" | "funksional" => {
            Some(DepartmentBucket::FunctionalDiagnostics)
        }
        "dermatology" | "dermatologiya" | "derma" => Some(DepartmentBucket::Dermatology),
        "dental" | "stomatology" | "stomatologiya" | "stom" => Some(DepartmentBucket::Dental),
        "lab" | "laboratory" | "laboratoriya" => Some(DepartmentBucket::Laboratory),
        "procedures" | "muolaja" | "physio" | "fizioterapiya" | "kosmetologiya" => {
            Some(DepartmentBucket::Procedures)
        }
        _ => None,
    }
}

/// Does an appointment belong to the given department view?
///
/// `None` is the aggregate view — classification is skipped entirely.
/// Once an appointment carries any real service code, classification is
/// based exclusively on codes: a QR registration's generic queue tag must
/// not override a specific service code. Only code-free appointments fall
/// back to the specialty tag, then the queue tags of their assignments.
pub fn matches_view(appt: &UnifiedAppointment, view: Option<DepartmentBucket>) -> bool {
    let Some(bucket) = view else {
        return true;
    };
    let has_codes = appt.services.iter().any(|s| !s.code.trim().is_empty());
    if has_codes {
        return appt
            .services
            .iter()
            .any(|s| classify_code(&s.code) == Some(bucket));
    }
    if let Some(tag) = appt.specialty_tag.as_deref() {
        if let Some(b) = classify_tag(tag) {
            return b == bucket;
        }
    }
    appt.assignments
        .iter()
        .any(|a| classify_tag(&a.department_tag) == Some(bucket))
}
