//! Queue snapshot store — the single shared state between the refresh
//! scheduler and the presentation layer.
//!
//! All mutation goes through named operations; consumers only ever see
//! immutable snapshots. The appointment list is replaced wholesale each
//! cycle, never patched in place, so previous/next can be compared by
//! identity to skip redundant UI updates.

use std::sync::{Arc, RwLock};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::classifier::{self, DepartmentBucket};
use crate::models::UnifiedAppointment;
use crate::numbering;

/// Data freshness indicator exposed to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    Loading,
    FreshFromServer,
    StaleFallback,
    ReauthRequired,
}

pub struct QueueStore {
    appointments: RwLock<Arc<Vec<UnifiedAppointment>>>,
    freshness: RwLock<Freshness>,
    day: RwLock<NaiveDate>,
    view: RwLock<Option<DepartmentBucket>>,
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

impl QueueStore {
    pub fn new(day: NaiveDate) -> Self {
        Self {
            appointments: RwLock::new(Arc::new(Vec::new())),
            freshness: RwLock::new(Freshness::Loading),
            day: RwLock::new(day),
            view: RwLock::new(None),
        }
    }

    // ── Named mutations ──────────────────────────────────────────────────

    /// A refresh cycle finished: replace the list, mark fresh.
    pub fn ingest_cycle_complete(&self, list: Vec<UnifiedAppointment>) {
        *write(&self.appointments) = Arc::new(list);
        *write(&self.freshness) = Freshness::FreshFromServer;
    }

    /// An optimistic override was applied locally: replace the list
    /// without touching freshness — this is not server data.
    pub fn override_applied(&self, list: Vec<UnifiedAppointment>) {
        *write(&self.appointments) = Arc::new(list);
    }

    /// A user-visible load started. Silent refreshes do not touch the
    /// indicator — previous data stays displayed.
    pub fn mark_loading(&self) {
        *write(&self.freshness) = Freshness::Loading;
    }

    /// Transient failure: last good list stays, freshness degrades.
    pub fn mark_stale(&self) {
        *write(&self.freshness) = Freshness::StaleFallback;
    }

    /// 401-equivalent: requires re-authentication, no silent recovery.
    pub fn mark_reauth_required(&self) {
        *write(&self.freshness) = Freshness::ReauthRequired;
    }

    pub fn set_day(&self, day: NaiveDate) {
        *write(&self.day) = day;
    }

    pub fn set_view(&self, view: Option<DepartmentBucket>) {
        *write(&self.view) = view;
    }

    // ── Snapshots ────────────────────────────────────────────────────────

    /// The current unified list. The Arc identity changes exactly when
    /// the list was replaced.
    pub fn snapshot(&self) -> Arc<Vec<UnifiedAppointment>> {
        read(&self.appointments).clone()
    }

    pub fn freshness(&self) -> Freshness {
        *read(&self.freshness)
    }

    pub fn day(&self) -> NaiveDate {
        *read(&self.day)
    }

    pub fn view(&self) -> Option<DepartmentBucket> {
        *read(&self.view)
    }

    /// The unified queue for the active department view: classified,
    /// ordered, numbered. Always a fresh Vec.
    pub fn visible_queue(&self) -> Vec<UnifiedAppointment> {
        let view = self.view();
        let snapshot = self.snapshot();
        let filtered: Vec<UnifiedAppointment> = snapshot
            .iter()
            .filter(|a| classifier::matches_view(a, view))
            .cloned()
            .collect();
        numbering::assign(&filtered, view)
    }
}
