//! Refresh Scheduler — the single entry point for every way the queue
//! gets reloaded: the poll timer, domain events, and explicit user
//! actions.
//!
//! One state machine instead of independent timers and listeners each
//! touching state: every trigger funnels into `request_refresh(mode,
//! reason)`, guarded by a single in-flight flag. The very first
//! mount-time load has its own once-only guard so a double-invoke by the
//! hosting shell cannot issue two concurrent initial fetches.
//!
//! A refresh cycle runs over a frozen snapshot in fixed order: fetch →
//! fold per department → fold across departments → override overlay →
//! ingest-cycle-complete. There is no hard cancellation; a superseded
//! fetch simply lands later, and since every cycle is a full replace,
//! out-of-order completions are tolerated within the override TTL window.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::config;
use crate::events::{DomainEvent, EventBus};
use crate::feed::{FeedError, QueueBackend};
use crate::merge;
use crate::overrides::{OverridePatch, OverrideStore};
use crate::store::QueueStore;

/// Whether a refresh may alter user-visible loading indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    Visible,
    Silent,
}

/// Why a refresh was requested. Logged, and used to pick the mode for
/// event-driven refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshReason {
    Initial,
    Timer,
    Manual,
    DateChange,
    DomainEvent,
}

/// Observable scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Loading,
    LoadingSilent,
    Suppressed,
}

pub struct RefreshScheduler<B: QueueBackend> {
    backend: B,
    store: Arc<QueueStore>,
    overrides: Mutex<OverrideStore>,
    bus: EventBus,
    in_flight: AtomicBool,
    initial_started: AtomicBool,
    suppressed: AtomicBool,
    current_mode: RwLock<Option<RefreshMode>>,
}

impl<B: QueueBackend> RefreshScheduler<B> {
    pub fn new(backend: B, store: Arc<QueueStore>, overrides: OverrideStore, bus: EventBus) -> Self {
        Self {
            backend,
            store,
            overrides: Mutex::new(overrides),
            bus,
            in_flight: AtomicBool::new(false),
            initial_started: AtomicBool::new(false),
            suppressed: AtomicBool::new(false),
            current_mode: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &Arc<QueueStore> {
        &self.store
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn state(&self) -> SchedulerState {
        if self.suppressed.load(Ordering::SeqCst) {
            return SchedulerState::Suppressed;
        }
        match *self.current_mode.read().unwrap_or_else(|e| e.into_inner()) {
            Some(RefreshMode::Visible) => SchedulerState::Loading,
            Some(RefreshMode::Silent) => SchedulerState::LoadingSilent,
            None => SchedulerState::Idle,
        }
    }

    // ── Suppression (blocking dialog / wizard open) ─────────────────────

    pub fn suppress(&self) {
        self.suppressed.store(true, Ordering::SeqCst);
        tracing::debug!("Refresh suppressed");
    }

    pub fn resume(&self) {
        self.suppressed.store(false, Ordering::SeqCst);
        tracing::debug!("Refresh resumed");
    }

    // ── Entry points ─────────────────────────────────────────────────────

    /// Mount-time load. Guarded separately: only the first call fetches,
    /// a framework double-invoke is a no-op.
    pub async fn initial_load(&self) -> bool {
        if self
            .initial_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Initial load already issued, skipping double-invoke");
            return false;
        }
        self.request_refresh(RefreshMode::Visible, RefreshReason::Initial)
            .await
    }

    /// Manual refresh button.
    pub async fn refresh_now(&self) -> bool {
        self.request_refresh(RefreshMode::Visible, RefreshReason::Manual)
            .await
    }

    /// Date change: switch the active day, then reload visibly.
    pub async fn change_day(&self, day: NaiveDate) -> bool {
        self.store.set_day(day);
        self.request_refresh(RefreshMode::Visible, RefreshReason::DateChange)
            .await
    }

    /// The single entry point every trigger funnels into. Returns whether
    /// a fetch actually ran.
    pub async fn request_refresh(&self, mode: RefreshMode, reason: RefreshReason) -> bool {
        if mode == RefreshMode::Silent && self.suppressed.load(Ordering::SeqCst) {
            tracing::debug!(?reason, "Suppressed, skipping silent refresh");
            return false;
        }
        // Single in-flight guard: overlapping triggers collapse into one.
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!(?mode, ?reason, "Refresh already in flight, skipping");
            return false;
        }
        *self.current_mode.write().unwrap_or_else(|e| e.into_inner()) = Some(mode);

        if mode == RefreshMode::Visible {
            self.store.mark_loading();
        }
        tracing::debug!(?mode, ?reason, "Refresh started");

        let result = self.run_cycle().await;
        match result {
            Ok(count) => {
                tracing::debug!(?reason, count, "Refresh cycle complete");
            }
            Err(ref e) if e.is_auth() => {
                tracing::warn!(?reason, "Authentication expired during refresh");
                self.store.mark_reauth_required();
            }
            Err(e) => {
                // Last good list stays displayed in either mode; only the
                // freshness indicator degrades. Silent failures are
                // otherwise swallowed — retry happens on the next tick.
                self.store.mark_stale();
                match mode {
                    RefreshMode::Visible => {
                        tracing::error!(?reason, error = %e, "Refresh failed")
                    }
                    RefreshMode::Silent => {
                        tracing::warn!(?reason, error = %e, "Silent refresh failed")
                    }
                }
            }
        }

        *self.current_mode.write().unwrap_or_else(|e| e.into_inner()) = None;
        self.in_flight.store(false, Ordering::SeqCst);
        true
    }

    /// Fixed-order cycle over a frozen snapshot of ingested entries.
    async fn run_cycle(&self) -> Result<usize, FeedError> {
        let day = self.store.day();
        let entries = self.backend.ingest_day(day).await?;
        let unified = merge::reconcile(&entries, day);

        // Overlay applied last so it wins over this cycle's computed state.
        let overrides = self.overrides.lock().unwrap_or_else(|e| e.into_inner());
        let overlaid = match overrides.overlay_all(&unified) {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(error = %e, "Override overlay failed, using server state");
                unified
            }
        };
        drop(overrides);

        let count = overlaid.len();
        self.store.ingest_cycle_complete(overlaid);
        Ok(count)
    }

    // ── Optimistic overrides ─────────────────────────────────────────────

    /// Record a user-intent patch and re-overlay the current snapshot so
    /// the change shows immediately, without waiting for the next fetch.
    pub fn apply_optimistic_override(
        &self,
        id: &str,
        patch: &OverridePatch,
        ttl: Duration,
    ) -> Result<(), crate::overrides::OverrideError> {
        let overrides = self.overrides.lock().unwrap_or_else(|e| e.into_inner());
        overrides.put(id, patch, ttl)?;
        let snapshot = self.store.snapshot();
        let overlaid = overrides.overlay_all(&snapshot)?;
        self.store.override_applied(overlaid);
        Ok(())
    }

    /// Shared access for the bulk-action layer.
    pub fn with_overrides<T>(&self, f: impl FnOnce(&OverrideStore) -> T) -> T {
        let overrides = self.overrides.lock().unwrap_or_else(|e| e.into_inner());
        f(&overrides)
    }
}

impl<B: QueueBackend + 'static> RefreshScheduler<B> {
    /// Start the poll timer and the domain-event listener. Both funnel
    /// into `request_refresh`; handles are returned for shutdown.
    pub fn spawn(self: &Arc<Self>) -> (JoinHandle<()>, JoinHandle<()>) {
        let timer = {
            let scheduler = Arc::clone(self);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(config::POLL_INTERVAL);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                // First tick fires immediately; the initial load owns that.
                interval.tick().await;
                loop {
                    interval.tick().await;
                    scheduler
                        .request_refresh(RefreshMode::Silent, RefreshReason::Timer)
                        .await;
                }
            })
        };

        let listener = {
            let scheduler = Arc::clone(self);
            let mut rx = self.bus.subscribe();
            tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(event) => {
                            // Settle delay tolerates backend write-then-read
                            // lag; one retry-free fetch afterwards.
                            tokio::time::sleep(config::EVENT_SETTLE_DELAY).await;
                            let mode = match event {
                                DomainEvent::DateChanged => RefreshMode::Visible,
                                _ => RefreshMode::Silent,
                            };
                            scheduler
                                .request_refresh(mode, RefreshReason::DomainEvent)
                                .await;
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(missed = n, "Event listener lagged");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            })
        };

        (timer, listener)
    }
}
