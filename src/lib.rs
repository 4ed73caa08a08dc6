//! Navbat — clinic front-desk queue reconciliation engine.
//!
//! Turns heterogeneous per-specialty queue feeds (QR self-registration,
//! walk-in desk entries, scheduled visits) into one consistent,
//! deduplicated, per-department patient queue, safe to render and act on
//! under continuous background polling and optimistic local edits.

pub mod actions; // Bulk write actions with partial-failure outcomes
pub mod classifier; // Service code / tag → department bucket
pub mod config;
pub mod events; // Process-wide domain event channel
pub mod feed; // Queue feed ingestor + backend client
pub mod identity; // Per-day dedup keys
pub mod merge; // Entry merger — the two fold passes
pub mod models;
pub mod numbering; // Display numbers for the active view
pub mod overrides; // TTL'd optimistic override store
pub mod scheduler; // Refresh state machine
pub mod store; // Queue snapshot store

pub use actions::BulkOutcome;
pub use classifier::DepartmentBucket;
pub use events::{DomainEvent, EventBus};
pub use feed::{FeedError, QueueBackend, QueueFeedClient};
pub use models::{DepartmentAssignment, RawQueueEntry, UnifiedAppointment};
pub use overrides::{OverridePatch, OverrideStore};
pub use scheduler::{RefreshMode, RefreshReason, RefreshScheduler, SchedulerState};
pub use store::{Freshness, QueueStore};

use tracing_subscriber::EnvFilter;

/// Initialize tracing once at startup.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("Navbat starting v{}", config::APP_VERSION);
}
