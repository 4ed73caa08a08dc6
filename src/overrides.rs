//! Local Override Store — short-lived, client-held corrections applied on
//! top of server data to reflect a just-performed action before the
//! server's own state catches up.
//!
//! Backed by one small sqlite table (survives reload); each row carries
//! its own expiry. Expiry is lazy — checked at overlay time, no
//! background sweep. While unexpired, an override wins over freshly
//! ingested server data unconditionally; a server value that already
//! confirms the patch supersedes the row.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{EntryStatus, ModelError, PaymentStatus, UnifiedAppointment};

#[derive(Error, Debug)]
pub enum OverrideError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Whitelisted patch: status and payment status only. Never a blind
/// spread — a stale snapshot of assignment arrays must not sneak back in
/// through an override.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverridePatch {
    pub status: Option<EntryStatus>,
    pub payment_status: Option<PaymentStatus>,
}

impl OverridePatch {
    pub fn status(status: EntryStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn payment(payment_status: PaymentStatus) -> Self {
        Self {
            payment_status: Some(payment_status),
            ..Self::default()
        }
    }

    /// Does the fresh server record already carry every patched value?
    fn confirmed_by(&self, appt: &UnifiedAppointment) -> bool {
        self.status.map_or(true, |s| s == appt.status)
            && self
                .payment_status
                .map_or(true, |p| p == appt.payment_status)
    }
}

/// Keyed cache of user-intent state, one row per appointment primary id.
pub struct OverrideStore {
    conn: Connection,
}

impl OverrideStore {
    /// Open (or create) the on-disk store.
    pub fn open(path: &Path) -> Result<Self, OverrideError> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        Self::init(&conn)?;
        Ok(Self { conn })
    }

    /// In-memory store for tests and ephemeral sessions.
    pub fn open_in_memory() -> Result<Self, OverrideError> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self { conn })
    }

    fn init(conn: &Connection) -> Result<(), OverrideError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS overrides (
                appointment_id TEXT PRIMARY KEY,
                status TEXT,
                payment_status TEXT,
                expires_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Record an optimistic patch for `id`, valid for `ttl` from now.
    pub fn put(&self, id: &str, patch: &OverridePatch, ttl: Duration) -> Result<(), OverrideError> {
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::seconds(0));
        self.put_until(id, patch, expires_at)
    }

    /// Record a patch with an absolute expiry.
    pub fn put_until(
        &self,
        id: &str,
        patch: &OverridePatch,
        expires_at: DateTime<Utc>,
    ) -> Result<(), OverrideError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO overrides (appointment_id, status, payment_status, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                id,
                patch.status.map(|s| s.as_str()),
                patch.payment_status.map(|p| p.as_str()),
                expires_at,
            ],
        )?;
        Ok(())
    }

    pub fn remove(&self, id: &str) -> Result<(), OverrideError> {
        self.conn
            .execute("DELETE FROM overrides WHERE appointment_id = ?1", params![id])?;
        Ok(())
    }

    /// Unexpired patch for `id`, if any. Expired rows are treated as absent.
    pub fn get_active(&self, id: &str) -> Result<Option<OverridePatch>, OverrideError> {
        let row = self
            .conn
            .query_row(
                "SELECT status, payment_status, expires_at FROM overrides
                 WHERE appointment_id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, DateTime<Utc>>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((status, payment, expires_at)) = row else {
            return Ok(None);
        };
        if expires_at <= Utc::now() {
            return Ok(None);
        }
        Ok(Some(OverridePatch {
            status: status.as_deref().map(str::parse).transpose()?,
            payment_status: payment.as_deref().map(str::parse).transpose()?,
        }))
    }

    /// Apply the override for this appointment, if one is live.
    ///
    /// Returns a new appointment — the fresh one is never mutated in
    /// place. A server record that already confirms the patch deletes the
    /// row and passes through unchanged.
    pub fn overlay(&self, appt: &UnifiedAppointment) -> Result<UnifiedAppointment, OverrideError> {
        let Some(patch) = self.get_active(&appt.primary_id)? else {
            return Ok(appt.clone());
        };
        if patch.confirmed_by(appt) {
            self.remove(&appt.primary_id)?;
            return Ok(appt.clone());
        }
        let mut out = appt.clone();
        if let Some(status) = patch.status {
            out.status = status;
        }
        if let Some(payment) = patch.payment_status {
            out.payment_status = payment;
        }
        Ok(out)
    }

    /// Overlay a whole freshly ingested list.
    pub fn overlay_all(
        &self,
        appts: &[UnifiedAppointment],
    ) -> Result<Vec<UnifiedAppointment>, OverrideError> {
        appts.iter().map(|a| self.overlay(a)).collect()
    }

    /// Delete every expired row. Optional housekeeping; correctness never
    /// depends on it because expiry is checked at read time.
    pub fn expire(&self) -> Result<usize, OverrideError> {
        let n = self.conn.execute(
            "DELETE FROM overrides WHERE expires_at <= ?1",
            params![Utc::now()],
        )?;
        Ok(n)
    }
}
