//! Shared daily quota for the OMDb enrichment API.
//!
//! State lives in the store (the `cursor` column of the `omdb_quota` import
//! status row) rather than process memory, so the import runners and the
//! backfill manager share one ground truth that survives restarts. The
//! internal mutex serializes read-modify-write within this process; a
//! multi-process deployment would need a storage-level atomic increment
//! instead.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::db::Store;
use crate::models::cursor::{QuotaState, parse_rfc3339};

/// Pseudo-source key for the quota's import status row.
pub const OMDB_QUOTA_SOURCE: &str = "omdb_quota";

#[derive(Debug, Clone, Serialize)]
pub struct QuotaStats {
    pub date_utc: String,
    pub used_today: u32,
    pub daily_limit: u32,
    pub remaining: u32,
    pub exhausted: bool,
    pub next_reset_utc: String,
}

pub struct QuotaProvider {
    store: Store,
    daily_limit: u32,
    cached: Mutex<Option<QuotaState>>,
}

impl QuotaProvider {
    #[must_use]
    pub fn new(store: Store, daily_limit: u32) -> Self {
        Self {
            store,
            daily_limit,
            cached: Mutex::new(None),
        }
    }

    /// Current state for today's UTC date. A stale stored date (from a
    /// previous day or a crashed process) is atomically replaced with a
    /// fresh zeroed state.
    pub async fn get(&self) -> Result<QuotaState> {
        let mut cached = self.cached.lock().await;
        self.load_current(&mut cached, Utc::now()).await
    }

    pub async fn increment(&self) -> Result<QuotaState> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        let mut state = self.load_current(&mut cached, now).await?;

        state.used_today += 1;
        if state.used_today >= state.daily_limit && state.exhausted_until_utc.is_none() {
            info!(
                used = state.used_today,
                limit = state.daily_limit,
                "Daily OMDb quota reached, enrichment paused until {}",
                state.next_reset_utc
            );
            state.exhausted_until_utc = Some(state.next_reset_utc.clone());
        }

        self.persist(&state).await?;
        *cached = Some(state.clone());
        Ok(state)
    }

    /// Whether enrichment calls should be skipped. A future
    /// `exhausted_until_utc` stamp is authoritative even if `used_today`
    /// looks available (day-rollover edge); once the stamp has passed it is
    /// cleared as a side effect.
    pub async fn is_exhausted(&self) -> Result<bool> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        let mut state = self.load_current(&mut cached, now).await?;

        if let Some(until) = state.exhausted_until_utc.as_deref().and_then(parse_rfc3339) {
            if until > now {
                return Ok(true);
            }
            debug!("OMDb exhaustion window passed, clearing flag");
            state.exhausted_until_utc = None;
            self.persist(&state).await?;
            *cached = Some(state.clone());
        }

        Ok(state.used_today >= state.daily_limit)
    }

    pub async fn remaining(&self) -> Result<u32> {
        Ok(self.get().await?.remaining())
    }

    pub async fn stats(&self) -> Result<QuotaStats> {
        let state = self.get().await?;
        let exhausted = {
            let now = Utc::now();
            state
                .exhausted_until_utc
                .as_deref()
                .and_then(parse_rfc3339)
                .is_some_and(|until| until > now)
                || state.used_today >= state.daily_limit
        };
        Ok(QuotaStats {
            date_utc: state.date_utc.clone(),
            used_today: state.used_today,
            daily_limit: state.daily_limit,
            remaining: state.remaining(),
            exhausted,
            next_reset_utc: state.next_reset_utc,
        })
    }

    async fn load_current(
        &self,
        cached: &mut Option<QuotaState>,
        now: DateTime<Utc>,
    ) -> Result<QuotaState> {
        let today = now.format("%Y-%m-%d").to_string();

        if let Some(state) = cached.as_ref() {
            if state.date_utc == today {
                return Ok(state.clone());
            }
        }

        let stored = self
            .store
            .ensure_import_status(OMDB_QUOTA_SOURCE)
            .await?
            .cursor
            .and_then(|raw| serde_json::from_str::<QuotaState>(&raw).ok());

        let state = match stored {
            Some(mut state) if state.date_utc == today => {
                // A config change mid-day adopts the new limit immediately.
                if state.daily_limit != self.daily_limit {
                    state.daily_limit = self.daily_limit;
                    self.persist(&state).await?;
                }
                state
            }
            stale => {
                if stale.is_some() {
                    debug!("OMDb quota state is from a previous UTC day, resetting");
                }
                let fresh = QuotaState::fresh(self.daily_limit, now);
                self.persist(&fresh).await?;
                fresh
            }
        };

        *cached = Some(state.clone());
        Ok(state)
    }

    async fn persist(&self, state: &QuotaState) -> Result<()> {
        let encoded = serde_json::to_string(state)?;
        self.store
            .set_cursor(OMDB_QUOTA_SOURCE, Some(encoded))
            .await
    }
}
