//! Calendar-driven sync manager.
//!
//! Each source gets a designated morning hour so the daily full runs
//! stagger their load on the external APIs. On startup any source with an
//! empty store gets its first run immediately; after that an hourly tick
//! (or an optional cron expression) checks which sources are due. Assumes
//! one long-lived process in one timezone; a multi-instance deployment
//! would need external leader election to keep "one scheduled run per
//! day" true.

use anyhow::Result;
use chrono::{DateTime, Local, Timelike};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{Duration, interval};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::config::SchedulerConfig;
use crate::db::Store;
use crate::domain::Source;
use crate::models::cursor::parse_rfc3339;
use crate::services::catalog::ImportRunner;

#[derive(Debug, Serialize)]
pub struct SchedulerSnapshot {
    pub is_running: bool,
    pub tick_interval_minutes: u32,
    pub morning_hours: HashMap<String, u32>,
    pub active_sources: Vec<String>,
}

pub struct SyncManager {
    store: Store,
    runners: HashMap<Source, Arc<ImportRunner>>,
    config: SchedulerConfig,
    running: Arc<RwLock<bool>>,
}

impl SyncManager {
    #[must_use]
    pub fn new(
        store: Store,
        runners: HashMap<Source, Arc<ImportRunner>>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            runners,
            config,
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn start(self: Arc<Self>) -> Result<()> {
        if !self.config.enabled {
            info!("Sync manager is disabled in config");
            return Ok(());
        }

        *self.running.write().await = true;
        info!("Starting sync manager");

        self.startup_catchup().await;

        if let Some(cron_expr) = self.config.cron_expression.clone() {
            self.run_with_cron(&cron_expr).await
        } else {
            self.run_with_interval().await
        }
    }

    /// A source with zero imported records has never completed a first
    /// run; trigger it right away instead of waiting for its morning hour.
    async fn startup_catchup(&self) {
        for (source, runner) in &self.runners {
            match self.store.count_by_source(*source).await {
                Ok(0) => {
                    info!(
                        source = source.as_str(),
                        "Empty store, starting first import"
                    );
                    Self::spawn_run(Arc::clone(runner));
                }
                Ok(_) => {}
                Err(e) => warn!(source = source.as_str(), "Startup count failed: {e}"),
            }
        }
    }

    async fn run_with_cron(&self, cron_expr: &str) -> Result<()> {
        let mut sched = JobScheduler::new().await?;

        let store = self.store.clone();
        let runners = self.runners.clone();
        let config = self.config.clone();
        let running = Arc::clone(&self.running);

        let job = Job::new_async(cron_expr, move |_uuid, _lock| {
            let store = store.clone();
            let runners = runners.clone();
            let config = config.clone();
            let running = Arc::clone(&running);
            Box::pin(async move {
                if !*running.read().await {
                    return;
                }
                tick(&store, &runners, &config, Local::now()).await;
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;

        info!("Sync manager running with cron: {}", cron_expr);

        loop {
            if !*self.running.read().await {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        sched.shutdown().await?;
        Ok(())
    }

    async fn run_with_interval(&self) -> Result<()> {
        let minutes = self.config.tick_interval_minutes.max(1);
        info!("Sync manager checking every {} minutes", minutes);

        let mut check = interval(Duration::from_secs(u64::from(minutes) * 60));
        check.tick().await; // immediate first tick; startup catchup already ran

        loop {
            check.tick().await;
            if !*self.running.read().await {
                break;
            }
            tick(&self.store, &self.runners, &self.config, Local::now()).await;
        }

        Ok(())
    }

    pub async fn stop(&self) {
        info!("Stopping sync manager...");
        *self.running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Manual trigger used by the control surface; returns false when the
    /// source has no configured runner.
    pub fn trigger(&self, source: Source) -> bool {
        match self.runners.get(&source) {
            Some(runner) => {
                Self::spawn_run(Arc::clone(runner));
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn runner(&self, source: Source) -> Option<&Arc<ImportRunner>> {
        self.runners.get(&source)
    }

    pub async fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            is_running: self.is_running().await,
            tick_interval_minutes: self.config.tick_interval_minutes,
            morning_hours: self
                .runners
                .keys()
                .map(|s| (s.as_str().to_string(), self.config.morning_hour(*s)))
                .collect(),
            active_sources: self
                .runners
                .iter()
                .filter(|(_, runner)| runner.is_running())
                .map(|(source, _)| source.as_str().to_string())
                .collect(),
        }
    }

    fn spawn_run(runner: Arc<ImportRunner>) {
        tokio::spawn(async move {
            let source = runner.source();
            let outcome = runner.start().await;
            if outcome.is_already_running() {
                info!(source = source.as_str(), "Run already in progress, skipped");
            } else {
                info!(
                    source = source.as_str(),
                    imported = outcome.imported,
                    updated = outcome.updated,
                    "Scheduled run finished"
                );
            }
        });
    }
}

/// One scheduling pass: start every source whose morning hour matches,
/// that has not synced yet today and is not already running.
async fn tick(
    store: &Store,
    runners: &HashMap<Source, Arc<ImportRunner>>,
    config: &SchedulerConfig,
    now: DateTime<Local>,
) {
    for (source, runner) in runners {
        let key = source.as_str();

        if now.hour() != config.morning_hour(*source) {
            continue;
        }
        // The runner's in-process flag mirrors the persisted one and keeps
        // the hourly tick from racing a manual start.
        if runner.is_running() {
            continue;
        }

        match store.get_import_status(key).await {
            Ok(status) => {
                let status = status.as_ref();
                if status.is_some_and(|s| s.is_active) {
                    continue;
                }
                if ran_today(status.and_then(|s| s.last_sync_at.as_deref()), now) {
                    continue;
                }
            }
            Err(e) => {
                error!(source = key, "Status read failed during tick: {e}");
                continue;
            }
        }

        info!(
            source = key,
            hour = now.hour(),
            "Morning hour reached, starting sync"
        );
        SyncManager::spawn_run(Arc::clone(runner));
    }
}

/// Whether the stored last-sync stamp falls on today's local date.
#[must_use]
pub fn ran_today(last_sync_at: Option<&str>, now: DateTime<Local>) -> bool {
    last_sync_at
        .and_then(parse_rfc3339)
        .map(|sync| sync.with_timezone(&Local).date_naive() == now.date_naive())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ran_today_compares_local_dates() {
        let now = Local.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
        let this_morning = now - chrono::Duration::hours(3);
        let yesterday = now - chrono::Duration::days(1);

        assert!(ran_today(Some(&this_morning.to_rfc3339()), now));
        assert!(!ran_today(Some(&yesterday.to_rfc3339()), now));
        assert!(!ran_today(None, now));
        assert!(!ran_today(Some("not a timestamp"), now));
    }
}
