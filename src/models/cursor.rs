//! Typed resume-state blobs persisted in the `cursor` column of an
//! import status row. The store treats the column as opaque text; each
//! consumer owns exactly one of these shapes.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Daily OMDb quota, persisted under the `omdb_quota` pseudo-source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaState {
    pub date_utc: String,
    pub used_today: u32,
    pub daily_limit: u32,
    pub next_reset_utc: String,
    pub exhausted_until_utc: Option<String>,
}

impl QuotaState {
    /// Zeroed state for the given moment's UTC day.
    #[must_use]
    pub fn fresh(daily_limit: u32, now: DateTime<Utc>) -> Self {
        Self {
            date_utc: now.format("%Y-%m-%d").to_string(),
            used_today: 0,
            daily_limit,
            next_reset_utc: next_utc_midnight(now).to_rfc3339(),
            exhausted_until_utc: None,
        }
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.daily_limit.saturating_sub(self.used_today)
    }
}

/// Run state of the rating backfill job, persisted under the
/// `rating_backfill_state` pseudo-source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillState {
    pub lock_until: Option<String>,
    pub last_run_at: Option<String>,
    pub last_error: Option<String>,
}

impl BackfillState {
    /// Whether a previous run still holds the time-boxed lock.
    #[must_use]
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lock_until
            .as_deref()
            .and_then(parse_rfc3339)
            .is_some_and(|until| until > now)
    }
}

/// Resume state for Jikan's curated sweep: the top-anime list first, then
/// a seasonal backfill walking backward one season at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum CuratedCursor {
    Top { page: u32 },
    Seasonal { year: i32, season: String },
    Done,
}

impl CuratedCursor {
    #[must_use]
    pub const fn start() -> Self {
        Self::Top { page: 1 }
    }
}

/// Seasons in airing order; the seasonal backfill walks them in reverse.
pub const SEASONS: [&str; 4] = ["winter", "spring", "summer", "fall"];

/// The season preceding `(year, season)` in airing order.
#[must_use]
pub fn previous_season(year: i32, season: &str) -> (i32, String) {
    match SEASONS.iter().position(|s| *s == season) {
        Some(0) | None => (year - 1, SEASONS[3].to_string()),
        Some(i) => (year, SEASONS[i - 1].to_string()),
    }
}

pub fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

#[must_use]
pub fn next_utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let next_day = now.date_naive().succ_opt().unwrap_or(now.date_naive());
    next_day.and_time(NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_quota_state_targets_next_midnight() {
        let now = parse_rfc3339("2026-03-01T18:30:00Z").unwrap();
        let state = QuotaState::fresh(1000, now);
        assert_eq!(state.date_utc, "2026-03-01");
        assert_eq!(state.used_today, 0);
        assert_eq!(
            parse_rfc3339(&state.next_reset_utc).unwrap(),
            parse_rfc3339("2026-03-02T00:00:00Z").unwrap()
        );
    }

    #[test]
    fn backfill_lock_expires() {
        let now = parse_rfc3339("2026-03-01T12:00:00Z").unwrap();
        let held = BackfillState {
            lock_until: Some("2026-03-01T12:10:00Z".to_string()),
            ..Default::default()
        };
        let expired = BackfillState {
            lock_until: Some("2026-03-01T11:00:00Z".to_string()),
            ..Default::default()
        };
        assert!(held.is_locked(now));
        assert!(!expired.is_locked(now));
        assert!(!BackfillState::default().is_locked(now));
    }

    #[test]
    fn curated_cursor_round_trips_as_tagged_json() {
        let cursor = CuratedCursor::Seasonal {
            year: 2024,
            season: "fall".to_string(),
        };
        let json = serde_json::to_string(&cursor).unwrap();
        assert!(json.contains("\"phase\":\"seasonal\""));
        assert_eq!(
            serde_json::from_str::<CuratedCursor>(&json).unwrap(),
            cursor
        );
    }

    #[test]
    fn seasonal_walk_crosses_year_boundary() {
        assert_eq!(previous_season(2024, "fall"), (2024, "summer".to_string()));
        assert_eq!(previous_season(2024, "winter"), (2023, "fall".to_string()));
    }
}
