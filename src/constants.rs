pub mod rate {
    use std::time::Duration;

    pub const TVMAZE_LIMIT: u32 = 15;
    pub const TVMAZE_WINDOW: Duration = Duration::from_secs(10);

    pub const TMDB_LIMIT: u32 = 35;
    pub const TMDB_WINDOW: Duration = Duration::from_secs(1);

    pub const JIKAN_LIMIT: u32 = 3;
    pub const JIKAN_WINDOW: Duration = Duration::from_secs(1);

    pub const ANILIST_LIMIT: u32 = 2;
    pub const ANILIST_WINDOW: Duration = Duration::from_secs(3);

    // AniDB bans aggressive clients outright; stay well under their ceiling.
    pub const ANIDB_LIMIT: u32 = 1;
    pub const ANIDB_WINDOW: Duration = Duration::from_secs(4);

    pub const OMDB_LIMIT: u32 = 1;
    pub const OMDB_WINDOW: Duration = Duration::from_secs(1);
}

pub mod sync {

    /// Most-recent errors kept on an import status row.
    pub const MAX_TRACKED_ERRORS: usize = 20;

    /// Phase 0 adopts the real record count when the tracked total drifts
    /// past either threshold.
    pub const HEALTH_DISPARITY_RATIO: f64 = 0.10;
    pub const HEALTH_DISPARITY_ABSOLUTE: i64 = 100;

    /// Progress strings are rewritten every N items during phase 1.
    pub const PROGRESS_STRIDE: usize = 5;

    /// Consecutive page-fetch failures tolerated before the run aborts.
    pub const MAX_CONSECUTIVE_PAGE_FAILURES: u32 = 3;

    /// Episode list pages fetched per title for sources that paginate
    /// episodes (Jikan serves 100 per page).
    pub const MAX_EPISODE_PAGES: u32 = 3;
}

pub mod backfill {

    pub const DEFAULT_BATCH_SIZE: usize = 40;

    pub const DEFAULT_INTERVAL_MINUTES: u64 = 5;

    pub const LOCK_MINUTES: i64 = 15;

    /// First tick shortly after process start.
    pub const STARTUP_DELAY_SECS: u64 = 30;
}

pub mod quota {

    pub const OMDB_DAILY_LIMIT: u32 = 1000;
}
