use serde::Serialize;

/// Result of one orchestrated import run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SyncOutcome {
    pub imported: u32,
    pub updated: u32,
    pub errors: Vec<String>,
}

impl SyncOutcome {
    /// Sentinel returned when a start request races an active run. Not an
    /// error: callers inspect `errors` rather than catching anything.
    #[must_use]
    pub fn already_running() -> Self {
        Self {
            imported: 0,
            updated: 0,
            errors: vec!["already in progress".to_string()],
        }
    }

    #[must_use]
    pub fn is_already_running(&self) -> bool {
        self.errors.iter().any(|e| e == "already in progress")
    }
}

/// Result of one rating backfill batch.
#[derive(Debug, Default, Clone, Serialize)]
pub struct BackfillOutcome {
    pub updated: u32,
    pub skipped: u32,
    pub failed: u32,
    pub exhausted: bool,
}
