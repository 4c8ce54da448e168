pub mod backfill;
pub mod catalog;
pub mod enrichment;
pub mod quota;
pub mod rate_limit;
pub mod scheduler;
pub mod sync;

pub use backfill::{BackfillConfig, RatingBackfillService, RATING_BACKFILL_SOURCE};
pub use catalog::{CatalogSource, CuratedImport, FetchedItem, ImportRunner, PhaseEnd};
pub use enrichment::{EnrichOutcome, EnrichmentService};
pub use quota::{QuotaProvider, QuotaStats, OMDB_QUOTA_SOURCE};
pub use rate_limit::RequestGate;
pub use scheduler::{SchedulerSnapshot, SyncManager};
