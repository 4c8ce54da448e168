pub mod content;
pub mod cursor;
pub mod sync;

pub use content::{ContentRecord, EpisodeInfo, RatingPatch};
pub use cursor::{BackfillState, CuratedCursor, QuotaState};
pub use sync::{BackfillOutcome, SyncOutcome};
