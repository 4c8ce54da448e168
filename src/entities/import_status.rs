use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Durable per-source sync bookkeeping. Also hosts the two pseudo-sources
/// (`omdb_quota`, `rating_backfill_state`) that park their own state in the
/// `cursor` column.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "import_status")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub source: String,
    pub is_active: bool,
    pub current_page: i32,
    pub total_imported: i32,
    pub total_available: Option<i32>,
    pub phase1_progress: Option<String>,
    pub phase2_progress: Option<String>,
    pub phase3_progress: Option<String>,
    pub errors: Option<String>, // JSON array stored as string
    pub cursor: Option<String>,
    pub last_sync_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
