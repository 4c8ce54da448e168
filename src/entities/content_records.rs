use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "content_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub source: String,
    pub source_id: String,
    pub title: String,
    #[sea_orm(indexed)]
    pub media_type: String,
    pub overview: Option<String>,
    pub genres: Option<String>, // JSON array stored as string
    pub tags: Option<String>,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub popularity: Option<f64>,
    pub year: Option<i32>,
    pub end_year: Option<i32>,
    pub release_date: Option<String>,
    pub status: Option<String>,
    pub total_seasons: Option<i32>,
    pub total_episodes: Option<i32>,
    pub season: Option<String>,
    pub network: Option<String>,
    pub air_time: Option<String>,
    pub air_days: Option<String>,
    pub studio: Option<String>,
    pub source_material: Option<String>,
    pub runtime: Option<i32>,
    pub episode_data: Option<String>,
    pub rating: Option<f64>,
    pub mal_rating: Option<f64>,
    pub imdb_rating: Option<f64>,
    pub imdb_id: Option<String>,
    pub vote_count: Option<i32>,
    pub rotten_tomatoes_rating: Option<String>,
    pub imdb_checked_at: Option<String>,
    pub created_at: String,
    pub last_updated: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
