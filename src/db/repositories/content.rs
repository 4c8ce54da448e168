use crate::domain::{ContentStatus, MediaType, Source};
use crate::entities::{content_records, prelude::*};
use crate::models::content::{ContentRecord, RatingPatch};
use anyhow::Result;
use chrono::Utc;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

/// Optional filters for the read-only browse endpoint.
#[derive(Debug, Default, Clone)]
pub struct ContentFilter {
    pub source: Option<Source>,
    pub media_type: Option<MediaType>,
    pub status: Option<ContentStatus>,
    pub page: u64,
    pub page_size: u64,
}

pub struct ContentRepository {
    conn: DatabaseConnection,
}

impl ContentRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    // ========================================================================
    // Model Conversion Helpers
    // ========================================================================

    fn map_model(model: content_records::Model) -> Result<ContentRecord> {
        Ok(ContentRecord {
            id: Some(model.id),
            source: model.source.parse()?,
            source_id: model.source_id,
            title: model.title,
            media_type: model.media_type.parse()?,
            overview: model.overview,
            genres: decode_list(model.genres),
            tags: decode_list(model.tags),
            poster_url: model.poster_url,
            backdrop_url: model.backdrop_url,
            popularity: model.popularity,
            year: model.year,
            end_year: model.end_year,
            release_date: model.release_date,
            status: model.status.and_then(|s| s.parse().ok()),
            total_seasons: model.total_seasons,
            total_episodes: model.total_episodes,
            season: model.season,
            network: model.network,
            air_time: model.air_time,
            air_days: decode_list(model.air_days),
            studio: model.studio,
            source_material: model.source_material,
            runtime: model.runtime,
            episode_data: model
                .episode_data
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default(),
            rating: model.rating,
            mal_rating: model.mal_rating,
            imdb_rating: model.imdb_rating,
            imdb_id: model.imdb_id,
            vote_count: model.vote_count,
            rotten_tomatoes_rating: model.rotten_tomatoes_rating,
            imdb_checked_at: model.imdb_checked_at,
            created_at: Some(model.created_at),
            last_updated: Some(model.last_updated),
        })
    }

    fn catalog_fields(record: &ContentRecord) -> content_records::ActiveModel {
        content_records::ActiveModel {
            source: Set(record.source.as_str().to_string()),
            source_id: Set(record.source_id.clone()),
            title: Set(record.title.clone()),
            media_type: Set(record.media_type.as_str().to_string()),
            overview: Set(record.overview.clone()),
            genres: Set(encode_list(&record.genres)),
            tags: Set(encode_list(&record.tags)),
            poster_url: Set(record.poster_url.clone()),
            backdrop_url: Set(record.backdrop_url.clone()),
            popularity: Set(record.popularity),
            year: Set(record.year),
            end_year: Set(record.end_year),
            release_date: Set(record.release_date.clone()),
            status: Set(record.status.map(|s| s.as_str().to_string())),
            total_seasons: Set(record.total_seasons),
            total_episodes: Set(record.total_episodes),
            season: Set(record.season.clone()),
            network: Set(record.network.clone()),
            air_time: Set(record.air_time.clone()),
            air_days: Set(encode_list(&record.air_days)),
            studio: Set(record.studio.clone()),
            source_material: Set(record.source_material.clone()),
            runtime: Set(record.runtime),
            rating: Set(record.rating),
            mal_rating: Set(record.mal_rating),
            episode_data: Set(if record.episode_data.is_empty() {
                None
            } else {
                serde_json::to_string(&record.episode_data).ok()
            }),
            last_updated: Set(Utc::now().to_rfc3339()),
            ..Default::default()
        }
    }

    // ========================================================================
    // Content Operations
    // ========================================================================

    pub async fn get(&self, id: i32) -> Result<Option<ContentRecord>> {
        let model = ContentRecords::find_by_id(id).one(&self.conn).await?;
        model.map(Self::map_model).transpose()
    }

    pub async fn get_by_key(&self, source: Source, source_id: &str) -> Result<Option<ContentRecord>> {
        let model = ContentRecords::find()
            .filter(content_records::Column::Source.eq(source.as_str()))
            .filter(content_records::Column::SourceId.eq(source_id))
            .one(&self.conn)
            .await?;
        model.map(Self::map_model).transpose()
    }

    /// Insert a brand-new record; returns the assigned surrogate id.
    pub async fn insert(&self, record: &ContentRecord) -> Result<i32> {
        let now = Utc::now().to_rfc3339();
        let mut model = Self::catalog_fields(record);
        model.imdb_rating = Set(record.imdb_rating);
        model.imdb_id = Set(record.imdb_id.clone());
        model.vote_count = Set(record.vote_count);
        model.rotten_tomatoes_rating = Set(record.rotten_tomatoes_rating.clone());
        model.imdb_checked_at = Set(record.imdb_checked_at.clone());
        model.created_at = Set(now);

        let res = ContentRecords::insert(model).exec(&self.conn).await?;
        Ok(res.last_insert_id)
    }

    /// Overwrite the catalog-owned fields of an existing row, leaving the
    /// rating fields and `created_at` untouched.
    pub async fn overwrite_catalog(&self, id: i32, record: &ContentRecord) -> Result<()> {
        let mut model = Self::catalog_fields(record);
        model.id = Set(id);
        ContentRecords::update(model).exec(&self.conn).await?;
        Ok(())
    }

    /// Apply an enrichment patch; only the provided rating fields change.
    pub async fn apply_rating_patch(&self, id: i32, patch: &RatingPatch) -> Result<()> {
        let mut model = content_records::ActiveModel {
            id: Set(id),
            last_updated: Set(Utc::now().to_rfc3339()),
            ..Default::default()
        };
        if let Some(imdb_id) = &patch.imdb_id {
            model.imdb_id = Set(Some(imdb_id.clone()));
        }
        if let Some(rating) = patch.imdb_rating {
            model.imdb_rating = Set(Some(rating));
        }
        if let Some(votes) = patch.vote_count {
            model.vote_count = Set(Some(votes));
        }
        if let Some(rt) = &patch.rotten_tomatoes_rating {
            model.rotten_tomatoes_rating = Set(Some(rt.clone()));
        }
        if let Some(checked) = &patch.imdb_checked_at {
            model.imdb_checked_at = Set(Some(checked.clone()));
        }
        ContentRecords::update(model).exec(&self.conn).await?;
        Ok(())
    }

    pub async fn list_by_source_and_status(
        &self,
        source: Source,
        statuses: &[ContentStatus],
    ) -> Result<Vec<ContentRecord>> {
        let status_strings: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
        let rows = ContentRecords::find()
            .filter(content_records::Column::Source.eq(source.as_str()))
            .filter(content_records::Column::Status.is_in(status_strings))
            .order_by_asc(content_records::Column::Id)
            .all(&self.conn)
            .await?;
        rows.into_iter().map(Self::map_model).collect()
    }

    /// Unrated records never checked against OMDb, highest-value first.
    pub async fn query_unrated(
        &self,
        media_types: &[MediaType],
        limit: u64,
    ) -> Result<Vec<ContentRecord>> {
        let type_strings: Vec<&str> = media_types.iter().map(|t| t.as_str()).collect();
        let rows = ContentRecords::find()
            .filter(content_records::Column::MediaType.is_in(type_strings))
            .filter(content_records::Column::ImdbRating.is_null())
            .filter(content_records::Column::ImdbCheckedAt.is_null())
            .order_by_desc(content_records::Column::Popularity)
            .order_by_desc(content_records::Column::CreatedAt)
            .limit(limit)
            .all(&self.conn)
            .await?;
        rows.into_iter().map(Self::map_model).collect()
    }

    pub async fn count_unrated(&self, media_types: &[MediaType]) -> Result<u64> {
        let type_strings: Vec<&str> = media_types.iter().map(|t| t.as_str()).collect();
        let count = ContentRecords::find()
            .filter(content_records::Column::MediaType.is_in(type_strings))
            .filter(content_records::Column::ImdbRating.is_null())
            .filter(content_records::Column::ImdbCheckedAt.is_null())
            .count(&self.conn)
            .await?;
        Ok(count)
    }

    pub async fn count_rated(&self, media_type: MediaType) -> Result<u64> {
        let count = ContentRecords::find()
            .filter(content_records::Column::MediaType.eq(media_type.as_str()))
            .filter(content_records::Column::ImdbRating.is_not_null())
            .count(&self.conn)
            .await?;
        Ok(count)
    }

    pub async fn count_missing_rating(&self, media_type: MediaType) -> Result<u64> {
        let count = ContentRecords::find()
            .filter(content_records::Column::MediaType.eq(media_type.as_str()))
            .filter(content_records::Column::ImdbRating.is_null())
            .count(&self.conn)
            .await?;
        Ok(count)
    }

    pub async fn count_by_source(&self, source: Source) -> Result<u64> {
        let count = ContentRecords::find()
            .filter(content_records::Column::Source.eq(source.as_str()))
            .count(&self.conn)
            .await?;
        Ok(count)
    }

    pub async fn delete_by_source(&self, source: Source) -> Result<u64> {
        let res = ContentRecords::delete_many()
            .filter(content_records::Column::Source.eq(source.as_str()))
            .exec(&self.conn)
            .await?;
        Ok(res.rows_affected)
    }

    pub async fn list(&self, filter: &ContentFilter) -> Result<Vec<ContentRecord>> {
        let mut query = ContentRecords::find();
        if let Some(source) = filter.source {
            query = query.filter(content_records::Column::Source.eq(source.as_str()));
        }
        if let Some(media_type) = filter.media_type {
            query = query.filter(content_records::Column::MediaType.eq(media_type.as_str()));
        }
        if let Some(status) = filter.status {
            query = query.filter(content_records::Column::Status.eq(status.as_str()));
        }

        let page_size = filter.page_size.clamp(1, 200);
        let rows = query
            .order_by_desc(content_records::Column::Popularity)
            .order_by_asc(content_records::Column::Id)
            .offset(filter.page.saturating_mul(page_size))
            .limit(page_size)
            .all(&self.conn)
            .await?;
        rows.into_iter().map(Self::map_model).collect()
    }
}

fn encode_list(values: &[String]) -> Option<String> {
    if values.is_empty() {
        None
    } else {
        serde_json::to_string(values).ok()
    }
}

fn decode_list(raw: Option<String>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}
