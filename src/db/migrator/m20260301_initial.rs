use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ContentRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ContentRecords::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ContentRecords::Source).string().not_null())
                    .col(
                        ColumnDef::new(ContentRecords::SourceId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ContentRecords::Title).string().not_null())
                    .col(
                        ColumnDef::new(ContentRecords::MediaType)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ContentRecords::Overview).text())
                    .col(ColumnDef::new(ContentRecords::Genres).text())
                    .col(ColumnDef::new(ContentRecords::Tags).text())
                    .col(ColumnDef::new(ContentRecords::PosterUrl).string())
                    .col(ColumnDef::new(ContentRecords::BackdropUrl).string())
                    .col(ColumnDef::new(ContentRecords::Popularity).double())
                    .col(ColumnDef::new(ContentRecords::Year).integer())
                    .col(ColumnDef::new(ContentRecords::EndYear).integer())
                    .col(ColumnDef::new(ContentRecords::ReleaseDate).string())
                    .col(ColumnDef::new(ContentRecords::Status).string())
                    .col(ColumnDef::new(ContentRecords::TotalSeasons).integer())
                    .col(ColumnDef::new(ContentRecords::TotalEpisodes).integer())
                    .col(ColumnDef::new(ContentRecords::Season).string())
                    .col(ColumnDef::new(ContentRecords::Network).string())
                    .col(ColumnDef::new(ContentRecords::AirTime).string())
                    .col(ColumnDef::new(ContentRecords::AirDays).text())
                    .col(ColumnDef::new(ContentRecords::Studio).string())
                    .col(ColumnDef::new(ContentRecords::SourceMaterial).string())
                    .col(ColumnDef::new(ContentRecords::Runtime).integer())
                    .col(ColumnDef::new(ContentRecords::EpisodeData).text())
                    .col(ColumnDef::new(ContentRecords::Rating).double())
                    .col(ColumnDef::new(ContentRecords::MalRating).double())
                    .col(ColumnDef::new(ContentRecords::ImdbRating).double())
                    .col(ColumnDef::new(ContentRecords::ImdbId).string())
                    .col(ColumnDef::new(ContentRecords::VoteCount).integer())
                    .col(ColumnDef::new(ContentRecords::RottenTomatoesRating).string())
                    .col(ColumnDef::new(ContentRecords::ImdbCheckedAt).string())
                    .col(
                        ColumnDef::new(ContentRecords::CreatedAt)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ContentRecords::LastUpdated)
                            .string()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // One row per (source, source_id); phase 2 relies on this for
        // idempotent re-imports.
        manager
            .create_index(
                Index::create()
                    .name("idx_content_source_source_id")
                    .table(ContentRecords::Table)
                    .col(ContentRecords::Source)
                    .col(ContentRecords::SourceId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_content_media_type_status")
                    .table(ContentRecords::Table)
                    .col(ContentRecords::MediaType)
                    .col(ContentRecords::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_content_imdb_rating")
                    .table(ContentRecords::Table)
                    .col(ContentRecords::ImdbRating)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ImportStatus::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ImportStatus::Source)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ImportStatus::IsActive)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ImportStatus::CurrentPage)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(ImportStatus::TotalImported)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(ImportStatus::TotalAvailable).integer())
                    .col(ColumnDef::new(ImportStatus::Phase1Progress).string())
                    .col(ColumnDef::new(ImportStatus::Phase2Progress).string())
                    .col(ColumnDef::new(ImportStatus::Phase3Progress).string())
                    .col(ColumnDef::new(ImportStatus::Errors).text())
                    .col(ColumnDef::new(ImportStatus::Cursor).text())
                    .col(ColumnDef::new(ImportStatus::LastSyncAt).string())
                    .col(ColumnDef::new(ImportStatus::CreatedAt).string().not_null())
                    .col(ColumnDef::new(ImportStatus::UpdatedAt).string().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ImportStatus::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ContentRecords::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ContentRecords {
    Table,
    Id,
    Source,
    SourceId,
    Title,
    MediaType,
    Overview,
    Genres,
    Tags,
    PosterUrl,
    BackdropUrl,
    Popularity,
    Year,
    EndYear,
    ReleaseDate,
    Status,
    TotalSeasons,
    TotalEpisodes,
    Season,
    Network,
    AirTime,
    AirDays,
    Studio,
    SourceMaterial,
    Runtime,
    EpisodeData,
    Rating,
    MalRating,
    ImdbRating,
    ImdbId,
    VoteCount,
    RottenTomatoesRating,
    ImdbCheckedAt,
    CreatedAt,
    LastUpdated,
}

#[derive(DeriveIden)]
enum ImportStatus {
    Table,
    Source,
    IsActive,
    CurrentPage,
    TotalImported,
    TotalAvailable,
    Phase1Progress,
    Phase2Progress,
    Phase3Progress,
    Errors,
    Cursor,
    LastSyncAt,
    CreatedAt,
    UpdatedAt,
}
