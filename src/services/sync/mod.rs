pub mod anidb;
pub mod anilist;
pub mod jikan;
pub mod tmdb;
pub mod tvmaze;

pub use anidb::AnidbCatalog;
pub use anilist::AnilistCatalog;
pub use jikan::{JikanCatalog, JikanCurated};
pub use tmdb::TmdbCatalog;
pub use tvmaze::TvmazeCatalog;
