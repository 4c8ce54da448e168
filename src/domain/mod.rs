//! Small value types shared across the catalog pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A string from the store or an API caller that matches no known variant.
#[derive(Debug, Error)]
#[error("Unknown {kind}: {value}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// External catalog provider a record originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Tvmaze,
    Tmdb,
    Jikan,
    Anidb,
    Anilist,
    Manual,
}

impl Source {
    /// Sources backed by an importable external catalog (excludes `Manual`).
    pub const CATALOGS: [Self; 5] = [
        Self::Tvmaze,
        Self::Tmdb,
        Self::Jikan,
        Self::Anidb,
        Self::Anilist,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tvmaze => "tvmaze",
            Self::Tmdb => "tmdb",
            Self::Jikan => "jikan",
            Self::Anidb => "anidb",
            Self::Anilist => "anilist",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tvmaze" => Ok(Self::Tvmaze),
            "tmdb" => Ok(Self::Tmdb),
            "jikan" => Ok(Self::Jikan),
            "anidb" => Ok(Self::Anidb),
            "anilist" => Ok(Self::Anilist),
            "manual" => Ok(Self::Manual),
            other => Err(UnknownVariant::new("source", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
    Anime,
}

impl MediaType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Tv => "tv",
            Self::Anime => "anime",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(Self::Movie),
            "tv" => Ok(Self::Tv),
            "anime" => Ok(Self::Anime),
            other => Err(UnknownVariant::new("media type", other)),
        }
    }
}

/// Unified airing/release status. Each client maps its provider's native
/// vocabulary onto this enum; nothing downstream branches on provider strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    Airing,
    Upcoming,
    Completed,
    Cancelled,
    Released,
}

impl ContentStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Airing => "airing",
            Self::Upcoming => "upcoming",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Released => "released",
        }
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "airing" => Ok(Self::Airing),
            "upcoming" => Ok(Self::Upcoming),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "released" => Ok(Self::Released),
            other => Err(UnknownVariant::new("content status", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_round_trips_through_str() {
        for source in Source::CATALOGS {
            assert_eq!(source.as_str().parse::<Source>().unwrap(), source);
        }
        assert_eq!("manual".parse::<Source>().unwrap(), Source::Manual);
        assert!("netflix".parse::<Source>().is_err());
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            ContentStatus::Airing,
            ContentStatus::Upcoming,
            ContentStatus::Completed,
            ContentStatus::Cancelled,
            ContentStatus::Released,
        ] {
            assert_eq!(status.as_str().parse::<ContentStatus>().unwrap(), status);
        }
    }

    #[test]
    fn media_type_round_trips_through_str() {
        for media_type in [MediaType::Movie, MediaType::Tv, MediaType::Anime] {
            assert_eq!(
                media_type.as_str().parse::<MediaType>().unwrap(),
                media_type
            );
        }
    }
}
