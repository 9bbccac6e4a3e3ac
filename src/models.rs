use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Director value for a movie whose crew could not be resolved.
pub const UNKNOWN_DIRECTOR: &str = "N/A";
/// Country value for a movie whose production countries could not be resolved.
pub const UNKNOWN_COUNTRY: &str = "Desconhecido";
/// Cast entries kept per movie.
pub const MAX_CAST: usize = 30;

/// One row of the viewing-history export, before any lookup.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawWatchRecord {
    pub title: String,
    pub year: i32,    // 0 when missing or unparseable
    pub rating: f64,  // 0.0 when missing or unparseable
    pub watched_date: String,
    pub rewatch: bool,
    pub review: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedMovie {
    pub title: String,
    pub release_year: i32,
    pub external_id: Option<i64>, // None when the catalog lookup failed
    pub rating: f64,
    pub date_watched: String, // ISO date or empty
    #[serde(default)]
    pub rewatch: bool,
    #[serde(default)]
    pub review: Option<String>,
    pub director: String, // ", "-joined when several
    pub cast: Vec<String>,
    pub genres: Vec<String>,
    pub runtime: u32, // minutes
    pub country: String,
    pub poster_path: Option<String>,
    pub overview: String,
}

impl EnrichedMovie {
    /// Builds the movie a record degrades to when nothing could be looked up.
    pub fn unenriched(record: RawWatchRecord) -> Self {
        Self {
            title: record.title,
            release_year: record.year,
            external_id: None,
            rating: record.rating,
            date_watched: record.watched_date,
            rewatch: record.rewatch,
            review: record.review,
            director: UNKNOWN_DIRECTOR.to_string(),
            cast: Vec::new(),
            genres: Vec::new(),
            runtime: 0,
            country: UNKNOWN_COUNTRY.to_string(),
            poster_path: None,
            overview: String::new(),
        }
    }

    pub fn is_enriched(&self) -> bool {
        self.external_id.is_some()
    }

    /// The parsed watch date, `None` when empty or unparseable.
    pub fn watch_date(&self) -> Option<NaiveDate> {
        parse_watch_date(&self.date_watched)
    }

    /// Individual director names, skipping the unresolved sentinel.
    pub fn director_names(&self) -> impl Iterator<Item = &str> {
        self.director
            .split(", ")
            .map(str::trim)
            .filter(|name| !name.is_empty() && *name != UNKNOWN_DIRECTOR)
    }
}

/// Accepts plain `YYYY-MM-DD` dates as well as RFC 3339 timestamps.
pub fn parse_watch_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

/// Statistics for one director or actor.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersonAggregate {
    pub count: usize,
    pub total_rating: f64,
    pub average_rating: f64,
    pub movies: Vec<Arc<EnrichedMovie>>,
    pub first_movie: Option<Arc<EnrichedMovie>>, // earliest dated watch
    pub last_movie: Option<Arc<EnrichedMovie>>,  // latest dated watch
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenreAggregate {
    pub count: usize,
    pub total_rating: f64,
    pub average_rating: f64,
    pub movies: Vec<Arc<EnrichedMovie>>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    pub total_movies: usize,
    pub average_rating: f64,
    pub total_runtime: u64,
    pub average_runtime: f64,
    pub year_range: i32,
    pub sorted_movies: Vec<Arc<EnrichedMovie>>, // ascending by watch date
}
