//! Drives each watch record through catalog search, disambiguation, detail
//! fetch and field merge.
//!
//! Records are processed strictly one after another: each lookup is awaited
//! before the next record starts, so progress is monotonic and only one
//! request is ever in flight.

use crate::metadata::{MetadataClient, MovieDetails, SearchCandidate};
use crate::models::{EnrichedMovie, RawWatchRecord, MAX_CAST, UNKNOWN_COUNTRY, UNKNOWN_DIRECTOR};
use serde::Serialize;
use tracing::{debug, info, warn};

const DIRECTOR_JOB: &str = "Director";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentStage {
    Pending,
    Searching,
    Disambiguating,
    FetchingDetails,
    Merged,
}

/// How far a record got before it was merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EnrichmentOutcome {
    Enriched,
    NoCandidates,
    NoDetails,
}

/// Side-channel notification sent after each record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichmentProgress {
    pub current: usize, // 1-based
    pub total: usize,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct EnrichmentReport {
    pub movies: Vec<EnrichedMovie>,
    pub outcomes: Vec<EnrichmentOutcome>, // parallel to `movies`
}

impl EnrichmentReport {
    pub fn enriched_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| **o == EnrichmentOutcome::Enriched)
            .count()
    }

    pub fn unenriched_titles(&self) -> Vec<&str> {
        self.movies
            .iter()
            .zip(&self.outcomes)
            .filter(|(_, outcome)| **outcome != EnrichmentOutcome::Enriched)
            .map(|(movie, _)| movie.title.as_str())
            .collect()
    }
}

pub struct EnrichmentPipeline<'a> {
    client: &'a dyn MetadataClient,
}

impl<'a> EnrichmentPipeline<'a> {
    pub fn new(client: &'a dyn MetadataClient) -> Self {
        Self { client }
    }

    /// Enriches every record, in order. Never drops a record.
    pub async fn run<F>(&self, records: Vec<RawWatchRecord>, mut on_progress: F) -> EnrichmentReport
    where
        F: FnMut(&EnrichmentProgress),
    {
        let total = records.len();
        info!("Starting enrichment of {} records", total);

        let mut movies = Vec::with_capacity(total);
        let mut outcomes = Vec::with_capacity(total);

        for (index, record) in records.into_iter().enumerate() {
            let title = record.title.clone();
            let (movie, outcome) = self.enrich_one(record).await;
            if outcome != EnrichmentOutcome::Enriched {
                warn!("Could not enrich '{}': {:?}", title, outcome);
            }
            movies.push(movie);
            outcomes.push(outcome);

            on_progress(&EnrichmentProgress {
                current: index + 1,
                total,
                title,
            });
        }

        let report = EnrichmentReport { movies, outcomes };
        info!(
            "Enrichment complete: {} of {} records matched",
            report.enriched_count(),
            total
        );
        report
    }

    /// Runs a single record through the lookup state machine.
    pub async fn enrich_one(&self, record: RawWatchRecord) -> (EnrichedMovie, EnrichmentOutcome) {
        let mut stage = EnrichmentStage::Pending;
        advance(&record.title, &mut stage, EnrichmentStage::Searching);
        let candidates = self.client.search(&record.title, record.year).await;

        advance(&record.title, &mut stage, EnrichmentStage::Disambiguating);
        let Some(candidate) = pick_candidate(&record.title, &candidates) else {
            advance(&record.title, &mut stage, EnrichmentStage::Merged);
            return (EnrichedMovie::unenriched(record), EnrichmentOutcome::NoCandidates);
        };

        advance(&record.title, &mut stage, EnrichmentStage::FetchingDetails);
        let details = self.client.fetch_details(candidate.id).await;

        advance(&record.title, &mut stage, EnrichmentStage::Merged);
        match details {
            Some(details) => (merge_details(record, details), EnrichmentOutcome::Enriched),
            None => (EnrichedMovie::unenriched(record), EnrichmentOutcome::NoDetails),
        }
    }
}

fn advance(title: &str, stage: &mut EnrichmentStage, next: EnrichmentStage) {
    debug!("'{}': {:?} -> {:?}", title, stage, next);
    *stage = next;
}

/// Exact case-insensitive title match first, else the catalog's top result.
pub fn pick_candidate<'c>(title: &str, candidates: &'c [SearchCandidate]) -> Option<&'c SearchCandidate> {
    let wanted = title.to_lowercase();
    candidates
        .iter()
        .find(|c| c.title.to_lowercase() == wanted)
        .or_else(|| candidates.first())
}

/// Combines a watch record with the catalog's detail record.
pub fn merge_details(record: RawWatchRecord, details: MovieDetails) -> EnrichedMovie {
    let director = details
        .credits
        .crew
        .iter()
        .find(|member| member.job == DIRECTOR_JOB)
        .map(|member| member.name.clone())
        .unwrap_or_else(|| UNKNOWN_DIRECTOR.to_string());

    let country = details
        .production_countries
        .into_iter()
        .next()
        .map(|c| c.name)
        .unwrap_or_else(|| UNKNOWN_COUNTRY.to_string());

    EnrichedMovie {
        external_id: Some(details.id),
        director,
        cast: details
            .credits
            .cast
            .into_iter()
            .take(MAX_CAST)
            .map(|member| member.name)
            .collect(),
        genres: details.genres.into_iter().map(|g| g.name).collect(),
        runtime: details.runtime.unwrap_or(0),
        country,
        poster_path: details.poster_path.filter(|p| !p.is_empty()),
        overview: details.overview.unwrap_or_default(),
        ..EnrichedMovie::unenriched(record)
    }
}
