//! Per-chart statistics, recomputed on demand from the current movie set.

use crate::models::{EnrichedMovie, GenreAggregate, PersonAggregate, SummaryStats};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub const MAX_RATING: f64 = 5.0;
const BEST_YEAR_SAMPLE: usize = 3;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDetails {
    pub total_movies: usize,
    pub average_rating: f64,
    pub total_runtime: u64,
    pub first_movie: Option<Arc<EnrichedMovie>>,
    pub last_movie: Option<Arc<EnrichedMovie>>,
    pub max_rating: Option<f64>,
    pub min_rating: Option<f64>,
    pub highest_rated: Vec<Arc<EnrichedMovie>>,
    pub lowest_rated: Vec<Arc<EnrichedMovie>>,
}

pub fn summary_details(movies: &[Arc<EnrichedMovie>], summary: &SummaryStats) -> SummaryDetails {
    let max_rating = movies.iter().map(|m| m.rating).reduce(f64::max);
    let min_rating = movies.iter().map(|m| m.rating).reduce(f64::min);

    SummaryDetails {
        total_movies: summary.total_movies,
        average_rating: summary.average_rating,
        total_runtime: summary.total_runtime,
        first_movie: summary.sorted_movies.iter().find(|m| m.watch_date().is_some()).cloned(),
        last_movie: summary.sorted_movies.iter().rev().find(|m| m.watch_date().is_some()).cloned(),
        max_rating,
        min_rating,
        highest_rated: rated_exactly(movies, max_rating),
        lowest_rated: rated_exactly(movies, min_rating),
    }
}

fn rated_exactly(movies: &[Arc<EnrichedMovie>], rating: Option<f64>) -> Vec<Arc<EnrichedMovie>> {
    match rating {
        Some(rating) => movies.iter().filter(|m| m.rating == rating).cloned().collect(),
        None => Vec::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingBucket {
    pub rating: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingDistribution {
    pub mean: f64,
    pub median: f64,
    pub modes: Vec<f64>,
    pub std_dev: f64,
    pub histogram: Vec<RatingBucket>,
    pub perfect_scores: Vec<Arc<EnrichedMovie>>,
    pub lowest_rated: Vec<Arc<EnrichedMovie>>,
}

pub fn rating_distribution(movies: &[Arc<EnrichedMovie>]) -> Option<RatingDistribution> {
    if movies.is_empty() {
        return None;
    }
    let ratings: Vec<f64> = movies.iter().map(|m| m.rating).collect();
    let n = ratings.len() as f64;
    let mean = ratings.iter().sum::<f64>() / n;

    let mut sorted = ratings.clone();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };

    let variance = ratings.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;

    // tenths of a star, so 3.5 and 3.50000001 land in one bar
    let mut histogram: BTreeMap<i64, usize> = BTreeMap::new();
    for rating in &ratings {
        *histogram.entry((rating * 10.0).round() as i64).or_default() += 1;
    }

    let min_rating = sorted[0];
    Some(RatingDistribution {
        mean,
        median,
        modes: modes(&ratings),
        std_dev: variance.sqrt(),
        histogram: histogram
            .into_iter()
            .map(|(tenths, count)| RatingBucket {
                rating: tenths as f64 / 10.0,
                count,
            })
            .collect(),
        perfect_scores: rated_exactly(movies, Some(MAX_RATING)),
        lowest_rated: rated_exactly(movies, Some(min_rating)),
    })
}

/// Most frequent ratings, in the order each one first reached the top count.
fn modes(ratings: &[f64]) -> Vec<f64> {
    let mut counts: HashMap<u64, usize> = HashMap::new();
    let mut max_count = 0;
    let mut modes = Vec::new();
    for rating in ratings {
        let count = counts.entry(rating.to_bits()).or_default();
        *count += 1;
        if *count > max_count {
            max_count = *count;
            modes = vec![*rating];
        } else if *count == max_count {
            modes.push(*rating);
        }
    }
    modes
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupEntry {
    pub name: String,
    pub count: usize,
    pub average_rating: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeopleDetails {
    pub total: usize,
    pub entries: Vec<GroupEntry>,
}

pub fn people_details(people: &BTreeMap<String, PersonAggregate>) -> PeopleDetails {
    PeopleDetails {
        total: people.len(),
        entries: ranked(people.iter().map(|(name, p)| (name, p.count, p.average_rating))),
    }
}

/// Sorts by descending count; equal counts stay in name order.
pub fn ranked<'a>(entries: impl Iterator<Item = (&'a String, usize, f64)>) -> Vec<GroupEntry> {
    let mut ranked: Vec<GroupEntry> = entries
        .map(|(name, count, average_rating)| GroupEntry {
            name: name.clone(),
            count,
            average_rating,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenreDetails {
    pub favorite: String,
    pub favorite_count: usize,
    pub best_movie: Arc<EnrichedMovie>,
    pub worst_movie: Arc<EnrichedMovie>,
    pub averages: Vec<GroupEntry>,
}

pub fn genre_details(genres: &BTreeMap<String, GenreAggregate>) -> Option<GenreDetails> {
    let averages = ranked(genres.iter().map(|(name, g)| (name, g.count, g.average_rating)));
    let favorite = averages.first()?;
    let favorite_movies = &genres.get(&favorite.name)?.movies;

    Some(GenreDetails {
        favorite: favorite.name.clone(),
        favorite_count: favorite.count,
        best_movie: first_by(favorite_movies, |candidate, best| candidate > best)?,
        worst_movie: first_by(favorite_movies, |candidate, worst| candidate < worst)?,
        averages,
    })
}

/// Walks the movies keeping the current pick unless `replaces` says otherwise.
fn first_by(movies: &[Arc<EnrichedMovie>], replaces: fn(f64, f64) -> bool) -> Option<Arc<EnrichedMovie>> {
    movies
        .iter()
        .cloned()
        .reduce(|kept, next| if replaces(next.rating, kept.rating) { next } else { kept })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearAverage {
    pub year: i32,
    pub average: f64,
    pub count: usize,
    #[serde(skip)]
    pub movies: Vec<Arc<EnrichedMovie>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingByYear {
    pub best_year: Option<YearAverage>,
    pub worst_year: Option<YearAverage>,
    pub best_year_highlights: Vec<Arc<EnrichedMovie>>,
    pub table: Vec<YearAverage>, // newest release year first
}

pub fn rating_by_year(movies: &[Arc<EnrichedMovie>]) -> RatingByYear {
    let mut by_year: BTreeMap<i32, Vec<Arc<EnrichedMovie>>> = BTreeMap::new();
    for movie in movies.iter().filter(|m| m.release_year > 0) {
        by_year.entry(movie.release_year).or_default().push(Arc::clone(movie));
    }

    let ascending: Vec<YearAverage> = by_year
        .into_iter()
        .map(|(year, movies)| YearAverage {
            year,
            average: movies.iter().map(|m| m.rating).sum::<f64>() / movies.len() as f64,
            count: movies.len(),
            movies,
        })
        .collect();

    // seeded from the first year, so ties go to the earliest one
    let best_year = ascending
        .iter()
        .cloned()
        .reduce(|best, y| if y.average > best.average { y } else { best });
    let worst_year = ascending
        .iter()
        .cloned()
        .reduce(|worst, y| if y.average < worst.average { y } else { worst });

    let best_year_highlights = best_year
        .as_ref()
        .map(|y| y.movies.iter().take(BEST_YEAR_SAMPLE).cloned().collect())
        .unwrap_or_default();

    let mut table = ascending;
    table.reverse();

    RatingByYear {
        best_year,
        worst_year,
        best_year_highlights,
        table,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RuntimeBand {
    Under90,
    From90To120,
    From120To150,
    From150To180,
    Over180,
}

impl RuntimeBand {
    pub const ALL: [RuntimeBand; 5] = [
        RuntimeBand::Under90,
        RuntimeBand::From90To120,
        RuntimeBand::From120To150,
        RuntimeBand::From150To180,
        RuntimeBand::Over180,
    ];

    /// Band for a runtime in minutes; `None` when the runtime is unknown.
    pub fn for_runtime(minutes: u32) -> Option<Self> {
        match minutes {
            0 => None,
            1..=89 => Some(RuntimeBand::Under90),
            90..=120 => Some(RuntimeBand::From90To120),
            121..=150 => Some(RuntimeBand::From120To150),
            151..=180 => Some(RuntimeBand::From150To180),
            _ => Some(RuntimeBand::Over180),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RuntimeBand::Under90 => "<90m",
            RuntimeBand::From90To120 => "90-120m",
            RuntimeBand::From120To150 => "120-150m",
            RuntimeBand::From150To180 => "150-180m",
            RuntimeBand::Over180 => ">180m",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeBucket {
    pub label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeDetails {
    pub buckets: Vec<RuntimeBucket>,
    pub movies_with_runtime: usize,
    pub average_runtime: Option<f64>,
    pub longest: Option<Arc<EnrichedMovie>>,
    pub shortest: Option<Arc<EnrichedMovie>>,
}

pub fn runtime_details(movies: &[Arc<EnrichedMovie>]) -> RuntimeDetails {
    let timed: Vec<&Arc<EnrichedMovie>> = movies.iter().filter(|m| m.runtime > 0).collect();

    let buckets = RuntimeBand::ALL
        .iter()
        .map(|band| RuntimeBucket {
            label: band.label(),
            count: timed
                .iter()
                .filter(|m| RuntimeBand::for_runtime(m.runtime) == Some(*band))
                .count(),
        })
        .collect();

    let total: u64 = timed.iter().map(|m| u64::from(m.runtime)).sum();
    let average_runtime = (!timed.is_empty()).then(|| total as f64 / timed.len() as f64);

    RuntimeDetails {
        buckets,
        movies_with_runtime: timed.len(),
        average_runtime,
        longest: timed
            .iter()
            .copied()
            .reduce(|kept, m| if m.runtime > kept.runtime { m } else { kept })
            .cloned(),
        shortest: timed
            .iter()
            .copied()
            .reduce(|kept, m| if m.runtime < kept.runtime { m } else { kept })
            .cloned(),
    }
}

/// Watches per calendar month (January first), undated movies excluded.
pub fn movies_by_month(movies: &[Arc<EnrichedMovie>]) -> [usize; 12] {
    use chrono::Datelike;

    let mut months = [0; 12];
    for date in movies.iter().filter_map(|m| m.watch_date()) {
        months[date.month0() as usize] += 1;
    }
    months
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub year: i32,
    pub rating: f64,
}

pub fn rating_vs_year(movies: &[Arc<EnrichedMovie>]) -> Vec<ScatterPoint> {
    movies
        .iter()
        .filter(|m| m.release_year > 0)
        .map(|m| ScatterPoint {
            year: m.release_year,
            rating: m.rating,
        })
        .collect()
}
