//! Grouped statistics over an enriched movie set.
//!
//! Everything here is a pure function of the input slice. Indices are built in
//! one fold and never mutated afterwards; [`Indices::merge`] combines two
//! finished index sets into a new one.

use crate::models::{EnrichedMovie, GenreAggregate, PersonAggregate, SummaryStats};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Indices {
    pub directors: BTreeMap<String, PersonAggregate>,
    pub actors: BTreeMap<String, PersonAggregate>,
    pub genres: BTreeMap<String, GenreAggregate>,
}

impl Indices {
    /// Credits every director, cast member and genre of every movie.
    pub fn build(movies: &[Arc<EnrichedMovie>]) -> Self {
        movies
            .iter()
            .fold(Indices::default(), |mut acc, movie| {
                for name in movie.director_names() {
                    credit_person(&mut acc.directors, name, movie);
                }
                for name in movie.cast.iter().filter(|n| !n.is_empty()) {
                    credit_person(&mut acc.actors, name, movie);
                }
                for name in movie.genres.iter().filter(|n| !n.is_empty()) {
                    credit_genre(&mut acc.genres, name, movie);
                }
                acc
            })
            .with_averages()
    }

    /// Combines two index sets as if built from the concatenated movie lists.
    pub fn merge(self, other: Indices) -> Self {
        Indices {
            directors: merge_maps(self.directors, other.directors, merge_person),
            actors: merge_maps(self.actors, other.actors, merge_person),
            genres: merge_maps(self.genres, other.genres, merge_genre),
        }
        .with_averages()
    }

    fn with_averages(mut self) -> Self {
        for person in self.directors.values_mut().chain(self.actors.values_mut()) {
            person.average_rating = person.total_rating / person.count as f64;
        }
        for genre in self.genres.values_mut() {
            genre.average_rating = genre.total_rating / genre.count as f64;
        }
        self
    }
}

fn credit_person(map: &mut BTreeMap<String, PersonAggregate>, name: &str, movie: &Arc<EnrichedMovie>) {
    let entry = map.entry(name.to_string()).or_insert_with(|| PersonAggregate {
        count: 0,
        total_rating: 0.0,
        average_rating: 0.0,
        movies: Vec::new(),
        first_movie: None,
        last_movie: None,
    });
    entry.count += 1;
    entry.total_rating += movie.rating;
    entry.movies.push(Arc::clone(movie));

    if let Some(date) = movie.watch_date() {
        if is_before(date, entry.first_movie.as_ref()) {
            entry.first_movie = Some(Arc::clone(movie));
        }
        if is_after(date, entry.last_movie.as_ref()) {
            entry.last_movie = Some(Arc::clone(movie));
        }
    }
}

fn credit_genre(map: &mut BTreeMap<String, GenreAggregate>, name: &str, movie: &Arc<EnrichedMovie>) {
    let entry = map.entry(name.to_string()).or_insert_with(|| GenreAggregate {
        count: 0,
        total_rating: 0.0,
        average_rating: 0.0,
        movies: Vec::new(),
    });
    entry.count += 1;
    entry.total_rating += movie.rating;
    entry.movies.push(Arc::clone(movie));
}

// Current holders always carry a parseable date, so an empty slot is the only
// way a comparison can be skipped.
fn is_before(date: NaiveDate, current: Option<&Arc<EnrichedMovie>>) -> bool {
    current
        .and_then(|m| m.watch_date())
        .map_or(true, |current| date < current)
}

fn is_after(date: NaiveDate, current: Option<&Arc<EnrichedMovie>>) -> bool {
    current
        .and_then(|m| m.watch_date())
        .map_or(true, |current| date > current)
}

fn merge_maps<T>(
    mut left: BTreeMap<String, T>,
    right: BTreeMap<String, T>,
    combine: fn(T, T) -> T,
) -> BTreeMap<String, T> {
    for (name, value) in right {
        let merged = match left.remove(&name) {
            Some(existing) => combine(existing, value),
            None => value,
        };
        left.insert(name, merged);
    }
    left
}

fn merge_person(mut left: PersonAggregate, right: PersonAggregate) -> PersonAggregate {
    left.count += right.count;
    left.total_rating += right.total_rating;
    left.movies.extend(right.movies);

    if let Some(candidate) = right.first_movie {
        if candidate.watch_date().is_some_and(|d| is_before(d, left.first_movie.as_ref())) {
            left.first_movie = Some(candidate);
        }
    }
    if let Some(candidate) = right.last_movie {
        if candidate.watch_date().is_some_and(|d| is_after(d, left.last_movie.as_ref())) {
            left.last_movie = Some(candidate);
        }
    }
    left
}

fn merge_genre(mut left: GenreAggregate, right: GenreAggregate) -> GenreAggregate {
    left.count += right.count;
    left.total_rating += right.total_rating;
    left.movies.extend(right.movies);
    left
}

impl SummaryStats {
    pub fn from_movies(movies: &[Arc<EnrichedMovie>]) -> Self {
        if movies.is_empty() {
            return SummaryStats::default();
        }

        let total_movies = movies.len();
        let average_rating = movies.iter().map(|m| m.rating).sum::<f64>() / total_movies as f64;
        let total_runtime: u64 = movies.iter().map(|m| u64::from(m.runtime)).sum();
        let average_runtime = total_runtime as f64 / total_movies as f64;

        let years = movies.iter().map(|m| m.release_year).filter(|y| *y > 0);
        let year_range = match (years.clone().min(), years.max()) {
            (Some(min), Some(max)) => max - min,
            _ => 0,
        };

        SummaryStats {
            total_movies,
            average_rating,
            total_runtime,
            average_runtime,
            year_range,
            sorted_movies: sort_by_watch_date(movies),
        }
    }
}

/// Dated movies ascending, then undated movies in their original order.
pub fn sort_by_watch_date(movies: &[Arc<EnrichedMovie>]) -> Vec<Arc<EnrichedMovie>> {
    let mut sorted = movies.to_vec();
    sorted.sort_by_key(|m| match m.watch_date() {
        Some(date) => (0, Some(date)),
        None => (1, None),
    });
    sorted
}
