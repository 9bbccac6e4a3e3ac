//! Read-only projection served to the presentation layer.

use crate::commands::AppState;
use crate::models::{EnrichedMovie, PersonAggregate, SummaryStats};
use crate::stats::{self, GenreDetails, GroupEntry, PeopleDetails, RatingByYear, RatingDistribution, RuntimeDetails, ScatterPoint, SummaryDetails};
use clap::ValueEnum;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupKind {
    Directors,
    Actors,
    Genres,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersonKind {
    Director,
    Actor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartKind {
    Summary,
    RatingDistribution,
    Directors,
    Actors,
    Genres,
    RatingByYear,
    Runtime,
    MoviesByMonth,
    RatingVsYear,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "chart", content = "data", rename_all = "kebab-case")]
pub enum ChartDetails {
    Summary(SummaryDetails),
    RatingDistribution(Option<RatingDistribution>),
    Directors(PeopleDetails),
    Actors(PeopleDetails),
    Genres(Option<GenreDetails>),
    RatingByYear(RatingByYear),
    Runtime(RuntimeDetails),
    MoviesByMonth([usize; 12]),
    RatingVsYear(Vec<ScatterPoint>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieDetail {
    pub movie: Arc<EnrichedMovie>,
    pub poster_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StarBucket {
    pub stars: i64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonDetail {
    pub name: String,
    pub kind: PersonKind,
    pub count: usize,
    pub average_rating: f64,
    pub first_movie: Option<Arc<EnrichedMovie>>,
    pub last_movie: Option<Arc<EnrichedMovie>>,
    pub filmography: Vec<Arc<EnrichedMovie>>, // best rated first
    pub best_movie: Option<Arc<EnrichedMovie>>,
    pub worst_movie: Option<Arc<EnrichedMovie>>,
    pub histogram: Vec<StarBucket>,
}

pub struct QueryFacade<'a> {
    state: &'a AppState,
    image_base_url: &'a str,
}

impl<'a> QueryFacade<'a> {
    pub fn new(state: &'a AppState, image_base_url: &'a str) -> Self {
        Self { state, image_base_url }
    }

    /// Movies whose title, director or cast contains `filter`, ignoring case.
    pub fn list_movies(&self, filter: Option<&str>) -> Vec<Arc<EnrichedMovie>> {
        let needle = filter.map(str::to_lowercase).filter(|f| !f.is_empty());
        self.state
            .movies
            .iter()
            .filter(|m| needle.as_deref().map_or(true, |n| movie_matches(m, n)))
            .cloned()
            .collect()
    }

    /// Group members by descending count, optionally filtered by name.
    pub fn list_group(&self, kind: GroupKind, filter: Option<&str>) -> Vec<GroupEntry> {
        let indices = &self.state.indices;
        let entries = match kind {
            GroupKind::Directors => stats::people_details(&indices.directors).entries,
            GroupKind::Actors => stats::people_details(&indices.actors).entries,
            GroupKind::Genres => stats::ranked(
                indices
                    .genres
                    .iter()
                    .map(|(name, g)| (name, g.count, g.average_rating)),
            ),
        };

        match filter.map(str::to_lowercase).filter(|f| !f.is_empty()) {
            Some(needle) => entries
                .into_iter()
                .filter(|e| e.name.to_lowercase().contains(&needle))
                .collect(),
            None => entries,
        }
    }

    /// First movie with this title (ignoring case), narrowed by release year when given.
    pub fn movie_detail(&self, title: &str, year: Option<i32>) -> Option<MovieDetail> {
        let title = title.to_lowercase();
        let movie = self.state.movies.iter().find(|m| {
            m.title.to_lowercase() == title && year.map_or(true, |y| m.release_year == y)
        })?;
        Some(MovieDetail {
            movie: Arc::clone(movie),
            poster_url: self.poster_url(movie),
        })
    }

    pub fn poster_url(&self, movie: &EnrichedMovie) -> Option<String> {
        movie
            .poster_path
            .as_deref()
            .map(|path| format!("{}/{}", self.image_base_url.trim_end_matches('/'), path.trim_start_matches('/')))
    }

    pub fn person_detail(&self, kind: PersonKind, name: &str) -> Option<PersonDetail> {
        let people = match kind {
            PersonKind::Director => &self.state.indices.directors,
            PersonKind::Actor => &self.state.indices.actors,
        };
        let (name, person) = lookup_person(people, name)?;

        let mut filmography = person.movies.clone();
        filmography.sort_by(|a, b| b.rating.total_cmp(&a.rating));

        let mut histogram: BTreeMap<i64, usize> = BTreeMap::new();
        for movie in &filmography {
            *histogram.entry(movie.rating.floor() as i64).or_default() += 1;
        }

        Some(PersonDetail {
            name: name.clone(),
            kind,
            count: person.count,
            average_rating: person.average_rating,
            first_movie: person.first_movie.clone(),
            last_movie: person.last_movie.clone(),
            best_movie: filmography.first().cloned(),
            worst_movie: filmography.last().cloned(),
            filmography,
            histogram: histogram
                .into_iter()
                .map(|(stars, count)| StarBucket { stars, count })
                .collect(),
        })
    }

    pub fn summary(&self) -> &SummaryStats {
        &self.state.summary
    }

    pub fn chart(&self, kind: ChartKind) -> ChartDetails {
        let movies = &self.state.movies;
        let indices = &self.state.indices;
        match kind {
            ChartKind::Summary => ChartDetails::Summary(stats::summary_details(movies, &self.state.summary)),
            ChartKind::RatingDistribution => ChartDetails::RatingDistribution(stats::rating_distribution(movies)),
            ChartKind::Directors => ChartDetails::Directors(stats::people_details(&indices.directors)),
            ChartKind::Actors => ChartDetails::Actors(stats::people_details(&indices.actors)),
            ChartKind::Genres => ChartDetails::Genres(stats::genre_details(&indices.genres)),
            ChartKind::RatingByYear => ChartDetails::RatingByYear(stats::rating_by_year(movies)),
            ChartKind::Runtime => ChartDetails::Runtime(stats::runtime_details(movies)),
            ChartKind::MoviesByMonth => ChartDetails::MoviesByMonth(stats::movies_by_month(movies)),
            ChartKind::RatingVsYear => ChartDetails::RatingVsYear(stats::rating_vs_year(movies)),
        }
    }
}

fn movie_matches(movie: &EnrichedMovie, needle: &str) -> bool {
    movie.title.to_lowercase().contains(needle)
        || movie.director.to_lowercase().contains(needle)
        || movie.cast.iter().any(|c| c.to_lowercase().contains(needle))
}

// Exact key first, then a case-insensitive match.
fn lookup_person<'m>(
    people: &'m BTreeMap<String, PersonAggregate>,
    name: &str,
) -> Option<(&'m String, &'m PersonAggregate)> {
    people
        .get_key_value(name)
        .or_else(|| people.iter().find(|(key, _)| key.to_lowercase() == name.to_lowercase()))
}
