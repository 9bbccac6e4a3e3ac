use async_trait::async_trait;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};
use watchdeck_lib::commands::{import_history, reset_session, restore_session};
use watchdeck_lib::db::SessionStore;
use watchdeck_lib::metadata::{
    CastMember, Credits, CrewMember, MetadataClient, MovieDetails, NamedEntry, SearchCandidate,
};
use watchdeck_lib::models::{UNKNOWN_COUNTRY, UNKNOWN_DIRECTOR};
use watchdeck_lib::query::{ChartDetails, ChartKind, GroupKind, PersonKind, QueryFacade};

const IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w300";

/// Knows "Alpha" and nothing else.
struct AlphaOnlyCatalog;

#[async_trait]
impl MetadataClient for AlphaOnlyCatalog {
    async fn search(&self, title: &str, _year: i32) -> Vec<SearchCandidate> {
        match title {
            "Alpha" => vec![
                SearchCandidate {
                    id: 2,
                    title: "Alpha Returns".to_string(),
                },
                SearchCandidate {
                    id: 1,
                    title: "Alpha".to_string(),
                },
            ],
            _ => Vec::new(),
        }
    }

    async fn fetch_details(&self, candidate_id: i64) -> Option<MovieDetails> {
        if candidate_id != 1 {
            return None;
        }
        Some(MovieDetails {
            id: 1,
            runtime: Some(101),
            poster_path: Some("/alpha.jpg".to_string()),
            overview: Some("A first film.".to_string()),
            genres: vec![NamedEntry { name: "Drama".to_string() }],
            production_countries: vec![NamedEntry { name: "Brazil".to_string() }],
            credits: Credits {
                cast: vec![CastMember { name: "Y".to_string() }],
                crew: vec![
                    CrewMember { name: "Z".to_string(), job: "Writer".to_string() },
                    CrewMember { name: "X".to_string(), job: "Director".to_string() },
                ],
            },
        })
    }
}

fn history(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

const ALPHA_BETA: &str = "Name,Year,Rating,Date\nAlpha,2000,5,2020-01-01\nBeta,2001,3,2020-02-01\n";

#[tokio::test]
async fn test_partial_enrichment_end_to_end() {
    let file = history(ALPHA_BETA);
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(dir.path().join("watchdeck.db")).unwrap();

    let mut progress = Vec::new();
    let outcome = import_history(file.path(), &AlphaOnlyCatalog, &store, |p| {
        progress.push((p.current, p.total, p.title.clone()))
    })
    .await
    .unwrap();

    assert_eq!(
        progress,
        vec![(1, 2, "Alpha".to_string()), (2, 2, "Beta".to_string())]
    );
    assert_eq!(outcome.enriched_count, 1);
    assert_eq!(outcome.unenriched_titles, vec!["Beta"]);

    let state = &outcome.state;
    assert_eq!(state.indices.directors.len(), 1);
    let x = &state.indices.directors["X"];
    assert_eq!(x.count, 1);
    assert_eq!(x.average_rating, 5.0);
    assert_eq!(state.summary.total_movies, 2);
    assert_eq!(state.summary.average_rating, 4.0);

    let beta = &state.movies[1];
    assert_eq!(beta.title, "Beta");
    assert_eq!(beta.release_year, 2001);
    assert_eq!(beta.rating, 3.0);
    assert_eq!(beta.date_watched, "2020-02-01");
    assert_eq!(beta.director, UNKNOWN_DIRECTOR);
    assert_eq!(beta.country, UNKNOWN_COUNTRY);
    assert!(beta.genres.is_empty());
    assert!(beta.cast.is_empty());
}

#[tokio::test]
async fn test_session_survives_reopen_and_serves_queries() {
    let file = history(ALPHA_BETA);
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("watchdeck.db");

    let imported = {
        let store = SessionStore::new(&db_path).unwrap();
        import_history(file.path(), &AlphaOnlyCatalog, &store, |_| {})
            .await
            .unwrap()
            .state
    };

    let store = SessionStore::new(&db_path).unwrap();
    let state = restore_session(&store).unwrap();
    let restored: Vec<_> = state.movies.iter().map(|m| (**m).clone()).collect();
    let original: Vec<_> = imported.movies.iter().map(|m| (**m).clone()).collect();
    assert_eq!(restored, original);

    let query = QueryFacade::new(&state, IMAGE_BASE);

    let alpha = query.movie_detail("alpha", Some(2000)).unwrap();
    assert_eq!(alpha.movie.director, "X");
    assert_eq!(alpha.movie.cast, vec!["Y"]);
    assert_eq!(alpha.movie.runtime, 101);
    assert_eq!(
        alpha.poster_url.as_deref(),
        Some("https://image.tmdb.org/t/p/w300/alpha.jpg")
    );

    let x = query.person_detail(PersonKind::Director, "X").unwrap();
    assert_eq!(x.first_movie.unwrap().title, "Alpha");
    assert_eq!(x.histogram.len(), 1);

    assert_eq!(query.list_movies(Some("y")).len(), 1);
    assert_eq!(query.list_group(GroupKind::Genres, None)[0].name, "Drama");

    match query.chart(ChartKind::Runtime) {
        ChartDetails::Runtime(runtime) => {
            assert_eq!(runtime.movies_with_runtime, 1);
            assert_eq!(runtime.buckets[1].label, "90-120m");
            assert_eq!(runtime.buckets[1].count, 1);
        }
        other => panic!("unexpected chart {:?}", other),
    }
    match query.chart(ChartKind::Summary) {
        ChartDetails::Summary(summary) => {
            assert_eq!(summary.first_movie.unwrap().title, "Alpha");
            assert_eq!(summary.last_movie.unwrap().title, "Beta");
        }
        other => panic!("unexpected chart {:?}", other),
    }

    reset_session(&store).unwrap();
    assert!(restore_session(&store).is_none());
}
