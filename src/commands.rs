use crate::aggregation::Indices;
use crate::db::SessionStore;
use crate::enrichment::{EnrichmentPipeline, EnrichmentProgress};
use crate::error::ImportError;
use crate::history_parser::read_history_file;
use crate::metadata::MetadataClient;
use crate::models::{EnrichedMovie, SummaryStats};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Everything derived from one movie set. Rebuilt whole whenever the set changes.
#[derive(Debug, Default)]
pub struct AppState {
    pub movies: Vec<Arc<EnrichedMovie>>,
    pub indices: Indices,
    pub summary: SummaryStats,
}

impl AppState {
    pub fn from_movies(movies: Vec<EnrichedMovie>) -> Self {
        let movies: Vec<Arc<EnrichedMovie>> = movies.into_iter().map(Arc::new).collect();
        let indices = Indices::build(&movies);
        let summary = SummaryStats::from_movies(&movies);
        Self {
            movies,
            indices,
            summary,
        }
    }
}

#[derive(Debug)]
pub struct ImportOutcome {
    pub state: AppState,
    pub enriched_count: usize,
    pub unenriched_titles: Vec<String>,
    /// Set when the new session could not be persisted. The in-memory state is still valid.
    pub storage_warning: Option<String>,
}

/// Reads, enriches, indexes and persists a viewing-history export.
///
/// Only an unreadable or header-less file rejects the import. Lookup and
/// storage problems degrade the outcome instead.
pub async fn import_history<P, F>(
    path: P,
    client: &dyn MetadataClient,
    store: &SessionStore,
    on_progress: F,
) -> Result<ImportOutcome, ImportError>
where
    P: AsRef<Path>,
    F: FnMut(&EnrichmentProgress),
{
    let path = path.as_ref();
    info!("Importing viewing history from: {}", path.display());

    let records = read_history_file(path).map_err(|e| {
        error!("History import failed: {}", e);
        e
    })?;

    let report = EnrichmentPipeline::new(client).run(records, on_progress).await;
    let enriched_count = report.enriched_count();
    let unenriched_titles = report
        .unenriched_titles()
        .into_iter()
        .map(str::to_string)
        .collect();

    let state = AppState::from_movies(report.movies);

    let storage_warning = match store.save(&state.movies) {
        Ok(()) => None,
        Err(e) => {
            warn!("Session save failed: {}", e);
            Some(e.to_string())
        }
    };

    Ok(ImportOutcome {
        state,
        enriched_count,
        unenriched_titles,
        storage_warning,
    })
}

/// Rebuilds the state from the stored session, if there is a usable one.
pub fn restore_session(store: &SessionStore) -> Option<AppState> {
    match store.load() {
        Ok(Some(movies)) => Some(AppState::from_movies(movies)),
        Ok(None) => None,
        Err(e) => {
            warn!("Session restore failed: {}", e);
            None
        }
    }
}

pub fn reset_session(store: &SessionStore) -> Result<(), String> {
    store.clear().map_err(|e| {
        warn!("Session reset failed: {}", e);
        e.to_string()
    })?;
    info!("Session cleared");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::freeze_size;
    use crate::metadata::{Credits, CrewMember, MovieDetails, NamedEntry, SearchCandidate};
    use async_trait::async_trait;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    struct OneMovieCatalog;

    #[async_trait]
    impl MetadataClient for OneMovieCatalog {
        async fn search(&self, title: &str, _year: i32) -> Vec<SearchCandidate> {
            if title == "Heat" {
                vec![SearchCandidate {
                    id: 949,
                    title: "Heat".to_string(),
                }]
            } else {
                Vec::new()
            }
        }

        async fn fetch_details(&self, candidate_id: i64) -> Option<MovieDetails> {
            Some(MovieDetails {
                id: candidate_id,
                runtime: Some(170),
                genres: vec![NamedEntry { name: "Crime".to_string() }],
                credits: Credits {
                    cast: Vec::new(),
                    crew: vec![CrewMember {
                        name: "Michael Mann".to_string(),
                        job: "Director".to_string(),
                    }],
                },
                ..Default::default()
            })
        }
    }

    fn history_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_import_builds_and_saves_state() {
        let file = history_file("Date,Name,Year,Rating\n2023-01-01,Heat,1995,4.5\n2023-01-02,Nope,2001,2\n");
        let store = SessionStore::open_in_memory().unwrap();
        let mut seen = Vec::new();

        let outcome = import_history(file.path(), &OneMovieCatalog, &store, |p| seen.push(p.current))
            .await
            .unwrap();

        assert_eq!(seen, vec![1, 2]);
        assert_eq!(outcome.enriched_count, 1);
        assert_eq!(outcome.unenriched_titles, vec!["Nope"]);
        assert!(outcome.storage_warning.is_none());
        assert_eq!(outcome.state.summary.total_movies, 2);
        assert_eq!(outcome.state.indices.directors["Michael Mann"].count, 1);

        let restored = restore_session(&store).unwrap();
        assert_eq!(restored.movies.len(), 2);
        assert_eq!(restored.indices, outcome.state.indices);
    }

    #[tokio::test]
    async fn test_import_keeps_state_when_save_fails() {
        let long_review = "x".repeat(256 * 1024);
        let file = history_file(&format!(
            "Date,Name,Year,Rating,Review\n2023-01-01,Heat,1995,4.5,{}\n2023-01-02,Nope,2001,2,\n",
            long_review
        ));
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("full.db")).unwrap();
        freeze_size(&store);

        let outcome = import_history(file.path(), &OneMovieCatalog, &store, |_| {})
            .await
            .unwrap();

        assert!(outcome.storage_warning.is_some());
        assert_eq!(outcome.state.movies.len(), 2);
        assert_eq!(outcome.state.movies[0].review.as_deref(), Some(long_review.as_str()));
        assert_eq!(outcome.state.summary.total_movies, 2);
        assert_eq!(outcome.state.indices.directors["Michael Mann"].count, 1);
        assert!(restore_session(&store).is_none());
    }

    #[tokio::test]
    async fn test_import_rejects_missing_file() {
        let store = SessionStore::open_in_memory().unwrap();
        let result = import_history("/no/such/history.csv", &OneMovieCatalog, &store, |_| {}).await;
        assert!(matches!(result, Err(ImportError::UnreadableFile { .. })));
    }

    #[tokio::test]
    async fn test_import_rejects_headerless_file() {
        let file = history_file("\n\n");
        let store = SessionStore::open_in_memory().unwrap();
        let result = import_history(file.path(), &OneMovieCatalog, &store, |_| {}).await;
        assert!(matches!(result, Err(ImportError::Parse(_))));
    }

    #[test]
    fn test_reset_then_restore_is_empty() {
        let store = SessionStore::open_in_memory().unwrap();
        let state = AppState::from_movies(vec![EnrichedMovie::unenriched(Default::default())]);
        store.save(&state.movies).unwrap();

        reset_session(&store).unwrap();
        assert!(restore_session(&store).is_none());
    }

    #[test]
    fn test_empty_state() {
        let state = AppState::from_movies(Vec::new());
        assert!(state.movies.is_empty());
        assert_eq!(state.summary.total_movies, 0);
        assert!(state.indices.directors.is_empty());
    }
}
