//! External movie catalog lookups.
//!
//! Both operations fail soft: transport, status and decode errors are logged,
//! counted and turned into an empty candidate list or an absent detail record.

use crate::error::MetadataError;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// One ranked result of a title search.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchCandidate {
    pub id: i64,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MovieDetails {
    pub id: i64,
    #[serde(default)]
    pub runtime: Option<u32>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub genres: Vec<NamedEntry>,
    #[serde(default)]
    pub production_countries: Vec<NamedEntry>,
    #[serde(default)]
    pub credits: Credits,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NamedEntry {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Credits {
    #[serde(default)]
    pub cast: Vec<CastMember>,
    #[serde(default)]
    pub crew: Vec<CrewMember>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CastMember {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CrewMember {
    pub name: String,
    #[serde(default)]
    pub job: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchCandidate>,
}

/// Read-only access to a movie catalog.
#[async_trait]
pub trait MetadataClient: Send + Sync {
    /// Candidates for a title, ranked by the catalog. Empty on any failure.
    async fn search(&self, title: &str, year: i32) -> Vec<SearchCandidate>;

    /// Full record for a candidate. `None` on any failure.
    async fn fetch_details(&self, candidate_id: i64) -> Option<MovieDetails>;
}

/// Failed lookups since the client was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupFailures {
    pub searches: usize,
    pub details: usize,
}

/// TMDB v3 client.
pub struct TmdbClient {
    client: Client,
    base_url: Url,
    api_key: String,
    language: Option<String>,
    search_failures: AtomicUsize,
    detail_failures: AtomicUsize,
}

impl TmdbClient {
    pub fn new(
        base_url: Url,
        api_key: impl Into<String>,
        language: Option<String>,
        timeout: Duration,
    ) -> Result<Self, MetadataError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
            language,
            search_failures: AtomicUsize::new(0),
            detail_failures: AtomicUsize::new(0),
        })
    }

    pub fn failures(&self) -> LookupFailures {
        LookupFailures {
            searches: self.search_failures.load(Ordering::Relaxed),
            details: self.detail_failures.load(Ordering::Relaxed),
        }
    }

    /// Endpoint URL with the credential and optional language applied.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, MetadataError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| MetadataError::Connection(format!("invalid base URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut().append_pair("api_key", &self.api_key);
        if let Some(language) = &self.language {
            url.query_pairs_mut().append_pair("language", language);
        }
        Ok(url)
    }

    fn search_url(&self, title: &str, year: i32) -> Result<Url, MetadataError> {
        let mut url = self.endpoint(&["search", "movie"])?;
        url.query_pairs_mut().append_pair("query", title);
        if year > 0 {
            url.query_pairs_mut().append_pair("year", &year.to_string());
        }
        Ok(url)
    }

    fn details_url(&self, candidate_id: i64) -> Result<Url, MetadataError> {
        let mut url = self.endpoint(&["movie", &candidate_id.to_string()])?;
        url.query_pairs_mut()
            .append_pair("append_to_response", "credits");
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, MetadataError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MetadataError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| MetadataError::InvalidResponse(e.to_string()))
    }

    async fn try_search(&self, title: &str, year: i32) -> Result<Vec<SearchCandidate>, MetadataError> {
        let url = self.search_url(title, year)?;
        let response: SearchResponse = self.get_json(url).await?;
        Ok(response.results)
    }

    async fn try_fetch_details(&self, candidate_id: i64) -> Result<MovieDetails, MetadataError> {
        let url = self.details_url(candidate_id)?;
        self.get_json(url).await
    }
}

#[async_trait]
impl MetadataClient for TmdbClient {
    async fn search(&self, title: &str, year: i32) -> Vec<SearchCandidate> {
        match self.try_search(title, year).await {
            Ok(results) => {
                debug!(title, year, results = results.len(), "Catalog search complete");
                results
            }
            Err(e) => {
                self.search_failures.fetch_add(1, Ordering::Relaxed);
                warn!("Catalog search failed for '{}' ({}): {}", title, year, e);
                Vec::new()
            }
        }
    }

    async fn fetch_details(&self, candidate_id: i64) -> Option<MovieDetails> {
        match self.try_fetch_details(candidate_id).await {
            Ok(details) => Some(details),
            Err(e) => {
                self.detail_failures.fetch_add(1, Ordering::Relaxed);
                warn!("Catalog detail fetch failed for id {}: {}", candidate_id, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(language: Option<&str>) -> TmdbClient {
        TmdbClient::new(
            Url::parse("https://api.themoviedb.org/3").unwrap(),
            "secret",
            language.map(str::to_string),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_search_url() {
        let url = client(None).search_url("Se7en & more", 1995).unwrap();
        assert_eq!(url.path(), "/3/search/movie");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("api_key".to_string(), "secret".to_string()),
                ("query".to_string(), "Se7en & more".to_string()),
                ("year".to_string(), "1995".to_string()),
            ]
        );
    }

    #[test]
    fn test_search_url_without_year() {
        let url = client(None).search_url("Alien", 0).unwrap();
        assert!(!url.query_pairs().any(|(k, _)| k == "year"));
    }

    #[test]
    fn test_details_url_with_language() {
        let url = client(Some("pt-BR")).details_url(603).unwrap();
        assert_eq!(url.path(), "/3/movie/603");
        let query = url.query().unwrap();
        assert!(query.contains("language=pt-BR"));
        assert!(query.contains("append_to_response=credits"));
    }

    #[test]
    fn test_details_decoding_with_missing_fields() {
        let details: MovieDetails = serde_json::from_str(
            r#"{
                "id": 603,
                "runtime": 136,
                "poster_path": null,
                "genres": [{"id": 28, "name": "Action"}],
                "credits": {
                    "cast": [{"name": "Keanu Reeves", "order": 0}],
                    "crew": [{"name": "Lana Wachowski", "job": "Director"}]
                }
            }"#,
        )
        .unwrap();
        assert_eq!(details.runtime, Some(136));
        assert_eq!(details.poster_path, None);
        assert_eq!(details.overview, None);
        assert!(details.production_countries.is_empty());
        assert_eq!(details.genres[0].name, "Action");
        assert_eq!(details.credits.crew[0].job, "Director");
    }

    #[tokio::test]
    async fn test_unreachable_catalog_fails_soft() {
        let client = TmdbClient::new(
            Url::parse("http://127.0.0.1:9").unwrap(),
            "secret",
            None,
            Duration::from_millis(500),
        )
        .unwrap();

        assert!(client.search("Alien", 1979).await.is_empty());
        assert!(client.fetch_details(1).await.is_none());
        assert_eq!(
            client.failures(),
            LookupFailures {
                searches: 1,
                details: 1
            }
        );
    }

    /// Serves the same canned response to every connection.
    async fn canned_catalog(status_line: &'static str, body: &'static str) -> Url {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let response = format!(
                    "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        Url::parse(&format!("http://{}/3", addr)).unwrap()
    }

    fn local_client(base_url: Url) -> TmdbClient {
        TmdbClient::new(base_url, "secret", None, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_error_status_fails_soft() {
        let base_url = canned_catalog(
            "HTTP/1.1 401 Unauthorized",
            r#"{"status_message":"Invalid API key"}"#,
        )
        .await;
        let client = local_client(base_url);

        assert!(client.search("Alien", 1979).await.is_empty());
        assert!(client.fetch_details(348).await.is_none());
        assert_eq!(
            client.failures(),
            LookupFailures {
                searches: 1,
                details: 1
            }
        );
    }

    #[tokio::test]
    async fn test_truncated_body_fails_soft() {
        let base_url = canned_catalog("HTTP/1.1 200 OK", r#"{"results":"#).await;
        let client = local_client(base_url);

        assert!(client.search("Alien", 1979).await.is_empty());
        assert!(client.fetch_details(348).await.is_none());
        assert!(client.search("Aliens", 1986).await.is_empty());
        assert_eq!(
            client.failures(),
            LookupFailures {
                searches: 2,
                details: 1
            }
        );
    }

    #[tokio::test]
    async fn test_successful_search_decodes_results() {
        let base_url = canned_catalog(
            "HTTP/1.1 200 OK",
            r#"{"page":1,"results":[{"id":348,"title":"Alien","release_date":"1979-05-25"},{"id":8077}]}"#,
        )
        .await;
        let client = local_client(base_url);

        let results = client.search("Alien", 1979).await;
        assert_eq!(
            results,
            vec![
                SearchCandidate {
                    id: 348,
                    title: "Alien".to_string()
                },
                SearchCandidate {
                    id: 8077,
                    title: String::new()
                },
            ]
        );
        assert_eq!(client.failures(), LookupFailures::default());
    }
}
