// src/services/search.rs

//! Search API client.
//!
//! Issues `search/tweets`-style requests and decodes the payload into
//! [`SearchResponse`] pages.

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ApiConfig, RawSearchResponse, SearchQuery, SearchResponse};
use crate::utils::http::create_async_client;

/// Longest body excerpt kept in upstream error messages.
const ERROR_BODY_LIMIT: usize = 200;

/// Source of search result pages.
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse>;
}

/// HTTP client for a `search/tweets.json` compatible endpoint.
pub struct TwitterSearchClient {
    client: Client,
    endpoint: Url,
    bearer_token: Option<String>,
}

impl TwitterSearchClient {
    /// Create a client from API settings.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            endpoint: Url::parse(&config.endpoint)?,
            bearer_token: config
                .bearer_token
                .as_ref()
                .filter(|t| !t.trim().is_empty())
                .cloned(),
        })
    }

    /// Full request URL for a query.
    pub fn request_url(&self, query: &SearchQuery) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .extend_pairs(query.params().iter().map(|(k, v)| (*k, v.as_str())));
        url
    }
}

#[async_trait]
impl SearchClient for TwitterSearchClient {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse> {
        let url = self.request_url(query);
        log::debug!("GET {}", url);

        let mut request = self.client.get(url);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let excerpt: String = String::from_utf8_lossy(&body)
                .chars()
                .take(ERROR_BODY_LIMIT)
                .collect();
            return Err(AppError::upstream(status.as_u16(), excerpt));
        }

        parse_response(&body, query.count)
    }
}

/// Decode a raw search payload.
pub fn parse_response(body: &[u8], requested_count: usize) -> Result<SearchResponse> {
    let raw: RawSearchResponse = serde_json::from_slice(body).map_err(AppError::malformed)?;
    Ok(raw.into_response(requested_count))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> TwitterSearchClient {
        let config = ApiConfig {
            endpoint: "https://search.example.com/1.1/search/tweets.json".to_string(),
            ..ApiConfig::default()
        };
        TwitterSearchClient::new(&config).unwrap()
    }

    #[test]
    fn test_request_url_first_page() {
        let url = client().request_url(&SearchQuery::recent("#tagwatch", 100, 0));
        assert_eq!(
            url.as_str(),
            "https://search.example.com/1.1/search/tweets.json?q=%23tagwatch&count=100&result_type=recent"
        );
    }

    #[test]
    fn test_request_url_with_bounds() {
        let first = SearchQuery::recent("#tagwatch", 10, 55);
        let url = client().request_url(&first);
        assert!(url.as_str().ends_with("&since_id=55"));

        let next = first.next_page(1000).unwrap();
        let url = client().request_url(&next);
        assert!(url.as_str().ends_with("&max_id=999"));
        assert!(!url.as_str().contains("since_id"));
    }

    #[test]
    fn test_parse_response_malformed() {
        let err = parse_response(br#"{"errors": [{"code": 32}]}"#, 10).unwrap_err();
        assert!(matches!(err, AppError::MalformedResponse(_)));
        assert!(err.is_upstream());

        let err = parse_response(b"<html>", 10).unwrap_err();
        assert!(matches!(err, AppError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_response_ok() {
        let body = br#"{"statuses": [], "search_metadata": {"max_id": 0}}"#;
        let page = parse_response(body, 10).unwrap();
        assert!(page.posts.is_empty());
        assert_eq!(page.requested_count, 10);
        assert!(!page.is_full_page());
    }
}
