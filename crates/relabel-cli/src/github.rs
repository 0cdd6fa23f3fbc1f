//! GitHub REST client for issues, timelines and labels
//!
//! Implements [`IssueSource`] and [`LabelSink`] on top of reqwest. Listings
//! follow `Link: rel="next"` headers until the last page.

use async_trait::async_trait;
use relabel_core::config::GitHubConfig;
use relabel_core::{Issue, IssueSource, LabelSink, RawEvent};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as HttpClient, Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument};

const USER_AGENT: &str = concat!("relabel/", env!("CARGO_PKG_VERSION"));
const API_VERSION: &str = "2022-11-28";

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid token")]
    InvalidToken,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// GitHub API client scoped to one repository
#[derive(Clone)]
pub struct GitHubClient {
    http: HttpClient,
    base_url: Url,
    owner: String,
    repo: String,
    per_page: u8,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig, token: &str) -> Result<Self, GitHubError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| GitHubError::InvalidToken)?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(API_VERSION),
        );

        let http = HttpClient::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        let base_url = Url::parse(&config.api_url)
            .map_err(|e| GitHubError::InvalidUrl(format!("{}: {}", config.api_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(GitHubError::InvalidUrl(config.api_url.clone()));
        }

        Ok(Self {
            http,
            base_url,
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            per_page: config.per_page.clamp(1, 100),
        })
    }

    /// Repository-relative URL; segments are percent-encoded
    fn repo_url(&self, segments: &[&str]) -> Result<Url, GitHubError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GitHubError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["repos", self.owner.as_str(), self.repo.as_str()])
            .extend(segments);
        Ok(url)
    }

    async fn check(response: Response) -> Result<Response, GitHubError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = match response.json::<ApiErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => status.canonical_reason().unwrap_or("unknown").to_string(),
        };
        Err(GitHubError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// GET every page of a listing
    async fn get_all<T: DeserializeOwned>(
        &self,
        mut url: Url,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, GitHubError> {
        let per_page = self.per_page.to_string();
        url.query_pairs_mut()
            .extend_pairs(query)
            .append_pair("per_page", &per_page);

        let mut items = Vec::new();
        let mut next = Some(url);
        while let Some(url) = next.take() {
            debug!(url = %url, "GET");
            let response = Self::check(self.http.get(url).send().await?).await?;
            next = next_link(response.headers())
                .map(|link| {
                    Url::parse(&link).map_err(|e| GitHubError::InvalidUrl(format!("{link}: {e}")))
                })
                .transpose()?;
            let page: Vec<T> = response.json().await?;
            items.extend(page);
        }
        Ok(items)
    }

    #[instrument(skip(self))]
    pub async fn list_closed_issues(&self) -> Result<Vec<Issue>, GitHubError> {
        let url = self.repo_url(&["issues"])?;
        let issues: Vec<Issue> = self.get_all(url, &[("state", "closed")]).await?;
        info!(count = issues.len(), "listed closed issues");
        Ok(issues)
    }

    #[instrument(skip(self))]
    pub async fn issue_timeline(&self, issue: u64) -> Result<Vec<RawEvent>, GitHubError> {
        let number = issue.to_string();
        let url = self.repo_url(&["issues", &number, "timeline"])?;
        self.get_all(url, &[]).await
    }

    #[instrument(skip(self))]
    pub async fn add_labels(&self, issue: u64, labels: &[&str]) -> Result<(), GitHubError> {
        let number = issue.to_string();
        let url = self.repo_url(&["issues", &number, "labels"])?;
        let body = serde_json::json!({ "labels": labels });
        Self::check(self.http.post(url).json(&body).send().await?).await?;
        Ok(())
    }

    /// Remove a label. A 404 means the label is already gone.
    #[instrument(skip(self))]
    pub async fn remove_label(&self, issue: u64, label: &str) -> Result<(), GitHubError> {
        let number = issue.to_string();
        let url = self.repo_url(&["issues", &number, "labels", label])?;
        let response = self.http.delete(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(issue, label, "label already absent");
            return Ok(());
        }
        Self::check(response).await?;
        Ok(())
    }
}

/// Extract the `rel="next"` target from a Link header
fn next_link(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(header::LINK)?.to_str().ok()?;
    link.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|p| p.trim().replace(' ', "") == "rel=\"next\"");
        if !is_next {
            return None;
        }
        let target = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        Some(target.to_string())
    })
}

#[async_trait]
impl IssueSource for GitHubClient {
    async fn closed_issues(&self) -> relabel_core::Result<Vec<Issue>> {
        self.list_closed_issues()
            .await
            .map_err(|e| relabel_core::Error::Fetch(e.to_string()))
    }

    async fn timeline(&self, issue: u64) -> relabel_core::Result<Vec<RawEvent>> {
        self.issue_timeline(issue)
            .await
            .map_err(|e| relabel_core::Error::Fetch(format!("timeline of #{}: {}", issue, e)))
    }
}

#[async_trait]
impl LabelSink for GitHubClient {
    async fn add_label(&self, issue: u64, label: &str) -> relabel_core::Result<()> {
        self.add_labels(issue, &[label])
            .await
            .map_err(|e| relabel_core::Error::Mutation {
                issue,
                label: label.to_string(),
                reason: e.to_string(),
            })
    }

    async fn remove_label(&self, issue: u64, label: &str) -> relabel_core::Result<()> {
        GitHubClient::remove_label(self, issue, label)
            .await
            .map_err(|e| relabel_core::Error::Mutation {
                issue,
                label: label.to_string(),
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{
        body_json, header as has_header, method, path, query_param, query_param_is_missing,
    };
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GitHubClient {
        let config = GitHubConfig {
            owner: "acme".into(),
            repo: "support".into(),
            api_url: server.uri(),
            per_page: 2,
            concurrency: 2,
        };
        GitHubClient::new(&config, "test-token").unwrap()
    }

    #[test]
    fn test_next_link() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::LINK,
            HeaderValue::from_static(
                "<https://api.github.com/x?page=2>; rel=\"next\", <https://api.github.com/x?page=5>; rel=\"last\"",
            ),
        );
        assert_eq!(
            next_link(&headers).as_deref(),
            Some("https://api.github.com/x?page=2")
        );

        let mut last_page = HeaderMap::new();
        last_page.insert(
            header::LINK,
            HeaderValue::from_static("<https://api.github.com/x?page=1>; rel=\"prev\""),
        );
        assert_eq!(next_link(&last_page), None);
        assert_eq!(next_link(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_lists_closed_issues_across_pages() {
        let server = MockServer::start().await;
        let next = format!(
            "<{}/repos/acme/support/issues?state=closed&per_page=2&page=2>; rel=\"next\"",
            server.uri()
        );

        Mock::given(method("GET"))
            .and(path("/repos/acme/support/issues"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"number": 3, "title": "c", "state": "closed"}
            ])))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/repos/acme/support/issues"))
            .and(query_param("state", "closed"))
            .and(query_param_is_missing("page"))
            .and(has_header("authorization", "Bearer test-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("link", next.as_str())
                    .set_body_json(serde_json::json!([
                        {"number": 1, "title": "a", "state": "closed",
                         "labels": [{"name": "sup:acao imediata", "color": "b60205"}]},
                        {"number": 2, "title": "b", "state": "closed"}
                    ])),
            )
            .mount(&server)
            .await;

        let issues = client(&server).list_closed_issues().await.unwrap();

        let numbers: Vec<u64> = issues.iter().map(|i| i.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(issues[0].labels[0].name, "sup:acao imediata");
    }

    #[tokio::test]
    async fn test_timeline_keeps_unknown_events() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/support/issues/7/timeline"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"event": "labeled", "label": {"name": "bug", "color": "d73a4a"},
                 "created_at": "2017-05-02T10:00:00Z"},
                {"event": "commented", "body": "hi"},
                {"event": "unlabeled", "label": {"name": "bug"}}
            ])))
            .mount(&server)
            .await;

        let timeline = client(&server).issue_timeline(7).await.unwrap();

        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline[1].event, "commented");
        assert_eq!(timeline[2], RawEvent::unlabeled("bug"));
    }

    #[tokio::test]
    async fn test_add_label_posts_single_label() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/support/issues/42/labels"))
            .and(body_json(serde_json::json!({"labels": ["prioridade:media"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        LabelSink::add_label(&client(&server), 42, "prioridade:media")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_remove_missing_label_is_ok() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/repos/acme/support/issues/42/labels/legacy"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(serde_json::json!({"message": "Label does not exist"})),
            )
            .mount(&server)
            .await;

        LabelSink::remove_label(&client(&server), 42, "legacy")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_server_error_is_mutation_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/support/issues/43/labels"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(serde_json::json!({"message": "boom"})),
            )
            .mount(&server)
            .await;

        let err = LabelSink::add_label(&client(&server), 43, "prioridade:media")
            .await
            .unwrap_err();

        match err {
            relabel_core::Error::Mutation { issue, reason, .. } => {
                assert_eq!(issue, 43);
                assert!(reason.contains("500 - boom"));
            }
            other => panic!("expected mutation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_error_maps_to_fetch_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/support/issues"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(serde_json::json!({"message": "Bad credentials"})),
            )
            .mount(&server)
            .await;

        let err = IssueSource::closed_issues(&client(&server)).await.unwrap_err();
        assert!(matches!(err, relabel_core::Error::Fetch(ref m) if m.contains("Bad credentials")));
    }
}
