//! GitHub REST client
//!
//! Implements [`ForgeApi`] against the GitHub v3 REST API using `reqwest`.
//! Responses are decoded into the types in [`crate::schema`]; a payload that
//! does not fit is reported as [`ForgeError::MalformedResponse`].

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, LINK};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::api::{ForgeApi, ForgeResult};
use crate::error::ForgeError;
use crate::schema::{
    Comparison, FileContent, IssueComment, MergeRequest, MergeResult, PullRequest, RawContent,
    RepoRef, Repository, Review, UserSearch, UserSummary,
};

const DEFAULT_API_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const PER_PAGE: &str = "100";
/// Upper bound on pages read from one list endpoint.
const MAX_PAGES: usize = 50;

/// GitHub API configuration
#[derive(Debug, Clone)]
pub struct ForgeConfig {
    /// REST API root (e.g. "https://api.github.com")
    pub api_url: String,
    /// Token sent as a bearer credential
    pub token: String,
    pub user_agent: String,
}

impl ForgeConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: token.into(),
            user_agent: format!("eip-automerge/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Point the client at a different API root (GitHub Enterprise, test server)
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }
}

/// REST client for the GitHub API
#[derive(Debug, Clone)]
pub struct GitHubClient {
    config: ForgeConfig,
    http_client: reqwest::Client,
}

impl GitHubClient {
    pub fn new(config: ForgeConfig) -> ForgeResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(API_VERSION),
        );

        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()?;

        Ok(GitHubClient {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .bearer_auth(&self.config.token)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<serde_json::Value>,
    ) -> ForgeResult<T> {
        let endpoint = format!("{} {}", method, path);
        let url = format!("{}{}", self.config.api_url, path);
        debug!(endpoint = %endpoint, "calling forge API");

        let mut request = self.request(method, &url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let (_, bytes) = execute(&endpoint, request).await?;
        decode(&endpoint, &bytes)
    }

    /// GET every page of a list endpoint, following `Link: rel="next"`.
    async fn send_paged<T: DeserializeOwned>(&self, path: &str) -> ForgeResult<Vec<T>> {
        let endpoint = format!("GET {}", path);
        let url = format!("{}{}", self.config.api_url, path);
        let mut request = self
            .request(Method::GET, &url)
            .query(&[("per_page", PER_PAGE)]);

        let mut items = Vec::new();
        for page in 1..=MAX_PAGES {
            debug!(endpoint = %endpoint, page, "calling forge API");
            let (headers, bytes) = execute(&endpoint, request).await?;
            let batch: Vec<T> = decode(&endpoint, &bytes)?;
            items.extend(batch);

            match next_page_url(&headers) {
                Some(next) => request = self.request(Method::GET, &next),
                None => return Ok(items),
            }
        }
        warn!(endpoint = %endpoint, pages = MAX_PAGES, "page limit reached; list truncated");
        Ok(items)
    }
}

async fn execute(endpoint: &str, request: RequestBuilder) -> ForgeResult<(HeaderMap, Vec<u8>)> {
    let response = request.send().await?;
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.bytes().await?.to_vec();

    if status == StatusCode::NOT_FOUND {
        return Err(ForgeError::NotFound {
            endpoint: endpoint.to_string(),
        });
    }
    if !status.is_success() {
        return Err(ForgeError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }
    Ok((headers, bytes))
}

fn decode<T: DeserializeOwned>(endpoint: &str, bytes: &[u8]) -> ForgeResult<T> {
    serde_json::from_slice(bytes).map_err(|e| ForgeError::MalformedResponse {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })
}

/// Target of the `rel="next"` entry in a `Link` header.
fn next_page_url(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let url = target.strip_prefix('<')?.strip_suffix('>')?;
        parts
            .any(|p| p.trim() == "rel=\"next\"")
            .then(|| url.to_string())
    })
}

#[async_trait]
impl ForgeApi for GitHubClient {
    #[instrument(skip(self))]
    async fn get_repository(&self, repo: &RepoRef) -> ForgeResult<Repository> {
        let path = format!("/repos/{}/{}", repo.owner, repo.name);
        self.send(Method::GET, &path, &[], None).await
    }

    #[instrument(skip(self))]
    async fn get_pull_request(&self, repo: &RepoRef, number: u64) -> ForgeResult<PullRequest> {
        let path = format!("/repos/{}/{}/pulls/{}", repo.owner, repo.name, number);
        self.send(Method::GET, &path, &[], None).await
    }

    #[instrument(skip(self))]
    async fn list_reviews(&self, repo: &RepoRef, number: u64) -> ForgeResult<Vec<Review>> {
        let path = format!(
            "/repos/{}/{}/pulls/{}/reviews",
            repo.owner, repo.name, number
        );
        self.send_paged(&path).await
    }

    #[instrument(skip(self))]
    async fn compare_commits(
        &self,
        repo: &RepoRef,
        base: &str,
        head: &str,
    ) -> ForgeResult<Comparison> {
        let path = format!(
            "/repos/{}/{}/compare/{}...{}",
            repo.owner, repo.name, base, head
        );
        self.send(Method::GET, &path, &[], None).await
    }

    #[instrument(skip(self))]
    async fn get_file_contents(
        &self,
        repo: &RepoRef,
        path: &str,
        git_ref: &str,
    ) -> ForgeResult<FileContent> {
        let api_path = format!("/repos/{}/{}/contents/{}", repo.owner, repo.name, path);
        let raw: RawContent = self
            .send(Method::GET, &api_path, &[("ref", git_ref)], None)
            .await?;
        FileContent::try_from(raw)
    }

    #[instrument(skip(self))]
    async fn list_issue_comments(
        &self,
        repo: &RepoRef,
        number: u64,
    ) -> ForgeResult<Vec<IssueComment>> {
        let path = format!(
            "/repos/{}/{}/issues/{}/comments",
            repo.owner, repo.name, number
        );
        self.send_paged(&path).await
    }

    #[instrument(skip(self, body))]
    async fn create_issue_comment(
        &self,
        repo: &RepoRef,
        number: u64,
        body: &str,
    ) -> ForgeResult<IssueComment> {
        let path = format!(
            "/repos/{}/{}/issues/{}/comments",
            repo.owner, repo.name, number
        );
        self.send(Method::POST, &path, &[], Some(json!({ "body": body })))
            .await
    }

    #[instrument(skip(self, body))]
    async fn update_issue_comment(
        &self,
        repo: &RepoRef,
        comment_id: u64,
        body: &str,
    ) -> ForgeResult<IssueComment> {
        let path = format!(
            "/repos/{}/{}/issues/comments/{}",
            repo.owner, repo.name, comment_id
        );
        self.send(Method::PATCH, &path, &[], Some(json!({ "body": body })))
            .await
    }

    #[instrument(skip(self, request))]
    async fn merge_pull_request(
        &self,
        repo: &RepoRef,
        number: u64,
        request: &MergeRequest,
    ) -> ForgeResult<MergeResult> {
        let path = format!("/repos/{}/{}/pulls/{}/merge", repo.owner, repo.name, number);
        let body = serde_json::to_value(request).map_err(|e| ForgeError::MalformedResponse {
            endpoint: format!("PUT {}", path),
            reason: e.to_string(),
        })?;
        self.send(Method::PUT, &path, &[], Some(body)).await
    }

    #[instrument(skip(self))]
    async fn search_users_by_email(&self, email: &str) -> ForgeResult<Vec<UserSummary>> {
        let q = format!("{} in:email", email);
        let search: UserSearch = self
            .send(Method::GET, "/search/users", &[("q", q.as_str())], None)
            .await?;
        Ok(search.items)
    }
}
