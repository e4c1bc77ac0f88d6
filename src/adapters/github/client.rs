//! GitHub HTTP client with rate limiting.
//!
//! Wraps the handful of REST API v3 calls nightpatch makes. Every request
//! first waits on a shared `governor` limiter sized from
//! `github.requests_per_hour`, so concurrent workers share one budget.

use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::GitHubConfig;

use super::models::{
    GitHubAddLabels, GitHubCreatePullRequest, GitHubCreatedPull, GitHubIssue, GitHubPull,
    GitHubRepository,
};

const USER_AGENT: &str = "nightpatch";

/// HTTP client for the GitHub REST API v3.
///
/// All methods map network and HTTP errors to
/// [`DomainError::ExecutionFailed`].
#[derive(Clone)]
pub struct GitHubClient {
    http: Client,
    api_base: String,
    token: Option<String>,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl GitHubClient {
    pub fn new(api_base: impl Into<String>, token: Option<String>, requests_per_hour: u32) -> Self {
        let per_hour = NonZeroU32::new(requests_per_hour).unwrap_or(NonZeroU32::MIN);
        Self {
            http: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            limiter: Arc::new(RateLimiter::direct(Quota::per_hour(per_hour))),
        }
    }

    pub fn from_config(config: &GitHubConfig) -> Self {
        Self::new(
            config.api_base.clone(),
            config.token.clone(),
            config.requests_per_hour,
        )
    }

    /// Wait for a rate-limit cell and build an authorized request.
    async fn rate_limited_request(&self, method: Method, url: &str) -> RequestBuilder {
        self.limiter.until_ready().await;
        let builder = self
            .http
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", USER_AGENT);
        match self.token {
            Some(ref token) => builder.header("Authorization", format!("Bearer {token}")),
            None => builder,
        }
    }

    fn repo_url(&self, owner: &str, repo: &str, tail: &str) -> String {
        format!("{}/repos/{owner}/{repo}{tail}", self.api_base)
    }

    /// Fetch the repository's metadata (for its default branch).
    pub async fn get_repository(&self, owner: &str, repo: &str) -> DomainResult<GitHubRepository> {
        let url = self.repo_url(owner, repo, "");
        let req = self.rate_limited_request(Method::GET, &url).await;
        let resp = send("get_repository", req).await?;
        parse("get_repository", resp).await
    }

    /// List open pull requests (first page of 100).
    pub async fn list_open_pulls(&self, owner: &str, repo: &str) -> DomainResult<Vec<GitHubPull>> {
        let url = self.repo_url(owner, repo, "/pulls?state=open&per_page=100");
        let req = self.rate_limited_request(Method::GET, &url).await;
        let resp = send("list_pulls", req).await?;
        parse("list_pulls", resp).await
    }

    /// List open issues (first page of 100).
    ///
    /// The endpoint also returns pull requests; callers filter them out.
    pub async fn list_open_issues(&self, owner: &str, repo: &str) -> DomainResult<Vec<GitHubIssue>> {
        let url = self.repo_url(owner, repo, "/issues?state=open&per_page=100");
        let req = self.rate_limited_request(Method::GET, &url).await;
        let resp = send("list_issues", req).await?;
        parse("list_issues", resp).await
    }

    pub async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        request: &GitHubCreatePullRequest<'_>,
    ) -> DomainResult<GitHubCreatedPull> {
        let url = self.repo_url(owner, repo, "/pulls");
        let req = self
            .rate_limited_request(Method::POST, &url)
            .await
            .json(request);
        let resp = send("create_pull_request", req).await?;
        parse("create_pull_request", resp).await
    }

    /// Add labels to an issue or pull request.
    pub async fn add_labels(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        labels: &[&str],
    ) -> DomainResult<()> {
        let url = self.repo_url(owner, repo, &format!("/issues/{number}/labels"));
        let body = GitHubAddLabels {
            labels: labels.to_vec(),
        };
        let req = self
            .rate_limited_request(Method::POST, &url)
            .await
            .json(&body);
        send("add_labels", req).await?;
        Ok(())
    }
}

impl fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_base", &self.api_base)
            .field("authenticated", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

async fn send(op: &str, req: RequestBuilder) -> DomainResult<Response> {
    let resp = req
        .send()
        .await
        .map_err(|e| DomainError::ExecutionFailed(format!("GitHub {op} request failed: {e}")))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(DomainError::ExecutionFailed(format!(
            "GitHub {op} returned {status}: {body}"
        )));
    }
    Ok(resp)
}

async fn parse<T: DeserializeOwned>(op: &str, resp: Response) -> DomainResult<T> {
    resp.json::<T>()
        .await
        .map_err(|e| DomainError::ExecutionFailed(format!("GitHub {op} parse failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_requests_carry_auth_and_api_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/acme/app")
            .match_header("authorization", "Bearer t0ken")
            .match_header("accept", "application/vnd.github+json")
            .match_header("x-github-api-version", "2022-11-28")
            .match_header("user-agent", "nightpatch")
            .with_status(200)
            .with_body(r#"{"default_branch": "trunk", "full_name": "acme/app"}"#)
            .create_async()
            .await;

        let client = GitHubClient::new(server.url(), Some("t0ken".to_string()), 100);
        let repo = client.get_repository("acme", "app").await.unwrap();
        assert_eq!(repo.default_branch, "trunk");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_anonymous_client_sends_no_authorization() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/acme/app/pulls")
            .match_query(Matcher::UrlEncoded("state".into(), "open".into()))
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = GitHubClient::new(server.url(), Some(String::new()), 100);
        assert!(client.list_open_pulls("acme", "app").await.unwrap().is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_includes_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/acme/app/issues")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"message": "Not Found"}"#)
            .create_async()
            .await;

        let client = GitHubClient::new(server.url(), None, 100);
        let err = client.list_open_issues("acme", "app").await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("list_issues returned 404"), "{message}");
        assert!(message.contains("Not Found"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_a_parse_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/acme/app")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = GitHubClient::new(server.url(), None, 100);
        let err = client.get_repository("acme", "app").await.unwrap_err();
        assert!(err.to_string().contains("get_repository parse failed"));
    }
}
