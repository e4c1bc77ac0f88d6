//! GitHub REST API payloads used by the pull request service.
//!
//! Only the fields nightpatch reads are modelled; everything else in the
//! responses is ignored.

use serde::{Deserialize, Serialize};

use crate::domain::models::Issue;

/// An item from the issues endpoint.
///
/// Issues and pull requests share the endpoint. Pull requests carry a
/// non-null `pull_request` field and are dropped before prioritisation.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubIssue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub labels: Vec<GitHubLabel>,
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

impl GitHubIssue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

impl From<GitHubIssue> for Issue {
    fn from(issue: GitHubIssue) -> Self {
        Self {
            number: issue.number,
            title: issue.title,
            body: issue.body.unwrap_or_default(),
            labels: issue.labels.into_iter().map(|l| l.name).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubLabel {
    pub name: String,
}

/// An open pull request from the pulls endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubPull {
    pub number: u64,
    pub html_url: String,
    pub head: GitHubHead,
    #[serde(default)]
    pub labels: Vec<GitHubLabel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubHead {
    #[serde(rename = "ref")]
    pub ref_name: String,
}

/// The subset of repository metadata needed to target a pull request.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRepository {
    pub default_branch: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GitHubCreatePullRequest<'a> {
    pub title: &'a str,
    pub head: &'a str,
    pub base: &'a str,
    pub body: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct GitHubAddLabels<'a> {
    pub labels: Vec<&'a str>,
}

/// Response from the create-pull-request endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubCreatedPull {
    pub number: u64,
    pub html_url: String,
}
