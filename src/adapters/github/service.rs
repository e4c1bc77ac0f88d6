//! [`PullRequestService`] backed by the GitHub REST API.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{split_repo, GitHubConfig, Issue, PullRequestRef};
use crate::domain::ports::{PullRequestDraft, PullRequestService};

use super::client::GitHubClient;
use super::models::GitHubCreatePullRequest;

/// Opens labelled pull requests and reads open issues.
///
/// A pull request counts as managed when it carries `managed_label` or its
/// head branch starts with `branch_prefix`; either is enough so a label
/// removed by hand does not cause a second pull request.
#[derive(Debug, Clone)]
pub struct GitHubPullRequestService {
    client: GitHubClient,
    managed_label: String,
    branch_prefix: String,
}

impl GitHubPullRequestService {
    pub fn new(
        client: GitHubClient,
        managed_label: impl Into<String>,
        branch_prefix: impl Into<String>,
    ) -> Self {
        Self {
            client,
            managed_label: managed_label.into(),
            branch_prefix: branch_prefix.into(),
        }
    }

    pub fn from_config(config: &GitHubConfig) -> Self {
        Self::new(
            GitHubClient::from_config(config),
            config.managed_label.clone(),
            config.branch_prefix.clone(),
        )
    }
}

fn owner_and_name(repo: &str) -> DomainResult<(&str, &str)> {
    split_repo(repo)
        .ok_or_else(|| DomainError::ValidationFailed(format!("not an owner/name repository: {repo}")))
}

/// Append a closing keyword for the related issue unless the body has one.
fn body_with_issue_link(draft: &PullRequestDraft) -> String {
    match draft.related_issue {
        Some(number) if !draft.body.contains(&format!("Fixes #{number}")) => {
            format!("{}\n\nFixes #{number}\n", draft.body.trim_end())
        }
        _ => draft.body.clone(),
    }
}

#[async_trait]
impl PullRequestService for GitHubPullRequestService {
    async fn has_open_managed_pr(&self, repo: &str) -> DomainResult<bool> {
        let (owner, name) = owner_and_name(repo)?;
        let pulls = self.client.list_open_pulls(owner, name).await?;
        let managed = pulls.iter().find(|pr| {
            pr.head.ref_name.starts_with(&self.branch_prefix)
                || pr
                    .labels
                    .iter()
                    .any(|l| l.name.eq_ignore_ascii_case(&self.managed_label))
        });
        if let Some(pr) = managed {
            debug!(repo, number = pr.number, url = %pr.html_url, "managed pull request still open");
        }
        Ok(managed.is_some())
    }

    async fn open_issues(&self, repo: &str) -> DomainResult<Vec<Issue>> {
        let (owner, name) = owner_and_name(repo)?;
        let items = self.client.list_open_issues(owner, name).await?;
        Ok(items
            .into_iter()
            .filter(|item| !item.is_pull_request())
            .map(Issue::from)
            .collect())
    }

    async fn create_pr(&self, repo: &str, draft: &PullRequestDraft) -> DomainResult<PullRequestRef> {
        let (owner, name) = owner_and_name(repo)?;
        let base = self.client.get_repository(owner, name).await?.default_branch;
        let body = body_with_issue_link(draft);

        let created = self
            .client
            .create_pull_request(
                owner,
                name,
                &GitHubCreatePullRequest {
                    title: &draft.title,
                    head: &draft.branch,
                    base: &base,
                    body: &body,
                },
            )
            .await?;

        // The pull request exists at this point; a missing label only weakens
        // duplicate detection, which the branch prefix still covers.
        if let Err(e) = self
            .client
            .add_labels(owner, name, created.number, &[self.managed_label.as_str()])
            .await
        {
            warn!(repo, number = created.number, error = %e, "failed to label pull request");
        }

        Ok(PullRequestRef {
            number: created.number,
            url: created.html_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn service(url: String) -> GitHubPullRequestService {
        GitHubPullRequestService::new(GitHubClient::new(url, None, 1_000), "nightpatch", "nightpatch/")
    }

    #[tokio::test]
    async fn test_managed_pr_detected_by_label_or_branch() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/acme/labelled/pulls")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"[{"number": 3, "html_url": "https://github.com/acme/labelled/pull/3",
                     "head": {"ref": "feature/x"}, "labels": [{"name": "NightPatch"}]}]"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/repos/acme/branch/pulls")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"[{"number": 4, "html_url": "https://github.com/acme/branch/pull/4",
                     "head": {"ref": "nightpatch/20261019-main-py"}, "labels": []}]"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/repos/acme/other/pulls")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"[{"number": 5, "html_url": "https://github.com/acme/other/pull/5",
                     "head": {"ref": "dependabot/npm"}, "labels": [{"name": "deps"}]}]"#,
            )
            .create_async()
            .await;

        let svc = service(server.url());
        assert!(svc.has_open_managed_pr("acme/labelled").await.unwrap());
        assert!(svc.has_open_managed_pr("acme/branch").await.unwrap());
        assert!(!svc.has_open_managed_pr("acme/other").await.unwrap());
    }

    #[tokio::test]
    async fn test_open_issues_excludes_pull_requests() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/acme/app/issues")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("state".into(), "open".into()),
                Matcher::UrlEncoded("per_page".into(), "100".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"[
                    {"number": 1, "title": "Crash", "body": "boom", "labels": [{"name": "bug"}]},
                    {"number": 2, "title": "PR", "pull_request": {"url": "x"}}
                ]"#,
            )
            .create_async()
            .await;

        let issues = service(server.url()).open_issues("acme/app").await.unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].number, 1);
        assert!(issues[0].has_label("bug"));
    }

    #[tokio::test]
    async fn test_create_pr_targets_default_branch_and_labels() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/acme/app")
            .with_status(200)
            .with_body(r#"{"default_branch": "develop"}"#)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/repos/acme/app/pulls")
            .match_body(Matcher::PartialJsonString(
                r#"{"head": "nightpatch/fix", "base": "develop", "title": "Fix crash"}"#.to_string(),
            ))
            .with_status(201)
            .with_body(r#"{"number": 41, "html_url": "https://github.com/acme/app/pull/41"}"#)
            .create_async()
            .await;
        let label = server
            .mock("POST", "/repos/acme/app/issues/41/labels")
            .match_body(Matcher::Json(serde_json::json!({"labels": ["nightpatch"]})))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let draft = PullRequestDraft {
            branch: "nightpatch/fix".to_string(),
            title: "Fix crash".to_string(),
            body: "Body".to_string(),
            related_issue: Some(12),
        };
        let pr = service(server.url()).create_pr("acme/app", &draft).await.unwrap();
        assert_eq!(pr.number, 41);
        assert_eq!(pr.url, "https://github.com/acme/app/pull/41");
        create.assert_async().await;
        label.assert_async().await;
    }

    #[tokio::test]
    async fn test_label_failure_does_not_fail_creation() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/acme/app")
            .with_status(200)
            .with_body(r#"{"default_branch": "main"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/repos/acme/app/pulls")
            .with_status(201)
            .with_body(r#"{"number": 9, "html_url": "https://github.com/acme/app/pull/9"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/repos/acme/app/issues/9/labels")
            .with_status(403)
            .create_async()
            .await;

        let draft = PullRequestDraft {
            branch: "nightpatch/fix".to_string(),
            title: "t".to_string(),
            body: "b".to_string(),
            related_issue: None,
        };
        let pr = service(server.url()).create_pr("acme/app", &draft).await.unwrap();
        assert_eq!(pr.number, 9);
    }

    #[test]
    fn test_issue_link_not_duplicated() {
        let mut draft = PullRequestDraft {
            branch: "b".to_string(),
            title: "t".to_string(),
            body: "Fixes #3".to_string(),
            related_issue: Some(3),
        };
        assert_eq!(body_with_issue_link(&draft), "Fixes #3");
        draft.body = "Summary".to_string();
        assert_eq!(body_with_issue_link(&draft), "Summary\n\nFixes #3\n");
        draft.related_issue = None;
        assert_eq!(body_with_issue_link(&draft), "Summary");
    }

    #[tokio::test]
    async fn test_rejects_malformed_repository_name() {
        let svc = service("http://127.0.0.1:9".to_string());
        assert!(matches!(
            svc.open_issues("no-slash").await,
            Err(DomainError::ValidationFailed(_))
        ));
    }
}
