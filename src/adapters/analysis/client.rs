//! Chat completions client.
//!
//! Speaks two dialects: any server exposing `POST /v1/chat/completions`
//! (including a local Ollama) and Azure OpenAI deployments. Transient
//! failures are retried with exponential backoff up to
//! `analysis.max_attempts` attempts in total.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AnalysisConfig, AnalysisProvider, FixCandidate, Issue, RepositorySnapshot, RunContext, SourceFile};
use crate::domain::ports::AnalysisService;

use super::errors::CompletionError;
use super::prompt::{build_prompt, SYSTEM_PROMPT};
use super::response::parse_fix_response;

const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    total_tokens: Option<u64>,
}

#[derive(Debug, Clone)]
enum Credential {
    Bearer(String),
    /// Azure's `api-key` header.
    ApiKey(String),
}

/// [`AnalysisService`] backed by a chat completions endpoint.
#[derive(Debug, Clone)]
pub struct ChatCompletionsAnalyzer {
    http: Client,
    url: String,
    api_version: Option<String>,
    model: String,
    credential: Option<Credential>,
    max_attempts: u32,
    max_prompt_chars: usize,
    retry_interval: Duration,
}

impl ChatCompletionsAnalyzer {
    pub fn new(config: &AnalysisConfig) -> DomainResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DomainError::ExecutionFailed(format!("failed to build HTTP client: {e}")))?;

        let endpoint = config.endpoint.trim_end_matches('/');
        let api_key = config.api_key.clone().filter(|k| !k.is_empty());
        let (url, api_version, credential) = match config.provider {
            AnalysisProvider::OpenaiCompatible => (
                format!("{endpoint}/v1/chat/completions"),
                None,
                api_key.map(Credential::Bearer),
            ),
            AnalysisProvider::Azure => {
                let deployment = config
                    .deployment
                    .as_deref()
                    .filter(|d| !d.is_empty())
                    .unwrap_or(&config.model);
                (
                    format!("{endpoint}/openai/deployments/{deployment}/chat/completions"),
                    Some(config.api_version.clone()),
                    api_key.map(Credential::ApiKey),
                )
            }
        };

        Ok(Self {
            http,
            url,
            api_version,
            model: config.model.clone(),
            credential,
            max_attempts: config.max_attempts.max(1),
            max_prompt_chars: config.max_prompt_chars,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        })
    }

    /// Override the first retry delay (doubles on each further retry).
    #[must_use]
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    async fn send_once(&self, request: &ChatRequest<'_>) -> Result<String, CompletionError> {
        let mut builder = self.http.post(&self.url).json(request);
        if let Some(ref version) = self.api_version {
            builder = builder.query(&[("api-version", version)]);
        }
        match self.credential {
            Some(Credential::Bearer(ref key)) => builder = builder.bearer_auth(key),
            Some(Credential::ApiKey(ref key)) => builder = builder.header("api-key", key),
            None => {}
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::from_status(status, body));
        }

        let parsed: ChatResponse = response.json().await?;
        if let Some(tokens) = parsed.usage.and_then(|u| u.total_tokens) {
            debug!(tokens, "completion usage");
        }
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(CompletionError::EmptyResponse)
    }

    /// Send one completion request, retrying transient failures.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.1,
            stream: false,
        };

        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.retry_interval)
            .with_multiplier(2.0)
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(None)
            .build();

        let attempts = AtomicU32::new(0);
        let attempts = &attempts;
        let request = &request;
        let max_attempts = self.max_attempts;

        backoff::future::retry_notify(
            policy,
            move || async move {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                match self.send_once(request).await {
                    Ok(content) => Ok(content),
                    Err(e) if e.is_transient() && attempt < max_attempts => {
                        Err(backoff::Error::transient(e))
                    }
                    Err(e) => Err(backoff::Error::permanent(e)),
                }
            },
            |err: CompletionError, wait: Duration| {
                warn!(
                    error = %err,
                    retry_in_ms = wait.as_millis() as u64,
                    "analysis request failed, retrying"
                );
            },
        )
        .await
    }
}

#[async_trait]
impl AnalysisService for ChatCompletionsAnalyzer {
    #[instrument(skip_all, fields(repo = %snapshot.repo, files = files.len(), issues = issues.len()))]
    async fn analyze(
        &self,
        _ctx: &RunContext,
        snapshot: &RepositorySnapshot,
        files: &[SourceFile],
        issues: &[Issue],
    ) -> DomainResult<Option<FixCandidate>> {
        let prompt = build_prompt(&snapshot.repo, files, issues, self.max_prompt_chars);
        info!(prompt_chars = prompt.len(), "requesting fix proposal");

        let content = self
            .complete(SYSTEM_PROMPT, &prompt)
            .await
            .map_err(|e| DomainError::ExecutionFailed(format!("analysis request failed: {e}")))?;

        // An unusable answer means no proposal, not a failed repository.
        match parse_fix_response(&content) {
            Ok(Some(fix)) => {
                info!(file = %fix.file_path, confidence = %fix.confidence, "fix proposed");
                Ok(Some(fix))
            }
            Ok(None) => {
                info!("no bug reported");
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "discarding unusable analysis response");
                Ok(None)
            }
        }
    }
}
