use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Main configuration structure for nightpatch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Repositories to review, as `owner/name`
    #[serde(default)]
    pub repos: Vec<String>,

    /// Maximum number of repositories reviewed concurrently (1-16)
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Time of day (`HH:MM`) after which no new repository is admitted
    #[serde(default)]
    pub deadline: Option<String>,

    /// IANA zone for the deadline and branch timestamps; system local when unset
    #[serde(default)]
    pub timezone: Option<String>,

    /// Upper bound on waiting for in-flight tasks during shutdown
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,

    /// Commit fixes locally but never push or open pull requests
    #[serde(default)]
    pub dry_run: bool,

    /// Directory holding repository working copies
    #[serde(default = "default_clone_dir")]
    pub clone_dir: PathBuf,

    /// Size limit for `clone_dir` checked before each fresh clone; 0 disables it
    #[serde(default = "default_max_clone_disk_mb")]
    pub max_clone_disk_mb: u64,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Fix safety pipeline configuration
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Code host configuration
    #[serde(default)]
    pub github: GitHubConfig,

    /// Git transport configuration
    #[serde(default)]
    pub git: GitConfig,

    /// Analysis service configuration
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

const fn default_max_workers() -> usize {
    3
}

const fn default_drain_timeout_secs() -> u64 {
    60
}

fn default_clone_dir() -> PathBuf {
    PathBuf::from(".nightpatch/repos")
}

const fn default_max_clone_disk_mb() -> u64 {
    5_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repos: vec![],
            max_workers: default_max_workers(),
            deadline: None,
            timezone: None,
            drain_timeout_secs: default_drain_timeout_secs(),
            dry_run: false,
            clone_dir: default_clone_dir(),
            max_clone_disk_mb: default_max_clone_disk_mb(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            pipeline: PipelineConfig::default(),
            github: GitHubConfig::default(),
            git: GitConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".nightpatch/nightpatch.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// What the syntax validator does when a checker cannot be run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailablePolicy {
    /// Treat a missing or hung checker as a rejection.
    FailClosed,
    /// Let the edit proceed unvalidated for this language.
    FailOpen,
}

/// One external syntax checker, selected by file extension.
///
/// The temporary file path is appended as the last argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CheckerConfig {
    pub name: String,
    /// Extensions including the leading dot, e.g. `.py`
    pub extensions: Vec<String>,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub on_unavailable: UnavailablePolicy,
    /// When set, a failing run only counts as invalid if its output matches
    #[serde(default)]
    pub invalid_pattern: Option<String>,
    #[serde(default = "default_checker_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_checker_timeout_secs() -> u64 {
    10
}

/// Built-in checker table.
///
/// Python and Node checkers are assumed present and fail closed; the
/// TypeScript compiler is an optional download and fails open.
pub fn default_checkers() -> Vec<CheckerConfig> {
    vec![
        CheckerConfig {
            name: "python".to_string(),
            extensions: vec![".py".to_string()],
            program: "python3".to_string(),
            args: vec![
                "-c".to_string(),
                "import ast, sys; ast.parse(open(sys.argv[1], encoding='utf-8').read(), sys.argv[1])"
                    .to_string(),
            ],
            on_unavailable: UnavailablePolicy::FailClosed,
            invalid_pattern: None,
            timeout_secs: default_checker_timeout_secs(),
        },
        CheckerConfig {
            name: "node".to_string(),
            extensions: vec![
                ".js".to_string(),
                ".jsx".to_string(),
                ".mjs".to_string(),
                ".cjs".to_string(),
            ],
            program: "node".to_string(),
            args: vec!["--check".to_string()],
            on_unavailable: UnavailablePolicy::FailClosed,
            invalid_pattern: None,
            timeout_secs: default_checker_timeout_secs(),
        },
        CheckerConfig {
            name: "typescript".to_string(),
            extensions: vec![".ts".to_string(), ".tsx".to_string()],
            program: "npx".to_string(),
            args: [
                "--yes",
                "-p",
                "typescript",
                "tsc",
                "--noEmit",
                "--allowJs",
                "--esModuleInterop",
                "--jsx",
                "react-jsx",
                "--isolatedModules",
                "--noResolve",
                "--moduleResolution",
                "bundler",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
            on_unavailable: UnavailablePolicy::FailOpen,
            invalid_pattern: Some("error TS1".to_string()),
            timeout_secs: 30,
        },
    ]
}

/// Fix safety pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipelineConfig {
    /// Maximum absolute line delta between original and replacement
    #[serde(default = "default_max_line_delta")]
    pub max_line_delta: usize,

    /// Maximum replacement/original line ratio when original is non-empty
    #[serde(default = "default_max_growth_factor")]
    pub max_growth_factor: f64,

    /// Run the repository's test command after applying a fix
    #[serde(default)]
    pub run_tests: bool,

    /// Test command, program first
    #[serde(default)]
    pub test_command: Vec<String>,

    #[serde(default = "default_test_timeout_secs")]
    pub test_timeout_secs: u64,

    /// Characters of test output kept from the tail
    #[serde(default = "default_test_output_limit")]
    pub test_output_limit: usize,

    #[serde(default = "default_checkers")]
    pub checkers: Vec<CheckerConfig>,
}

const fn default_max_line_delta() -> usize {
    200
}

const fn default_max_growth_factor() -> f64 {
    3.0
}

const fn default_test_timeout_secs() -> u64 {
    300
}

const fn default_test_output_limit() -> usize {
    4_000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_line_delta: default_max_line_delta(),
            max_growth_factor: default_max_growth_factor(),
            run_tests: false,
            test_command: vec![],
            test_timeout_secs: default_test_timeout_secs(),
            test_output_limit: default_test_output_limit(),
            checkers: default_checkers(),
        }
    }
}

/// GitHub configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GitHubConfig {
    /// API token; falls back to `GITHUB_TOKEN`
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Label attached to every pull request this tool opens
    #[serde(default = "default_managed_label")]
    pub managed_label: String,

    /// Branch name prefix for fix branches
    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,

    #[serde(default = "default_requests_per_hour")]
    pub requests_per_hour: u32,
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_managed_label() -> String {
    "nightpatch".to_string()
}

fn default_branch_prefix() -> String {
    "nightpatch/".to_string()
}

const fn default_requests_per_hour() -> u32 {
    5_000
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: default_api_base(),
            managed_label: default_managed_label(),
            branch_prefix: default_branch_prefix(),
            requests_per_hour: default_requests_per_hour(),
        }
    }
}

/// Git transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GitConfig {
    /// Clone URL with a `{repo}` placeholder
    #[serde(default = "default_clone_url_template")]
    pub clone_url_template: String,

    #[serde(default)]
    pub author_name: Option<String>,

    #[serde(default)]
    pub author_email: Option<String>,

    #[serde(default = "default_git_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_clone_url_template() -> String {
    "https://github.com/{repo}.git".to_string()
}

const fn default_git_timeout_secs() -> u64 {
    300
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            clone_url_template: default_clone_url_template(),
            author_name: None,
            author_email: None,
            timeout_secs: default_git_timeout_secs(),
        }
    }
}

/// Wire dialect of the chat completions endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisProvider {
    /// `POST {endpoint}/v1/chat/completions` with bearer auth (Ollama, vLLM, OpenAI).
    #[default]
    OpenaiCompatible,
    /// Azure OpenAI deployments, authenticated with an `api-key` header.
    Azure,
}

/// Analysis service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AnalysisConfig {
    #[serde(default)]
    pub provider: AnalysisProvider,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Azure deployment name; defaults to `model`
    #[serde(default)]
    pub deployment: Option<String>,

    /// Azure `api-version` query parameter
    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_analysis_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per analysis call, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_max_files")]
    pub max_files: usize,

    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "qwen2.5-coder:14b".to_string()
}

fn default_api_version() -> String {
    "2024-02-15-preview".to_string()
}

const fn default_analysis_timeout_secs() -> u64 {
    300
}

const fn default_max_attempts() -> u32 {
    2
}

const fn default_max_files() -> usize {
    50
}

const fn default_max_file_bytes() -> u64 {
    100_000
}

const fn default_max_prompt_chars() -> usize {
    50_000
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            provider: AnalysisProvider::default(),
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
            deployment: None,
            api_version: default_api_version(),
            timeout_secs: default_analysis_timeout_secs(),
            max_attempts: default_max_attempts(),
            max_files: default_max_files(),
            max_file_bytes: default_max_file_bytes(),
            max_prompt_chars: default_max_prompt_chars(),
        }
    }
}
