use serde::Deserialize;
use std::path::{Path, PathBuf};

/// What the pipeline does when a single feed cannot be fetched or parsed.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the run at the first failing feed.
    #[default]
    Abort,
    /// Log the failure and move on without writing a page.
    Skip,
    /// Write an "unavailable" page in place of the feed.
    Placeholder,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Directory the index and feed pages are written into
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Maximum number of feeds processed at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default = "default_escape_html")]
    pub escape_html: bool,
    /// Treat non-2xx responses as fetch failures instead of parsing the body
    #[serde(default)]
    pub strict_status: bool,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Request timeout in seconds; unset leaves the client default
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_concurrency() -> usize {
    1
}

fn default_escape_html() -> bool {
    true
}

fn default_user_agent() -> String {
    "FeedPages/1.0 (RSS Aggregator)".to_string()
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub output_dir: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub failure_policy: Option<FailurePolicy>,
    /// Turns escaping off; absent leaves the file's `escape_html`
    pub raw_html: bool,
    /// Turns strict status on; absent leaves the file's `strict_status`
    pub strict_status: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            concurrency: default_concurrency(),
            failure_policy: FailurePolicy::default(),
            escape_html: default_escape_html(),
            strict_status: false,
            user_agent: default_user_agent(),
            timeout_secs: None,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load the config at `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_overrides(mut self, overrides: &Overrides) -> Self {
        if let Some(dir) = &overrides.output_dir {
            self.output_dir = dir.clone();
        }
        if let Some(concurrency) = overrides.concurrency {
            self.concurrency = concurrency;
        }
        if let Some(policy) = overrides.failure_policy {
            self.failure_policy = policy;
        }
        if overrides.raw_html {
            self.escape_html = false;
        }
        if overrides.strict_status {
            self.strict_status = true;
        }
        self
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be at least 1");
        }
        if self.user_agent.trim().is_empty() {
            anyhow::bail!("user_agent must not be empty");
        }
        Ok(())
    }
}
