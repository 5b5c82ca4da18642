//! Job configuration, loaded from an optional TOML file.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning so typos do not
//! go unnoticed. Command-line flags are applied on top by the binary.
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// A value parsed but cannot be used.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Struct
// ============================================================================

const KNOWN_KEYS: [&str; 12] = [
    "category_url",
    "feed_title",
    "feed_description",
    "feed_url",
    "user_agent",
    "request_timeout_secs",
    "request_delay_ms",
    "max_pages_to_scan",
    "recent_to_include",
    "output_path",
    "state_path",
    "dry_run",
];

/// Everything one scan-extract-publish run needs.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// First listing page of the category; page `n` is `<category_url>page/<n>/`.
    pub category_url: String,

    pub feed_title: String,

    pub feed_description: String,

    /// Public URL of the published feed. Inferred from the git remote when unset.
    pub feed_url: Option<String>,

    pub user_agent: String,

    /// Upper bound for any single HTTP request.
    pub request_timeout_secs: u64,

    /// Pause between consecutive requests to the site.
    pub request_delay_ms: u64,

    /// How many listing pages a run may scan.
    pub max_pages_to_scan: usize,

    /// Maximum number of items in the published feed.
    pub recent_to_include: usize,

    pub output_path: PathBuf,

    pub state_path: PathBuf,

    /// Run everything but write nothing.
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            category_url: "https://darkhorsepressnow.com/category/news/top-story/".to_string(),
            feed_title: "Darkhorse Press - Top Story".to_string(),
            feed_description: "Latest Top Story posts from Darkhorse Press.".to_string(),
            feed_url: None,
            user_agent: "Mozilla/5.0 (compatible; TopStoryRssBot/1.0)".to_string(),
            request_timeout_secs: 20,
            request_delay_ms: 1000,
            max_pages_to_scan: 5,
            recent_to_include: 40,
            output_path: PathBuf::from("docs/darkhorse-top-story.xml"),
            state_path: PathBuf::from("darkhorse-top-story.seen.json"),
            dry_run: false,
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), category = %config.category_url, "Loaded configuration");
        Ok(config)
    }

    /// Rejects values the job cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.category_base()?;
        if self.max_pages_to_scan == 0 {
            return Err(ConfigError::Invalid(
                "max_pages_to_scan must be at least 1".to_string(),
            ));
        }
        if self.recent_to_include == 0 {
            return Err(ConfigError::Invalid(
                "recent_to_include must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The category URL, parsed, with a trailing slash so `page/<n>/` joins
    /// underneath it.
    pub fn category_base(&self) -> Result<Url, ConfigError> {
        let mut url = Url::parse(self.category_url.trim()).map_err(|e| {
            ConfigError::Invalid(format!("category_url '{}': {}", self.category_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ConfigError::Invalid(format!(
                "category_url '{}' must be an http(s) URL",
                self.category_url
            )));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    /// The feed length bound; zero is clamped to one (`validate` rejects it).
    pub fn recent_limit(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.recent_to_include).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// `feed_url` if set, else a GitHub Pages URL inferred from the
    /// repository's `.git/config` in the working directory.
    pub fn resolved_feed_url(&self) -> String {
        if let Some(url) = self.feed_url.as_deref().filter(|u| !u.trim().is_empty()) {
            return url.trim().to_string();
        }
        infer_feed_url(&self.output_path, Path::new(".git/config"))
    }
}

/// Builds `https://<owner>.github.io/<repo>/<output file name>` from the first
/// GitHub remote in a git config file, or a placeholder when there is none.
pub fn infer_feed_url(output_path: &Path, git_config: &Path) -> String {
    let file_name = output_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "feed.xml".to_string());

    let remote = std::fs::read_to_string(git_config)
        .ok()
        .and_then(|content| content.lines().find_map(github_owner_repo));

    match remote {
        Some((owner, repo)) => format!("https://{owner}.github.io/{repo}/{file_name}"),
        None => format!("https://<username>.github.io/<repo>/{file_name}"),
    }
}

/// Parses `url = https://github.com/owner/repo(.git)` or
/// `url = git@github.com:owner/repo(.git)` config lines.
fn github_owner_repo(line: &str) -> Option<(String, String)> {
    let (key, value) = line.trim().split_once('=')?;
    if key.trim() != "url" {
        return None;
    }
    let value = value.trim();
    let rest = value
        .strip_prefix("https://github.com/")
        .or_else(|| value.strip_prefix("git@github.com:"))?;
    let (owner, repo) = rest.split_once('/')?;
    let repo = repo.trim_end_matches('/');
    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}

// ============================================================================
// Tests
// ============================================================================
