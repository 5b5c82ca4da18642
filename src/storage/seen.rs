use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::util::write_atomic;

/// Errors from loading or persisting the seen-state file.
#[derive(Debug, Error)]
pub enum StateError {
    /// The file exists but does not hold a valid state document. The run must
    /// stop here: treating every listed post as new would flood the feed.
    #[error("State file {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to read state file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The previous state file is left untouched when this occurs.
    #[error("Failed to write state file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// On-disk document. Unknown keys (such as an `items` cache written by older
/// tooling) are ignored on load and dropped on the next write.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    seen_urls: BTreeSet<String>,
}

/// What [`SeenStore::persist`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Written,
    /// Nothing was added since load.
    Unchanged,
    /// Dry-run mode; nothing touched the disk.
    Skipped,
}

/// The durable set of post URLs already processed.
///
/// The set only grows: there is no removal API, so a post is extracted at
/// most once over the lifetime of the state file even after it ages out of
/// the published feed. URLs are kept sorted so the file diffs cleanly.
#[derive(Debug)]
pub struct SeenStore {
    path: PathBuf,
    seen: BTreeSet<String>,
    added: usize,
    dry_run: bool,
}

impl SeenStore {
    /// Loads the state at `path`; a missing file is an empty set.
    pub fn load(path: &Path, dry_run: bool) -> Result<Self, StateError> {
        let seen = match std::fs::read(path) {
            Ok(bytes) => {
                let file: StateFile =
                    serde_json::from_slice(&bytes).map_err(|source| StateError::Corrupt {
                        path: path.to_path_buf(),
                        source,
                    })?;
                file.seen_urls
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No state file found, starting with empty seen set");
                BTreeSet::new()
            }
            Err(source) => {
                return Err(StateError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        tracing::debug!(path = %path.display(), seen = seen.len(), "Loaded seen state");
        Ok(Self {
            path: path.to_path_buf(),
            seen,
            added: 0,
            dry_run,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, StateError> {
        Self::load(&config.state_path, config.dry_run)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    /// Records `url` as processed. Returns `false` if it was already present.
    pub fn mark_seen(&mut self, url: &str) -> bool {
        if self.seen.contains(url) {
            return false;
        }
        self.seen.insert(url.to_owned());
        self.added += 1;
        true
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Number of URLs added since load.
    pub fn added(&self) -> usize {
        self.added
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the full set back atomically: either the whole new document
    /// lands or the previous file stays as it was.
    pub fn persist(&self) -> Result<PersistOutcome, StateError> {
        if self.dry_run {
            tracing::info!(
                path = %self.path.display(),
                added = self.added,
                "Dry run: seen state not written"
            );
            return Ok(PersistOutcome::Skipped);
        }
        if self.added == 0 {
            return Ok(PersistOutcome::Unchanged);
        }

        let file = StateFile {
            seen_urls: self.seen.clone(),
        };
        let mut bytes = serde_json::to_vec_pretty(&file)?;
        bytes.push(b'\n');

        write_atomic(&self.path, &bytes).map_err(|source| StateError::Write {
            path: self.path.clone(),
            source,
        })?;

        tracing::info!(
            path = %self.path.display(),
            total = self.seen.len(),
            added = self.added,
            "Updated seen state"
        );
        Ok(PersistOutcome::Written)
    }
}
