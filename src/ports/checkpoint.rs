use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::matching::MatchResult;

/// Identifies the checkpoint of one (source playlist, destination account) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CheckpointKey {
    pub source_id: String,
    pub account: String,
}

impl CheckpointKey {
    pub fn new(source_id: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            account: account.into(),
        }
    }

    /// Filesystem-safe identifier derived from both key parts
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.source_id.as_bytes());
        hasher.update([0]);
        hasher.update(self.account.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Progress of one export run, persisted after every completed track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCheckpoint {
    /// Content hash of the source track list this progress belongs to
    pub playlist_source_hash: String,
    /// Destination playlist created by the first run, absent in dry-run mode
    pub destination_playlist_id: Option<String>,
    pub results_so_far: Vec<MatchResult>,
    /// Always equal to `results_so_far.len()`
    pub next_index: usize,
    pub updated_at: DateTime<Utc>,
}

impl SessionCheckpoint {
    pub fn new(playlist_source_hash: String, destination_playlist_id: Option<String>) -> Self {
        Self {
            playlist_source_hash,
            destination_playlist_id,
            results_so_far: Vec::new(),
            next_index: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn record(&mut self, result: MatchResult) {
        self.results_so_far.push(result);
        self.next_index = self.results_so_far.len();
        self.updated_at = Utc::now();
    }

    pub fn is_consistent(&self) -> bool {
        self.next_index == self.results_so_far.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("Failed to access checkpoint {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Checkpoint {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("Failed to serialize checkpoint")]
    Serialize(#[from] serde_json::Error),
}

/// Storage for session checkpoints. One running session owns a key at a time.
pub trait CheckpointStore: Send + Sync {
    fn load(&self, key: &CheckpointKey) -> Result<Option<SessionCheckpoint>, CheckpointError>;

    fn save(&self, key: &CheckpointKey, checkpoint: &SessionCheckpoint)
    -> Result<(), CheckpointError>;

    /// Remove the checkpoint; removing a missing checkpoint is not an error.
    fn delete(&self, key: &CheckpointKey) -> Result<(), CheckpointError>;
}

impl<T: CheckpointStore + ?Sized> CheckpointStore for std::sync::Arc<T> {
    fn load(&self, key: &CheckpointKey) -> Result<Option<SessionCheckpoint>, CheckpointError> {
        (**self).load(key)
    }

    fn save(
        &self,
        key: &CheckpointKey,
        checkpoint: &SessionCheckpoint,
    ) -> Result<(), CheckpointError> {
        (**self).save(key, checkpoint)
    }

    fn delete(&self, key: &CheckpointKey) -> Result<(), CheckpointError> {
        (**self).delete(key)
    }
}
