use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::ports::checkpoint::{CheckpointError, CheckpointKey, CheckpointStore, SessionCheckpoint};

/// Keeps one JSON file per checkpoint key in a directory.
///
/// Writes go to a temporary file in the same directory which is then renamed over
/// the previous checkpoint, so a crash mid-write leaves the last complete one intact.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    directory: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn path_for(&self, key: &CheckpointKey) -> PathBuf {
        self.directory.join(format!("{}.json", key.digest()))
    }

    fn io_error(path: &Path, source: std::io::Error) -> CheckpointError {
        CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self, key: &CheckpointKey) -> Result<Option<SessionCheckpoint>, CheckpointError> {
        let path = self.path_for(key);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(Self::io_error(&path, error)),
        };

        let checkpoint: SessionCheckpoint = serde_json::from_reader(BufReader::new(file))
            .map_err(|error| CheckpointError::Corrupt {
                path: path.clone(),
                reason: error.to_string(),
            })?;

        if !checkpoint.is_consistent() {
            return Err(CheckpointError::Corrupt {
                path,
                reason: format!(
                    "next_index {} does not match {} recorded results",
                    checkpoint.next_index,
                    checkpoint.results_so_far.len()
                ),
            });
        }

        tracing::debug!(
            "Loaded checkpoint {} at index {}",
            path.display(),
            checkpoint.next_index
        );
        Ok(Some(checkpoint))
    }

    fn save(
        &self,
        key: &CheckpointKey,
        checkpoint: &SessionCheckpoint,
    ) -> Result<(), CheckpointError> {
        std::fs::create_dir_all(&self.directory)
            .map_err(|error| Self::io_error(&self.directory, error))?;

        let path = self.path_for(key);
        let temp = NamedTempFile::new_in(&self.directory)
            .map_err(|error| Self::io_error(&self.directory, error))?;

        let mut writer = BufWriter::new(temp);
        serde_json::to_writer_pretty(&mut writer, checkpoint)?;
        writer.flush().map_err(|error| Self::io_error(&path, error))?;
        let temp = writer
            .into_inner()
            .map_err(|error| Self::io_error(&path, error.into_error()))?;

        temp.persist(&path)
            .map_err(|error| Self::io_error(&path, error.error))?;

        tracing::trace!(
            "Saved checkpoint {} at index {}",
            path.display(),
            checkpoint.next_index
        );
        Ok(())
    }

    fn delete(&self, key: &CheckpointKey) -> Result<(), CheckpointError> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!("Deleted checkpoint {}", path.display());
                Ok(())
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(Self::io_error(&path, error)),
        }
    }
}
