use tokio_util::sync::CancellationToken;

use crate::governor::{GuardError, RateGovernor};
use crate::matching::{MatchOutcome, MatchResolver, MatchResult};
use crate::ports::catalog::CatalogClient;
use crate::ports::checkpoint::{CheckpointError, CheckpointKey, CheckpointStore, SessionCheckpoint};
use crate::track::{SourcePlaylist, TrackDescriptor};

use super::report::ExportReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initializing,
    Resolving(usize),
    Appending(usize),
    Completed,
    /// Quota exhausted, resumable later
    Suspended,
    /// Cancelled between tracks, resumable
    Interrupted,
    Failed,
}

/// How a session that did not fail ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Completed(ExportReport),
    Suspended {
        report: ExportReport,
        next_index: usize,
    },
    Interrupted {
        report: ExportReport,
        next_index: usize,
    },
}

impl SessionOutcome {
    pub fn report(&self) -> &ExportReport {
        match self {
            SessionOutcome::Completed(report)
            | SessionOutcome::Suspended { report, .. }
            | SessionOutcome::Interrupted { report, .. } => report,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Source playlist has no tracks")]
    EmptyPlaylist,
    #[error(
        "A checkpoint exists for this playlist but was made from a different track list \
         (checkpoint {expected}, source {found}); refusing to resume"
    )]
    CheckpointMismatch { expected: String, found: String },
    #[error("Checkpoint storage failed")]
    Checkpoint(#[from] CheckpointError),
    #[error("Failed to create the destination playlist")]
    CreatePlaylist(#[source] GuardError),
    #[error("Catalog call failed at track {index}")]
    Catalog {
        index: usize,
        #[source]
        source: GuardError,
    },
}

/// Where and how a playlist gets exported.
#[derive(Debug, Clone)]
pub struct Destination {
    /// Destination account label, part of the checkpoint key
    pub account: String,
    pub playlist_title: String,
    pub playlist_description: String,
    /// Resolve only, never write to the catalog
    pub dry_run: bool,
}

/// One export run over a source playlist.
///
/// Tracks are processed strictly in source order with at most one catalog call in
/// flight, and the checkpoint is written after every completed track.
pub struct ExportSession<'a, C, S> {
    pub(super) client: &'a C,
    pub(super) store: &'a S,
    pub(super) governor: &'a RateGovernor,
    pub(super) resolver: &'a MatchResolver,
    pub(super) search_limit: usize,
    pub(super) cancel: CancellationToken,
    pub(super) playlist: &'a SourcePlaylist,
    pub(super) destination: &'a Destination,
    pub(super) key: CheckpointKey,
    pub(super) state: SessionState,
}

impl<'a, C, S> ExportSession<'a, C, S>
where
    C: CatalogClient,
    S: CheckpointStore,
{
    fn transition(&mut self, state: SessionState) {
        tracing::trace!("Session state {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Write the checkpoint. A session that cannot persist its progress has failed.
    fn persist(&mut self, checkpoint: &SessionCheckpoint) -> Result<(), ExportError> {
        self.store.save(&self.key, checkpoint).map_err(|error| {
            self.transition(SessionState::Failed);
            ExportError::Checkpoint(error)
        })
    }

    fn report(&self, checkpoint: &SessionCheckpoint, quota_exhausted: bool) -> ExportReport {
        ExportReport::new(
            checkpoint.destination_playlist_id.clone(),
            checkpoint.results_so_far.clone(),
            quota_exhausted,
        )
    }

    /// Load the matching checkpoint, or start a fresh one.
    fn initialize(&mut self) -> Result<SessionCheckpoint, ExportError> {
        self.transition(SessionState::Initializing);
        let hash = self.playlist.content_hash();

        let loaded = self.store.load(&self.key).map_err(|error| {
            self.transition(SessionState::Failed);
            ExportError::Checkpoint(error)
        })?;
        match loaded {
            Some(checkpoint) if checkpoint.playlist_source_hash == hash => {
                tracing::info!(
                    "Resuming export of '{}' at track {}/{}",
                    self.playlist.name,
                    checkpoint.next_index,
                    self.playlist.tracks.len()
                );
                Ok(checkpoint)
            }
            Some(checkpoint) => {
                self.transition(SessionState::Failed);
                Err(ExportError::CheckpointMismatch {
                    expected: checkpoint.playlist_source_hash,
                    found: hash,
                })
            }
            None => {
                tracing::info!(
                    "Starting export of '{}' ({} tracks)",
                    self.playlist.name,
                    self.playlist.tracks.len()
                );
                Ok(SessionCheckpoint::new(hash, None))
            }
        }
    }

    pub async fn run(mut self) -> Result<SessionOutcome, ExportError> {
        if self.playlist.tracks.is_empty() {
            return Err(ExportError::EmptyPlaylist);
        }

        let mut checkpoint = self.initialize()?;

        if !self.destination.dry_run && checkpoint.destination_playlist_id.is_none() {
            let client = self.client;
            let destination = self.destination;
            let title = destination.playlist_title.as_str();
            let description = destination.playlist_description.as_str();

            match self
                .governor
                .guard("create playlist", || client.create_playlist(title, description))
                .await
            {
                Ok(playlist_id) => {
                    tracing::info!("Created destination playlist {}", playlist_id);
                    checkpoint.destination_playlist_id = Some(playlist_id);
                }
                Err(GuardError::QuotaExceeded(_)) => {
                    self.persist(&checkpoint)?;
                    self.transition(SessionState::Suspended);
                    return Ok(SessionOutcome::Suspended {
                        report: self.report(&checkpoint, true),
                        next_index: checkpoint.next_index,
                    });
                }
                Err(error) => {
                    self.persist(&checkpoint)?;
                    self.transition(SessionState::Failed);
                    return Err(ExportError::CreatePlaylist(error));
                }
            }
        }
        self.persist(&checkpoint)?;

        let playlist = self.playlist;
        let destination_playlist_id = checkpoint.destination_playlist_id.clone();
        for index in checkpoint.next_index..playlist.tracks.len() {
            if self.cancel.is_cancelled() {
                tracing::info!("Export interrupted before track {}", index);
                self.transition(SessionState::Interrupted);
                return Ok(SessionOutcome::Interrupted {
                    report: self.report(&checkpoint, false),
                    next_index: checkpoint.next_index,
                });
            }

            let track = &playlist.tracks[index];
            match self
                .process_track(index, track, destination_playlist_id.as_deref())
                .await
            {
                Ok(result) => {
                    checkpoint.record(result);
                    self.persist(&checkpoint)?;
                }
                Err(GuardError::QuotaExceeded(error)) => {
                    tracing::warn!(
                        "Quota exhausted at track {}, suspending: {}",
                        index,
                        error
                    );
                    self.persist(&checkpoint)?;
                    self.transition(SessionState::Suspended);
                    return Ok(SessionOutcome::Suspended {
                        report: self.report(&checkpoint, true),
                        next_index: checkpoint.next_index,
                    });
                }
                Err(error) => {
                    self.persist(&checkpoint)?;
                    self.transition(SessionState::Failed);
                    return Err(ExportError::Catalog {
                        index,
                        source: error,
                    });
                }
            }
        }

        let report = self.report(&checkpoint, false);
        if let Err(error) = self.store.delete(&self.key) {
            self.transition(SessionState::Failed);
            return Err(error.into());
        }
        self.transition(SessionState::Completed);
        tracing::info!(
            "Export of '{}' completed: {} matched, {} unresolved, {} ambiguous",
            self.playlist.name,
            report.matched_count(),
            report.unresolved_count,
            report.ambiguous_count
        );
        Ok(SessionOutcome::Completed(report))
    }

    /// Search, resolve and (unless dry-running) append one track.
    async fn process_track(
        &mut self,
        index: usize,
        track: &TrackDescriptor,
        destination_playlist_id: Option<&str>,
    ) -> Result<MatchResult, GuardError> {
        self.transition(SessionState::Resolving(index));

        let client = self.client;
        let query = track.search_query();
        let limit = self.search_limit;
        let candidates = self
            .governor
            .guard("search", || client.search(&query, limit))
            .await?;

        tracing::debug!(
            "Track {} '{}' by '{}': {} candidates",
            index,
            track.title,
            track.artist,
            candidates.len()
        );
        let outcome = self.resolver.resolve(track, candidates);

        match &outcome {
            MatchOutcome::Matched { catalog_id, score } => {
                tracing::info!(
                    "Matched '{}' by '{}' to {} (score {:.2})",
                    track.title,
                    track.artist,
                    catalog_id,
                    score
                );
                if let Some(playlist_id) = destination_playlist_id {
                    self.transition(SessionState::Appending(index));
                    self.governor
                        .guard("append", || client.append_item(playlist_id, catalog_id))
                        .await?;
                }
            }
            MatchOutcome::Ambiguous { candidates } => {
                tracing::warn!(
                    "Ambiguous match for '{}' by '{}': {} close candidates",
                    track.title,
                    track.artist,
                    candidates.len()
                );
            }
            MatchOutcome::Unresolved => {
                tracing::warn!("No match for '{}' by '{}'", track.title, track.artist);
            }
        }

        Ok(MatchResult {
            track: track.clone(),
            outcome,
        })
    }
}
