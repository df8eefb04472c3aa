//! Playlist export engine: resolves every source track against the destination
//! catalog and builds the destination playlist in source order, checkpointing
//! after each track so an interrupted or quota-suspended run can resume.

pub mod checkpoint;
pub mod dry_run;
pub mod report;
pub mod session;

use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::config::Config;
use crate::governor::RateGovernor;
use crate::matching::MatchResolver;
use crate::ports::catalog::CatalogClient;
use crate::ports::checkpoint::{CheckpointError, CheckpointKey, CheckpointStore};
use crate::track::SourcePlaylist;

pub use session::{Destination, ExportError, ExportSession, SessionOutcome, SessionState};

pub struct PlaylistExportEngine<C, S> {
    client: C,
    store: S,
    governor: RateGovernor,
    resolver: MatchResolver,
    search_limit: usize,
    cancel: CancellationToken,
}

impl<C, S> PlaylistExportEngine<C, S>
where
    C: CatalogClient,
    S: CheckpointStore,
{
    pub fn new(client: C, store: S, config: &Config) -> Self {
        Self {
            client,
            store,
            governor: RateGovernor::new(&config.governor),
            resolver: MatchResolver::new(config.matching.clone()),
            search_limit: config.youtube.search_limit,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop between tracks once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Dry runs are keyed separately so they never pick up a real run's progress.
    pub fn checkpoint_key(&self, playlist: &SourcePlaylist, destination: &Destination) -> CheckpointKey {
        let account = if destination.dry_run {
            format!("{}#dry-run", destination.account)
        } else {
            destination.account.clone()
        };
        CheckpointKey::new(playlist.source_id.clone(), account)
    }

    /// Forget any saved progress for this playlist and destination.
    pub fn discard_checkpoint(
        &self,
        playlist: &SourcePlaylist,
        destination: &Destination,
    ) -> Result<(), CheckpointError> {
        self.store.delete(&self.checkpoint_key(playlist, destination))
    }

    #[instrument(skip_all, fields(playlist = %playlist.name, dry_run = destination.dry_run))]
    pub async fn export(
        &self,
        playlist: &SourcePlaylist,
        destination: &Destination,
    ) -> Result<SessionOutcome, ExportError> {
        let session = ExportSession {
            client: &self.client,
            store: &self.store,
            governor: &self.governor,
            resolver: &self.resolver,
            search_limit: self.search_limit,
            cancel: self.cancel.clone(),
            playlist,
            destination,
            key: self.checkpoint_key(playlist, destination),
            state: SessionState::Initializing,
        };
        session.run().await
    }
}
