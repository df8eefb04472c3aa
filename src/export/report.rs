use serde::Serialize;

use crate::matching::{MatchOutcome, MatchResult};

/// Outcome of an export session, ordered by source position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportReport {
    /// Absent in dry-run mode or when the session stopped before creating it
    pub destination_playlist_id: Option<String>,
    pub matched: Vec<MatchResult>,
    pub unresolved_count: usize,
    pub ambiguous_count: usize,
    pub quota_exhausted: bool,
}

impl ExportReport {
    pub fn new(
        destination_playlist_id: Option<String>,
        results: Vec<MatchResult>,
        quota_exhausted: bool,
    ) -> Self {
        let count = |kind: fn(&MatchOutcome) -> bool| {
            results.iter().filter(|result| kind(&result.outcome)).count()
        };
        let unresolved_count = count(|outcome| matches!(outcome, MatchOutcome::Unresolved));
        let ambiguous_count = count(|outcome| matches!(outcome, MatchOutcome::Ambiguous { .. }));

        Self {
            destination_playlist_id,
            matched: results,
            unresolved_count,
            ambiguous_count,
            quota_exhausted,
        }
    }

    pub fn matched_count(&self) -> usize {
        self.matched.len() - self.unresolved_count - self.ambiguous_count
    }

    /// Tracks the user has to handle manually
    pub fn needs_attention(&self) -> impl Iterator<Item = &MatchResult> {
        self.matched
            .iter()
            .filter(|result| !matches!(result.outcome, MatchOutcome::Matched { .. }))
    }
}
