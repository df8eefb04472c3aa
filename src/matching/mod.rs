//! Fuzzy resolution of source tracks to destination catalog items.
//!
//! Catalogs share no stable key with the source export, so every track is matched by
//! scoring title, artist, duration and version markers. Close calls are reported as
//! [`MatchOutcome::Ambiguous`] instead of being guessed.

mod normalize;
mod resolver;

use serde::{Deserialize, Serialize};

use crate::ports::catalog::Candidate;
use crate::track::TrackDescriptor;

pub use normalize::{clean_channel_name, is_version_annotation, normalize_string};
pub use resolver::MatchResolver;

/// A candidate together with the score it received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchOutcome {
    Matched { catalog_id: String, score: f64 },
    Unresolved,
    /// Several candidates scored within the ambiguity margin of each other
    Ambiguous { candidates: Vec<ScoredCandidate> },
}

impl MatchOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            MatchOutcome::Matched { .. } => "matched",
            MatchOutcome::Unresolved => "unresolved",
            MatchOutcome::Ambiguous { .. } => "ambiguous",
        }
    }
}

/// The resolution recorded for one source track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub track: TrackDescriptor,
    pub outcome: MatchOutcome,
}
