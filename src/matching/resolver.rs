use std::collections::HashSet;

use crate::config::MatchingConfig;
use crate::ports::catalog::Candidate;
use crate::track::TrackDescriptor;

use super::normalize::{NormalizedMetadata, normalize_metadata};
use super::{MatchOutcome, ScoredCandidate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationMatch {
    /// Within tolerance, or one side has no duration
    Exact,
    /// Within three times the tolerance
    Close,
    /// Further apart, commonly a different take
    Mismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionMatch {
    Match,
    /// Exactly one side is marked as an alternate performance
    OneSided,
    /// Both sides carry different alternate markers
    Conflict,
}

/// Scores catalog candidates against a source track and decides whether the best
/// one is safe to use.
#[derive(Debug, Clone)]
pub struct MatchResolver {
    config: MatchingConfig,
}

impl MatchResolver {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    /// Score every candidate and decide between matched, ambiguous and unresolved.
    pub fn resolve<I>(&self, track: &TrackDescriptor, candidates: I) -> MatchOutcome
    where
        I: IntoIterator<Item = Candidate>,
    {
        let source = normalize_metadata(&track.title, &track.artist);

        let mut seen = HashSet::new();
        let mut scored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .filter(|candidate| seen.insert(candidate.catalog_id.clone()))
            .map(|candidate| {
                let score = self.score(&source, track.duration_seconds, &candidate);
                ScoredCandidate { candidate, score }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.candidate.catalog_id.cmp(&b.candidate.catalog_id))
        });

        let Some(best) = scored.first() else {
            return MatchOutcome::Unresolved;
        };
        if best.score < self.config.accept_threshold {
            return MatchOutcome::Unresolved;
        }

        let best_score = best.score;
        let contenders = scored
            .iter()
            .take_while(|c| best_score - c.score < self.config.ambiguity_margin)
            .count();

        if contenders > 1 {
            scored.truncate(contenders);
            return MatchOutcome::Ambiguous {
                candidates: scored,
            };
        }

        let best = scored.swap_remove(0);
        MatchOutcome::Matched {
            catalog_id: best.candidate.catalog_id,
            score: best.score,
        }
    }

    /// Overall similarity in `[0, 1]` between a normalized source track and a candidate.
    pub fn score(
        &self,
        source: &NormalizedMetadata,
        source_duration: Option<u32>,
        candidate: &Candidate,
    ) -> f64 {
        let target = normalize_metadata(&candidate.title, &candidate.artist);

        let title_similarity = string_similarity(&source.title, &target.title);
        let artist_similarity = artist_similarity(source, &target);

        let weight_sum = self.config.title_weight + self.config.artist_weight;
        let mut score = if weight_sum > 0.0 {
            (title_similarity * self.config.title_weight
                + artist_similarity * self.config.artist_weight)
                / weight_sum
        } else {
            0.0
        };

        score *= match self.duration_match(source_duration, candidate.duration_seconds) {
            DurationMatch::Exact => 1.0,
            DurationMatch::Close => 0.85,
            DurationMatch::Mismatch => 0.5,
        };

        score *= match compare_versions(source, &target) {
            VersionMatch::Match => 1.0,
            VersionMatch::OneSided => 0.85,
            VersionMatch::Conflict => 0.6,
        };

        score
    }

    pub fn duration_match(&self, source: Option<u32>, candidate: Option<u32>) -> DurationMatch {
        let (Some(source), Some(candidate)) = (source, candidate) else {
            return DurationMatch::Exact;
        };
        let diff = source.abs_diff(candidate);
        let tolerance = self.config.duration_tolerance_secs;

        if diff <= tolerance {
            DurationMatch::Exact
        } else if diff <= tolerance.saturating_mul(3) {
            DurationMatch::Close
        } else {
            DurationMatch::Mismatch
        }
    }
}

pub fn compare_versions(source: &NormalizedMetadata, target: &NormalizedMetadata) -> VersionMatch {
    match (source.alternate, target.alternate) {
        (None, None) => VersionMatch::Match,
        (Some(a), Some(b)) if a == b => VersionMatch::Match,
        (Some(_), Some(_)) => VersionMatch::Conflict,
        _ => VersionMatch::OneSided,
    }
}

/// Token-set (Jaccard) similarity, robust to word reordering.
pub fn token_similarity(s1: &str, s2: &str) -> f64 {
    let tokens1: HashSet<&str> = s1.split_whitespace().collect();
    let tokens2: HashSet<&str> = s2.split_whitespace().collect();

    if tokens1.is_empty() && tokens2.is_empty() {
        return 1.0;
    }
    if tokens1.is_empty() || tokens2.is_empty() {
        return 0.0;
    }

    let intersection = tokens1.intersection(&tokens2).count();
    let union = tokens1.union(&tokens2).count();

    intersection as f64 / union as f64
}

/// Jaro-Winkler on characters or token overlap on words, whichever is higher.
pub fn string_similarity(s1: &str, s2: &str) -> f64 {
    if s1 == s2 {
        return 1.0;
    }
    if s1.is_empty() || s2.is_empty() {
        return 0.0;
    }

    let jw = jaro_winkler::jaro_winkler(s1, s2);
    let token = token_similarity(s1, s2);

    jw.max(token * 0.95)
}

/// Primary artist similarity weighted against overlap of the full credit lists.
pub fn artist_similarity(source: &NormalizedMetadata, target: &NormalizedMetadata) -> f64 {
    let (Some(source_primary), Some(target_primary)) =
        (source.artists.first(), target.artists.first())
    else {
        return 0.0;
    };

    let primary = string_similarity(source_primary, target_primary);

    let overlap = source
        .artists
        .iter()
        .map(|artist| {
            target
                .artists
                .iter()
                .map(|other| string_similarity(artist, other))
                .fold(0.0_f64, f64::max)
        })
        .sum::<f64>()
        / source.artists.len() as f64;

    primary * 0.7 + overlap * 0.3
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::track;

    fn candidate(id: &str, title: &str, artist: &str, duration: Option<u32>) -> Candidate {
        Candidate {
            catalog_id: id.to_string(),
            title: title.to_string(),
            artist: artist.to_string(),
            duration_seconds: duration,
        }
    }

    fn resolver() -> MatchResolver {
        MatchResolver::new(MatchingConfig::default())
    }

    #[test]
    fn test_string_similarity() {
        assert!((string_similarity("hello", "hello") - 1.0).abs() < 0.001);
        assert!(string_similarity("hello", "hallo") > 0.8);
        assert!(string_similarity("hello", "world") < 0.5);
        assert!(string_similarity("quick brown fox", "brown fox quick") >= 0.95);
        assert_eq!(string_similarity("", "something"), 0.0);
    }

    #[test]
    fn test_duration_match() {
        let resolver = resolver();
        assert_eq!(resolver.duration_match(Some(355), Some(360)), DurationMatch::Exact);
        assert_eq!(resolver.duration_match(Some(355), Some(365)), DurationMatch::Close);
        assert_eq!(resolver.duration_match(Some(180), Some(240)), DurationMatch::Mismatch);
        assert_eq!(resolver.duration_match(None, Some(240)), DurationMatch::Exact);
    }

    #[test]
    fn test_exact_duration_beats_live_version() {
        let mut t = track(0, "Bohemian Rhapsody", "Queen");
        t.duration_seconds = Some(355);
        let candidates = vec![
            candidate("A", "Bohemian Rhapsody", "Queen", Some(354)),
            candidate("B", "Bohemian Rhapsody (Live)", "Queen", Some(360)),
        ];

        match resolver().resolve(&t, candidates) {
            MatchOutcome::Matched { catalog_id, score } => {
                assert_eq!(catalog_id, "A");
                assert!(score > 0.99);
            }
            other => panic!("expected a match, got {other:?}"),
        }
    }

    #[test]
    fn test_close_contenders_are_ambiguous() {
        let t = track(0, "Yesterday", "The Beatles");
        let candidates = vec![
            candidate("C", "Yesterday", "Beatles cover band", None),
            candidate("D", "Yesterday (Remastered)", "The Beatles", None),
        ];

        match resolver().resolve(&t, candidates) {
            MatchOutcome::Ambiguous { candidates } => {
                let mut ids: Vec<_> = candidates
                    .iter()
                    .map(|c| c.candidate.catalog_id.as_str())
                    .collect();
                ids.sort();
                assert_eq!(ids, vec!["C", "D"]);
                assert!(candidates.iter().all(|c| c.score >= 0.75));
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn test_unrelated_candidates_are_unresolved() {
        let t = track(0, "Yesterday", "The Beatles");
        let candidates = vec![
            candidate("X", "Smells Like Teen Spirit", "Nirvana", None),
            candidate("Y", "Hotel California", "Eagles", None),
        ];
        assert_eq!(resolver().resolve(&t, candidates), MatchOutcome::Unresolved);
    }

    #[test]
    fn test_no_candidates_is_unresolved() {
        let t = track(0, "Yesterday", "The Beatles");
        assert_eq!(resolver().resolve(&t, Vec::new()), MatchOutcome::Unresolved);
    }

    #[test]
    fn test_exact_tie_orders_by_catalog_id() {
        let t = track(0, "Song", "Artist");
        let candidates = vec![
            candidate("zzz", "Song", "Artist", None),
            candidate("aaa", "Song", "Artist", None),
        ];

        match resolver().resolve(&t, candidates) {
            MatchOutcome::Ambiguous { candidates } => {
                assert_eq!(candidates[0].candidate.catalog_id, "aaa");
                assert_eq!(candidates[1].candidate.catalog_id, "zzz");
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_catalog_ids_collapse() {
        let t = track(0, "Song", "Artist");
        let candidates = vec![
            candidate("same", "Song", "Artist", None),
            candidate("same", "Song", "Artist", None),
        ];
        assert!(matches!(
            resolver().resolve(&t, candidates),
            MatchOutcome::Matched { .. }
        ));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let mut t = track(3, "Don't Stop Me Now", "Queen");
        t.duration_seconds = Some(209);
        let candidates = vec![
            candidate("1", "Don't Stop Me Now (Official Video)", "Queen", Some(211)),
            candidate("2", "Don't Stop Me Now - Live at Wembley", "Queen", Some(260)),
            candidate("3", "Dont Stop Me Now", "Queen Tribute", Some(209)),
        ];

        let first = resolver().resolve(&t, candidates.clone());
        for _ in 0..10 {
            assert_eq!(resolver().resolve(&t, candidates.clone()), first);
        }
    }

    #[test]
    fn test_wrong_duration_penalized() {
        let resolver = resolver();
        let source = normalize_metadata("Song", "Artist");
        let same = candidate("1", "Song", "Artist", Some(200));
        let cover = candidate("2", "Song", "Artist", Some(320));

        assert!(resolver.score(&source, Some(200), &same) > resolver.score(&source, Some(200), &cover));
        assert!(resolver.score(&source, Some(200), &cover) < 0.75);
    }

    #[test]
    fn test_featured_artist_order_does_not_matter() {
        let source = normalize_metadata("Under Pressure", "Queen, David Bowie");
        let target = normalize_metadata("Under Pressure", "Queen & David Bowie");
        assert!(artist_similarity(&source, &target) > 0.99);
    }
}
