//! CSV rendering of an export report, used by `--dry-run` so the resolved list can be
//! checked by hand or fed to another service's "title, artist" importer.

use std::io::Write;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Result, WrapErr};
use serde::Serialize;

use super::report::ExportReport;
use crate::matching::{MatchOutcome, MatchResult};

#[derive(Debug, Serialize)]
struct DryRunRow<'a> {
    position: usize,
    title: &'a str,
    artist: &'a str,
    album: Option<&'a str>,
    outcome: &'static str,
    catalog_id: Option<&'a str>,
    score: Option<String>,
    alternatives: String,
}

impl<'a> From<&'a MatchResult> for DryRunRow<'a> {
    fn from(result: &'a MatchResult) -> Self {
        let track = &result.track;
        let (catalog_id, score, alternatives) = match &result.outcome {
            MatchOutcome::Matched { catalog_id, score } => {
                (Some(catalog_id.as_str()), Some(*score), String::new())
            }
            MatchOutcome::Unresolved => (None, None, String::new()),
            MatchOutcome::Ambiguous { candidates } => (
                None,
                candidates.first().map(|scored| scored.score),
                candidates
                    .iter()
                    .map(|scored| {
                        format!(
                            "{} ({} - {}, {:.3})",
                            scored.candidate.catalog_id,
                            scored.candidate.artist,
                            scored.candidate.title,
                            scored.score
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
        };

        Self {
            position: track.source_position + 1,
            title: &track.title,
            artist: &track.artist,
            album: track.album.as_deref(),
            outcome: result.outcome.label(),
            catalog_id,
            score: score.map(|score| format!("{score:.3}")),
            alternatives,
        }
    }
}

/// `<dir>/<stem>.dry-run.csv` next to the source export.
pub fn default_output_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "playlist".to_string());
    source.with_file_name(format!("{stem}.dry-run.csv"))
}

pub fn write_report<W: Write>(writer: W, report: &ExportReport) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for result in &report.matched {
        writer
            .serialize(DryRunRow::from(result))
            .wrap_err("Failed to write dry-run row")?;
    }
    writer.flush().wrap_err("Failed to flush dry-run output")?;
    Ok(())
}

pub fn write_report_file(path: &Path, report: &ExportReport) -> Result<()> {
    let file = std::fs::File::create(path)
        .wrap_err_with(|| format!("Failed to create dry-run output: {}", path.display()))?;
    write_report(file, report)
        .wrap_err_with(|| format!("Failed to write dry-run output: {}", path.display()))?;
    tracing::info!(
        "Wrote {} resolved tracks to {}",
        report.matched.len(),
        path.display()
    );
    Ok(())
}
