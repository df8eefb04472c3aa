mod config;
mod export;
mod governor;
mod logging;
mod matching;
mod ports;
mod rimusic;
mod track;
mod youtube;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::{Result, eyre::Context};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    export::{
        Destination, ExportError, PlaylistExportEngine, SessionOutcome,
        checkpoint::FileCheckpointStore, dry_run,
    },
    logging::init_tracing,
    matching::MatchOutcome,
    track::SourcePlaylist,
    youtube::YoutubeClient,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, global = true, env = "RIMUSIC2YT_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `rimusic2yt=debug`
    #[arg(long, default_value = "info", global = true, env = "LOG_LEVEL")]
    log_level: String,

    /// OTLP gRPC endpoint to export traces to
    #[arg(long, global = true, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

fn is_file(s: &str) -> Result<PathBuf, String> {
    let p: PathBuf = s.into();
    if p.is_file() {
        Ok(p)
    } else {
        Err(format!("`{}` is not an existing file", s))
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Export a RiMusic playlist to a YouTube playlist
    Export {
        /// The playlist CSV exported from RiMusic
        #[arg(value_parser = is_file)]
        csv_playlist: PathBuf,

        /// Name of the created playlist (default: the name stored in the export)
        #[arg(short = 'n', long)]
        playlist_name: Option<String>,

        /// Only resolve tracks and write them to a CSV, without creating a playlist
        #[arg(long)]
        dry_run: bool,

        /// Where to write the dry-run CSV (default: next to the export)
        #[arg(long, requires = "dry_run")]
        dry_run_output: Option<PathBuf>,

        /// OAuth access token with the youtube scope
        #[arg(long, env = "YOUTUBE_ACCESS_TOKEN", hide_env_values = true)]
        access_token: String,

        /// Throw away saved progress and start from the first track
        #[arg(long)]
        restart: bool,
    },
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let tracer_provider = init_tracing(args.otlp_endpoint.as_deref(), &args.log_level)?;

    let result = run(args).await;

    if let Some(tracer_provider) = tracer_provider
        && let Err(error) = tracer_provider.shutdown()
    {
        eprintln!("Failed to flush traces: {error}");
    }
    result
}

async fn run(args: Args) -> Result<()> {
    tracing::debug!("Loading configuration");
    let config = {
        if let Some(config) = args.config {
            Config::from_file(&config)
        } else {
            Config::load()
        }
    }
    .with_context(|| "Failed to load rimusic2yt config")?;

    match args.command {
        Commands::Export {
            csv_playlist,
            playlist_name,
            dry_run,
            dry_run_output,
            access_token,
            restart,
        } => {
            let playlist = rimusic::read_playlist(&csv_playlist, playlist_name.as_deref())
                .wrap_err("Failed to read the RiMusic playlist")?;
            let dry_run_output = dry_run.then(|| {
                dry_run_output.unwrap_or_else(|| dry_run::default_output_path(&csv_playlist))
            });

            export_playlist(&config, &playlist, access_token, dry_run_output, restart).await?;
        }
        Commands::Config(config_commands) => match config_commands {
            ConfigCommands::CreateDefault => {
                tracing::debug!("Creating default config");
                let path = Config::create_default()?;
                println!("{}", path.display());
            }
            ConfigCommands::Path => match Config::config_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("No default config path found"),
            },
        },
    }

    Ok(())
}

/// Run one export session. `dry_run_output` is set exactly when dry-running.
async fn export_playlist(
    config: &Config,
    playlist: &SourcePlaylist,
    access_token: String,
    dry_run_output: Option<PathBuf>,
    restart: bool,
) -> Result<()> {
    let destination = Destination {
        account: config.youtube.account.clone(),
        playlist_title: playlist.name.clone(),
        playlist_description: format!(
            "Imported from RiMusic ({} tracks)",
            playlist.tracks.len()
        ),
        dry_run: dry_run_output.is_some(),
    };

    let client = YoutubeClient::new(&config.youtube, access_token)?;
    let store = FileCheckpointStore::new(config.checkpoint_directory()?);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current track");
            interrupt.cancel();
        }
    });

    let engine = PlaylistExportEngine::new(client, store, config).with_cancellation(cancel);
    if restart {
        tracing::info!("Discarding saved progress for '{}'", playlist.name);
        engine.discard_checkpoint(playlist, &destination)?;
    }

    let outcome = match engine.export(playlist, &destination).await {
        Ok(outcome) => outcome,
        Err(error @ ExportError::CheckpointMismatch { .. }) => {
            return Err(error).wrap_err(
                "The playlist changed since the last run, pass --restart to start over",
            );
        }
        Err(error) => return Err(error).wrap_err("Export failed, rerun to resume"),
    };

    if let Some(path) = &dry_run_output {
        dry_run::write_report_file(path, outcome.report())?;
    }
    print_summary(playlist, &outcome);
    Ok(())
}

fn print_summary(playlist: &SourcePlaylist, outcome: &SessionOutcome) {
    let report = outcome.report();
    let total = playlist.tracks.len();

    match outcome {
        SessionOutcome::Completed(_) => println!(
            "Exported '{}': {} matched, {} unresolved, {} ambiguous of {} tracks",
            playlist.name,
            report.matched_count(),
            report.unresolved_count,
            report.ambiguous_count,
            total
        ),
        SessionOutcome::Suspended { next_index, .. } => println!(
            "YouTube quota exhausted after {}/{} tracks. Resume later by running the same command again.",
            next_index, total
        ),
        SessionOutcome::Interrupted { next_index, .. } => println!(
            "Interrupted after {}/{} tracks. Run the same command again to resume.",
            next_index, total
        ),
    }

    if let Some(playlist_id) = &report.destination_playlist_id {
        println!("Playlist: https://www.youtube.com/playlist?list={playlist_id}");
    }

    if report.ambiguous_count > 0 {
        println!(
            "Ambiguous tracks were not added. They are often the same recording uploaded both \
             by an artist's Topic channel and as an official video; pick one of the links below \
             and add it by hand."
        );
    }

    for result in report.needs_attention() {
        let track = &result.track;
        println!(
            "  #{} {} - {}: {}",
            track.source_position + 1,
            track.artist,
            track.title,
            result.outcome.label()
        );
        if let MatchOutcome::Ambiguous { candidates } = &result.outcome {
            for scored in candidates {
                println!(
                    "      https://www.youtube.com/watch?v={} {} - {} ({:.2})",
                    scored.candidate.catalog_id,
                    scored.candidate.artist,
                    scored.candidate.title,
                    scored.score
                );
            }
        }
    }
}
