//! Offline voice-feature extraction.
//!
//! Runs the same loading and extraction pipeline as the API's
//! `analyze_voice` endpoint over local files and prints one JSON object per
//! file.

use anyhow::{Context, Result};
use clap::Parser;
use parkinsight_voice::{extract, load_audio, DEFAULT_MAX_AUDIO_SECONDS};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Audio files to analyse (wav, ogg, webm, flac, mp3, ...)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Analyse at most this many seconds of each file
    #[arg(long, default_value_t = DEFAULT_MAX_AUDIO_SECONDS, value_parser = clap::value_parser!(u32).range(1..))]
    max_seconds: u32,
}

#[derive(Serialize)]
struct FileReport<'a> {
    file: String,
    decoder: &'a str,
    synthetic_audio: bool,
    truncated: bool,
    duration_seconds: f64,
    voiced_frames: usize,
    features: parkinsight_core::VoiceFeatures,
    stages: Vec<parkinsight_voice::StageReport>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    for path in &args.files {
        let clip = load_audio(path, args.max_seconds);
        if clip.synthetic {
            tracing::warn!(path = %path.display(), "Could not decode file, features come from synthetic noise");
        }
        let extraction = extract(&clip.samples, clip.sample_rate);

        let report = FileReport {
            file: path.display().to_string(),
            decoder: clip.decoder,
            synthetic_audio: clip.synthetic,
            truncated: clip.truncated,
            duration_seconds: clip.duration_seconds(),
            voiced_frames: extraction.voiced_frames,
            stages: extraction.report(),
            features: extraction.features,
        };

        let json = if args.pretty {
            serde_json::to_string_pretty(&report)
        } else {
            serde_json::to_string(&report)
        }
        .with_context(|| format!("serializing features for {}", path.display()))?;
        println!("{json}");
    }

    Ok(())
}
