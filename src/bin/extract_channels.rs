#![forbid(unsafe_code)]

//! Command-line front end for the extraction pipeline.
//!
//! Single mode takes one channel identifier and fails hard on any terminal
//! error. Batch mode takes a newline-delimited identifier list (from a file,
//! inline text, or both) and skips failing channels so one bad identifier
//! never aborts the run. Either way the output is one ZIP holding the video
//! table and the channel summary table.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::{Local, Utc};
use clap::Parser;
use tube_harvest::api::HttpGateway;
use tube_harvest::config::{ConfigOverrides, resolve_config};
use tube_harvest::export::{sanitize_label, write_archive};
use tube_harvest::run::{DateWindow, RunResult, parse_channel_ids, run_batch, run_single};

#[derive(Debug, Parser)]
#[command(
    name = "extract_channels",
    about = "Extract recent-video metadata for YouTube channels into CSV tables"
)]
struct Cli {
    /// Channel identifier for single-channel mode.
    #[arg(long, conflicts_with_all = ["ids_file", "ids"])]
    channel: Option<String>,

    /// File with one channel identifier per line (batch mode).
    #[arg(long)]
    ids_file: Option<PathBuf>,

    /// Inline newline-delimited channel identifiers (batch mode).
    #[arg(long)]
    ids: Option<String>,

    /// Look-back window in whole months.
    #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(u32).range(1..=60))]
    months: u32,

    /// Label used only to name the batch output archive.
    #[arg(long, default_value = "extract")]
    label: String,

    /// Directory the archive is written into.
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// Override the API key from the environment.
    #[arg(long)]
    api_key: Option<String>,

    /// Override the API base URL.
    #[arg(long)]
    base_url: Option<String>,
}

impl Cli {
    /// Collects batch identifiers: file contents first, then inline text,
    /// in the order given. Dedup happens later in the aggregator.
    fn batch_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        if let Some(path) = &self.ids_file {
            let content = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            ids.extend(parse_channel_ids(&content));
        }
        if let Some(text) = &self.ids {
            ids.extend(parse_channel_ids(text));
        }
        Ok(ids)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let config = resolve_config(ConfigOverrides {
        api_key: cli.api_key.clone(),
        base_url: cli.base_url.clone(),
        env_path: None,
    })?;
    let gateway = HttpGateway::new(&config);

    let window = DateWindow::months_back(cli.months, Local::now().date_naive());
    let extracted_at = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();

    println!("===================================");
    println!("YouTube Channel Extractor");
    println!("===================================");
    println!(
        "Window: {} to {} (inclusive)",
        window.start.date(),
        window.end.date()
    );
    println!();

    let (result, archive_path) = if let Some(channel_id) = &cli.channel {
        let result = run_single(&gateway, channel_id.trim(), window, &extracted_at)?;
        let path = cli.output_dir.join(single_archive_name(&result));
        (result, path)
    } else {
        let ids = cli.batch_ids()?;
        if ids.is_empty() {
            bail!(
                "no channel identifiers provided; use --channel, --ids-file, or --ids"
            );
        }
        let result = run_batch(&gateway, &ids, window, &extracted_at);
        let path = cli.output_dir.join(batch_archive_name(&cli.label));
        (result, path)
    };

    write_archive(&archive_path, &result)?;

    println!();
    println!("===================================");
    println!("Extraction complete");
    println!("===================================");
    println!("Channels: {}", result.channels.len());
    println!("Videos: {}", result.videos.len());
    println!("Archive: {}", archive_path.display());

    Ok(())
}

/// Single mode names the archive after the channel plus its row count, the
/// way the batch label works for multi-channel runs.
fn single_archive_name(result: &RunResult) -> String {
    let channel_name = result
        .channels
        .first()
        .map(|summary| summary.channel_name.as_str())
        .unwrap_or_default();
    let mut name = sanitize_label(channel_name);
    if name.is_empty() {
        name = "channel".to_string();
    }
    format!("{}{}.zip", name, result.videos.len())
}

fn batch_archive_name(label: &str) -> String {
    let mut sanitized = sanitize_label(label);
    if sanitized.is_empty() {
        sanitized = "category".to_string();
    }
    format!("yt_data_{sanitized}.zip")
}
