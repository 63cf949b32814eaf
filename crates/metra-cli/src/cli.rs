//! Command-line arguments of the `metra` binary.
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// In-process metrics registry with Prometheus exposition.
#[derive(Parser, Debug)]
#[command(name = "metra", version)]
pub struct Cli {
    /// Log output format: text, json or journald.
    #[arg(long, global = true, env = "METRA_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log filter directive, e.g. `info` or `metra_prometheus=debug`.
    #[arg(long, global = true, env = "METRA_LOG", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve /metrics with a background refresh until SIGINT/SIGTERM.
    Serve(ServeArgs),
    /// Refresh once and print the result.
    Export(ExportArgs),
    /// Check that the Prometheus client loads and the exposition has no duplicate series.
    Validate(ExporterArgs),
}

/// Naming and labelling of exported metrics.
#[derive(Args, Debug, Clone)]
pub struct ExporterArgs {
    /// Metric name namespace. Defaults to the app identity, else `app`.
    #[arg(long, env = "METRA_NAMESPACE")]
    pub namespace: Option<String>,

    /// Metric name subsystem. Defaults to the app identity, else `metrics`.
    #[arg(long, env = "METRA_SUBSYSTEM")]
    pub subsystem: Option<String>,

    /// Label added to every series, as `key=value`. Repeatable.
    #[arg(long = "label", value_parser = parse_label)]
    pub labels: Vec<(String, String)>,

    /// JSON taxonomy file (metric name -> unit, buckets, help).
    #[arg(long, env = "METRA_TAXONOMY")]
    pub taxonomy: Option<PathBuf>,

    /// Do not record refresh self-instrumentation.
    #[arg(long)]
    pub no_instrument: bool,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub exporter: ExporterArgs,

    #[arg(long, env = "METRA_HOST", default_value = metra_api::DEFAULT_HOST)]
    pub host: String,

    #[arg(long, env = "METRA_PORT", default_value_t = metra_api::DEFAULT_PORT)]
    pub port: u16,

    #[arg(long, env = "METRA_PATH", default_value = metra_api::DEFAULT_PATH)]
    pub path: String,

    /// Background refresh interval in seconds.
    #[arg(long, env = "METRA_INTERVAL_SECS", default_value_t = 15)]
    pub interval_secs: u64,

    /// Refresh before every scrape.
    #[arg(long)]
    pub refresh_on_scrape: bool,

    /// Require `Authorization: Bearer <token>` on scrapes.
    #[arg(long, env = "METRA_BEARER_TOKEN", hide_env_values = true)]
    pub bearer_token: Option<String>,

    /// Seconds to wait for in-flight scrapes on shutdown.
    #[arg(long, default_value_t = 5)]
    pub shutdown_timeout_secs: u64,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub exporter: ExporterArgs,

    #[arg(long, value_enum, default_value = "text")]
    pub format: ExportFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// Prometheus exposition text.
    Text,
    /// Registry snapshot as JSON.
    Json,
}

fn parse_label(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}
