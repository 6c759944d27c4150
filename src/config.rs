//! Run configuration
//!
//! Raw input comes from command line flags (each with a `LOADTEST_*`
//! environment fallback) and an optional TOML file. It is resolved exactly
//! once into a [`ResolvedConfig`]; nothing downstream looks at raw input.
//!
//! Precedence: flag/env > file > preset > built-in default.

use crate::monitor::status::ExpectedTopology;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Tables every generated workload contains unless overridden
pub const DEFAULT_TABLES: [&str; 4] = ["users", "products", "orders", "order_items"];

pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_PROJECT: &str = "output";
pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const COMPOSE_FILE_NAME: &str = "docker-compose.loadtest.yml";
pub const DEFAULT_RUNNER_LABEL: &str = "local";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Source database or stream being synced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Mysql,
    Postgresql,
    PostgresqlLogical,
    Mongodb,
    Neo4j,
    Kafka,
    Csv,
    Jsonl,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Mysql => "mysql",
            SourceKind::Postgresql => "postgresql",
            SourceKind::PostgresqlLogical => "postgresql-logical",
            SourceKind::Mongodb => "mongodb",
            SourceKind::Neo4j => "neo4j",
            SourceKind::Kafka => "kafka",
            SourceKind::Csv => "csv",
            SourceKind::Jsonl => "jsonl",
        }
    }

    /// Kafka topics and file sources get one sync container per table
    pub fn syncs_per_table(&self) -> bool {
        matches!(self, SourceKind::Kafka | SourceKind::Csv | SourceKind::Jsonl)
    }

    pub fn expected_sync_containers(&self, table_count: usize) -> usize {
        if self.syncs_per_table() {
            table_count
        } else {
            1
        }
    }
}

impl FromStr for SourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(SourceKind::Mysql),
            "postgresql" | "postgres" | "postgresql-trigger" => Ok(SourceKind::Postgresql),
            "postgresql-logical" | "postgresql-wal" => Ok(SourceKind::PostgresqlLogical),
            "mongodb" | "mongo" => Ok(SourceKind::Mongodb),
            "neo4j" => Ok(SourceKind::Neo4j),
            "kafka" => Ok(SourceKind::Kafka),
            "csv" => Ok(SourceKind::Csv),
            "jsonl" => Ok(SourceKind::Jsonl),
            other => Err(ConfigError::UnknownSource(other.to_string())),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workload size preset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    #[default]
    Small,
    Medium,
    Large,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Small => "small",
            Preset::Medium => "medium",
            Preset::Large => "large",
        }
    }

    /// Rows per table
    pub fn row_count(&self) -> u64 {
        match self {
            Preset::Small => 10_000,
            Preset::Medium => 100_000,
            Preset::Large => 1_000_000,
        }
    }

    pub fn workers(&self) -> usize {
        match self {
            Preset::Small => 2,
            Preset::Medium => 4,
            Preset::Large => 8,
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command line arguments of `loadtest-ci`
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "loadtest-ci")]
#[command(about = "Run a containerised sync load test and record its metrics")]
pub struct RunArgs {
    /// Data source (mysql, postgresql, postgresql-logical, mongodb, neo4j, kafka, csv, jsonl)
    #[arg(long, env = "LOADTEST_SOURCE")]
    pub source: Option<String>,

    /// Size preset; supplies row count and worker defaults
    #[arg(long, value_enum, env = "LOADTEST_PRESET")]
    pub preset: Option<Preset>,

    /// Rows per table
    #[arg(long, env = "LOADTEST_ROW_COUNT")]
    pub row_count: Option<u64>,

    /// Populate/verify worker containers
    #[arg(long, env = "LOADTEST_WORKERS")]
    pub workers: Option<usize>,

    /// Comma separated table names
    #[arg(long, env = "LOADTEST_TABLES", value_delimiter = ',')]
    pub tables: Option<Vec<String>>,

    /// Seconds before the run is declared timed out
    #[arg(long, env = "LOADTEST_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Seconds between status polls
    #[arg(long, env = "LOADTEST_POLL_INTERVAL")]
    pub poll_interval: Option<u64>,

    /// Directory for metrics, logs and (by default) the compose file
    #[arg(long, env = "LOADTEST_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Compose file describing the workload
    #[arg(long, env = "LOADTEST_COMPOSE_FILE")]
    pub compose_file: Option<PathBuf>,

    /// Compose project name, passed to docker-compose as `-p`
    #[arg(long, env = "LOADTEST_PROJECT")]
    pub project: Option<String>,

    /// Optional TOML file with any of the settings above
    #[arg(long, env = "LOADTEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip cleanup of resources left by a previous run
    #[arg(long)]
    pub skip_cleanup: bool,

    /// Tear everything down even when the run failed
    #[arg(long)]
    pub no_preserve_on_failure: bool,

    /// Commit id recorded with the metrics
    #[arg(long, env = "LOADTEST_GIT_SHA")]
    pub git_sha: Option<String>,

    /// Branch or tag recorded with the metrics
    #[arg(long, env = "LOADTEST_GIT_REF")]
    pub git_ref: Option<String>,
}

/// Settings accepted in the TOML file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub source: Option<String>,
    pub preset: Option<Preset>,
    pub row_count: Option<u64>,
    pub workers: Option<usize>,
    pub tables: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
    pub output_dir: Option<PathBuf>,
    pub compose_file: Option<PathBuf>,
    pub project: Option<String>,
    pub skip_cleanup: Option<bool>,
    pub preserve_on_failure: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Fully resolved, validated settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub source: SourceKind,
    pub preset: Preset,
    pub row_count: u64,
    pub workers: usize,
    pub tables: Vec<String>,
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub output_dir: PathBuf,
    pub compose_file: PathBuf,
    pub project: String,
    pub skip_cleanup: bool,
    pub preserve_on_failure: bool,
    /// Explicit commit id; None falls back to the local checkout
    pub git_sha: Option<String>,
    pub git_ref: Option<String>,
    pub runner_label: String,
}

impl ResolvedConfig {
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn expected_sync_containers(&self) -> usize {
        self.source.expected_sync_containers(self.table_count())
    }

    pub fn expected_topology(&self) -> ExpectedTopology {
        ExpectedTopology {
            workers: self.workers,
            sync_containers: self.expected_sync_containers(),
        }
    }

    /// Total rows across all tables
    pub fn rows_synced(&self) -> u64 {
        self.row_count * self.table_count() as u64
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.output_dir.join("metrics.json")
    }

    pub fn prometheus_path(&self) -> PathBuf {
        self.output_dir.join("metrics.prom")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.output_dir.join("logs")
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn validate_tables(tables: Vec<String>) -> Result<Vec<String>, ConfigError> {
    let tables: Vec<String> = tables.into_iter().map(|t| t.trim().to_string()).collect();

    if tables.is_empty() {
        return Err(ConfigError::Invalid("at least one table is required".to_string()));
    }
    if let Some(empty) = tables.iter().position(String::is_empty) {
        return Err(ConfigError::Invalid(format!("table #{} has an empty name", empty + 1)));
    }
    for (idx, table) in tables.iter().enumerate() {
        if tables[..idx].contains(table) {
            return Err(ConfigError::Invalid(format!("duplicate table: {}", table)));
        }
    }

    Ok(tables)
}

/// Resolve raw input into a [`ResolvedConfig`]
///
/// # Arguments
/// * `args` - Parsed flags (environment fallbacks already applied by clap)
/// * `file` - Parsed TOML file, if one was given
/// * `env` - Lookup for CI identity variables (`GITHUB_SHA`, `GITHUB_REF_NAME`, `GITHUB_RUNNER`)
///
/// # Errors
/// Unknown source, or validation failure (zero workers, zero rows, bad tables)
pub fn resolve<F>(args: RunArgs, file: FileConfig, env: F) -> Result<ResolvedConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let source: SourceKind = args
        .source
        .or(file.source)
        .as_deref()
        .unwrap_or("kafka")
        .parse()?;

    let preset = args.preset.or(file.preset).unwrap_or_default();
    let row_count = args
        .row_count
        .or(file.row_count)
        .unwrap_or_else(|| preset.row_count());
    let workers = args
        .workers
        .or(file.workers)
        .unwrap_or_else(|| preset.workers());

    if workers == 0 {
        return Err(ConfigError::Invalid("workers must be at least 1".to_string()));
    }
    if row_count == 0 {
        return Err(ConfigError::Invalid("row count must be at least 1".to_string()));
    }

    let tables = validate_tables(
        args.tables
            .or(file.tables)
            .unwrap_or_else(|| DEFAULT_TABLES.iter().map(|t| t.to_string()).collect()),
    )?;

    let timeout_secs = args
        .timeout
        .or(file.timeout_secs)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let poll_secs = args
        .poll_interval
        .or(file.poll_interval_secs)
        .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
    if poll_secs == 0 {
        return Err(ConfigError::Invalid("poll interval must be at least 1 second".to_string()));
    }

    let output_dir = args
        .output_dir
        .or(file.output_dir)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
    let compose_file = args
        .compose_file
        .or(file.compose_file)
        .unwrap_or_else(|| output_dir.join(COMPOSE_FILE_NAME));
    let project = non_empty(args.project.or(file.project))
        .unwrap_or_else(|| DEFAULT_PROJECT.to_string());

    Ok(ResolvedConfig {
        source,
        preset,
        row_count,
        workers,
        tables,
        timeout: Duration::from_secs(timeout_secs),
        poll_interval: Duration::from_secs(poll_secs),
        output_dir,
        compose_file,
        project,
        skip_cleanup: args.skip_cleanup || file.skip_cleanup.unwrap_or(false),
        preserve_on_failure: !args.no_preserve_on_failure
            && file.preserve_on_failure.unwrap_or(true),
        git_sha: non_empty(args.git_sha).or_else(|| non_empty(env("GITHUB_SHA"))),
        git_ref: non_empty(args.git_ref).or_else(|| non_empty(env("GITHUB_REF_NAME"))),
        runner_label: non_empty(env("GITHUB_RUNNER"))
            .unwrap_or_else(|| DEFAULT_RUNNER_LABEL.to_string()),
    })
}

/// Resolve from parsed flags, loading `--config` and reading the process environment
pub fn resolve_from_args(args: RunArgs) -> Result<ResolvedConfig, ConfigError> {
    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    resolve(args, file, |key| std::env::var(key).ok())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
