//! CLI definitions for mtaops.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// mtaops CLI.
#[derive(Parser)]
#[command(name = "mtaops")]
#[command(about = "Operation lifecycle controller for MTA deployments")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/mtaops.toml", global = true, env = "MTAOPS_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the cleanup scheduler until interrupted (default)
    Run,

    /// Run the cleanup chain once now
    Cleanup {
        /// Override the configured retention window
        #[arg(long)]
        retention_days: Option<u32>,
    },

    /// Dispatch one action on an operation
    Action {
        /// Action id: start, resume, retry or abort
        action: String,

        /// Root process id of the operation
        process_id: String,

        /// User the action runs on behalf of
        #[arg(long, env = "MTAOPS_USER")]
        user: String,
    },

    /// Start a new operation in the process engine
    Launch {
        /// Process type: DEPLOY, BLUE_GREEN_DEPLOY, UNDEPLOY or CTS_DEPLOY
        process_type: String,

        /// Target space
        #[arg(long)]
        space: String,

        /// User the operation runs on behalf of
        #[arg(long, env = "MTAOPS_USER")]
        user: String,

        /// MTA identity, used for conflict detection
        #[arg(long)]
        mta_id: Option<String>,

        #[arg(long)]
        namespace: Option<String>,

        /// Extra process variable as KEY=VALUE (repeatable)
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<(String, String)>,
    },

    /// Record a lifecycle signal reported by the process engine
    Signal {
        /// Root process id of the operation
        process_id: String,

        signal: EngineSignal,

        /// The failure was caused by deployment content (with `failed`)
        #[arg(long)]
        content_error: bool,
    },

    /// List operations as JSON lines
    Operations {
        /// Only operations in this state (e.g. RUNNING, ERROR)
        #[arg(long)]
        state: Option<String>,

        /// Maximum number of operations to print
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

/// Engine lifecycle signals accepted by `signal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum EngineSignal {
    /// The process parked at a wait point
    WaitPoint,
    Finished,
    Failed,
}

/// Parse a `KEY=VALUE` pair.
fn parse_var(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}
