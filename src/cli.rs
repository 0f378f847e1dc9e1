//! Command-line interface definitions using clap
//!
//! This module defines the CLI structure for linkcycle using clap's derive macros.

use clap::{Parser, Subcommand, ValueEnum};

use crate::scheduler::JobKind;

/// linkcycle - link lifecycle and quota engine
#[derive(Parser)]
#[command(name = "linkcycle")]
#[command(version)]
#[command(about = "Expire, evict and purge short links on a schedule", long_about = None)]
pub struct Cli {
    /// Configuration file (default: config.toml)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run lifecycle jobs
    Jobs {
        #[command(subcommand)]
        action: JobCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum JobCommands {
    /// Run one job once and print its JSON report
    Run {
        #[arg(value_enum)]
        job: JobArg,
    },

    /// Run all jobs on their configured intervals until Ctrl-C
    Serve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum JobArg {
    /// Archive links whose remove_at has passed
    Expire,
    /// Archive links over the owner's role caps
    EnforceQuota,
    /// Permanently delete archived links past retention
    PurgeArchive,
}

impl From<JobArg> for JobKind {
    fn from(arg: JobArg) -> Self {
        match arg {
            JobArg::Expire => JobKind::ExpireLinks,
            JobArg::EnforceQuota => JobKind::EnforceQuota,
            JobArg::PurgeArchive => JobKind::PurgeArchive,
        }
    }
}

/// Configuration management commands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Generate {
        /// Output path (default: config.example.toml)
        output_path: Option<String>,

        /// Force overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
