//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Resolve anime episode pages to direct download links.
///
/// Learns each streaming site's layout on first use and reuses it afterwards.
#[derive(Parser, Debug)]
#[command(name = "animedl")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/animedl/config.toml)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve one episode to a downloadable URL
    Resolve(ResolveArgs),

    /// Print the provider each URL belongs to
    Classify {
        /// URLs to classify
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// List learned navigation patterns
    Patterns {
        /// Only show patterns for this site name or template
        #[arg(long)]
        site: Option<String>,
    },
}

/// Arguments for `animedl resolve`.
#[derive(clap::Args, Debug)]
pub struct ResolveArgs {
    /// Configured site name, or an episode URL template containing {episode}
    #[arg(short, long)]
    pub site: String,

    /// Show slug as it appears in the site's URLs
    #[arg(long)]
    pub show: String,

    /// Episode number
    #[arg(short, long)]
    pub episode: String,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}
