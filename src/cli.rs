use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "forgepack")]
#[command(author, version, about = "Media packaging orchestrator driving ffmpeg")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Package a source file with the selected plugins
    Run {
        /// Source media file
        #[arg(required = true)]
        input: PathBuf,

        /// Plugin to attach (repeatable). Defaults to the plugins configured
        /// under [plugins.*], or every built-in plugin.
        #[arg(short, long = "plugin")]
        plugins: Vec<String>,

        /// Build and print the command graph without running it
        #[arg(long)]
        dry_run: bool,
    },

    /// Probe a media file and display its streams
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the codecs supported by the provisioned ffmpeg
    Codecs {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the container formats supported by the provisioned ffmpeg
    Formats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve dependencies, downloading them when needed
    Provision {
        /// Dependencies to resolve (defaults to the whole manifest)
        names: Vec<String>,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Show a persisted job state file
    Status {
        /// Path to the job state file
        #[arg(required = true)]
        state_file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the registered plugins
    Plugins,

    /// Display version information
    Version,
}
