use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "microdeploy")]
#[command(version)]
#[command(about = "Bring a single-node deployment up or tear it down through a CPI", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Set the deployment manifest, or show the current one
    Deployment {
        /// Path to the deployment manifest (YAML)
        manifest: Option<PathBuf>,
    },

    /// Create or update the deployment
    Deploy(ReleaseArgs),

    /// Delete the deployment's VM, disk and stemcell
    Delete {
        #[command(flatten)]
        release: ReleaseArgs,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the resources recorded in the deployment state
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
pub struct ReleaseArgs {
    /// CPI release tarball (.tgz)
    #[arg(value_name = "CPI_RELEASE")]
    pub cpi_release: PathBuf,
}
