//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{ConfigOverrides, Mount};

#[derive(Parser)]
#[command(name = "snaketron-ctl")]
#[command(author, version, long_about = None)]
#[command(about = "Build and run the snaketron container with X11 display forwarding")]
pub struct Args {
    #[command(subcommand)]
    pub command: SubCommand,

    /// Configuration file (defaults to ./snaketron.toml when present)
    #[arg(long, global = true, env = "SNAKETRON_CONFIG")]
    pub config: Option<PathBuf>,

    /// Image name of the build artifact
    #[arg(long, global = true, env = "SNAKETRON_IMAGE")]
    pub image: Option<String>,

    /// Build context directory
    #[arg(long, global = true)]
    pub context: Option<PathBuf>,

    /// Build definition (relative to the context)
    #[arg(long, global = true)]
    pub dockerfile: Option<PathBuf>,

    /// Container runtime binary (docker, podman)
    #[arg(long, global = true, env = "SNAKETRON_RUNTIME")]
    pub runtime: Option<String>,

    /// Existence marker file (relative to the context)
    #[arg(long, global = true)]
    pub marker: Option<PathBuf>,

    /// Print runtime commands instead of executing them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Output format as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum SubCommand {
    /// Build the image unless it is already built from the current Dockerfile
    Build {
        /// Rebuild even if the marker says the image is up to date
        #[arg(long)]
        force: bool,
    },

    /// Build if needed, then run the container in the foreground
    Run {
        /// Rebuild even if the marker says the image is up to date
        #[arg(long)]
        force: bool,

        /// Host source directory to mount for live editing
        #[arg(long)]
        source: Option<PathBuf>,

        /// Extra bind mount in the form HOST:CONTAINER[:MODE]
        #[arg(long = "mount", value_name = "HOST:CONTAINER[:MODE]")]
        mounts: Vec<Mount>,

        /// Command to run instead of the image entrypoint
        #[arg(last = true)]
        command: Vec<String>,
    },

    /// Remove containers derived from the image, the image and the marker
    Clean,

    /// Show whether the image is built and up to date
    Status,
}

impl Args {
    /// Flags that override the configuration file
    pub fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides {
            image: self.image.clone(),
            context: self.context.clone(),
            dockerfile: self.dockerfile.clone(),
            runtime: self.runtime.clone(),
            marker: self.marker.clone(),
            ..Default::default()
        };

        if let SubCommand::Run {
            source,
            mounts,
            command,
            ..
        } = &self.command
        {
            overrides.source = source.clone();
            overrides.mounts = mounts.clone();
            overrides.command = command.clone();
        }

        overrides
    }
}
