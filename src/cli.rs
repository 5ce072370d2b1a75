/// CLI argument parsing

use clap::{Parser, Subcommand};

// Build timestamp injected at compile time
pub const VERSION_WITH_BUILD: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (built: ",
    env!("BUILD_TIMESTAMP"),
    ")"
);

#[derive(Parser)]
#[command(name = "dockwatch")]
#[command(author, version = VERSION_WITH_BUILD, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show container status
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Start a container
    Start {
        /// Container to start
        name: String,
    },

    /// Stop a container
    Stop {
        /// Container to stop
        name: String,
    },

    /// Restart a container
    Restart {
        /// Container to restart
        name: String,
    },

    /// Force-remove a container
    Remove {
        /// Container to remove
        name: String,
    },

    /// View the most recent log lines of a container
    Logs {
        /// Container name
        name: String,

        /// Number of lines to show
        #[arg(short = 'n', long, default_value = "50")]
        tail: usize,
    },

    /// Rebuild a compose service and bring it back up
    Rebuild {
        /// Container (or compose service) to rebuild
        name: String,
    },
}
