//! CLI command definitions for shellgate.

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server for the browser shell client
    Serve {
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run one command through the session (shares the stored working directory)
    Exec {
        /// Shell command line, passed to the shell verbatim
        command: String,
    },

    /// List autocomplete matches for a partial token
    Hint {
        /// Partial token to complete
        value: String,

        /// "binary" searches executables on the path, "file" lists the current directory
        #[arg(long, default_value = "binary")]
        kind: String,
    },

    /// Show recently executed commands for the configured caller
    History {
        /// Limit number of results
        #[arg(long, short = 'n', default_value_t = 20)]
        limit: usize,
    },

    /// Clear the stored working directory for the configured caller
    Reset,
}
