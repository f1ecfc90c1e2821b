use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "clipscout",
    about = "Clipscout - download, transcribe and research videos from social platforms",
    version,
    long_about = "A media-research service: submit a video URL over HTTP, poll the returned task id, \
and receive the transcript plus (for Instagram reels) comment sentiment and key talking points."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Reduce log output to warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Bind address (overrides the configured one)
        #[arg(short, long, value_name = "ADDR")]
        bind: Option<String>,

        /// Port (overrides the configured one)
        #[arg(short, long, value_name = "PORT")]
        port: Option<u16>,
    },

    /// Show or write the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// List supported platforms
    Platforms,
}
