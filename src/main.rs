use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clipscout::api::{ApiServer, AppState};
use clipscout::pipeline::{LiveAdapters, PipelineOrchestrator};
use clipscout::platform::Platform;
use clipscout::tasks::TaskRegistry;
use clipscout::{utils, Cli, Commands, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clipscout=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::load().await?;

    match cli.command {
        Commands::Serve { bind, port } => {
            // Check for required external tools (non-fatal; tasks report
            // their own failures if something really is missing)
            let missing_deps = utils::check_dependencies(&config).await;
            if !missing_deps.is_empty() {
                eprintln!("⚠️  Dependency check warnings:");
                for dep in missing_deps {
                    eprintln!("   • {}", dep);
                }
                eprintln!("   (Continuing anyway - tools may still be available)");
            }

            let mut config = config;
            if let Some(bind) = bind {
                config.server.bind_address = bind;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            let config = Arc::new(config);
            let registry = Arc::new(TaskRegistry::new());
            let adapters = Arc::new(LiveAdapters::from_config(&config));
            let orchestrator = Arc::new(PipelineOrchestrator::new(
                (*config).clone(),
                Arc::clone(&registry),
                adapters,
            ));

            let server = ApiServer::new(AppState::new(config, registry, orchestrator));

            let shutdown = server.cancel_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Received ctrl-c, shutting down");
                    shutdown.cancel();
                }
            });

            server.run().await?;
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                config.save().await?;
                println!("Configuration file written; edit it and restart the server.");
            }
        }
        Commands::Platforms => {
            println!("Supported platforms:");
            for platform in Platform::known() {
                println!("  • {}", platform);
            }
            println!("  • other (still downloadable via yt-dlp; no comment analysis)");
        }
    }

    Ok(())
}
