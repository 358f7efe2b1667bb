use anyhow::Result;
use clap::{Parser, Subcommand};
use hrbot::config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "hrbot")]
#[command(author, version, about = "HR assistant chatbot service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (chat API + web widget)
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Path to a config file (default: platform config dir)
        #[arg(short, long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "hrbot=debug"
    } else {
        "hrbot=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Serve { port, host, config } => {
            let mut config = match config {
                Some(path) => Config::load_from(std::path::Path::new(&path))?,
                None => Config::load()?,
            };
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }

            tracing::info!(
                "Starting HR chat server on {}:{} (model {})",
                config.server.host,
                config.server.port,
                config.gemini.model
            );
            hrbot::server::run_http_server(config).await?;
        }
    }

    Ok(())
}
