//! Torro server binary.

use clap::Parser;
use std::path::PathBuf;
use torro::config::TorroConfig;
use tracing::error;

#[derive(Parser)]
#[command(name = "torro", version, about = "Metadata catalog lineage engine")]
struct Cli {
    /// Path to a JSON configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Use the development configuration
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = if cli.dev {
        TorroConfig::development()
    } else if let Some(ref path) = cli.config {
        match TorroConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        TorroConfig::default()
    };

    if let Err(e) = torro::observability::init(&config.observability) {
        eprintln!("Failed to initialize observability: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = torro::run(config).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
