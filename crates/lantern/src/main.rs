//! Lantern CLI binary.
//!
//! This binary provides command-line access to Lantern's functionality:
//! - Probe servers and manage their models
//! - Generate, chat and embed directly against a server
//! - Run jobs through the priority queue

use clap::Parser;
use lantern::observability::{LoggingConfig, init_logging};
use lantern::{InferenceService, LanternConfig};

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{Cli, handle_command};

    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize tracing
    let mut logging = LoggingConfig::new().with_json_logs(cli.json_logs);
    if cli.verbose {
        logging = logging.with_log_level("debug");
    }
    init_logging(logging)?;

    let config = match &cli.config {
        Some(path) => LanternConfig::from_file(path)?,
        None => LanternConfig::load()?,
    };
    let service = InferenceService::new(config)?;

    let outcome = handle_command(&service, cli.server.as_deref(), cli.command).await;
    service.shutdown().await;
    outcome
}
