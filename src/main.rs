//! StudySync - study session scheduler CLI
//!
#![doc = "StudySync - study session scheduler"]
#![doc = "Main entry point for the StudySync command-line application."]

use anyhow::Result;

use studysync::cli::{Cli, Commands};
use studysync::commands::{self, AppContext};
use studysync::config::Config;
use studysync::logging::init_tracing;
use studysync::metrics::init_metrics_exporter;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    init_tracing(&config.logging)?;
    init_metrics_exporter();

    let ctx = AppContext::open(config)?;

    match cli.command {
        Commands::User { command } => {
            tracing::debug!("Starting user command");
            commands::user::handle_user(&ctx, command)
        }
        Commands::Session { command } => {
            tracing::debug!("Starting session command");
            commands::session::handle_session(&ctx, command)
        }
        Commands::Propose {
            session,
            user,
            slots,
        } => commands::schedule::run_propose(&ctx, &session, &user, &slots),
        Commands::Tally { session, json } => commands::schedule::run_tally(&ctx, &session, json),
        Commands::Finalize {
            session,
            host,
            auto,
            slot,
        } => {
            tracing::info!(session_id = %session, "Starting finalization");
            commands::schedule::run_finalize(&ctx, &session, &host, auto, slot.as_deref()).await
        }
        Commands::Resource { command } => commands::resource::handle_resource(&ctx, command),
        Commands::Feedback { command } => commands::feedback::handle_feedback(&ctx, command),
    }
}
