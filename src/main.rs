mod cli;
mod config;
mod convert;
mod error;
mod ingest;
mod orchestrator;
mod relay;
mod scheduler;
mod state_machine;
mod store;
mod telemetry;
mod ui;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use cli::{Cli, Command};
use config::RelayConfig;
use convert::PdfRenderer;
use ingest::InboxIngestor;
use orchestrator::JobOrchestrator;
use relay::MailRelayClient;
use scheduler::Scheduler;
use store::{JsonFileStore, RecordStore};
use ui::{Console, StatusSummary};

type Relay = JobOrchestrator<JsonFileStore, PdfRenderer, MailRelayClient, InboxIngestor<JsonFileStore>>;

fn build(config: &RelayConfig) -> Result<Relay> {
    let store = Arc::new(JsonFileStore::open(&config.store_path));
    let mailer = MailRelayClient::new(&config.mail).context("building mail relay client")?;
    let ingestor = InboxIngestor::new(&config.inbox_dir, store.clone());
    Ok(JobOrchestrator::new(store, PdfRenderer::new(), mailer, ingestor))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.verbose);

    let config = RelayConfig::load_from(&cli.config)?;
    let relay = build(&config)?;
    let console = Console::default();

    match cli.command {
        Command::Serve => {
            let relay = Arc::new(relay);
            let scheduler = Scheduler::start(relay, &config.schedule).await?;
            info!(store = %config.store_path.display(), inbox = %config.inbox_dir.display(), "reportrelay running, Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
            info!("shutting down");
            scheduler.shutdown().await?;
        }
        Command::Send => {
            let report = relay.run_primary_delivery().await?;
            console.print_report(&report);
        }
        Command::Resend => {
            let report = relay.run_retry_delivery().await?;
            console.print_report(&report);
        }
        Command::Receive => {
            relay.run_ingestion().await;
        }
        Command::Status => {
            let items = relay.store().find_all()?;
            console.print_status(&StatusSummary::from_items(&items));
        }
    }

    Ok(())
}
