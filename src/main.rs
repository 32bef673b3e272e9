use clap::Parser;
use export_worker::api::{AppState, start_api_server};
use export_worker::{Config, Exporter, TaskManagerClient, TransferAdapter, run_with_shutdown};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(author, version, about = "Exports task outputs to a remote FTP or SFTP endpoint")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, default_value = "export-worker.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> export_worker::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    info!(
        config = %cli.config.display(),
        task_manager = %config.task_manager.base_url,
        mode = ?config.export.mode,
        "export worker starting"
    );

    let cancel = CancellationToken::new();

    let source = Arc::new(TaskManagerClient::new(&config.task_manager)?);
    let transfer = Arc::new(
        TransferAdapter::from_config(&config.transfer)?.with_cancellation(cancel.clone()),
    );
    let exporter = Arc::new(Exporter::with_cancellation(
        &config,
        source,
        transfer.clone(),
        cancel.clone(),
    ));

    let (events, queue) = tokio::sync::mpsc::channel(config.api.event_queue_capacity);
    let state = AppState::new(transfer, events, cancel.clone());

    let api = tokio::spawn(start_api_server(state, config.api.bind_address));

    let signals = tokio::spawn({
        let exporter = exporter.clone();
        async move { run_with_shutdown(&exporter).await }
    });

    exporter.run(ReceiverStream::new(queue)).await;

    // the loop also ends when the API server dies and drops the queue sender
    cancel.cancel();
    signals.abort();

    match api.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!(error = %e, "API server failed");
            return Err(e);
        }
        Err(e) => error!(error = %e, "API server task panicked"),
    }

    info!("export worker stopped");
    Ok(())
}
