// Entrypoint for the CLI application.
// - Keeps `main` small: parse arguments, load the client configuration,
//   build the upload options and hand everything to the orchestrator.
// - Returns `anyhow::Result` so any failure exits non-zero.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use gyz::api::GyazoClient;
use gyz::cli::Cli;
use gyz::config::ClientConfig;
use gyz::option::{self, OptionSource};
use gyz::ui::{SpinnerProgress, TerminalPrompt};
use gyz::{init_tracing, upload};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    // Log lines go through the spinners so the two never interleave.
    let progress = Arc::new(SpinnerProgress::new());
    init_tracing(cli.quiet, progress.log_writer());

    // Refuse to do anything without a token.
    let config = ClientConfig::from_env()?;
    let client = Arc::new(GyazoClient::new(&config)?);
    tracing::debug!(endpoint = client.upload_url(), "client ready");

    let args = cli.into_upload_args();
    let source = if args.interactive {
        OptionSource::Interactive(&TerminalPrompt)
    } else {
        OptionSource::Flags(args.flag_values())
    };
    let option = option::build(source).context("Failed to build upload options")?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling uploads");
            on_interrupt.cancel();
        }
    });

    let report = upload::run(
        &args.paths,
        option,
        args.parallel,
        client,
        progress,
        cancel,
    )
    .await?;

    tracing::info!(uploaded = report.total(), "all uploads finished");
    Ok(())
}
