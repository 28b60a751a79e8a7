//! Wayfinder host
//!
//! Runs the background service behind a line-delimited JSON protocol on
//! stdin/stdout. The browser-side shim forwards runtime messages, port
//! traffic and tab events here and carries out the `tab_action` and
//! `open_tab` lines it gets back.

mod executor;
mod protocol;
mod state;

use anyhow::Context as _;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use wayfinder_core::Config;

use protocol::Outbound;
use state::HostState;

const DATA_DIR_ENV: &str = "WAYFINDER_DATA_DIR";
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    wayfinder_core::init_logging();

    let config = match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) => Config::new(PathBuf::from(dir)),
        None => Config::default(),
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_lines(rx));

    let host = HostState::new(config, tx).context("Failed to start background service")?;
    host.initialize()
        .await
        .context("Failed to initialize settings")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }

        match protocol::parse_line(&line) {
            Ok(inbound) => {
                host.dispatch(inbound);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Malformed line");
                if let Some(reply) = protocol::malformed_response(&line, &e) {
                    host.reply(reply);
                }
            }
        }
    }

    host.shutdown();
    drop(host);

    // In-flight answers may still hold the output channel
    match tokio::time::timeout(DRAIN_TIMEOUT, writer).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "Failed writing to stdout"),
        Ok(Err(e)) => tracing::error!(error = %e, "Output task panicked"),
        Err(_) => tracing::warn!("Output not drained before exit"),
    }

    Ok(())
}

async fn write_lines(mut rx: mpsc::UnboundedReceiver<Outbound>) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();

    while let Some(message) = rx.recv().await {
        let mut line = protocol::encode(&message)?;
        line.push('\n');
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await?;
    }

    Ok(())
}
