//! CP-Console: swipe cards against a central system from the terminal.
//!
//! Opens one WebSocket to the central system and feeds each stdin line to
//! the charge point as an idTag. State changes are printed as they happen.
//! The connection is never re-established; restart the tool instead.
//!
//! ## Usage
//!
//! ```bash
//! # Local SteVe instance, charge point "john"
//! cp-console
//!
//! # Another central system
//! cp-console --url ws://cs.example.com/ocpp --charge-point-id CP-42
//!
//! # More logging
//! RUST_LOG=cp_authorization=debug cp-console
//! ```

mod console;

use anyhow::{Context, Result};
use clap::Parser;
use cp_authorization::adapters::websocket_connection;
use cp_authorization::{ChargePoint, ChargePointConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tracing::info;
use tracing_subscriber::EnvFilter;

use console::{parse_command, Command};

/// Charge point authorization console
#[derive(Parser, Debug)]
#[command(name = "cp-console")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Central system WebSocket URL (without the charge point id)
    #[arg(long)]
    url: Option<String>,

    /// Charge point identity appended to the URL
    #[arg(long)]
    charge_point_id: Option<String>,

    /// WebSocket subprotocol to request
    #[arg(long)]
    subprotocol: Option<String>,
}

impl Args {
    /// Environment first, flags on top.
    fn into_config(self) -> ChargePointConfig {
        let mut config = ChargePointConfig::from_env();
        if let Some(url) = self.url {
            config.connection.central_system_url = url;
        }
        if let Some(id) = self.charge_point_id {
            config.connection.charge_point_id = id;
        }
        if let Some(subprotocol) = self.subprotocol {
            config.connection.subprotocol = subprotocol;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config = Args::parse().into_config();
    config.validate()?;

    let endpoint = config.connection.endpoint();
    let mut request = endpoint
        .as_str()
        .into_client_request()
        .with_context(|| format!("invalid endpoint {endpoint}"))?;
    request.headers_mut().insert(
        "Sec-WebSocket-Protocol",
        HeaderValue::from_str(&config.connection.subprotocol)?,
    );

    let (ws_stream, _) = connect_async(request)
        .await
        .with_context(|| format!("failed to connect to {endpoint}"))?;
    info!(%endpoint, subprotocol = %config.connection.subprotocol, "Connected to central system");

    let charge_point = ChargePoint::start(websocket_connection(ws_stream), &config)?;
    let handle = charge_point.handle();
    let mut states = handle.state_changes();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Type an idTag to swipe a card, 'state' to show the state, 'quit' to exit.");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_command(&line) {
                    Command::Swipe(id_tag) => {
                        let message_id = handle.swipe_card(id_tag).await?;
                        info!(%message_id, "Card swiped");
                    }
                    Command::ShowState => println!("state: {}", handle.state_name()),
                    Command::Quit => break,
                    Command::Nothing => {}
                }
            }
            Some(state) = states.next() => println!("state: {state}"),
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    charge_point.shutdown().await;
    Ok(())
}
