//! # chirp-relay
//!
//! Relay server binary — loads configuration, initializes tracing, and
//! starts the HTTP/WebSocket server around the stream relay.

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use chirp_server::{RelayConfig, RelayServer};
use chirp_stream::{FieldSelection, StreamOptions};

/// Resilient server-push stream relay.
#[derive(Parser, Debug)]
#[command(name = "chirp-relay", about = "Resilient server-push stream relay")]
struct Cli {
    /// Host to bind (overrides the HOST environment variable).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides the PORT environment variable).
    #[arg(long)]
    port: Option<u16>,
}

/// The fields and expansions requested from the upstream stream.
fn default_stream_options() -> StreamOptions {
    StreamOptions {
        expansions: vec!["author_id".into()],
        media: FieldSelection {
            fields: vec![
                "height".into(),
                "width".into(),
                "preview_image_url".into(),
                "type".into(),
                "url".into(),
            ],
        },
        tweet: FieldSelection {
            fields: vec![
                "attachments".into(),
                "author_id".into(),
                "created_at".into(),
                "id".into(),
                "text".into(),
            ],
        },
        user: FieldSelection {
            fields: vec![
                "created_at".into(),
                "id".into(),
                "profile_image_url".into(),
                "url".into(),
                "username".into(),
                "verified".into(),
            ],
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = RelayConfig::from_env().context("loading configuration")?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    let server = RelayServer::new(config.clone());
    server.relay().set_stream_options(default_stream_options());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "started");
    axum::serve(listener, server.router())
        .await
        .context("server error")?;
    Ok(())
}
