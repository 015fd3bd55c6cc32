//! Orchestrates application startup and component lifecycle.
//!
//! This library crate initializes configuration and concurrently runs the
//! primary services (SMTP, health check). It ensures that if either
//! essential service terminates unexpectedly, the entire application shuts
//! down with an error.

pub mod smtp;
pub mod webhook;
pub mod config;
pub mod health;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use log::{error, info};
use tokio::select;

use smtp::{EmailSink, Envelope, ServerSettings};
use webhook::WebhookSink;

/// Dispatches envelope delivery to whichever concrete sink the configuration
/// selected, without requiring `EmailSink` to be object-safe.
enum AnySink {
    Webhook(WebhookSink),
    Logging(smtp::sink::LoggingSink),
}

#[async_trait]
impl EmailSink for AnySink {
    async fn deliver(&self, envelope: Envelope) -> Result<()> {
        match self {
            AnySink::Webhook(sink) => sink.deliver(envelope).await,
            AnySink::Logging(sink) => sink.deliver(envelope).await,
        }
    }
}

/// Runs the main application logic.
///
/// Initializes and launches the SMTP and health check servers in separate
/// asynchronous tasks, then monitors them with `tokio::select!`. This
/// function only returns if configuration loading fails or if either server
/// task terminates, which for a long-running service is always an error
/// condition.
pub async fn run() -> Result<()> {
    info!(
        "Starting {} v{} inbound-SMTP server",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let config = match config::Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    let sink = match &config.webhook_url {
        Some(url) => AnySink::Webhook(WebhookSink::new(url.clone())),
        None => AnySink::Logging(smtp::sink::LoggingSink::default()),
    };

    let settings = ServerSettings {
        bind_address: config.smtp_host.clone(),
        port: config.smtp_port,
        server_name: config.server_name.clone(),
        max_line_len: config.max_line_len,
        max_data_bytes: config.max_data_bytes,
        read_timeout: Duration::from_secs(config.read_timeout_secs),
    };

    let smtp_server = smtp::Server::new(settings, Arc::new(sink));
    let health_config = config.clone();

    let health_handle = tokio::spawn(async move {
        if let Err(e) = health::run_health_server(health_config).await {
            error!("Health check server encountered a fatal error: {}", e);
            Err(e)
        } else {
            Ok(())
        }
    });

    let smtp_handle = tokio::spawn(async move {
        if let Err(e) = smtp_server.run().await {
            error!("SMTP server encountered a fatal error: {}", e);
            Err(e)
        } else {
            Ok(())
        }
    });

    select! {
        res = health_handle => {
            error!("Health check server task terminated.");
            match res {
                Ok(Ok(())) => {
                    Err(anyhow::anyhow!("Health check server exited cleanly, which is unexpected."))
                }
                Ok(Err(e)) => {
                    error!("Health check server returned error: {}", e);
                    Err(e)
                }
                Err(join_error) => {
                    error!("Health check server task failed (panic or cancellation): {}", join_error);
                    Err(anyhow::anyhow!("Health check server task failed: {}", join_error))
                }
            }
        },
        res = smtp_handle => {
            error!("SMTP server task terminated.");
            match res {
                Ok(Ok(())) => {
                    Err(anyhow::anyhow!("SMTP server exited cleanly, which is unexpected."))
                }
                Ok(Err(e)) => {
                    error!("SMTP server returned error: {}", e);
                    Err(e)
                }
                Err(join_error) => {
                    error!("SMTP server task failed (panic or cancellation): {}", join_error);
                    Err(anyhow::anyhow!("SMTP server task failed: {}", join_error))
                }
            }
        },
    }
}
