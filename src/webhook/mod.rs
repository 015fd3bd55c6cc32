//! Forwards completed envelopes to a configured webhook URL via HTTPS POST.
//!
//! This is the natural, but not required, concrete [`EmailSink`]: the core
//! SMTP engine only depends on the trait. `WebhookSink` uses `hyper` and
//! `hyper-rustls` for the HTTP/S client, and `mailparse`/`html2text` (via
//! [`email_parser`]) to shape the outgoing payload from the raw DATA body.

mod email_parser;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::Request;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::smtp::{EmailSink, Envelope};

type HttpsConn = hyper_rustls::HttpsConnector<HttpConnector>;
type WebhookHttpClient = Client<HttpsConn, Full<Bytes>>;

/// The JSON payload POSTed to the webhook URL for each delivered envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailPayload {
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_body: Option<String>,
}

/// A sink that POSTs each envelope to a configured webhook URL as JSON.
pub struct WebhookSink {
    webhook_url: String,
    client: WebhookHttpClient,
    user_agent: String,
}

impl WebhookSink {
    /// Creates a new `WebhookSink` targeting `webhook_url`.
    ///
    /// # Panics
    ///
    /// Panics if loading the system's native root TLS certificates fails,
    /// considered a fatal startup error, matching the rest of this crate's
    /// policy of failing fast on unusable configuration.
    pub fn new(webhook_url: String) -> Self {
        let https = HttpsConnectorBuilder::new()
            .with_native_roots()
            .expect("failed to load native root certificates for the webhook client")
            .https_only()
            .enable_http1()
            .build();

        let client: WebhookHttpClient = Client::builder(TokioExecutor::new()).build(https);
        let user_agent = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

        WebhookSink { webhook_url, client, user_agent }
    }
}

#[async_trait]
impl EmailSink for WebhookSink {
    /// Serializes the envelope as JSON and POSTs it to the webhook URL.
    ///
    /// A non-success HTTP status from the webhook endpoint is logged but
    /// does not cause this to return an `Err` (the envelope was already
    /// accepted by the SMTP engine before this is invoked, §4.5). Only
    /// failures to build or send the request at all are propagated.
    async fn deliver(&self, envelope: Envelope) -> Result<()> {
        let parsed = email_parser::parse(&envelope.body)?;

        let payload = EmailPayload {
            sender: envelope.mail_from.clone(),
            recipients: envelope.recipients,
            subject: parsed.subject,
            body: parsed.body,
            html_body: parsed.html_body,
        };

        info!(
            "Forwarding email from {} with subject: {}",
            payload.sender, payload.subject
        );

        let json_body = serde_json::to_string(&payload)?;

        let request = Request::builder()
            .method(hyper::Method::POST)
            .uri(&self.webhook_url)
            .header("content-type", "application/json")
            .header("user-agent", &self.user_agent)
            .body(Full::new(Bytes::from(json_body)))?;

        let response = self.client.request(request).await?;

        let status = response.status();
        if !status.is_success() {
            error!("Webhook request to {} failed with status: {}", self.webhook_url, status);
        } else {
            info!("Email forwarded to webhook {}, status: {}", self.webhook_url, status);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
