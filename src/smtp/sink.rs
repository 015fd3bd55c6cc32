//! The boundary a completed envelope is handed across. The core never
//! depends on a concrete delivery mechanism; see [`crate::webhook`] for the
//! shipped webhook-forwarding implementation.

use anyhow::Result;
use async_trait::async_trait;
use log::info;

pub use crate::smtp::session::Envelope;

/// Something that can accept a completed envelope. Implementations are
/// shared across every session task (`Arc`-wrapped by the caller), so any
/// internal state must be synchronized by the implementation itself (the
/// core never holds a lock across a sink call).
#[async_trait]
pub trait EmailSink: Send + Sync {
    /// Delivers one envelope. A returned error is logged by the caller and
    /// isolated to this single envelope (§4.5): the `250 Ok` for end-of-DATA
    /// has already been sent by the time this is invoked, so delivery
    /// failures never become SMTP-level errors.
    async fn deliver(&self, envelope: Envelope) -> Result<()>;
}

/// A sink that only logs. Used when no webhook URL is configured, and in
/// tests that don't care about delivery.
#[derive(Debug, Default, Clone)]
pub struct LoggingSink;

#[async_trait]
impl EmailSink for LoggingSink {
    async fn deliver(&self, envelope: Envelope) -> Result<()> {
        info!(
            "Accepted envelope from {:?} to {:?} ({} byte body); no webhook configured, logging only",
            envelope.mail_from,
            envelope.recipients,
            envelope.body.len()
        );
        Ok(())
    }
}
