//! The per-connection data model: the session's current phase and the
//! envelope (sender, recipients, body) accumulated while it is in flight.
//!
//! This module holds state only. Reading bytes, parsing commands, and
//! writing responses live in [`crate::smtp::protocol`]; dispatch logic that
//! matches `(Phase, Command)` lives in [`crate::smtp::protocol`] as well, and
//! mutates a `Session` through the methods defined here.

/// The six legal-command phases of an SMTP conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Before any HELO. Freshly accepted connection.
    Fresh,
    /// HELO has been accepted.
    Greeted,
    /// MAIL FROM has been accepted; no recipients yet.
    EnvelopeOpen,
    /// At least one RCPT TO has been accepted.
    CollectingRecipients,
    /// DATA has been accepted; body lines are being collected.
    ReceivingData,
    /// QUIT has been processed; the session is done.
    Closed,
}

/// A completed envelope, handed to the sink exactly once per successful DATA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub mail_from: String,
    pub recipients: Vec<String>,
    pub body: String,
}

/// Per-connection state. Owned exclusively by the task driving that
/// connection; never shared or mutated from elsewhere.
#[derive(Debug)]
pub struct Session {
    /// Dotted-quad or bracketed literal of the remote endpoint, used in the
    /// HELO greeting reply.
    pub peer_host_literal: String,
    pub phase: Phase,
    /// Monotone: once true, never cleared by RSET.
    helo_seen: bool,
    mail_from: Option<String>,
    recipients: Vec<String>,
    data_buffer: String,
}

impl Session {
    pub fn new(peer_host_literal: String) -> Self {
        Session {
            peer_host_literal,
            phase: Phase::Fresh,
            helo_seen: false,
            mail_from: None,
            recipients: Vec::new(),
            data_buffer: String::new(),
        }
    }

    pub fn helo_seen(&self) -> bool {
        self.helo_seen
    }

    /// Bytes accumulated in the DATA buffer so far.
    pub fn data_len(&self) -> usize {
        self.data_buffer.len()
    }

    /// Records a successful HELO. Idempotent only in the sense that callers
    /// already reject a second HELO before reaching here (§4.4 duplicate-HELO
    /// rule); this just performs the transition.
    pub fn accept_helo(&mut self) {
        self.helo_seen = true;
        self.phase = Phase::Greeted;
    }

    /// Records a successful MAIL FROM, opening a new envelope.
    pub fn accept_mail(&mut self, from: String) {
        debug_assert!(self.mail_from.is_none());
        self.mail_from = Some(from);
        self.phase = Phase::EnvelopeOpen;
    }

    /// Records a successful RCPT TO.
    pub fn accept_rcpt(&mut self, to: String) {
        self.recipients.push(to);
        self.phase = Phase::CollectingRecipients;
    }

    /// Transitions into the DATA body-collection phase. Requires at least
    /// one recipient (invariant 2 in the data model).
    pub fn accept_data_start(&mut self) {
        debug_assert!(!self.recipients.is_empty());
        self.phase = Phase::ReceivingData;
    }

    /// Appends one already-unstuffed line of DATA body content.
    pub fn push_data_line(&mut self, line: &str) {
        self.data_buffer.push_str(line);
        self.data_buffer.push_str("\r\n");
    }

    /// Completes the in-flight envelope and resets session state back to the
    /// pre-envelope phase (invariant 3). Returns the completed envelope.
    pub fn finish_envelope(&mut self) -> Envelope {
        let envelope = Envelope {
            mail_from: self.mail_from.take().unwrap_or_default(),
            recipients: std::mem::take(&mut self.recipients),
            body: std::mem::take(&mut self.data_buffer),
        };
        self.phase = self.post_envelope_phase();
        envelope
    }

    /// RSET: discards any in-flight envelope without delivering it (invariant
    /// 3), but never clears `helo_seen` (invariant 4).
    pub fn reset(&mut self) {
        self.mail_from = None;
        self.recipients.clear();
        self.data_buffer.clear();
        self.phase = self.post_envelope_phase();
    }

    pub fn close(&mut self) {
        self.phase = Phase::Closed;
    }

    fn post_envelope_phase(&self) -> Phase {
        if self.helo_seen {
            Phase::Greeted
        } else {
            Phase::Fresh
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_has_no_envelope() {
        let session = Session::new("127.0.0.1".to_string());
        assert_eq!(session.phase, Phase::Fresh);
        assert!(!session.helo_seen());
    }

    #[test]
    fn helo_is_monotone_across_reset() {
        let mut session = Session::new("127.0.0.1".to_string());
        session.accept_helo();
        assert!(session.helo_seen());
        session.accept_mail("a@x".to_string());
        session.reset();
        assert!(session.helo_seen(), "RSET must not clear helo_seen");
        assert_eq!(session.phase, Phase::Greeted);
    }

    #[test]
    fn reset_without_helo_returns_to_fresh() {
        let mut session = Session::new("127.0.0.1".to_string());
        session.accept_mail("a@x".to_string());
        session.reset();
        assert_eq!(session.phase, Phase::Fresh);
    }

    #[test]
    fn finish_envelope_resets_and_returns_accumulated_data() {
        let mut session = Session::new("127.0.0.1".to_string());
        session.accept_helo();
        session.accept_mail("a@x".to_string());
        session.accept_rcpt("b@x".to_string());
        session.accept_data_start();
        session.push_data_line("hello");
        let envelope = session.finish_envelope();

        assert_eq!(envelope.mail_from, "a@x");
        assert_eq!(envelope.recipients, vec!["b@x".to_string()]);
        assert_eq!(envelope.body, "hello\r\n");
        assert_eq!(session.phase, Phase::Greeted);
    }

    #[test]
    fn finish_envelope_then_mail_again_succeeds() {
        let mut session = Session::new("127.0.0.1".to_string());
        session.accept_mail("a@x".to_string());
        session.accept_rcpt("b@x".to_string());
        session.accept_data_start();
        session.finish_envelope();

        // The envelope-reset property: MAIL is legal again immediately.
        session.accept_mail("c@y".to_string());
        assert_eq!(session.phase, Phase::EnvelopeOpen);
    }
}
