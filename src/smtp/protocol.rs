//! Drives one session's conversation: reads command-mode lines and DATA
//! body lines off a buffered reader, dispatches them against the current
//! [`Phase`] via [`command::parse`], writes the matching [`Response`], and
//! mutates the [`Session`] accordingly.
//!
//! Generic over the reader/writer types so tests can exercise it against an
//! in-memory duplex pipe instead of a real `TcpStream`.

use anyhow::{anyhow, Result};
use log::{debug, trace};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};

use crate::smtp::command::{self, Command};
use crate::smtp::response::Response;
use crate::smtp::session::{Envelope, Phase, Session};

/// Lines longer than this without a terminator are a transport failure
/// (RFC 5321 §4.5.3.1); the connection is closed without a reply rather than
/// silently truncating a line the client believes is intact.
pub const MAX_LINE_LEN: usize = 1000;

/// Total accumulated DATA body size before the session replies `552` and
/// discards the in-flight envelope (untested refinement, §5).
pub const DEFAULT_MAX_DATA_BYTES: usize = 10 * 1024 * 1024;

/// The result of feeding one line through [`SmtpConnection::process_line`].
#[derive(Debug)]
pub enum Outcome {
    /// Reply already written; keep reading lines.
    Continue,
    /// QUIT was processed and replied to; the caller should close the
    /// socket.
    Quit,
    /// DATA completed successfully; the envelope is ready for the sink.
    Delivered(Envelope),
}

/// Owns the buffered I/O halves and the session state for one connection.
pub struct SmtpConnection<R, W>
where
    R: AsyncBufReadExt + Unpin,
    W: AsyncWriteExt + Unpin,
{
    reader: R,
    writer: W,
    session: Session,
    server_name: String,
    max_line_len: usize,
    max_data_bytes: usize,
}

impl<R, W> SmtpConnection<R, W>
where
    R: AsyncBufReadExt + Unpin,
    W: AsyncWriteExt + Unpin,
{
    pub fn new(reader: R, writer: W, peer_host_literal: String, server_name: String) -> Self {
        SmtpConnection {
            reader,
            writer,
            session: Session::new(peer_host_literal),
            server_name,
            max_line_len: MAX_LINE_LEN,
            max_data_bytes: DEFAULT_MAX_DATA_BYTES,
        }
    }

    pub fn with_limits(mut self, max_line_len: usize, max_data_bytes: usize) -> Self {
        self.max_line_len = max_line_len;
        self.max_data_bytes = max_data_bytes;
        self
    }

    pub fn phase(&self) -> Phase {
        self.session.phase
    }

    /// Sends the initial `220` greeting. Must be called exactly once, before
    /// the first line is read.
    pub async fn send_greeting(&mut self) -> Result<()> {
        self.write_response(&Response::greeting(&self.server_name)).await
    }

    /// Reads one CRLF-terminated line (a bare trailing LF is tolerated too).
    /// Returns `Ok(None)` on a clean EOF (peer closed the socket).
    ///
    /// Rejects lines that exceed `max_line_len` without finding a
    /// terminator, per the documented cap in §4.1.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        let mut buffer = String::new();
        let bytes_read = (&mut self.reader)
            .take(self.max_line_len as u64 + 1)
            .read_line(&mut buffer)
            .await?;

        if bytes_read == 0 {
            return Ok(None);
        }
        if buffer.len() > self.max_line_len && !buffer.ends_with('\n') {
            return Err(anyhow!(
                "line exceeded {} byte cap without a terminator",
                self.max_line_len
            ));
        }
        let line = buffer.trim_end_matches(['\r', '\n']).to_string();
        trace!("SMTP({:?}) read: {:?}", self.session.phase, line);
        Ok(Some(line))
    }

    async fn write_response(&mut self, response: &Response) -> Result<()> {
        debug!("SMTP({:?}) write: {} {}", self.session.phase, response.code, response.text);
        self.writer.write_all(response.to_wire().as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Processes one line according to the current phase. In
    /// [`Phase::ReceivingData`] the line is body content (or the
    /// terminating dot); everywhere else it's a command.
    pub async fn process_line(&mut self, line: &str) -> Result<Outcome> {
        if self.session.phase == Phase::ReceivingData {
            return self.process_data_line(line).await;
        }

        let command = command::parse(line);
        debug!("SMTP({:?}) command: {:?}", self.session.phase, command);
        self.dispatch_command(command).await
    }

    async fn dispatch_command(&mut self, command: Command) -> Result<Outcome> {
        // Syntax checks run before state-legality checks (§4.4 tie-break).
        match command {
            Command::Quit => {
                self.write_response(&Response::quit(&self.server_name)).await?;
                self.session.close();
                return Ok(Outcome::Quit);
            }
            Command::Noop { has_args } => {
                if has_args {
                    self.write_response(&Response::noop_syntax()).await?;
                } else {
                    self.write_response(&Response::ok()).await?;
                }
                return Ok(Outcome::Continue);
            }
            Command::Rset { has_args } => {
                if has_args {
                    self.write_response(&Response::rset_syntax()).await?;
                } else {
                    self.session.reset();
                    self.write_response(&Response::ok()).await?;
                }
                return Ok(Outcome::Continue);
            }
            Command::Helo(arg) => {
                let Some(_host) = arg else {
                    self.write_response(&Response::helo_syntax()).await?;
                    return Ok(Outcome::Continue);
                };
                if self.session.helo_seen() {
                    self.write_response(&Response::duplicate_helo()).await?;
                    return Ok(Outcome::Continue);
                }
                self.session.accept_helo();
                self.write_response(&Response::helo_ok(
                    &self.server_name,
                    &self.session.peer_host_literal,
                ))
                .await?;
                return Ok(Outcome::Continue);
            }
            Command::Mail(arg) => {
                let Some(from) = arg else {
                    self.write_response(&Response::mail_syntax()).await?;
                    return Ok(Outcome::Continue);
                };
                if self.session.phase != Phase::Fresh && self.session.phase != Phase::Greeted {
                    self.write_response(&Response::nested_mail()).await?;
                    return Ok(Outcome::Continue);
                }
                self.session.accept_mail(from);
                self.write_response(&Response::ok()).await?;
                return Ok(Outcome::Continue);
            }
            Command::Rcpt(arg) => {
                let Some(to) = arg else {
                    self.write_response(&Response::rcpt_syntax()).await?;
                    return Ok(Outcome::Continue);
                };
                match self.session.phase {
                    Phase::EnvelopeOpen | Phase::CollectingRecipients => {
                        self.session.accept_rcpt(to);
                        self.write_response(&Response::ok()).await?;
                    }
                    _ => {
                        self.write_response(&Response::need_mail()).await?;
                    }
                }
                return Ok(Outcome::Continue);
            }
            Command::Data { has_args } => {
                if has_args {
                    self.write_response(&Response::data_syntax()).await?;
                    return Ok(Outcome::Continue);
                }
                if self.session.phase != Phase::CollectingRecipients {
                    self.write_response(&Response::need_rcpt()).await?;
                    return Ok(Outcome::Continue);
                }
                self.session.accept_data_start();
                self.write_response(&Response::start_data()).await?;
                return Ok(Outcome::Continue);
            }
            Command::Unknown(verb) => {
                self.write_response(&Response::unknown_command(&verb)).await?;
                return Ok(Outcome::Continue);
            }
        }
    }

    async fn process_data_line(&mut self, line: &str) -> Result<Outcome> {
        if line == "." {
            let envelope = self.session.finish_envelope();
            self.write_response(&Response::ok()).await?;
            return Ok(Outcome::Delivered(envelope));
        }

        // Dot-unstuffing: a single leading '.' on a body line is transparency
        // padding and is stripped before the body is accumulated.
        let unstuffed = line.strip_prefix('.').unwrap_or(line);

        if self.current_data_len() + unstuffed.len() + 2 > self.max_data_bytes {
            self.session.reset();
            self.write_response(&Response::data_too_large()).await?;
            return Ok(Outcome::Continue);
        }

        self.session.push_data_line(unstuffed);
        Ok(Outcome::Continue)
    }

    fn current_data_len(&self) -> usize {
        self.session.data_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, BufReader};

    fn conn(
        peer: &str,
    ) -> (
        SmtpConnection<BufReader<tokio::io::DuplexStream>, tokio::io::DuplexStream>,
        tokio::io::DuplexStream,
    ) {
        let (server_io, client_io) = duplex(4096);
        let (server_read, server_write) = tokio::io::split(server_io);
        let connection = SmtpConnection::new(
            BufReader::new(server_read),
            server_write,
            peer.to_string(),
            "test".to_string(),
        );
        (connection, client_io)
    }

    async fn read_all_available(client: &mut tokio::io::DuplexStream) -> String {
        let mut buf = vec![0u8; 4096];
        let n = client.read(&mut buf).await.unwrap();
        String::from_utf8_lossy(&buf[..n]).to_string()
    }

    #[tokio::test]
    async fn greeting_is_wire_exact() {
        let (mut c, mut client) = conn("127.0.0.1");
        c.send_greeting().await.unwrap();
        assert_eq!(read_all_available(&mut client).await, "220 test node.js SMTP server\r\n");
    }

    #[tokio::test]
    async fn helo_without_args_is_syntax_error() {
        let (mut c, mut client) = conn("127.0.0.1");
        let outcome = c.process_line("HELO").await.unwrap();
        assert!(matches!(outcome, Outcome::Continue));
        assert_eq!(read_all_available(&mut client).await, "501 Syntax: HELO hostname\r\n");
        assert_eq!(c.phase(), Phase::Fresh);
    }

    #[tokio::test]
    async fn second_helo_is_rejected() {
        let (mut c, mut client) = conn("127.0.0.1");
        c.process_line("HELO localhost").await.unwrap();
        read_all_available(&mut client).await;
        c.process_line("HELO localhost").await.unwrap();
        assert_eq!(read_all_available(&mut client).await, "503 Duplicate HELO/EHLO\r\n");
    }

    #[tokio::test]
    async fn unknown_verb_echoes_uppercase_in_quotes() {
        let (mut c, mut client) = conn("127.0.0.1");
        c.process_line("ehlo").await.unwrap();
        assert_eq!(
            read_all_available(&mut client).await,
            "502 Error: command \"EHLO\" not implemented\r\n"
        );
    }

    #[tokio::test]
    async fn rcpt_before_mail_is_need_mail() {
        let (mut c, mut client) = conn("127.0.0.1");
        c.process_line("RCPT TO:<b@x>").await.unwrap();
        assert_eq!(read_all_available(&mut client).await, "503 Error: need MAIL command\r\n");
    }

    #[tokio::test]
    async fn data_before_rcpt_is_need_rcpt() {
        let (mut c, mut client) = conn("127.0.0.1");
        c.process_line("MAIL FROM:<a@x>").await.unwrap();
        read_all_available(&mut client).await;
        c.process_line("DATA").await.unwrap();
        assert_eq!(read_all_available(&mut client).await, "503 Error: need RCPT command\r\n");
    }

    #[tokio::test]
    async fn nested_mail_is_rejected() {
        let (mut c, mut client) = conn("127.0.0.1");
        c.process_line("MAIL FROM:<a@x>").await.unwrap();
        read_all_available(&mut client).await;
        c.process_line("MAIL FROM:<a2@x>").await.unwrap();
        assert_eq!(
            read_all_available(&mut client).await,
            "503 Error: nested MAIL command\r\n"
        );
    }

    #[tokio::test]
    async fn full_transaction_delivers_envelope() {
        let (mut c, mut client) = conn("127.0.0.1");
        c.process_line("MAIL FROM:<a@x>").await.unwrap();
        assert_eq!(read_all_available(&mut client).await, "250 Ok\r\n");
        c.process_line("RCPT TO:<b@x>").await.unwrap();
        assert_eq!(read_all_available(&mut client).await, "250 Ok\r\n");
        let outcome = c.process_line("DATA").await.unwrap();
        assert!(matches!(outcome, Outcome::Continue));
        assert_eq!(
            read_all_available(&mut client).await,
            "354 End data with <CR><LF>.<CR><LF>\r\n"
        );

        c.process_line("hello").await.unwrap();
        let outcome = c.process_line(".").await.unwrap();
        assert_eq!(read_all_available(&mut client).await, "250 Ok\r\n");

        match outcome {
            Outcome::Delivered(envelope) => {
                assert_eq!(envelope.mail_from, "a@x");
                assert_eq!(envelope.recipients, vec!["b@x".to_string()]);
                assert_eq!(envelope.body, "hello\r\n");
            }
            other => panic!("expected Delivered, got {:?}", other),
        }
        assert_eq!(c.phase(), Phase::Fresh);
    }

    #[tokio::test]
    async fn dot_unstuffing_strips_single_leading_dot() {
        let (mut c, mut client) = conn("127.0.0.1");
        c.process_line("MAIL FROM:<a@x>").await.unwrap();
        read_all_available(&mut client).await;
        c.process_line("RCPT TO:<b@x>").await.unwrap();
        read_all_available(&mut client).await;
        c.process_line("DATA").await.unwrap();
        read_all_available(&mut client).await;

        c.process_line("..leading dot line").await.unwrap();
        let outcome = c.process_line(".").await.unwrap();

        match outcome {
            Outcome::Delivered(envelope) => {
                assert_eq!(envelope.body, ".leading dot line\r\n");
            }
            other => panic!("expected Delivered, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn quit_closes_session() {
        let (mut c, mut client) = conn("127.0.0.1");
        let outcome = c.process_line("QUIT whatever").await.unwrap();
        assert!(matches!(outcome, Outcome::Quit));
        assert_eq!(read_all_available(&mut client).await, "221 test closing connection\r\n");
        assert_eq!(c.phase(), Phase::Closed);
    }

    #[tokio::test]
    async fn rset_preserves_helo_seen_but_clears_envelope() {
        let (mut c, mut client) = conn("127.0.0.1");
        c.process_line("HELO localhost").await.unwrap();
        read_all_available(&mut client).await;
        c.process_line("MAIL FROM:<a@x>").await.unwrap();
        read_all_available(&mut client).await;
        c.process_line("RSET").await.unwrap();
        assert_eq!(read_all_available(&mut client).await, "250 Ok\r\n");
        assert_eq!(c.phase(), Phase::Greeted);

        // MAIL succeeds again immediately (envelope-reset property).
        c.process_line("MAIL FROM:<c@y>").await.unwrap();
        assert_eq!(read_all_available(&mut client).await, "250 Ok\r\n");
    }

    #[tokio::test]
    async fn read_line_tolerates_bare_lf() {
        let (mut c, mut client) = conn("127.0.0.1");
        client.write_all(b"NOOP\n").await.unwrap();
        let line = c.read_line().await.unwrap().unwrap();
        assert_eq!(line, "NOOP");
    }

    #[tokio::test]
    async fn read_line_returns_none_on_eof() {
        let (mut c, client) = conn("127.0.0.1");
        drop(client);
        let line = c.read_line().await.unwrap();
        assert!(line.is_none());
    }
}
