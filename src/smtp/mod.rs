//! Binds the SMTP listening socket and drives one session per accepted
//! connection. Each connection gets its own [`protocol::SmtpConnection`]
//! (command parsing + state machine) and, on a completed DATA, hands the
//! resulting envelope to the shared sink.

pub mod command;
pub mod protocol;
pub mod response;
pub mod session;
pub mod sink;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{error, info, trace, warn};
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

pub use protocol::{Outcome, SmtpConnection};
pub use session::{Envelope, Phase, Session};
pub use sink::EmailSink;

/// Runtime settings the listener and per-connection driver need. Populated
/// from [`crate::config::Config`] by the caller.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub bind_address: String,
    pub port: u16,
    pub server_name: String,
    pub max_line_len: usize,
    pub max_data_bytes: usize,
    pub read_timeout: Duration,
}

/// The SMTP listener (C6). Generic over the sink so the core never depends
/// on a concrete delivery mechanism.
pub struct Server<S: EmailSink + 'static> {
    settings: ServerSettings,
    sink: Arc<S>,
}

impl<S: EmailSink + 'static> Server<S> {
    pub fn new(settings: ServerSettings, sink: Arc<S>) -> Self {
        Server { settings, sink }
    }

    /// Binds the configured address and accepts connections forever, each
    /// on its own task. Returns only if the initial bind fails; errors
    /// accepting an individual connection are logged and do not stop the
    /// loop (§6 listener, C6).
    pub async fn run(&self) -> Result<()> {
        let addr = format!("{}:{}", self.settings.bind_address, self.settings.port);
        let listener = TcpListener::bind(&addr).await?;
        info!("SMTP server listening on {}", addr);

        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    info!("New connection from: {}", peer_addr);
                    let sink = Arc::clone(&self.sink);
                    let settings = self.settings.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer_addr, settings, sink).await {
                            error!("Error handling SMTP connection from {}: {:#}", peer_addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}

/// Renders a remote address as the dotted-quad or bracketed literal used in
/// the HELO greeting reply.
fn peer_literal(peer_addr: SocketAddr) -> String {
    match peer_addr.ip() {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{}]", v6),
    }
}

/// Drives a single accepted connection end to end: greeting, command loop,
/// and delivery to the sink on each completed DATA.
async fn handle_connection<S: EmailSink>(
    stream: TcpStream,
    peer_addr: SocketAddr,
    settings: ServerSettings,
    sink: Arc<S>,
) -> Result<()> {
    let (read_half, write_half) = stream.into_split();
    let mut connection = SmtpConnection::new(
        BufReader::new(read_half),
        write_half,
        peer_literal(peer_addr),
        settings.server_name.clone(),
    )
    .with_limits(settings.max_line_len, settings.max_data_bytes);

    connection.send_greeting().await?;

    loop {
        let line = match timeout(settings.read_timeout, connection.read_line()).await {
            Ok(Ok(Some(line))) => line,
            Ok(Ok(None)) => {
                info!("Connection closed by client (EOF) from {}", peer_addr);
                break;
            }
            Ok(Err(e)) => {
                warn!("Transport error on connection from {}: {}", peer_addr, e);
                break;
            }
            Err(_) => {
                warn!("Read timeout on connection from {}; closing without a farewell", peer_addr);
                break;
            }
        };
        trace!("SMTP({:?}) from {}: {:?}", connection.phase(), peer_addr, line);

        match connection.process_line(&line).await? {
            Outcome::Continue => {}
            Outcome::Quit => break,
            Outcome::Delivered(envelope) => {
                let sender = envelope.mail_from.clone();
                if let Err(e) = sink.deliver(envelope).await {
                    error!("Sink failed to deliver envelope from {}: {:#}", sender, e);
                }
            }
        }
    }

    info!("Closing connection from {}", peer_addr);
    Ok(())
}
