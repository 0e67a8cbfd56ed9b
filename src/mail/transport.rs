//! Mail transport seam and its SMTP implementation.
//!
//! The dispatcher only talks to [`Connector`] and [`MailTransport`]; tests
//! swap in a scripted transport. [`SmtpConnector`] drives lettre's low-level
//! `SmtpConnection` so every protocol step can be classified on its own.

use std::time::Duration;

use lettre::address::Envelope;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{SmtpConnection, TlsParameters};
use lettre::transport::smtp::extension::ClientId;
use tracing::debug;

/// Failures reported by a transport, already sorted by protocol stage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("server does not support STARTTLS")]
    UpgradeNotSupported,

    #[error("server refused STARTTLS: {0}")]
    UpgradeRejected(String),

    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    #[error("sender refused: {0}")]
    SenderRefused(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("{0}")]
    Other(String),
}

/// One open mail session.
pub trait MailTransport: Send {
    /// Try to upgrade the channel with STARTTLS.
    fn upgrade(&mut self) -> Result<(), TransportError>;

    fn login(&mut self, username: &str, password: &str) -> Result<(), TransportError>;

    fn send(&mut self, envelope: &Envelope, message: &[u8]) -> Result<(), TransportError>;

    /// End the session. Called exactly once per opened transport.
    fn close(&mut self);
}

/// Opens mail sessions.
pub trait Connector: Send + Sync {
    fn connect(&self, host: &str, port: u16) -> Result<Box<dyn MailTransport>, TransportError>;
}

// ── Classification ──────────────────────────────────────────────────

/// Map a failed STARTTLS exchange to a transport error.
///
/// A reply from the server means it declined the upgrade and the session is
/// still usable; no reply means the connection itself broke.
pub fn classify_upgrade_failure(code: Option<u16>, message: String) -> TransportError {
    match code {
        Some(_) => TransportError::UpgradeRejected(message),
        None => TransportError::Other(message),
    }
}

/// Map a failed AUTH exchange to a transport error.
///
/// A permanent (5xx) or 454 reply means the server refused the credentials;
/// anything else is a transport problem.
pub fn classify_auth_failure(code: Option<u16>, message: String) -> TransportError {
    match code {
        Some(454) => TransportError::AuthRejected(message),
        Some(c) if (500..600).contains(&c) => TransportError::AuthRejected(message),
        _ => TransportError::Other(message),
    }
}

/// Map a failed MAIL FROM / RCPT / DATA exchange to a transport error.
pub fn classify_send_failure(code: Option<u16>, message: String) -> TransportError {
    let mentions_sender = {
        let lower = message.to_ascii_lowercase();
        lower.contains("sender") || lower.contains("mail from")
    };
    match code {
        Some(553) => TransportError::SenderRefused(message),
        Some(550 | 551 | 554 | 555) if mentions_sender => TransportError::SenderRefused(message),
        _ => TransportError::Other(message),
    }
}

fn reply_code(err: &lettre::transport::smtp::Error) -> Option<u16> {
    err.status().and_then(|code| code.to_string().parse().ok())
}

// ── SMTP over lettre ────────────────────────────────────────────────

/// Connects over implicit TLS (SMTPS).
#[derive(Debug, Clone)]
pub struct SmtpConnector {
    timeout: Duration,
}

impl SmtpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Connector for SmtpConnector {
    fn connect(&self, host: &str, port: u16) -> Result<Box<dyn MailTransport>, TransportError> {
        let tls = TlsParameters::new(host.to_string())
            .map_err(|e| TransportError::Connect(format!("TLS setup for {host}: {e}")))?;
        let hello = ClientId::Domain("localhost".to_string());

        let conn = SmtpConnection::connect(
            (host, port),
            Some(self.timeout),
            &hello,
            Some(&tls),
            None,
        )
        .map_err(|e| TransportError::Connect(format!("{host}:{port}: {e}")))?;

        debug!(host, port, "SMTP connection established");
        Ok(Box::new(SmtpSession { conn, tls, hello }))
    }
}

struct SmtpSession {
    conn: SmtpConnection,
    tls: TlsParameters,
    hello: ClientId,
}

impl MailTransport for SmtpSession {
    fn upgrade(&mut self) -> Result<(), TransportError> {
        // `connect` already greeted the server, so its EHLO capabilities are known.
        if !self.conn.can_starttls() {
            return Err(TransportError::UpgradeNotSupported);
        }
        self.conn
            .starttls(&self.tls, &self.hello)
            .map_err(|e| classify_upgrade_failure(reply_code(&e), format!("STARTTLS failed: {e}")))
    }

    fn login(&mut self, username: &str, password: &str) -> Result<(), TransportError> {
        let credentials = Credentials::new(username.to_string(), password.to_string());
        self.conn
            .auth(&[Mechanism::Plain, Mechanism::Login], &credentials)
            .map(|_| ())
            .map_err(|e| classify_auth_failure(reply_code(&e), e.to_string()))
    }

    fn send(&mut self, envelope: &Envelope, message: &[u8]) -> Result<(), TransportError> {
        self.conn
            .send(envelope, message)
            .map(|_| ())
            .map_err(|e| classify_send_failure(reply_code(&e), e.to_string()))
    }

    fn close(&mut self) {
        if self.conn.quit().is_err() {
            self.conn.abort();
        }
    }
}
