//! Mail dispatcher: one multipart message per batch, sent over one session.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use lettre::Message;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use secrecy::ExposeSecret;
use tracing::{debug, error, info, warn};

use crate::config::MailConfig;
use crate::error::DeliveryError;
use crate::mail::DeliveryOutcome;
use crate::mail::transport::{Connector, MailTransport, SmtpConnector, TransportError};
use crate::pipeline::ReportSink;
use crate::render::RenderedDocument;

/// Attachment file name for the `n`-th document (1-based).
pub fn attachment_name(n: usize, extension: &str) -> String {
    format!("report_{n}.{extension}")
}

impl From<TransportError> for DeliveryError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::AuthRejected(reason) => Self::AuthFailure(reason),
            TransportError::SenderRefused(reason) => Self::SenderRejected(reason),
            other => Self::Unexpected(other.to_string()),
        }
    }
}

/// Sends finished batches to the configured recipients.
#[derive(Clone)]
pub struct MailDispatcher {
    config: MailConfig,
    connector: Arc<dyn Connector>,
}

impl MailDispatcher {
    pub fn new(config: MailConfig, connector: Arc<dyn Connector>) -> Self {
        Self { config, connector }
    }

    /// Dispatcher speaking SMTP over implicit TLS.
    pub fn smtp(config: MailConfig) -> Self {
        let connector = Arc::new(SmtpConnector::new(config.timeout));
        Self::new(config, connector)
    }

    pub fn config(&self) -> &MailConfig {
        &self.config
    }

    /// Build the message: fixed text body stamped with the generation time,
    /// plus one attachment per document in input order.
    pub fn compose(&self, documents: &[RenderedDocument]) -> Result<Message, DeliveryError> {
        let from: Mailbox = self.config.from_address.parse().map_err(|e| {
            DeliveryError::Compose(format!("invalid from address {:?}: {e}", self.config.from_address))
        })?;

        let mut builder = Message::builder()
            .from(from)
            .subject(self.config.subject.clone());
        for to in &self.config.to_addresses {
            let mailbox: Mailbox = to
                .parse()
                .map_err(|e| DeliveryError::Compose(format!("invalid recipient {to:?}: {e}")))?;
            builder = builder.to(mailbox);
        }

        let text = format!(
            "{}\nGenerated {} UTC.\n",
            self.config.body,
            Utc::now().format("%Y-%m-%d %H:%M:%S")
        );
        let mut body = MultiPart::mixed().singlepart(SinglePart::plain(text));
        for (i, document) in documents.iter().enumerate() {
            let content_type = ContentType::parse(&document.content_type).map_err(|e| {
                DeliveryError::Compose(format!("bad content type {:?}: {e}", document.content_type))
            })?;
            body = body.singlepart(
                Attachment::new(attachment_name(i + 1, &document.extension))
                    .body(document.bytes.clone(), content_type),
            );
        }

        builder
            .multipart(body)
            .map_err(|e| DeliveryError::Compose(e.to_string()))
    }

    /// Deliver on the calling thread. Blocks on network I/O.
    pub fn dispatch(&self, documents: &[RenderedDocument]) -> DeliveryOutcome {
        match self.try_dispatch(documents) {
            Ok(()) => {
                let recipients = self.config.to_addresses.len();
                info!(
                    attachments = documents.len(),
                    recipients, "Report mail delivered"
                );
                DeliveryOutcome::Delivered {
                    attachments: documents.len(),
                    recipients,
                }
            }
            Err(e) => {
                match &e {
                    DeliveryError::MissingCredentials => {
                        error!("SMTP credentials are not configured, nothing sent")
                    }
                    DeliveryError::AuthFailure(reason) => {
                        error!(host = %self.config.host, "SMTP authentication failed: {reason}")
                    }
                    DeliveryError::SenderRejected(reason) => {
                        error!(from = %self.config.from_address, "Sender address rejected: {reason}")
                    }
                    DeliveryError::Compose(reason) => error!("Could not compose report mail: {reason}"),
                    DeliveryError::Unexpected(reason) => error!("Unexpected delivery error: {reason}"),
                }
                DeliveryOutcome::Failed(e)
            }
        }
    }

    fn try_dispatch(&self, documents: &[RenderedDocument]) -> Result<(), DeliveryError> {
        let password = self.config.password.expose_secret();
        if self.config.username.is_empty() || password.is_empty() {
            return Err(DeliveryError::MissingCredentials);
        }

        let message = self.compose(documents)?;
        let formatted = message.formatted();

        let mut session = Session(self.connector.connect(&self.config.host, self.config.port)?);

        match session.upgrade() {
            Ok(()) => debug!("Upgraded session with STARTTLS"),
            Err(TransportError::UpgradeNotSupported) => {
                warn!(host = %self.config.host, "Server does not support STARTTLS, continuing on the implicit TLS channel")
            }
            Err(TransportError::UpgradeRejected(reason)) => {
                warn!(host = %self.config.host, "Server refused STARTTLS ({reason}), continuing on the implicit TLS channel")
            }
            Err(e) => return Err(e.into()),
        }

        session.login(&self.config.username, password)?;
        session.send(message.envelope(), &formatted)?;
        Ok(())
    }
}

#[async_trait]
impl ReportSink for MailDispatcher {
    async fn deliver(&self, documents: Vec<RenderedDocument>) -> DeliveryOutcome {
        let dispatcher = self.clone();
        match tokio::task::spawn_blocking(move || dispatcher.dispatch(&documents)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Delivery task panicked: {e}");
                DeliveryOutcome::Failed(DeliveryError::Unexpected(format!(
                    "delivery task panicked: {e}"
                )))
            }
        }
    }
}

/// Closes the transport when dropped, whatever path left the dispatch.
struct Session(Box<dyn MailTransport>);

impl Deref for Session {
    type Target = dyn MailTransport;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl DerefMut for Session {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.0
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.0.close();
        debug!("Mail session closed");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use lettre::address::Envelope;
    use mail_parser::{MessageParser, MimeHeaders};
    use secrecy::SecretString;

    use super::*;

    /// Which step the scripted transport should fail at.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum FailAt {
        Nothing,
        Connect,
        UpgradeUnsupported,
        UpgradeRefused,
        UpgradeBroken,
        Login,
        Sender,
        Send,
    }

    #[derive(Clone)]
    struct ScriptedConnector {
        fail_at: FailAt,
        connects: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl ScriptedConnector {
        fn new(fail_at: FailAt) -> Self {
            Self {
                fail_at,
                connects: Arc::default(),
                closes: Arc::default(),
                sent: Arc::default(),
            }
        }
    }

    impl Connector for ScriptedConnector {
        fn connect(&self, _host: &str, _port: u16) -> Result<Box<dyn MailTransport>, TransportError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.fail_at == FailAt::Connect {
                return Err(TransportError::Connect("refused".into()));
            }
            Ok(Box::new(self.clone()))
        }
    }

    impl MailTransport for ScriptedConnector {
        fn upgrade(&mut self) -> Result<(), TransportError> {
            match self.fail_at {
                FailAt::UpgradeUnsupported => Err(TransportError::UpgradeNotSupported),
                FailAt::UpgradeRefused => {
                    Err(TransportError::UpgradeRejected("454 TLS not available".into()))
                }
                FailAt::UpgradeBroken => Err(TransportError::Other("connection reset".into())),
                _ => Ok(()),
            }
        }

        fn login(&mut self, _username: &str, _password: &str) -> Result<(), TransportError> {
            match self.fail_at {
                FailAt::Login => Err(TransportError::AuthRejected("535 bad credentials".into())),
                _ => Ok(()),
            }
        }

        fn send(&mut self, _envelope: &Envelope, message: &[u8]) -> Result<(), TransportError> {
            match self.fail_at {
                FailAt::Sender => Err(TransportError::SenderRefused("553 not yours".into())),
                FailAt::Send => Err(TransportError::Other("451 try again".into())),
                _ => {
                    self.sent.lock().unwrap().push(message.to_vec());
                    Ok(())
                }
            }
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn config(username: &str, password: &str) -> MailConfig {
        MailConfig {
            host: "smtp.test.com".into(),
            port: 465,
            username: username.into(),
            password: SecretString::from(password),
            from_address: "reports@test.com".into(),
            to_addresses: vec!["a@test.com".into(), "b@test.com".into()],
            subject: "Monthly report".into(),
            body: "Reports attached.".into(),
            timeout: Duration::from_secs(5),
        }
    }

    fn documents() -> Vec<RenderedDocument> {
        (0..2)
            .map(|i| RenderedDocument {
                bytes: format!("%PDF-fake-{i}").into_bytes(),
                extension: "pdf".into(),
                content_type: "application/pdf".into(),
            })
            .collect()
    }

    fn dispatcher(fail_at: FailAt) -> (ScriptedConnector, MailDispatcher) {
        let connector = ScriptedConnector::new(fail_at);
        let dispatcher = MailDispatcher::new(config("user", "secret"), Arc::new(connector.clone()));
        (connector, dispatcher)
    }

    #[test]
    fn attachment_names_are_one_based() {
        assert_eq!(attachment_name(1, "pdf"), "report_1.pdf");
        assert_eq!(attachment_name(12, "html"), "report_12.html");
    }

    #[test]
    fn delivers_all_attachments_in_order() {
        let (connector, dispatcher) = dispatcher(FailAt::Nothing);

        let outcome = dispatcher.dispatch(&documents());
        assert_eq!(
            outcome,
            DeliveryOutcome::Delivered {
                attachments: 2,
                recipients: 2
            }
        );
        assert_eq!(connector.closes.load(Ordering::SeqCst), 1);

        let sent = connector.sent.lock().unwrap();
        let parsed = MessageParser::default().parse(&sent[0][..]).unwrap();
        assert_eq!(parsed.subject(), Some("Monthly report"));

        let attachments: Vec<_> = parsed
            .attachments()
            .map(|part| {
                (
                    MimeHeaders::attachment_name(part).unwrap_or_default().to_string(),
                    part.contents().to_vec(),
                )
            })
            .collect();
        assert_eq!(
            attachments,
            vec![
                ("report_1.pdf".to_string(), b"%PDF-fake-0".to_vec()),
                ("report_2.pdf".to_string(), b"%PDF-fake-1".to_vec()),
            ]
        );
    }

    #[test]
    fn auth_rejection_is_an_outcome_and_closes_once() {
        let (connector, dispatcher) = dispatcher(FailAt::Login);

        let outcome = dispatcher.dispatch(&documents());
        assert!(matches!(
            outcome,
            DeliveryOutcome::Failed(DeliveryError::AuthFailure(_))
        ));
        assert_eq!(connector.closes.load(Ordering::SeqCst), 1);
        assert!(connector.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn sender_rejection_is_classified() {
        let (connector, dispatcher) = dispatcher(FailAt::Sender);
        assert!(matches!(
            dispatcher.dispatch(&documents()),
            DeliveryOutcome::Failed(DeliveryError::SenderRejected(_))
        ));
        assert_eq!(connector.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn other_send_failures_are_unexpected() {
        let (connector, dispatcher) = dispatcher(FailAt::Send);
        assert!(matches!(
            dispatcher.dispatch(&documents()),
            DeliveryOutcome::Failed(DeliveryError::Unexpected(_))
        ));
        assert_eq!(connector.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsupported_upgrade_still_delivers() {
        let (connector, dispatcher) = dispatcher(FailAt::UpgradeUnsupported);
        assert!(dispatcher.dispatch(&documents()).is_delivered());
        assert_eq!(connector.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn refused_upgrade_still_delivers() {
        let (connector, dispatcher) = dispatcher(FailAt::UpgradeRefused);
        assert!(dispatcher.dispatch(&documents()).is_delivered());
        assert_eq!(connector.sent.lock().unwrap().len(), 1);
        assert_eq!(connector.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn broken_upgrade_aborts_delivery() {
        let (connector, dispatcher) = dispatcher(FailAt::UpgradeBroken);
        assert!(matches!(
            dispatcher.dispatch(&documents()),
            DeliveryOutcome::Failed(DeliveryError::Unexpected(_))
        ));
        assert!(connector.sent.lock().unwrap().is_empty());
        assert_eq!(connector.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_connect_has_nothing_to_close() {
        let (connector, dispatcher) = dispatcher(FailAt::Connect);
        assert!(matches!(
            dispatcher.dispatch(&documents()),
            DeliveryOutcome::Failed(DeliveryError::Unexpected(_))
        ));
        assert_eq!(connector.closes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn missing_credentials_never_connect() {
        for (user, pass) in [("", "secret"), ("user", "")] {
            let connector = ScriptedConnector::new(FailAt::Nothing);
            let dispatcher = MailDispatcher::new(config(user, pass), Arc::new(connector.clone()));

            assert_eq!(
                dispatcher.dispatch(&documents()),
                DeliveryOutcome::Failed(DeliveryError::MissingCredentials)
            );
            assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
        }
    }

    #[test]
    fn bad_recipient_fails_composition() {
        let mut cfg = config("user", "secret");
        cfg.to_addresses = vec!["not an address".into()];
        let dispatcher = MailDispatcher::new(cfg, Arc::new(ScriptedConnector::new(FailAt::Nothing)));
        assert!(matches!(
            dispatcher.compose(&documents()),
            Err(DeliveryError::Compose(_))
        ));
    }

    #[tokio::test]
    async fn sink_delivery_runs_off_the_runtime() {
        let (connector, dispatcher) = dispatcher(FailAt::Nothing);
        let outcome = ReportSink::deliver(&dispatcher, documents()).await;
        assert!(outcome.is_delivered());
        assert_eq!(connector.closes.load(Ordering::SeqCst), 1);
    }
}
