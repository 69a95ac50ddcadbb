//! Outbound notification channels: desktop, email, webhook and log.
//!
//! Every channel is best effort. Callers log a returned error and carry on;
//! nothing here is allowed to stop deals from being persisted.

use async_trait::async_trait;
use deal_store::LedgerSnapshot;
use dealwatch_core::{NotificationError, NotifyConfig};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const ALERT_SUBJECT: &str = "🎯 Highlighted Deal Alert";
pub const DIGEST_SUBJECT: &str = "📦 Daily PC Deals CSV";

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Immediate notice for a single highlighted deal.
    async fn alert(&self, subject: &str, body: &str) -> Result<(), NotificationError>;

    /// Periodic export of the whole ledger.
    async fn digest(&self, snapshot: &LedgerSnapshot) -> Result<(), NotificationError>;
}

/// Writes notifications to the log only. Used when no channel is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn alert(&self, subject: &str, body: &str) -> Result<(), NotificationError> {
        info!("{}: {}", subject, body.replace('\n', " "));
        Ok(())
    }

    async fn digest(&self, snapshot: &LedgerSnapshot) -> Result<(), NotificationError> {
        info!(
            "{}: {} deals in {}",
            DIGEST_SUBJECT,
            snapshot.row_count,
            snapshot.path.display()
        );
        Ok(())
    }
}

/// Desktop toast via the platform notification service.
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    app_name: String,
}

impl DesktopNotifier {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }

    async fn show(&self, summary: String, body: String) -> Result<(), NotificationError> {
        let app_name = self.app_name.clone();
        let shown = tokio::task::spawn_blocking(move || {
            notify_rust::Notification::new()
                .appname(&app_name)
                .summary(&summary)
                .body(&body)
                .show()
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| e.to_string())
        .and_then(|inner| inner);

        shown.map_err(|reason| NotificationError::DeliveryFailed {
            channel: "desktop".to_string(),
            reason,
        })
    }
}

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn alert(&self, subject: &str, body: &str) -> Result<(), NotificationError> {
        self.show(subject.to_string(), body.to_string()).await
    }

    async fn digest(&self, snapshot: &LedgerSnapshot) -> Result<(), NotificationError> {
        let body = format!(
            "{} deals recorded in {}",
            snapshot.row_count,
            snapshot.path.display()
        );
        self.show(DIGEST_SUBJECT.to_string(), body).await
    }
}

#[derive(Debug, Serialize)]
struct WebhookAttachment<'a> {
    filename: String,
    content_type: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    subject: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachment: Option<WebhookAttachment<'a>>,
}

/// Posts notifications as JSON to an HTTP endpoint (chat relay, mail gateway, ...).
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http_client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, NotificationError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| webhook_failed(e.to_string()))?;

        Ok(Self {
            http_client,
            url: url.into(),
        })
    }

    async fn send(&self, message: &WebhookMessage<'_>) -> Result<(), NotificationError> {
        let response = self
            .http_client
            .post(&self.url)
            .json(message)
            .send()
            .await
            .map_err(|e| webhook_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Webhook returned {} for '{}'", status, message.subject);
            return Err(NotificationError::Rejected {
                status_code: status.as_u16(),
            });
        }

        debug!("Webhook accepted '{}'", message.subject);
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn alert(&self, subject: &str, body: &str) -> Result<(), NotificationError> {
        self.send(&WebhookMessage {
            subject,
            body,
            attachment: None,
        })
        .await
    }

    async fn digest(&self, snapshot: &LedgerSnapshot) -> Result<(), NotificationError> {
        let file_name = snapshot.file_name();
        let body = format!("Attached is your daily {} export.", file_name);
        self.send(&WebhookMessage {
            subject: DIGEST_SUBJECT,
            body: &body,
            attachment: Some(WebhookAttachment {
                filename: file_name,
                content_type: "text/csv",
                content: snapshot.as_text(),
            }),
        })
        .await
    }
}

fn webhook_failed(reason: String) -> NotificationError {
    NotificationError::DeliveryFailed {
        channel: "webhook".to_string(),
        reason,
    }
}

/// Mails alerts and the digest to the configured address, from itself,
/// over an implicit-TLS SMTP relay.
#[derive(Clone)]
pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    mailbox: Mailbox,
}

impl EmailNotifier {
    pub fn new(
        host: &str,
        port: u16,
        address: &str,
        password: &str,
    ) -> Result<Self, NotificationError> {
        let mailbox: Mailbox = address
            .parse()
            .map_err(|e: lettre::address::AddressError| email_failed(e.to_string()))?;
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| email_failed(e.to_string()))?
            .port(port)
            .credentials(Credentials::new(address.to_string(), password.to_string()))
            .build();

        Ok(Self { mailer, mailbox })
    }

    pub fn alert_message(&self, subject: &str, body: &str) -> Result<Message, NotificationError> {
        Message::builder()
            .from(self.mailbox.clone())
            .to(self.mailbox.clone())
            .subject(subject)
            .singlepart(SinglePart::plain(body.to_string()))
            .map_err(|e| email_failed(e.to_string()))
    }

    pub fn digest_message(&self, snapshot: &LedgerSnapshot) -> Result<Message, NotificationError> {
        let file_name = snapshot.file_name();
        let csv = ContentType::parse("text/csv").map_err(|e| email_failed(e.to_string()))?;
        let body = format!("Attached is your daily {} export.", file_name);

        Message::builder()
            .from(self.mailbox.clone())
            .to(self.mailbox.clone())
            .subject(DIGEST_SUBJECT)
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(body))
                    .singlepart(Attachment::new(file_name).body(snapshot.contents.clone(), csv)),
            )
            .map_err(|e| email_failed(e.to_string()))
    }

    async fn send(&self, message: Message) -> Result<(), NotificationError> {
        self.mailer
            .send(message)
            .await
            .map_err(|e| email_failed(e.to_string()))?;
        debug!("Email sent to {}", self.mailbox);
        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn alert(&self, subject: &str, body: &str) -> Result<(), NotificationError> {
        self.send(self.alert_message(subject, body)?).await
    }

    async fn digest(&self, snapshot: &LedgerSnapshot) -> Result<(), NotificationError> {
        self.send(self.digest_message(snapshot)?).await
    }
}

fn email_failed(reason: String) -> NotificationError {
    NotificationError::DeliveryFailed {
        channel: "email".to_string(),
        reason,
    }
}

/// Fans each notification out to every configured channel in turn.
/// All channels are tried; the first failure is returned.
#[derive(Default)]
pub struct NotifierSet {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifiers.push(Box::new(notifier));
        self
    }

    /// Channels enabled in `config`, falling back to [`LogNotifier`].
    pub fn from_config(config: &NotifyConfig) -> Result<Self, NotificationError> {
        let mut set = Self::new();
        if config.desktop {
            set = set.with(DesktopNotifier::new("dealwatch"));
        }
        if let Some(url) = &config.webhook_url {
            set = set.with(WebhookNotifier::new(url.clone())?);
        }
        if let (Some(address), Some(password)) = (&config.email_address, &config.email_password) {
            set = set.with(EmailNotifier::new(
                &config.smtp_host,
                config.smtp_port,
                address,
                password,
            )?);
        }
        if set.is_empty() {
            info!("No notification channel configured, alerts go to the log");
            set = set.with(LogNotifier);
        }
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

#[async_trait]
impl Notifier for NotifierSet {
    async fn alert(&self, subject: &str, body: &str) -> Result<(), NotificationError> {
        let mut first_error = None;
        for notifier in &self.notifiers {
            if let Err(e) = notifier.alert(subject, body).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn digest(&self, snapshot: &LedgerSnapshot) -> Result<(), NotificationError> {
        let mut first_error = None;
        for notifier in &self.notifiers {
            if let Err(e) = notifier.digest(snapshot).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

pub fn alert_body(title: &str, url: &str) -> String {
    format!("{}\n{}", title, url)
}
