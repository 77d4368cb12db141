//! Snapshot email delivery.

use crate::config::EmailConfig;
use crate::models::{Snapshot, SnapshotReport};
use askama::Template;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use std::sync::Mutex;
use tokio::sync::OnceCell;

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body_text: String,
    pub body_html: String,
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, email: &EmailMessage) -> Result<(), AppError>;
}

/// SMTP provider whose transport is built on first send and then reused.
///
/// A missing API key only fails the send, never startup.
pub struct SmtpEmailProvider {
    config: EmailConfig,
    transport: OnceCell<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpEmailProvider {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config,
            transport: OnceCell::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.transport.initialized()
    }

    async fn transport(&self) -> Result<&AsyncSmtpTransport<Tokio1Executor>, AppError> {
        self.transport
            .get_or_try_init(|| async {
                let api_key = self.config.api_key.as_ref().ok_or_else(|| {
                    AppError::ConfigError(anyhow::anyhow!("EMAIL_API_KEY is not configured"))
                })?;

                let creds = Credentials::new(
                    self.config.smtp_user.clone(),
                    api_key.expose_secret().clone(),
                );

                let transport =
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)
                        .map_err(|e| {
                            AppError::ConfigError(anyhow::anyhow!(
                                "Failed to create SMTP relay: {}",
                                e
                            ))
                        })?
                        .port(self.config.smtp_port)
                        .credentials(creds)
                        .build();

                tracing::info!(host = %self.config.smtp_host, "SMTP transport initialized");
                Ok::<_, AppError>(transport)
            })
            .await
    }
}

#[async_trait]
impl EmailProvider for SmtpEmailProvider {
    async fn send(&self, email: &EmailMessage) -> Result<(), AppError> {
        let transport = self.transport().await?;

        let from_mailbox: Mailbox =
            format!("{} <{}>", self.config.from_name, self.config.from_address)
                .parse()
                .map_err(|e| {
                    AppError::ConfigError(anyhow::anyhow!("Invalid from address: {}", e))
                })?;

        let to_mailbox: Mailbox = email
            .to
            .parse()
            .map_err(|e| AppError::EmailError(format!("Invalid recipient: {}", e)))?;

        let message = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(&email.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.body_text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.body_html.clone()),
                    ),
            )?;

        transport
            .send(message)
            .await
            .map_err(|e| AppError::EmailError(format!("Failed to send email: {}", e)))?;

        tracing::info!(subject = %email.subject, "Snapshot email sent");

        Ok(())
    }
}

/// Mock email provider for testing
pub struct MockEmailProvider {
    enabled: bool,
    sent: Mutex<Vec<EmailMessage>>,
}

impl MockEmailProvider {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EmailProvider for MockEmailProvider {
    async fn send(&self, email: &EmailMessage) -> Result<(), AppError> {
        if !self.enabled {
            return Err(AppError::EmailError(
                "Mock email provider is not enabled".to_string(),
            ));
        }

        tracing::info!(subject = %email.subject, "[MOCK] Email would be sent");

        self.sent
            .lock()
            .map_err(|_| AppError::InternalError(anyhow::anyhow!("Mock mailbox poisoned")))?
            .push(email.clone());
        Ok(())
    }
}

struct EmailSection {
    title: &'static str,
    items: Vec<String>,
}

#[derive(Template)]
#[template(path = "snapshot_email.html")]
struct SnapshotEmailHtml<'a> {
    created_on: &'a str,
    sections: &'a [EmailSection],
}

#[derive(Template)]
#[template(path = "snapshot_email.txt")]
struct SnapshotEmailText<'a> {
    created_on: &'a str,
    sections: &'a [EmailSection],
}

fn sections(report: &SnapshotReport) -> Vec<EmailSection> {
    let sections = [
        EmailSection {
            title: "Key findings",
            items: report
                .key_findings
                .iter()
                .map(|f| {
                    format!(
                        "[{}] {} ({} confidence)",
                        f.domain.label(),
                        f.finding,
                        f.confidence.as_str()
                    )
                })
                .collect(),
        },
        EmailSection {
            title: "Strengths",
            items: report
                .strengths
                .iter()
                .map(|s| format!("[{}] {}", s.domain.label(), s.description))
                .collect(),
        },
        EmailSection {
            title: "Risks",
            items: report
                .risks
                .iter()
                .map(|r| format!("[{}] {}", r.domain.label(), r.description))
                .collect(),
        },
        EmailSection {
            title: "Next steps",
            items: report
                .next_steps
                .iter()
                .map(|n| format!("{}. {} ({})", n.priority, n.action, n.rationale))
                .collect(),
        },
        EmailSection {
            title: "Assumptions to validate",
            items: report
                .validation_items
                .iter()
                .map(|v| format!("{}: {}", v.title, v.validation_step))
                .collect(),
        },
    ];

    sections
        .into_iter()
        .filter(|section| !section.items.is_empty())
        .collect()
}

/// Plain text and HTML rendering of a snapshot.
pub fn render_snapshot_email(to: &str, snapshot: &Snapshot) -> Result<EmailMessage, AppError> {
    let created_on = snapshot.created_at.format("%Y-%m-%d").to_string();
    let sections = sections(&snapshot.report);

    let render_error =
        |e: askama::Error| AppError::InternalError(anyhow::anyhow!("Failed to render email: {}", e));

    let body_html = SnapshotEmailHtml {
        created_on: &created_on,
        sections: &sections,
    }
    .render()
    .map_err(render_error)?;

    let body_text = SnapshotEmailText {
        created_on: &created_on,
        sections: &sections,
    }
    .render()
    .map_err(render_error)?;

    Ok(EmailMessage {
        to: to.to_string(),
        subject: "Your Atlas readiness snapshot".to_string(),
        body_text,
        body_html,
    })
}
