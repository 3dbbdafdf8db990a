use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart, SinglePart, header};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::render::escape_html;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Address error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Message error: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("SMTP server refused the connection")]
    Refused,
}

/// One message to one recipient.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub from_name: Option<String>,
    pub from_email: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingEmail {
    /// Plain text plus an HTML alternative built from the same text.
    pub fn to_message(&self) -> Result<Message, MailError> {
        let from = Mailbox::new(self.from_name.clone(), self.from_email.parse()?);
        let to: Mailbox = self.to.parse()?;

        let html_body = format!(
            "<!DOCTYPE html>\n<html>\n  <body style=\"font-family: Arial, sans-serif;\">\n{}\n  </body>\n</html>",
            self.body
                .split("\n\n")
                .map(|p| format!("    <p>{}</p>", escape_html(p).replace('\n', "<br>")))
                .collect::<Vec<_>>()
                .join("\n")
        );

        let multipart = MultiPart::alternative()
            .singlepart(SinglePart::builder().header(header::ContentType::TEXT_PLAIN).body(self.body.clone()))
            .singlepart(SinglePart::builder().header(header::ContentType::TEXT_HTML).body(html_body));

        Ok(Message::builder()
            .from(from)
            .to(to)
            .subject(self.subject.clone())
            .multipart(multipart)?)
    }
}

/// Connection details of a user's SMTP relay, password already unsealed.
#[derive(Clone)]
pub struct SmtpRelay {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
}

impl std::fmt::Debug for SmtpRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpRelay")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait SmtpSender: Send + Sync {
    async fn send(&self, relay: &SmtpRelay, message: Message) -> Result<(), MailError>;

    async fn test_connection(&self, relay: &SmtpRelay) -> Result<(), MailError>;
}

/// Sends through the user's relay with `lettre`. Port 465 uses implicit TLS,
/// everything else STARTTLS.
pub struct LettreSmtp;

impl LettreSmtp {
    fn transport(relay: &SmtpRelay) -> Result<AsyncSmtpTransport<Tokio1Executor>, MailError> {
        let builder = if relay.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&relay.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&relay.host)?
        };
        let builder = builder
            .port(relay.port)
            .timeout(Some(std::time::Duration::from_secs(20)));
        let builder = match &relay.password {
            Some(password) if !relay.username.is_empty() => {
                builder.credentials(Credentials::new(relay.username.clone(), password.clone()))
            }
            _ => builder,
        };
        Ok(builder.build())
    }
}

#[async_trait]
impl SmtpSender for LettreSmtp {
    async fn send(&self, relay: &SmtpRelay, message: Message) -> Result<(), MailError> {
        Self::transport(relay)?.send(message).await?;
        Ok(())
    }

    async fn test_connection(&self, relay: &SmtpRelay) -> Result<(), MailError> {
        if Self::transport(relay)?.test_connection().await? {
            Ok(())
        } else {
            Err(MailError::Refused)
        }
    }
}
