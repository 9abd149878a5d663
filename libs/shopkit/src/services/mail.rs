//! Outgoing mail: the transport-level `Mailer` supplied by the host and the
//! `Mail` facade stored in the context.

use std::sync::Arc;

use serde::Serialize;

use crate::error::ContextResult;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    pub from: Option<String>,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub headers: Vec<(String, String)>,
}

impl MailMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sender(mut self, addr: impl Into<String>) -> Self {
        self.from = Some(addr.into());
        self
    }

    pub fn to(mut self, addr: impl Into<String>) -> Self {
        self.to.push(addr.into());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Delivers messages (SMTP client, queue, test sink...).
pub trait Mailer: Send + Sync {
    fn send(&self, message: &MailMessage) -> ContextResult<()>;
}

/// Mail facade exposed by the context.
pub trait Mail: Send + Sync {
    fn create_message(&self) -> MailMessage;
    fn send(&self, message: MailMessage) -> ContextResult<()>;
}

/// `Mail` implementation that hands messages to a `Mailer`.
pub struct MailTransport {
    mailer: Arc<dyn Mailer>,
    default_from: Option<String>,
}

impl MailTransport {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self {
            mailer,
            default_from: None,
        }
    }

    pub fn with_sender(mut self, from: impl Into<String>) -> Self {
        self.default_from = Some(from.into());
        self
    }
}

impl Mail for MailTransport {
    fn create_message(&self) -> MailMessage {
        MailMessage {
            from: self.default_from.clone(),
            ..MailMessage::default()
        }
    }

    fn send(&self, message: MailMessage) -> ContextResult<()> {
        tracing::debug!(to = ?message.to, subject = %message.subject, "Sending mail");
        self.mailer.send(&message)
    }
}

/// Mailer that only logs what it would send.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, message: &MailMessage) -> ContextResult<()> {
        tracing::info!(
            from = ?message.from,
            to = ?message.to,
            subject = %message.subject,
            "Mail delivered to log transport"
        );
        Ok(())
    }
}
