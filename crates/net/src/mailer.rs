//! Outgoing mail seam
//!
//! [`SmtpMailer`] delivers through a configured relay. Without one the
//! process falls back to [`LogMailer`], which only records mail in the
//! trace log. Tests use [`MemoryMailer`] to read back what was sent.

use std::sync::Mutex;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingMail {
    pub fn otp(to: &str, code: &str, validity_minutes: i64) -> Self {
        Self {
            to: to.to_string(),
            subject: "Your MyCitiverse verification code".to_string(),
            body: format!(
                "Your verification code is {}. It expires in {} minutes.",
                code, validity_minutes
            ),
        }
    }

    pub fn welcome(to: &str, name: &str) -> Self {
        let greeting = if name.trim().is_empty() {
            "Hi".to_string()
        } else {
            format!("Hi {}", name.trim())
        };
        Self {
            to: to.to_string(),
            subject: "Welcome to MyCitiverse".to_string(),
            body: format!(
                "{}, your account is ready. Explore halls, events and city updates near you.",
                greeting
            ),
        }
    }
}

/// Something that can deliver mail
pub trait Mailer {
    fn send(&self, mail: &OutgoingMail) -> Result<()>;
}

/// Writes mail to the trace log instead of delivering it
#[derive(Debug, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<()> {
        info!(to = %mail.to, subject = %mail.subject, "Mail dispatched");
        debug!(to = %mail.to, body = %mail.body, "Mail body");
        Ok(())
    }
}

/// SMTP relay settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Sender mailbox, e.g. `MyCitiverse <no-reply@mycitiverse.in>`
    pub from: String,
    /// Upgrade the connection with STARTTLS; plain text otherwise
    pub starttls: bool,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 587,
            username: None,
            password: None,
            from: "MyCitiverse <no-reply@mycitiverse.in>".to_string(),
            starttls: true,
        }
    }
}

/// Delivers mail through an SMTP relay. Sending blocks until the relay
/// answers.
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self> {
        let host = settings.host.trim();
        if host.is_empty() {
            return Err(Error::Mail("SMTP host is not set".to_string()));
        }
        let from = settings
            .from
            .parse::<Mailbox>()
            .map_err(|e| Error::Mail(format!("Invalid sender {}: {}", settings.from, e)))?;

        let builder = if settings.starttls {
            SmtpTransport::starttls_relay(host).map_err(|e| Error::Mail(e.to_string()))?
        } else {
            SmtpTransport::builder_dangerous(host)
        };
        let mut builder = builder.port(settings.port);

        if let (Some(user), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        info!(host, port = settings.port, starttls = settings.starttls, "SMTP relay configured");
        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn message(&self, mail: &OutgoingMail) -> Result<Message> {
        let to = mail
            .to
            .trim()
            .parse::<Mailbox>()
            .map_err(|e| Error::Mail(format!("Invalid recipient {}: {}", mail.to, e)))?;
        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body.clone())
            .map_err(|e| Error::Mail(e.to_string()))
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<()> {
        let message = self.message(mail)?;
        self.transport
            .send(&message)
            .map_err(|e| Error::Mail(e.to_string()))?;
        info!(to = %mail.to, subject = %mail.subject, "Mail delivered");
        Ok(())
    }
}

/// Keeps every mail in memory
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    failing: bool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer that rejects every send
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Code from the most recent OTP mail addressed to `to`
    pub fn last_code_for(&self, to: &str) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|m| m.to.eq_ignore_ascii_case(to) && m.subject.contains("verification"))
            .and_then(|m| {
                m.body
                    .split_whitespace()
                    .map(|w| w.trim_end_matches('.'))
                    .find(|w| !w.is_empty() && w.bytes().all(|b| b.is_ascii_digit()) && w.len() >= 4)
                    .map(str::to_string)
            })
    }
}

impl Mailer for MemoryMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<()> {
        if self.failing {
            return Err(Error::Mail("mail relay unavailable".to_string()));
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| Error::Mail("mailbox poisoned".to_string()))?;
        sent.push(mail.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_mailer_captures_code() {
        let mailer = MemoryMailer::new();
        mailer.send(&OutgoingMail::otp("a@example.com", "042917", 5)).unwrap();
        mailer.send(&OutgoingMail::welcome("a@example.com", "Asha")).unwrap();

        assert_eq!(mailer.sent().len(), 2);
        assert_eq!(mailer.last_code_for("A@example.com").as_deref(), Some("042917"));
        assert_eq!(mailer.last_code_for("b@example.com"), None);
    }

    #[test]
    fn test_failing_mailer() {
        let mailer = MemoryMailer::failing();
        assert!(matches!(
            mailer.send(&OutgoingMail::welcome("a@example.com", "")),
            Err(Error::Mail(_))
        ));
        assert!(mailer.sent().is_empty());
    }

    fn plain_relay(port: u16) -> SmtpSettings {
        SmtpSettings {
            host: "127.0.0.1".into(),
            port,
            starttls: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_smtp_message_headers() {
        let mailer = SmtpMailer::new(&plain_relay(2525)).unwrap();
        let message = mailer
            .message(&OutgoingMail::otp("asha@example.com", "042917", 5))
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("To: asha@example.com"));
        assert!(raw.contains("Subject: Your MyCitiverse verification code"));
        assert!(raw.contains("no-reply@mycitiverse.in"));
        assert!(raw.contains("042917"));
    }

    #[test]
    fn test_smtp_settings_checked_up_front() {
        assert!(SmtpMailer::new(&SmtpSettings::default()).is_err());
        assert!(SmtpMailer::new(&SmtpSettings {
            from: "not a mailbox".into(),
            ..plain_relay(2525)
        })
        .is_err());

        let mailer = SmtpMailer::new(&plain_relay(2525)).unwrap();
        assert!(matches!(
            mailer.send(&OutgoingMail::welcome("nobody", "Asha")),
            Err(Error::Mail(_))
        ));
    }

    #[test]
    fn test_smtp_unreachable_relay_is_a_mail_error() {
        // Bind then release a port so nothing is listening on it
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let mailer = SmtpMailer::new(&plain_relay(port)).unwrap();

        assert!(matches!(
            mailer.send(&OutgoingMail::welcome("asha@example.com", "Asha")),
            Err(Error::Mail(_))
        ));
    }

    #[test]
    fn test_welcome_greeting() {
        assert!(OutgoingMail::welcome("a@example.com", "  ").body.starts_with("Hi,"));
        assert!(OutgoingMail::welcome("a@example.com", "Ravi").body.starts_with("Hi Ravi,"));
    }
}
