//!
//! # Account Email
//!
//! Welcome and cancellation notes sent around account lifecycle events.
//! Delivery is fire-and-forget: the HTTP response never waits on SMTP, and
//! a failed send is logged and forgotten. When no relay is configured the
//! mailer runs disabled, which is how development and test environments
//! operate.

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

#[derive(Clone)]
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: String,
}

impl Mailer {
    /// Builds the mailer from `SMTP_RELAY`, `SMTP_USERNAME`, `SMTP_PASSWORD`
    /// and `EMAIL_FROM`. Missing relay means a disabled mailer, not an error.
    pub fn from_env() -> Self {
        let from = std::env::var("EMAIL_FROM")
            .unwrap_or_else(|_| "taskpad@example.com".to_string());

        let transport = match std::env::var("SMTP_RELAY") {
            Ok(relay) => match AsyncSmtpTransport::<Tokio1Executor>::relay(&relay) {
                Ok(mut builder) => {
                    if let (Ok(username), Ok(password)) =
                        (std::env::var("SMTP_USERNAME"), std::env::var("SMTP_PASSWORD"))
                    {
                        builder = builder.credentials(Credentials::new(username, password));
                    }
                    Some(builder.build())
                }
                Err(e) => {
                    log::warn!("invalid SMTP relay {}: {}; mailer disabled", relay, e);
                    None
                }
            },
            Err(_) => None,
        };

        Self { transport, from }
    }

    /// A mailer that drops everything. Used in tests.
    pub fn disabled() -> Self {
        Self {
            transport: None,
            from: "taskpad@example.com".to_string(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    /// Greets a freshly registered account.
    pub fn send_welcome(&self, email: &str, name: &str) {
        self.dispatch(
            email,
            "Thanks for joining in!".to_string(),
            format!(
                "Welcome to the app, {}. Let me know how you get along with the app.",
                name
            ),
        );
    }

    /// Says goodbye after an account was deleted.
    pub fn send_cancellation(&self, email: &str, name: &str) {
        self.dispatch(
            email,
            format!("We're sad to see you go {}.", name),
            format!(
                "Your account has been deleted {} and you will stop getting notifications from us. \
                 Is there anything we could have done to have kept you on board?",
                name
            ),
        );
    }

    /// Queues one message in the background. Every failure mode downgrades
    /// to a log line.
    fn dispatch(&self, to: &str, subject: String, body: String) {
        let transport = match &self.transport {
            Some(transport) => transport.clone(),
            None => {
                log::debug!("mailer disabled; skipping \"{}\" to {}", subject, to);
                return;
            }
        };

        let from = match self.from.parse::<Mailbox>() {
            Ok(from) => from,
            Err(e) => {
                log::warn!("invalid sender address {}: {}", self.from, e);
                return;
            }
        };
        let to_mailbox = match to.parse::<Mailbox>() {
            Ok(to_mailbox) => to_mailbox,
            Err(e) => {
                log::warn!("invalid recipient address {}: {}", to, e);
                return;
            }
        };

        let message = match Message::builder()
            .from(from)
            .to(to_mailbox)
            .subject(subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(body)
        {
            Ok(message) => message,
            Err(e) => {
                log::warn!("could not build email \"{}\": {}", subject, e);
                return;
            }
        };

        actix_web::rt::spawn(async move {
            if let Err(e) = transport.send(message).await {
                log::warn!("email \"{}\" failed to send: {}", subject, e);
            }
        });
    }
}
