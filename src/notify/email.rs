// Welcome-email delivery over SMTP, with a logging fallback

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;
use tracing::{error, info};

use crate::config::EmailConfig;
use crate::core::errors::AppError;

const SENDER_NAME: &str = "Pet Club";
const WELCOME_SUBJECT: &str = "Welcome to Pet Club - your access credentials";

/// Outbound notifications. Delivery failures are reported as `false`, never raised.
#[async_trait]
pub trait EmailNotifier: Send + Sync {
    async fn send_welcome(&self, to: &str, name: &str, password: &str) -> bool;
}

/// Plain-text welcome message carrying the initial credentials
pub fn welcome_body(name: &str, email: &str, password: &str, client_url: &str) -> String {
    format!(
        "Hello {name},\n\n\
         An account has been created for you at Pet Club.\n\n\
         Email: {email}\n\
         Password: {password}\n\n\
         Sign in at {login_url} and change your password after the first login.\n\n\
         (c) {year} Pet Club",
        name = name,
        email = email,
        password = password,
        login_url = format!("{}/login", client_url.trim_end_matches('/')),
        year = Utc::now().year(),
    )
}

/// SMTP notifier built on lettre's tokio transport
pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    client_url: String,
}

impl SmtpNotifier {
    pub fn new(config: &EmailConfig) -> Result<Self, AppError> {
        let from: Mailbox = format!("{} <{}>", SENDER_NAME, config.from)
            .parse()
            .map_err(|e| AppError::Configuration(format!("Invalid EMAIL_FROM: {}", e)))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| AppError::Configuration(format!("Invalid EMAIL_HOST: {}", e)))?
            .port(config.port);

        if let (Some(user), Some(pass)) = (&config.user, &config.pass) {
            builder = builder.credentials(Credentials::new(
                user.clone(),
                pass.expose_secret().clone(),
            ));
        }

        Ok(Self {
            mailer: builder.build(),
            from,
            client_url: config.client_url.clone(),
        })
    }

    fn build_message(&self, to: &str, name: &str, password: &str) -> Result<Message, String> {
        let recipient: Mailbox = to
            .parse()
            .map_err(|e| format!("Invalid recipient: {}", e))?;

        Message::builder()
            .from(self.from.clone())
            .to(recipient)
            .subject(WELCOME_SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(welcome_body(name, to, password, &self.client_url))
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl EmailNotifier for SmtpNotifier {
    async fn send_welcome(&self, to: &str, name: &str, password: &str) -> bool {
        let message = match self.build_message(to, name, password) {
            Ok(message) => message,
            Err(e) => {
                error!(to = %to, error = %e, "Failed to build welcome email");
                return false;
            }
        };

        match self.mailer.send(message).await {
            Ok(response) => {
                info!(to = %to, code = %response.code(), "Welcome email sent");
                true
            }
            Err(e) => {
                error!(to = %to, error = %e, "Failed to send welcome email");
                false
            }
        }
    }
}

/// Notifier used when SMTP is not configured: records the event, sends nothing
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl EmailNotifier for LogNotifier {
    async fn send_welcome(&self, to: &str, name: &str, _password: &str) -> bool {
        info!(to = %to, name = %name, "SMTP not configured, welcome email skipped");
        true
    }
}
