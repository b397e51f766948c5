//! Outgoing mail. SMTP through `lettre` when a relay is configured, otherwise deliveries
//! are only written to the log.

use lettre::{
    address::AddressError,
    message::{header::ContentType, Mailbox},
    transport::smtp::{authentication::Credentials, Error as SmtpError},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;
use tracing::info;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),
    #[error("Invalid email address {address}: {source}")]
    InvalidAddress {
        address: String,
        source: AddressError,
    },
}

#[derive(Clone)]
pub enum Mailer {
    Smtp {
        transport: AsyncSmtpTransport<Tokio1Executor>,
        from: Mailbox,
    },
    Log {
        from: Mailbox,
    },
}

impl Mailer {
    pub fn from_config(config: &Config) -> Result<Self, EmailError> {
        let from = parse_mailbox(&config.mail_from)?;

        let Some(smtp) = &config.smtp else {
            return Ok(Mailer::Log { from });
        };

        // Plain SMTP, as offered by local relays such as smtp4dev.
        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.host).port(smtp.port);
        if let (Some(username), Some(password)) = (&smtp.username, &smtp.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Mailer::Smtp {
            transport: builder.build(),
            from,
        })
    }

    pub fn log_only(from: &str) -> Result<Self, EmailError> {
        Ok(Mailer::Log {
            from: parse_mailbox(from)?,
        })
    }

    pub async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError> {
        let recipient = parse_mailbox(to)?;

        match self {
            Mailer::Smtp { transport, from } => {
                let message = Message::builder()
                    .from(from.clone())
                    .to(recipient)
                    .subject(subject)
                    .header(ContentType::TEXT_PLAIN)
                    .body(body.to_owned())?;
                transport.send(message).await?;
            }
            Mailer::Log { from } => {
                info!(from = %from, to = %recipient, subject, body, "Email delivery (log only)");
            }
        }

        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, EmailError> {
    address
        .parse::<Mailbox>()
        .map_err(|source| EmailError::InvalidAddress {
            address: address.to_owned(),
            source,
        })
}
