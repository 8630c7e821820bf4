//! SMTP channel: HTML change table with the latest reports attached

use super::Notifier;
use crate::config::EmailConfig;
use crate::error::{Result, WatchError};
use crate::model::{PriceChange, NO_PRICE};
use async_trait::async_trait;
use html_escape::{encode_double_quoted_attribute, encode_text};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials as SmtpCredentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::fmt::{self, Write as _};
use std::fs;
use std::path::PathBuf;

const IMPLICIT_TLS_PORT: u16 = 465;

/// Report files attached to change mails: (file in report dir, attachment name, content type)
const ATTACHMENTS: &[(&str, &str, &str)] = &[
    ("latest.html", "reporte-precios.html", "text/html; charset=utf-8"),
    ("latest.csv", "reporte-precios.csv", "text/csv; charset=utf-8"),
];

fn or_placeholder(price: &str) -> &str {
    if price.is_empty() {
        NO_PRICE
    } else {
        price
    }
}

/// HTML body listing every change
pub fn change_table(changes: &[PriceChange]) -> String {
    let mut html = format!(
        "<p>Price changes detected in {} products:</p>\n\
         <table border=\"1\" cellpadding=\"4\" cellspacing=\"0\" style=\"border-collapse:collapse\">\n\
         <thead><tr><th>Product</th><th>Public price</th><th>Reseller price</th></tr></thead>\n<tbody>\n",
        changes.len()
    );
    for change in changes {
        let _ = writeln!(
            html,
            "<tr><td><a href=\"{}\">{}</a></td><td>{} &rarr; {}</td><td>{} &rarr; {}</td></tr>",
            encode_double_quoted_attribute(&change.identity),
            encode_text(&change.name),
            encode_text(or_placeholder(&change.old_public)),
            encode_text(or_placeholder(&change.new_public)),
            encode_text(or_placeholder(&change.old_reseller)),
            encode_text(or_placeholder(&change.new_reseller)),
        );
    }
    html.push_str("</tbody>\n</table>\n<p>The full price list is attached.</p>\n");
    html
}

fn mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|e| WatchError::Config(format!("invalid email address '{}': {}", address, e)))
}

/// Sends change mails through an SMTP relay (or any lettre transport)
pub struct EmailNotifier<T = AsyncSmtpTransport<Tokio1Executor>> {
    transport: T,
    from: Mailbox,
    to: Vec<Mailbox>,
    report_dir: PathBuf,
}

impl EmailNotifier {
    /// SMTP notifier; port 465 uses implicit TLS, any other port STARTTLS
    pub fn new(config: EmailConfig, report_dir: impl Into<PathBuf>) -> Result<Self> {
        let builder = if config.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| WatchError::Config(format!("SMTP relay '{}': {}", config.host, e)))?;

        let mut builder = builder.port(config.port);
        if !config.username.is_empty() {
            builder = builder.credentials(SmtpCredentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Self::with_transport(&config, report_dir, builder.build())
    }
}

impl<T> EmailNotifier<T> {
    pub fn with_transport(
        config: &EmailConfig,
        report_dir: impl Into<PathBuf>,
        transport: T,
    ) -> Result<Self> {
        Ok(Self {
            transport,
            from: mailbox(&config.from)?,
            to: config.to.iter().map(|to| mailbox(to)).collect::<Result<_>>()?,
            report_dir: report_dir.into(),
        })
    }

    fn builder(&self, subject: &str) -> lettre::message::MessageBuilder {
        self.to
            .iter()
            .fold(Message::builder().from(self.from.clone()), |builder, to| {
                builder.to(to.clone())
            })
            .subject(subject)
    }

    fn change_message(&self, changes: &[PriceChange]) -> Result<Message> {
        let mut parts = MultiPart::mixed().singlepart(SinglePart::html(change_table(changes)));

        for (file, name, content_type) in ATTACHMENTS {
            let path = self.report_dir.join(file);
            match fs::read(&path) {
                Ok(bytes) => {
                    let content_type = ContentType::parse(content_type)
                        .map_err(|e| WatchError::Delivery(format!("{}: {}", name, e)))?;
                    parts = parts.singlepart(Attachment::new(name.to_string()).body(bytes, content_type));
                }
                Err(e) => log::warn!("Not attaching {}: {}", path.display(), e),
            }
        }

        self.builder(&format!("Price changes ({})", changes.len()))
            .multipart(parts)
            .map_err(|e| WatchError::Delivery(e.to_string()))
    }

    fn failure_message(&self, message: &str) -> Result<Message> {
        self.builder("Price watch error")
            .singlepart(SinglePart::plain(message.to_string()))
            .map_err(|e| WatchError::Delivery(e.to_string()))
    }
}

impl<T> EmailNotifier<T>
where
    T: AsyncTransport + Send + Sync,
    T::Error: fmt::Display,
{
    async fn send(&self, message: Message) -> Result<()> {
        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| WatchError::Delivery(e.to_string()))
    }
}

#[async_trait]
impl<T> Notifier for EmailNotifier<T>
where
    T: AsyncTransport + Send + Sync,
    T::Ok: Send,
    T::Error: fmt::Display + Send,
{
    fn name(&self) -> &str {
        "email"
    }

    async fn notify_changes(&self, changes: &[PriceChange]) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let message = self.change_message(changes)?;
        self.send(message).await?;
        log::info!("Change mail sent to {} recipient(s)", self.to.len());
        Ok(())
    }

    async fn notify_failure(&self, message: &str) -> Result<()> {
        let message = self.failure_message(message)?;
        self.send(message).await
    }
}
