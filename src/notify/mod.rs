//! Confirmation notifications
//!
//! After a session is finalized every invited participant receives one
//! confirmation message. Delivery is best effort: each recipient is tried in
//! turn, failures are logged and collected, and the loop always runs to the
//! end. A failed delivery never rolls back the finalization.

use crate::config::NotificationConfig;
use crate::error::{Result, StudySyncError};
use crate::metrics;
use crate::slot::Slot;
use crate::storage::Session;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

pub mod sendgrid;

pub use sendgrid::SendGridNotifier;

/// Subject line of every confirmation message
pub const CONFIRMATION_SUBJECT: &str = "✅ Study Session Confirmed!";

/// Delivers one message to one recipient
///
/// # Examples
///
/// ```
/// use studysync::notify::Notifier;
/// use studysync::error::Result;
/// use async_trait::async_trait;
///
/// struct Silent;
///
/// #[async_trait]
/// impl Notifier for Silent {
///     async fn send(&self, _to: &str, _subject: &str, _html: &str) -> Result<()> {
///         Ok(())
///     }
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send an HTML message
    ///
    /// # Errors
    ///
    /// Returns an error when the message could not be handed to the
    /// delivery service.
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()>;
}

/// Notifier that only writes the message to the log
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        tracing::info!(to = %to, subject = %subject, bytes = html.len(), "Notification (log only)");
        Ok(())
    }
}

/// A recipient whose message could not be delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryFailure {
    /// Recipient address
    pub recipient: String,
    /// Why delivery failed
    pub reason: String,
}

impl From<DeliveryFailure> for StudySyncError {
    fn from(failure: DeliveryFailure) -> Self {
        StudySyncError::DeliveryFailure {
            recipient: failure.recipient,
            reason: failure.reason,
        }
    }
}

/// Per-recipient outcome of one dispatch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Recipients that accepted the message
    pub delivered: Vec<String>,
    /// Recipients that did not
    pub failed: Vec<DeliveryFailure>,
}

impl DispatchReport {
    /// True when no delivery failed
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Sends confirmation messages to every participant of a session
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    /// Create a dispatcher using `notifier` for delivery
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Send the confirmation for `slot` to each participant, in invitation order
    pub async fn dispatch_confirmation(&self, session: &Session, slot: &Slot) -> DispatchReport {
        let mut report = DispatchReport::default();

        for recipient in &session.participants {
            let html = render_confirmation(recipient, &session.title, slot);
            match self
                .notifier
                .send(recipient, CONFIRMATION_SUBJECT, &html)
                .await
            {
                Ok(()) => {
                    metrics::record_notification("delivered");
                    tracing::debug!(session_id = %session.id, recipient = %recipient, "Confirmation delivered");
                    report.delivered.push(recipient.clone());
                }
                Err(e) => {
                    metrics::record_notification("failed");
                    tracing::warn!(
                        session_id = %session.id,
                        recipient = %recipient,
                        error = %e,
                        "Confirmation delivery failed"
                    );
                    report.failed.push(DeliveryFailure {
                        recipient: recipient.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            session_id = %session.id,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "Confirmation dispatch finished"
        );
        report
    }
}

/// Build the notifier selected by configuration
///
/// # Errors
///
/// Returns `Config` for an unknown provider or a SendGrid provider without
/// an API key.
pub fn build_notifier(config: &NotificationConfig) -> Result<Arc<dyn Notifier>> {
    match config.provider.as_str() {
        "log" => Ok(Arc::new(LogNotifier)),
        "sendgrid" => {
            let api_key = config.sendgrid.api_key.clone().ok_or_else(|| {
                StudySyncError::Config("SendGrid API key is not configured".to_string())
            })?;
            let notifier = SendGridNotifier::new(
                config.sendgrid.api_base.clone(),
                api_key,
                config.from_address.clone(),
            )?;
            Ok(Arc::new(notifier))
        }
        other => Err(StudySyncError::Config(format!("Unknown notifier: {}", other)).into()),
    }
}

/// HTML body of a confirmation message
pub fn render_confirmation(recipient: &str, title: &str, slot: &Slot) -> String {
    format!(
        "<p>Hi {},</p>\n\
         <p>The study session <strong>{}</strong> has been confirmed at:</p>\n\
         <h3>{}</h3>\n\
         <p>Thanks,<br>StudySync Team</p>\n",
        escape_html(&greeting_name(recipient)),
        escape_html(title),
        slot
    )
}

/// Escape text for interpolation into HTML
///
/// ```
/// use studysync::notify::escape_html;
///
/// assert_eq!(escape_html("<b>\"R&D\"</b>"), "&lt;b&gt;&quot;R&amp;D&quot;&lt;/b&gt;");
/// ```
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Local part of an address, title-cased per alphabetic run
///
/// `"john.doe@x.com"` becomes `"John.Doe"`.
pub fn greeting_name(email: &str) -> String {
    let local = email.split('@').next().unwrap_or(email);
    let mut out = String::with_capacity(local.len());
    let mut at_word_start = true;
    for c in local.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}
