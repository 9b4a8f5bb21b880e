use async_trait::async_trait;
use tracing::warn;

use crate::ports::{EmailMessage, MailError, Mailer};

/// Fallback mailer for processes without SMTP settings: each message is
/// written to the log and never delivered.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        warn!(
            from = %message.from,
            to = %message.to,
            subject = %message.subject,
            html_len = message.html.len(),
            "no mail transport configured, email logged instead of sent"
        );
        Ok(())
    }
}
