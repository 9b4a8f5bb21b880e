//! NotifyHandler - 完了通知メールの送信
//!
//! 失敗時はリトライしない（ハーネスがログに残してジョブを破棄する）。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::domain::{HeraldError, NotifyTask, Outcome};
use crate::ports::{EmailMessage, Mailer};
use crate::typed::Handler;

pub struct NotifyHandler {
    mailer: Arc<dyn Mailer>,
    from: String,
}

impl NotifyHandler {
    pub fn new(mailer: Arc<dyn Mailer>, from: impl Into<String>) -> Self {
        Self {
            mailer,
            from: from.into(),
        }
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
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

/// 完了通知メールを組み立てる
pub fn completion_email(from: &str, job: &NotifyTask) -> EmailMessage {
    let task_id = escape_html(&job.task_id);
    let html = format!(
        "<h2>Task Completed</h2>\n\
         <p>Hello {name},</p>\n\
         <p>Your task has been successfully <b>completed</b>.</p>\n\
         <p>You can download the result from the monitoring page.</p>\n\
         <hr/>\n\
         <small>Task ID: {task_id}</small>\n",
        name = escape_html(&job.user.user_name),
    );
    EmailMessage {
        from: from.to_string(),
        to: job.user.email.clone(),
        subject: format!("Your task {} has been completed", job.task_id),
        html,
    }
}

#[async_trait]
impl Handler<NotifyTask> for NotifyHandler {
    async fn handle(&self, job: NotifyTask) -> Result<Outcome, HeraldError> {
        let message = completion_email(&self.from, &job);
        info!(task_id = %job.task_id, to = %message.to, "sending completion email");
        self.mailer.send(&message).await?;
        info!(task_id = %job.task_id, "completion email sent");
        Ok(Outcome::EmailSent {
            task_id: job.task_id,
            recipient: message.to,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorKind, UserDescriptor};
    use crate::impls::MemoryMailer;

    fn job() -> NotifyTask {
        NotifyTask {
            user: UserDescriptor::new(7, "Ana", "a@x.com"),
            task_id: "T1".into(),
        }
    }

    #[test]
    fn template_fields() {
        let message = completion_email("Herald <no-reply>", &job());
        assert_eq!(message.from, "Herald <no-reply>");
        assert_eq!(message.to, "a@x.com");
        assert_eq!(message.subject, "Your task T1 has been completed");
        assert!(message.html.contains("<h2>Task Completed</h2>"));
        assert!(message.html.contains("Hello Ana,"));
        assert!(message.html.contains("successfully <b>completed</b>"));
        assert!(message.html.contains("monitoring page"));
        assert!(message.html.contains("<small>Task ID: T1</small>"));
    }

    #[test]
    fn user_name_is_escaped() {
        let mut job = job();
        job.user.user_name = "<script>".into();
        let message = completion_email("x", &job);
        assert!(message.html.contains("Hello &lt;script&gt;,"));
    }

    #[tokio::test]
    async fn each_invocation_sends_once() {
        let mailer = Arc::new(MemoryMailer::new());
        let handler = NotifyHandler::new(mailer.clone(), "Herald <no-reply>");

        handler.handle(job()).await.unwrap();
        handler.handle(job()).await.unwrap();

        assert_eq!(mailer.attempts(), 2);
        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], sent[1]);
    }

    #[tokio::test]
    async fn delivery_failure_is_returned() {
        let mailer = Arc::new(MemoryMailer::new());
        mailer.set_failing(true);
        let handler = NotifyHandler::new(mailer.clone(), "Herald <no-reply>");

        let err = handler.handle(job()).await.unwrap_err();
        assert!(matches!(err, HeraldError::Notification(_)));
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert_eq!(mailer.attempts(), 1);
        assert!(mailer.sent().is_empty());
    }
}
