//! SMTP delivery through an async `lettre` transport.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use crate::config::{SmtpSettings, SmtpTls};
use crate::ports::{EmailMessage, MailError, Mailer};

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    /// Used as the sender address when `from` carries only a display name,
    /// the way authenticated relays rewrite the sender anyway.
    account: Option<Address>,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, MailError> {
        let host = settings.host.as_str();
        let builder = match settings.tls {
            SmtpTls::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(host),
            SmtpTls::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host),
            SmtpTls::Plain => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)),
        }
        .map_err(|err| MailError::Transport(format!("smtp relay {host}: {err}")))?;

        let builder = match settings.port {
            Some(port) => builder.port(port),
            None => builder,
        };
        let builder = match &settings.credentials {
            Some(c) => builder.credentials(Credentials::new(c.user.clone(), c.pass.clone())),
            None => builder,
        };

        let account = settings
            .credentials
            .as_ref()
            .and_then(|c| c.user.parse::<Address>().ok());
        Ok(Self {
            transport: builder.build(),
            account,
        })
    }

    /// Render `message` as a MIME message with an HTML body.
    pub fn build_message(&self, message: &EmailMessage) -> Result<Message, MailError> {
        let from = sender_mailbox(&message.from, self.account.as_ref())?;
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|err| MailError::Rejected(format!("recipient {:?}: {err}", message.to)))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(message.subject.as_str())
            .header(ContentType::TEXT_HTML)
            .body(message.html.clone())
            .map_err(|err| MailError::Rejected(err.to_string()))
    }
}

/// Parse `from`; a bare display name such as `Team <no-reply>` falls back to
/// the account address.
fn sender_mailbox(from: &str, account: Option<&Address>) -> Result<Mailbox, MailError> {
    match from.parse::<Mailbox>() {
        Ok(mailbox) => Ok(mailbox),
        Err(err) => {
            let Some(account) = account else {
                return Err(MailError::Rejected(format!("sender {from:?}: {err}")));
            };
            let name = from
                .split('<')
                .next()
                .map(|n| n.trim().trim_matches('"').trim())
                .filter(|n| !n.is_empty())
                .map(str::to_string);
            Ok(Mailbox::new(name, account.clone()))
        }
    }
}

fn send_error(err: lettre::transport::smtp::Error) -> MailError {
    if err.is_permanent() {
        MailError::Rejected(err.to_string())
    } else {
        MailError::Transport(err.to_string())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let email = self.build_message(message)?;
        let response = self.transport.send(email).await.map_err(send_error)?;
        debug!(to = %message.to, code = %response.code(), "smtp accepted message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SmtpCredentials;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    fn settings(port: u16, user: Option<&str>) -> SmtpSettings {
        SmtpSettings {
            host: "127.0.0.1".into(),
            port: Some(port),
            tls: SmtpTls::Plain,
            credentials: user.map(|u| SmtpCredentials {
                user: u.into(),
                pass: "secret".into(),
            }),
        }
    }

    fn message(from: &str, to: &str) -> EmailMessage {
        EmailMessage {
            from: from.into(),
            to: to.into(),
            subject: "Task status update".into(),
            html: "<p>Task <b>T1</b> completed</p>".into(),
        }
    }

    fn header<'a>(raw: &'a str, name: &str) -> &'a str {
        raw.lines()
            .find_map(|line| line.strip_prefix(name)?.strip_prefix(": "))
            .unwrap_or_default()
    }

    /// A one-connection SMTP server that refuses every recipient.
    async fn refusing_server() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let mut lines = BufReader::new(read).lines();
            write.write_all(b"220 test ready\r\n").await.unwrap();
            while let Ok(Some(line)) = lines.next_line().await {
                let reply: &[u8] = match line.get(..4).map(str::to_ascii_uppercase).as_deref() {
                    Some("RCPT") => b"550 5.1.1 mailbox unavailable\r\n",
                    Some("QUIT") => b"221 bye\r\n",
                    _ => b"250 ok\r\n",
                };
                if write.write_all(reply).await.is_err() || reply.starts_with(b"221") {
                    break;
                }
            }
        });
        port
    }

    #[test]
    fn message_is_html_with_headers() {
        let mailer = SmtpMailer::new(&settings(2525, None)).unwrap();
        let email = mailer
            .build_message(&message("Herald <herald@example.com>", "ada@example.com"))
            .unwrap();

        let raw = String::from_utf8(email.formatted()).unwrap();
        let from = header(&raw, "From");
        assert!(from.contains("Herald") && from.contains("<herald@example.com>"), "{raw}");
        assert!(header(&raw, "To").contains("ada@example.com"), "{raw}");
        assert_eq!(header(&raw, "Subject"), "Task status update");
        assert!(header(&raw, "Content-Type").starts_with("text/html"), "{raw}");
        assert!(raw.contains("<b>T1</b>"), "{raw}");
    }

    #[test]
    fn display_name_sender_uses_account_address() {
        let mailer = SmtpMailer::new(&settings(2525, Some("bot@example.com"))).unwrap();
        let email = mailer
            .build_message(&message(
                "Social Listening Auto Labeling <no-reply>",
                "ada@example.com",
            ))
            .unwrap();

        let raw = String::from_utf8(email.formatted()).unwrap();
        let from = header(&raw, "From");
        assert!(from.contains("Social Listening Auto Labeling"), "{raw}");
        assert!(from.contains("<bot@example.com>"), "{raw}");
    }

    #[test]
    fn bad_addresses_are_rejected() {
        let mailer = SmtpMailer::new(&settings(2525, None)).unwrap();

        let err = mailer
            .build_message(&message("Team <no-reply>", "ada@example.com"))
            .unwrap_err();
        assert!(matches!(err, MailError::Rejected(msg) if msg.contains("sender")));

        let err = mailer
            .build_message(&message("herald@example.com", "not an address"))
            .unwrap_err();
        assert!(matches!(err, MailError::Rejected(msg) if msg.contains("recipient")));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let mailer = SmtpMailer::new(&settings(port, None)).unwrap();

        let err = mailer
            .send(&message("herald@example.com", "ada@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::Transport(_)), "{err}");
    }

    #[tokio::test]
    async fn refused_recipient_is_rejected() {
        let port = refusing_server().await;
        let mailer = SmtpMailer::new(&settings(port, None)).unwrap();

        let err = mailer
            .send(&message("herald@example.com", "ada@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::Rejected(_)), "{err}");
    }
}
