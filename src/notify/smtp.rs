//! SMTP delivery of rule notifications.

use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use metrics::counter;
use tracing::{debug, error, warn};

use super::{NotificationError, Notifier};

/// Plain-text mail over async SMTP (STARTTLS relay).
#[derive(Clone)]
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        from: &str,
    ) -> Result<Self, NotificationError> {
        let from = parse_mailbox(from)?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)?.port(port);
        if let (Some(user), Some(pass)) = (username, password) {
            builder = builder.credentials(Credentials::new(user.to_string(), pass.to_string()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    async fn deliver(&self, to: &str, subject: &str, body: &str) -> Result<(), NotificationError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(to)?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        self.transport.send(message).await?;
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotificationError> {
    address
        .parse()
        .map_err(|source| NotificationError::Address {
            address: address.to_string(),
            source,
        })
}

impl Notifier for SmtpNotifier {
    fn send_async(&self, to: Vec<String>, subject: String, body: String) {
        if to.is_empty() {
            warn!(%subject, "Notification dropped: no recipients");
            return;
        }

        let notifier = self.clone();
        tokio::spawn(async move {
            for recipient in &to {
                match notifier.deliver(recipient, &subject, &body).await {
                    Ok(()) => {
                        counter!("notifications_sent_total", "channel" => "smtp").increment(1);
                        debug!(recipient = %recipient, %subject, "Notification sent");
                    }
                    Err(err) => {
                        counter!("notifications_failed_total", "channel" => "smtp").increment(1);
                        error!(recipient = %recipient, %subject, error = %err, "Notification failed");
                    }
                }
            }
        });
    }
}
