use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use marquee_core::notify::{Email, Mailer};
use marquee_core::{BookingError, CoreResult};
use marquee_shared::pii::Masked;
use tracing::{error, info};

use crate::error::{StoreError, StoreResult};

/// Sends HTML mail through an authenticated SMTP relay.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpMailer {
    pub fn new(host: &str, port: u16, username: String, password: String, sender: &str) -> StoreResult<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| StoreError::Mail(format!("SMTP relay error: {}", e)))?
            .port(port)
            .credentials(Credentials::new(username, password))
            .build();
        let sender = sender
            .parse()
            .map_err(|e| StoreError::Mail(format!("Invalid sender address: {}", e)))?;

        Ok(Self { transport, sender })
    }

    fn build(&self, email: &Email) -> StoreResult<Message> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| StoreError::Mail(format!("Invalid recipient: {}", e)))?;

        Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_HTML)
            .body(email.html.clone())
            .map_err(|e| StoreError::Mail(e.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email) -> CoreResult<()> {
        let message = self.build(email)?;
        match self.transport.send(message).await {
            Ok(_) => {
                info!(to = %Masked(email.to.as_str()), "Email sent: {}", email.subject);
                Ok(())
            }
            Err(e) => {
                error!(to = %Masked(email.to.as_str()), "Email delivery failed: {}", e);
                Err(BookingError::gateway(e))
            }
        }
    }
}
