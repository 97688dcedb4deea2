/// Outbound email
///
/// The login flow only needs one thing from mail: send a message with a
/// plaintext and an HTML body to one recipient. That is the [`Mailer`]
/// trait. [`MailjetMailer`] delivers through the Mailjet v3.1 HTTP API;
/// [`LogMailer`] only logs and is used when no provider is configured.
///
/// # Example
///
/// ```no_run
/// use vuedoo_shared::mail::{Mailer, OutgoingEmail, LogMailer};
///
/// # async fn example() -> Result<(), vuedoo_shared::mail::MailError> {
/// let mailer = LogMailer;
/// mailer
///     .send(OutgoingEmail {
///         recipient: "a@example.com".to_string(),
///         subject: "Hello".to_string(),
///         text: "Hi".to_string(),
///         html: "<p>Hi</p>".to_string(),
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;

pub mod mailjet;
pub mod templates;

pub use mailjet::{MailjetConfig, MailjetMailer};

/// Error type for mail delivery
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// Request never got an HTTP response (DNS, TLS, timeout, ...)
    #[error("Mail transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Provider answered with a non-2xx status
    #[error("Mail provider rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Client could not be constructed
    #[error("Mail client setup failed: {0}")]
    Build(String),
}

/// One message to one recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub recipient: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Email delivery collaborator
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Delivers the message or reports why it could not
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError>;
}

/// Mailer that writes to the log instead of delivering
///
/// Bodies are not logged: they carry one-time codes.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        tracing::info!(
            recipient = %email.recipient,
            subject = %email.subject,
            "No mail provider configured, message not delivered"
        );
        Ok(())
    }
}
