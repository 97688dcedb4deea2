/// Mailjet v3.1 send API
///
/// `POST https://api.mailjet.com/v3.1/send` with basic auth (API key and
/// secret) and a JSON `Messages` array. Any 2xx is success.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{MailError, Mailer, OutgoingEmail};

/// Production endpoint
pub const MAILJET_SEND_URL: &str = "https://api.mailjet.com/v3.1/send";

/// Mailjet credentials and sender identity
#[derive(Debug, Clone)]
pub struct MailjetConfig {
    pub api_key: String,
    pub api_secret: String,
    pub sender_email: String,
    pub sender_name: String,

    /// Upper bound on one send call
    pub timeout: Duration,

    /// Overridable for tests against a local server
    pub endpoint: String,
}

impl MailjetConfig {
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        sender_email: impl Into<String>,
        sender_name: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            sender_email: sender_email.into(),
            sender_name: sender_name.into(),
            timeout: Duration::from_secs(10),
            endpoint: MAILJET_SEND_URL.to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    #[serde(rename = "Messages")]
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Message<'a> {
    from: Address<'a>,
    to: [Address<'a>; 1],
    subject: &'a str,
    text_part: &'a str,
    #[serde(rename = "HTMLPart")]
    html_part: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Address<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

/// Mailer delivering through Mailjet
#[derive(Debug, Clone)]
pub struct MailjetMailer {
    client: Client,
    config: MailjetConfig,
}

impl MailjetMailer {
    pub fn new(config: MailjetConfig) -> Result<Self, MailError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MailError::Build(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn body<'a>(&'a self, email: &'a OutgoingEmail) -> SendRequest<'a> {
        SendRequest {
            messages: [Message {
                from: Address {
                    email: &self.config.sender_email,
                    name: Some(&self.config.sender_name),
                },
                to: [Address {
                    email: &email.recipient,
                    name: None,
                }],
                subject: &email.subject,
                text_part: &email.text,
                html_part: &email.html,
            }],
        }
    }
}

#[async_trait]
impl Mailer for MailjetMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
            .json(&self.body(&email))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(recipient = %email.recipient, "Mail accepted by Mailjet");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(MailError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
