//! Transactional Mail Delivery
//!
//! The `Mailer` trait is the seam between the registration workflow and the
//! delivery backend. Production uses SendGrid over HTTPS with bounded
//! retries; tests substitute an in-memory mock.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Delivery attempts before giving up.
pub const MAX_RETRIES: u32 = 3;

// ============================================================================
// TYPES
// ============================================================================

/// An invitation mail ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct InvitationMail {
    pub username: String,
    pub email: String,
    pub activation_url: String,
}

/// Errors from mail delivery.
#[derive(Debug, Error)]
pub enum MailerError {
    #[error("mail request failed: {0}")]
    Http(String),

    #[error("mail provider rejected the request with status {status}")]
    Rejected { status: u16 },

    #[error("mail delivery failed after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

/// Delivery backend for transactional mail.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_invitation(&self, mail: &InvitationMail) -> Result<(), MailerError>;
}

// ============================================================================
// SENDGRID BACKEND
// ============================================================================

const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// SendGrid-backed mailer with bounded retries and linear backoff.
pub struct SendGridMailer {
    client: reqwest::Client,
    api_key: String,
    from_email: String,
    /// Sandbox mode validates the request without delivering mail.
    sandbox: bool,
}

impl SendGridMailer {
    pub fn new(api_key: String, from_email: String, sandbox: bool) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            from_email,
            sandbox,
        }
    }

    fn payload(&self, mail: &InvitationMail) -> serde_json::Value {
        json!({
            "personalizations": [{
                "to": [{ "email": mail.email, "name": mail.username }],
            }],
            "from": { "email": self.from_email },
            "subject": "Finish setting up your Gather account",
            "content": [{
                "type": "text/html",
                "value": format!(
                    "<p>Hi {},</p><p>Welcome to Gather! Click \
                     <a href=\"{}\">here</a> to activate your account.</p>",
                    mail.username, mail.activation_url
                ),
            }],
            "mail_settings": {
                "sandbox_mode": { "enable": self.sandbox }
            },
        })
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send_invitation(&self, mail: &InvitationMail) -> Result<(), MailerError> {
        let payload = self.payload(mail);

        for attempt in 1..=MAX_RETRIES {
            let result = self
                .client
                .post(SENDGRID_SEND_URL)
                .bearer_auth(&self.api_key)
                .json(&payload)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    tracing::info!(email = %mail.email, attempt, "Invitation mail sent");
                    return Ok(());
                }
                Ok(response) => {
                    tracing::warn!(
                        email = %mail.email,
                        attempt,
                        status = response.status().as_u16(),
                        "Mail provider rejected request, retrying"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        email = %mail.email,
                        attempt,
                        error = %e,
                        "Mail request failed, retrying"
                    );
                }
            }

            if attempt < MAX_RETRIES {
                tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
            }
        }

        Err(MailerError::Exhausted {
            attempts: MAX_RETRIES,
        })
    }
}

// ============================================================================
// TEST DOUBLE
// ============================================================================

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory mailer recording sent mail, with a failure knob.
    #[derive(Default)]
    pub struct MockMailer {
        pub sent: Mutex<Vec<InvitationMail>>,
        pub fail: AtomicBool,
    }

    impl MockMailer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            let mailer = Self::default();
            mailer.fail.store(true, Ordering::SeqCst);
            mailer
        }

        pub fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Mailer for MockMailer {
        async fn send_invitation(&self, mail: &InvitationMail) -> Result<(), MailerError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(MailerError::Exhausted {
                    attempts: MAX_RETRIES,
                });
            }
            self.sent.lock().unwrap().push(mail.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_sandbox_flag() {
        let mailer = SendGridMailer::new("key".into(), "no-reply@gather.local".into(), true);
        let payload = mailer.payload(&InvitationMail {
            username: "alice".into(),
            email: "alice@example.com".into(),
            activation_url: "http://localhost:4000/confirm/tok".into(),
        });

        assert_eq!(payload["mail_settings"]["sandbox_mode"]["enable"], true);
        assert_eq!(
            payload["personalizations"][0]["to"][0]["email"],
            "alice@example.com"
        );
        assert!(payload["content"][0]["value"]
            .as_str()
            .unwrap()
            .contains("http://localhost:4000/confirm/tok"));
    }

    #[tokio::test]
    async fn test_mock_mailer_records_sends() {
        let mailer = mock::MockMailer::new();
        let mail = InvitationMail {
            username: "bob".into(),
            email: "bob@example.com".into(),
            activation_url: "http://localhost:4000/confirm/tok".into(),
        };

        mailer.send_invitation(&mail).await.unwrap();
        assert_eq!(mailer.sent_count(), 1);
        assert_eq!(mailer.sent.lock().unwrap()[0], mail);
    }
}
