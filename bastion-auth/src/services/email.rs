//! Outbound email. Production goes through SMTP; tests use a recording
//! provider so flows can read back the OTP that was "sent".

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::sync::Mutex;

use crate::config::SmtpConfig;

use super::error::ServiceError;

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_reset_otp(&self, to: &str, otp: &str) -> Result<(), ServiceError>;
}

pub struct SmtpEmailService {
    transport: SmtpTransport,
    from_address: String,
}

impl SmtpEmailService {
    pub fn new(config: &SmtpConfig) -> Result<Self, ServiceError> {
        let mut builder = SmtpTransport::relay(&config.host)
            .map_err(|e| ServiceError::Email(e.to_string()))?;

        if !config.user.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.user.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl EmailProvider for SmtpEmailService {
    async fn send_reset_otp(&self, to: &str, otp: &str) -> Result<(), ServiceError> {
        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|e| ServiceError::Email(format!("Invalid from address: {e}")))?,
            )
            .to(to
                .parse()
                .map_err(|e| ServiceError::Email(format!("Invalid recipient: {e}")))?)
            .subject("Your password reset code")
            .header(ContentType::TEXT_PLAIN)
            .body(format!(
                "Your password reset code is: {otp}\n\n\
                 The code expires in 10 minutes. If you did not request a reset,\n\
                 you can ignore this message."
            ))
            .map_err(|e| ServiceError::Email(e.to_string()))?;

        let transport = self.transport.clone();
        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| ServiceError::Email(e.to_string()))?
            .map_err(|e| ServiceError::Email(e.to_string()))?;

        tracing::info!(to, "reset OTP email sent");
        Ok(())
    }
}

/// Test provider that records every delivery instead of sending.
#[derive(Default)]
pub struct MockEmailService {
    sent: Mutex<Vec<(String, String)>>,
}

impl MockEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent OTP delivered to `email`, if any.
    pub fn last_otp_for(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, otp)| otp.clone())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl EmailProvider for MockEmailService {
    async fn send_reset_otp(&self, to: &str, otp: &str) -> Result<(), ServiceError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), otp.to_string()));
        Ok(())
    }
}
