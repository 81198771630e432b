//! Action-scoped rate limiting keyed on both email and client address.
//!
//! Both counters are consumed per attempt; denial of either key denies the
//! request, so neither a single mailbox nor a single address can flood a
//! sensitive action.

use std::sync::Arc;

use crate::config::RateLimitConfig;

use super::error::ServiceError;
use super::redis::CounterStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Login,
    ResetStart,
    ResetVerify,
}

impl Action {
    fn as_str(&self) -> &'static str {
        match self {
            Action::Login => "login",
            Action::ResetStart => "reset_start",
            Action::ResetVerify => "reset_verify",
        }
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    counters: Arc<dyn CounterStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(counters: Arc<dyn CounterStore>, config: RateLimitConfig) -> Self {
        Self { counters, config }
    }

    fn limits_for(&self, action: Action) -> (u32, u64) {
        match action {
            Action::Login => (
                self.config.login_attempts,
                self.config.login_window_seconds,
            ),
            Action::ResetStart => (
                self.config.reset_start_attempts,
                self.config.reset_start_window_seconds,
            ),
            Action::ResetVerify => (
                self.config.reset_verify_attempts,
                self.config.reset_verify_window_seconds,
            ),
        }
    }

    /// Consume one attempt for the given action. Errs with `RateLimited`
    /// carrying the longer of the two retry hints when either key is over.
    pub async fn allow(
        &self,
        action: Action,
        email: &str,
        client_addr: &str,
    ) -> Result<(), ServiceError> {
        let (limit, window) = self.limits_for(action);

        let email_key = format!("{}:email:{}", action.as_str(), email.to_lowercase());
        let addr_key = format!("{}:addr:{}", action.as_str(), client_addr);

        let by_email = self
            .counters
            .check_and_increment(&email_key, limit, window)
            .await?;
        let by_addr = self
            .counters
            .check_and_increment(&addr_key, limit, window)
            .await?;

        if by_email.allowed && by_addr.allowed {
            return Ok(());
        }

        let retry_after_seconds = by_email
            .retry_after_seconds
            .max(by_addr.retry_after_seconds);

        tracing::warn!(
            action = action.as_str(),
            client_addr,
            "rate limit exceeded"
        );

        Err(ServiceError::RateLimited {
            retry_after_seconds,
        })
    }
}
