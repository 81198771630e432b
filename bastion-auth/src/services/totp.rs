//! TOTP enrollment and verification.

use totp_rs::{Algorithm, Secret, TOTP};

use super::error::ServiceError;

const TOTP_DIGITS: usize = 6;
const TOTP_SKEW: u8 = 1;
const TOTP_STEP: u64 = 30;

#[derive(Clone)]
pub struct TotpService {
    issuer: String,
}

pub struct Enrollment {
    /// Base32 secret for the authenticator app.
    pub secret: String,
    pub provisioning_uri: String,
}

impl TotpService {
    pub fn new(issuer: String) -> Self {
        Self { issuer }
    }

    /// Generate a fresh secret and its otpauth:// URI for the given account.
    pub fn enroll(&self, account_email: &str) -> Result<Enrollment, ServiceError> {
        let secret = Secret::generate_secret();
        let totp = self.build(&secret.to_encoded().to_string(), account_email)?;

        Ok(Enrollment {
            secret: secret.to_encoded().to_string(),
            provisioning_uri: totp.get_url(),
        })
    }

    /// Check a 6-digit code against the stored secret, allowing one step of
    /// clock skew either way.
    pub fn verify(&self, secret: &str, code: &str) -> Result<bool, ServiceError> {
        let totp = self.build(secret, "")?;
        totp.check_current(code)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("System clock error: {e}")))
    }

    fn build(&self, secret: &str, account_email: &str) -> Result<TOTP, ServiceError> {
        let secret_bytes = Secret::Encoded(secret.to_string())
            .to_bytes()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Invalid TOTP secret: {e:?}")))?;

        TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            TOTP_SKEW,
            TOTP_STEP,
            secret_bytes,
            Some(self.issuer.clone()),
            account_email.to_string(),
        )
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("TOTP construction failed: {e}")))
    }
}
