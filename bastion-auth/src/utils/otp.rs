//! One-time password helpers for the reset flow.
//!
//! OTPs are 6-digit codes delivered by email; only their sha256 digest is
//! persisted, and comparisons run in constant time.

use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub const OTP_DIGITS: usize = 6;

/// Generate a random 6-digit OTP, zero-padded.
pub fn generate_otp() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:06}", n)
}

/// Hex sha256 digest of an OTP for storage.
pub fn hash_otp(otp: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(otp.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time comparison of a presented OTP against a stored digest.
pub fn verify_otp(candidate: &str, stored_hash: &str) -> bool {
    let candidate_hash = hash_otp(candidate);
    candidate_hash
        .as_bytes()
        .ct_eq(stored_hash.as_bytes())
        .into()
}
