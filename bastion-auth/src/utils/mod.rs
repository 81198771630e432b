pub mod otp;
pub mod password;
pub mod validation;

pub use otp::{generate_otp, hash_otp, verify_otp};
pub use password::{hash_password, verify_password, Password, PasswordHashString};
pub use validation::ValidatedJson;
