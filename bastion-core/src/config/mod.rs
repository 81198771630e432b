//! Settings shared by every service in the workspace.
//!
//! Only the listen port lives here; everything service-specific is layered
//! on top by the service's own config module. Values come from an optional
//! `configuration` file with `APP__`-prefixed environment variables taking
//! precedence.

use crate::error::AppError;
use config::{Config as Loader, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8080
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let settings = Loader::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both cases live in one test: env mutation is process-global and the
    // order matters.
    #[test]
    fn port_defaults_and_reads_from_env() {
        std::env::remove_var("APP__PORT");
        assert_eq!(Config::load().unwrap().port, 8080);

        std::env::set_var("APP__PORT", "9100");
        assert_eq!(Config::load().unwrap().port, 9100);
        std::env::remove_var("APP__PORT");
    }
}
