//! Pennyworth Settings
//!
//! Typed configuration read from the environment at startup. A missing
//! variable fails fast with its name; nothing here touches the network.

use std::env;

use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("missing environment variable {0}")]
    MissingVar(&'static str),
}

pub type Result<T> = std::result::Result<T, SettingsError>;

const DEFAULT_DATABASE_PATH: &str = "pennyworth.sqlite";

#[derive(Debug, Clone)]
pub struct Config {
    pub to_signer_queue: String,
    pub from_signer_queue: String,
    pub plaid_env: String,
    pub plaid_client_id: String,
    pub plaid_secret: String,
    pub signer_url: String,
    pub signer_public_key: String,
    pub server_private_key: String,
    pub server_kid: String,
    pub database_path: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            to_signer_queue: required("AWS_SQS_URL_TO_SIGNER")?,
            from_signer_queue: required("AWS_SQS_URL_FROM_SIGNER")?,
            plaid_env: required("PLAID_ENV")?,
            plaid_client_id: required("PLAID_CLIENTID")?,
            plaid_secret: required("PLAID_SECRET")?,
            signer_url: required("SIGNER_URL")?,
            signer_public_key: required("SIGNER_PUBLIC_KEY")?,
            server_private_key: required("SERVER_PRIVATE_KEY")?,
            server_kid: required("SERVER_KID")?,
            database_path: env::var("PENNYWORTH_DB")
                .unwrap_or_else(|_| DEFAULT_DATABASE_PATH.to_string()),
        };
        debug!(
            plaid_env = %config.plaid_env,
            database = %config.database_path,
            "configuration loaded"
        );
        Ok(config)
    }
}

fn required(name: &'static str) -> Result<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(SettingsError::MissingVar(name)),
    }
}
