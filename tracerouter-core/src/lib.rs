use std::env;

use tracing::warn;

pub mod compute;
pub mod error;
pub mod matcher;
pub mod models;

pub use compute::{client::ComputeClient, ComputeInventory};
pub use error::{ApiError, Error, Result};

pub const DEFAULT_API_ENDPOINT: &str = "https://compute.googleapis.com/compute/v1";
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const MAX_RETRIES_LIMIT: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_endpoint: String,
    pub access_token: Option<String>,
    pub gcloud_bin: String,
    pub max_retries: u32,
}

pub async fn new_client(config: &Config) -> Result<ComputeClient> {
    ComputeClient::connect(config).await
}

pub fn load_config() -> Config {
    let api_endpoint = env::var("COMPUTE_API_ENDPOINT").unwrap_or(DEFAULT_API_ENDPOINT.into());
    let access_token = env::var("GOOGLE_OAUTH_ACCESS_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty());
    let gcloud_bin = env::var("GCLOUD_BIN").unwrap_or("gcloud".into());
    let max_retries = parse_max_retries(env::var("COMPUTE_API_MAX_RETRIES").ok().as_deref());

    Config {
        api_endpoint,
        access_token,
        gcloud_bin,
        max_retries,
    }
}

fn parse_max_retries(raw: Option<&str>) -> u32 {
    let Some(raw) = raw else {
        return DEFAULT_MAX_RETRIES;
    };
    match raw.trim().parse::<u32>() {
        Ok(n) if n > MAX_RETRIES_LIMIT => {
            warn!("COMPUTE_API_MAX_RETRIES {n} is above {MAX_RETRIES_LIMIT}, clamping");
            MAX_RETRIES_LIMIT
        }
        Ok(n) => n,
        Err(_) => {
            warn!("ignoring invalid COMPUTE_API_MAX_RETRIES {raw:?}");
            DEFAULT_MAX_RETRIES
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_endpoint: DEFAULT_API_ENDPOINT.into(),
            access_token: None,
            gcloud_bin: "gcloud".into(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_retries_from_env_value() {
        assert_eq!(parse_max_retries(None), DEFAULT_MAX_RETRIES);
        assert_eq!(parse_max_retries(Some("0")), 0);
        assert_eq!(parse_max_retries(Some(" 5 ")), 5);
        assert_eq!(parse_max_retries(Some("many")), DEFAULT_MAX_RETRIES);
        assert_eq!(parse_max_retries(Some("-1")), DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn test_max_retries_is_clamped() {
        assert_eq!(parse_max_retries(Some("40")), MAX_RETRIES_LIMIT);
        assert_eq!(parse_max_retries(Some("4294967295")), MAX_RETRIES_LIMIT);
    }
}
