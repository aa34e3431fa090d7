use tokio::process;
use tracing::debug;

use crate::{
    error::{Error, Result},
    Config,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// A bearer token handed to us directly.
    AccessToken(String),
    /// Application default credentials minted through the gcloud tool.
    Gcloud { bin: String },
}

impl Credentials {
    pub fn from_config(config: &Config) -> Self {
        match &config.access_token {
            Some(token) => Credentials::AccessToken(token.clone()),
            None => Credentials::Gcloud {
                bin: config.gcloud_bin.clone(),
            },
        }
    }

    pub async fn access_token(&self) -> Result<String> {
        let token = match self {
            Credentials::AccessToken(token) => token.trim().to_string(),
            Credentials::Gcloud { bin } => {
                debug!("requesting application default token from {bin}");
                let output = process::Command::new(bin)
                    .arg("auth")
                    .arg("application-default")
                    .arg("print-access-token")
                    .output()
                    .await
                    .map_err(|e| Error::Auth(format!("failed to run {bin}: {e}")))?;
                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    return Err(Error::Auth(format!(
                        "{bin} exited with {}: {}",
                        output.status,
                        stderr.trim()
                    )));
                }
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            }
        };

        if token.is_empty() {
            return Err(Error::Auth("empty access token".into()));
        }

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token_is_trimmed() {
        let creds = Credentials::AccessToken(" ya29.token\n".into());
        assert_eq!(creds.access_token().await.unwrap(), "ya29.token");
    }

    #[tokio::test]
    async fn test_empty_static_token_is_auth_error() {
        let creds = Credentials::AccessToken("   ".into());
        assert!(matches!(creds.access_token().await, Err(Error::Auth(_))));
    }

    #[tokio::test]
    async fn test_missing_gcloud_binary_is_auth_error() {
        let creds = Credentials::Gcloud {
            bin: "/nonexistent/gcloud-for-tests".into(),
        };
        assert!(matches!(creds.access_token().await, Err(Error::Auth(_))));
    }

    #[tokio::test]
    async fn test_failing_gcloud_is_auth_error() {
        let creds = Credentials::Gcloud { bin: "false".into() };
        assert!(matches!(creds.access_token().await, Err(Error::Auth(_))));
    }
}
