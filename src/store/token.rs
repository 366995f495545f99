use serde::Deserialize;
use tracing::{debug, error};

use super::StoreError;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
}

/// Where BigQuery bearer tokens come from.
pub enum TokenSource {
    /// A token supplied through config or `BQ_ACCESS_TOKEN`.
    Static(String),
    /// The GCE/Cloud Run metadata server's default service account.
    Metadata { client: reqwest::Client, url: String },
}

impl TokenSource {
    pub fn metadata(client: reqwest::Client) -> Self {
        Self::Metadata {
            client,
            url: METADATA_TOKEN_URL.to_string(),
        }
    }

    pub async fn token(&self) -> Result<String, StoreError> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::Metadata { client, url } => {
                debug!("Requesting access token from metadata server");
                let response = client
                    .get(url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await
                    .map_err(|e| {
                        StoreError::Unavailable(format!("metadata server unreachable: {}", e))
                    })?;

                let status = response.status();
                let body = response.text().await.map_err(|e| {
                    StoreError::Unavailable(format!("failed to read token response: {}", e))
                })?;

                if !status.is_success() {
                    error!("Metadata token request failed with status {}: {}", status, body);
                    return Err(StoreError::Unavailable(format!(
                        "metadata token request failed with status {}",
                        status
                    )));
                }

                let token: MetadataToken = serde_json::from_str(&body)
                    .map_err(|e| StoreError::Protocol(format!("invalid token response: {}", e)))?;
                Ok(token.access_token)
            }
        }
    }
}
