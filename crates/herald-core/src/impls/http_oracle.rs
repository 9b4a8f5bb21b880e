//! HTTP client for the external status service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::domain::OracleSnapshot;
use crate::ports::{OracleError, StatusOracle};

#[derive(Debug, Clone)]
pub struct HttpStatusOracle {
    client: Client,
    url: String,
}

impl HttpStatusOracle {
    /// `endpoint` is the service base URL, `path` the status listing
    /// (`/api/label-excel-bg` in production).
    pub fn new(
        endpoint: &str,
        path: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, OracleError> {
        let mut builder = Client::builder().user_agent(concat!("herald/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| OracleError::Network(e.to_string()))?;
        Ok(Self {
            client,
            url: format!("{}{}", endpoint.trim_end_matches('/'), path),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl StatusOracle for HttpStatusOracle {
    async fn snapshot(&self) -> Result<OracleSnapshot, OracleError> {
        debug!(url = %self.url, "fetching task statuses");

        let response = self.client.get(&self.url).send().await.map_err(|e| {
            warn!(url = %self.url, error = %e, "status request failed");
            OracleError::Network(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(url = %self.url, status = status.as_u16(), "status service returned an error");
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| OracleError::Network(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| OracleError::Decode(e.to_string()))
    }
}
