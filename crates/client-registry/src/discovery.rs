//! Backend address discovery.

use crate::error::{RegistryError, RegistryResult};
use agent_service_client::{AgentResult, AgentService, HttpAgentClient};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Resolves the base address of the agent service.
#[async_trait]
pub trait AddressDiscovery: Send + Sync {
    async fn discover(&self) -> RegistryResult<String>;
}

/// Builds a client bound to a resolved address.
pub trait ClientFactory: Send + Sync {
    fn connect(&self, base_url: &str, project_path: &str) -> AgentResult<Arc<dyn AgentService>>;
}

/// Discovery over a GET endpoint answering `{"url": "..."}`.
#[derive(Clone)]
pub struct HttpDiscovery {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpDiscovery {
    pub fn new(http_client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AddressDiscovery for HttpDiscovery {
    async fn discover(&self) -> RegistryResult<String> {
        debug!(endpoint = %self.endpoint, "Discovering backend address");

        let response = self
            .http_client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| RegistryError::BackendUnreachable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RegistryError::BackendUnreachable(e.to_string()))?;

        parse_discovery_response(status.as_u16(), &body)
    }
}

/// Validate a discovery answer.
///
/// Anything other than a 2xx status with a JSON body whose `url` field is
/// a non-empty absolute URL string is `BackendUnreachable`.
pub fn parse_discovery_response(status: u16, body: &str) -> RegistryResult<String> {
    if !(200..300).contains(&status) {
        warn!(status, "Backend discovery returned non-success status");
        return Err(RegistryError::BackendUnreachable(format!(
            "discovery returned status {}",
            status
        )));
    }

    let value: serde_json::Value = serde_json::from_str(body).map_err(|e| {
        RegistryError::BackendUnreachable(format!("discovery response is not JSON: {}", e))
    })?;

    let url = value
        .get("url")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| {
            RegistryError::BackendUnreachable("discovery response has no url".to_string())
        })?;

    Url::parse(url).map_err(|e| {
        RegistryError::BackendUnreachable(format!("discovery returned invalid url {}: {}", url, e))
    })?;

    Ok(url.to_string())
}

/// Factory producing [`HttpAgentClient`]s that share one connection pool.
#[derive(Clone, Default)]
pub struct HttpClientFactory {
    http_client: reqwest::Client,
}

impl HttpClientFactory {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

impl ClientFactory for HttpClientFactory {
    fn connect(&self, base_url: &str, project_path: &str) -> AgentResult<Arc<dyn AgentService>> {
        let client = HttpAgentClient::new(self.http_client.clone(), base_url, project_path)?;
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_response() {
        let url = parse_discovery_response(200, r#"{"url":"http://127.0.0.1:4096"}"#).unwrap();
        assert_eq!(url, "http://127.0.0.1:4096");
    }

    #[test]
    fn test_parse_non_success_status() {
        let err = parse_discovery_response(503, r#"{"url":"http://127.0.0.1:4096"}"#).unwrap_err();
        assert_eq!(
            err,
            RegistryError::BackendUnreachable("discovery returned status 503".to_string())
        );
    }

    #[test]
    fn test_parse_missing_or_unusable_url() {
        for body in [
            r#"{}"#,
            r#"{"url":null}"#,
            r#"{"url":42}"#,
            r#"{"url":"   "}"#,
            r#"{"address":"http://x"}"#,
            r#"["http://x"]"#,
        ] {
            assert!(
                parse_discovery_response(200, body).is_err(),
                "expected failure for {}",
                body
            );
        }
    }

    #[test]
    fn test_parse_non_json_body() {
        assert!(parse_discovery_response(200, "http://127.0.0.1:4096").is_err());
    }

    #[test]
    fn test_parse_relative_url_rejected() {
        assert!(parse_discovery_response(200, r#"{"url":"/api"}"#).is_err());
    }

    #[test]
    fn test_factory_rejects_bad_address() {
        let factory = HttpClientFactory::default();
        assert!(factory.connect("::not a url::", "/src").is_err());
        assert!(factory.connect("http://127.0.0.1:4096", "/src").is_ok());
    }
}
