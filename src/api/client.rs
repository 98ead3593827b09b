//! HTTP client for the topology API.

use reqwest::blocking::Client;
use std::time::Duration;
use tracing::info;

use super::{NodeSource, SourceError};
use crate::graph::types::NetworkNode;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, SourceError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| SourceError::Http {
                url: base_url.clone(),
                source,
            })?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn nodes_url(&self) -> String {
        format!("{}/nodes", self.base_url)
    }
}

impl NodeSource for ApiClient {
    /// Fetch the full node list
    fn fetch_nodes(&self) -> Result<Vec<NetworkNode>, SourceError> {
        let url = self.nodes_url();
        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|source| SourceError::Http {
                url: url.clone(),
                source,
            })?;

        if !resp.status().is_success() {
            return Err(SourceError::Status {
                url,
                status: resp.status(),
            });
        }

        let nodes: Vec<NetworkNode> = resp.json().map_err(SourceError::Decode)?;
        info!(count = nodes.len(), url = %url, "Fetched nodes from API");
        Ok(nodes)
    }

    fn health(&self) -> Result<(), SourceError> {
        let url = format!("{}/health", self.base_url());
        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|source| SourceError::Http {
                url: url.clone(),
                source,
            })?;

        if !resp.status().is_success() {
            return Err(SourceError::Status {
                url,
                status: resp.status(),
            });
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("API {}", self.base_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_ignore_trailing_slash() {
        let client = ApiClient::new("http://127.0.0.1:6500/").unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:6500");
        assert_eq!(client.nodes_url(), "http://127.0.0.1:6500/nodes");
        assert_eq!(client.describe(), "API http://127.0.0.1:6500");
    }

    #[test]
    fn test_unreachable_api_is_an_http_error() {
        // Port 9 (discard) is closed on test machines
        let client = ApiClient::new("http://127.0.0.1:9").unwrap();
        match client.fetch_nodes() {
            Err(SourceError::Http { url, .. }) => assert_eq!(url, "http://127.0.0.1:9/nodes"),
            other => panic!("expected an HTTP error, got {:?}", other.map(|n| n.len())),
        }
    }
}
