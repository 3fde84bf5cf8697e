//! HTTPS/JSON client for the control plane's commitments API

use super::types::{
    CommitmentAssignmentUpdate, CommitmentImport, ListCommitmentsResponse, RemoteCommitment,
};
use super::{ApiResponse, InventoryApi};
use crate::error::{InventoryError, TransportError};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Collection path relative to the API base URL
pub const COMMITMENTS_PATH: &str = "v1/savings/commitments";

const API_KEY_HEADER: &str = "X-API-Key";

/// Client configuration
#[derive(Debug, Clone)]
struct ClientConfig {
    endpoint: String,
    api_key: Option<String>,
    request_timeout: Duration,
    connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// reqwest-backed [`InventoryApi`]
#[derive(Debug, Clone)]
pub struct HttpInventoryClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    request_timeout: Duration,
}

impl HttpInventoryClient {
    pub fn builder() -> HttpInventoryClientBuilder {
        HttpInventoryClientBuilder::new()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn collection_url(&self) -> Result<Url, TransportError> {
        self.base_url
            .join(COMMITMENTS_PATH)
            .map_err(|e| TransportError::Request(format!("invalid path: {e}")))
    }

    fn item_url(&self, id: &str) -> Result<Url, TransportError> {
        let mut url = self.collection_url()?;
        url.path_segments_mut()
            .map_err(|_| TransportError::Request("endpoint cannot be a base URL".to_string()))?
            .push(id);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<ApiResponse, TransportError> {
        let response = builder.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        debug!(status, "Control plane responded");
        Ok(ApiResponse { status, body })
    }

    fn transport_error(&self, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Deadline(self.request_timeout)
        } else if error.is_connect() {
            TransportError::Connect(error.to_string())
        } else {
            TransportError::Request(error.to_string())
        }
    }
}

#[async_trait]
impl InventoryApi for HttpInventoryClient {
    async fn list_commitments(&self) -> Result<Vec<RemoteCommitment>, InventoryError> {
        let url = self.collection_url()?;
        let response = self.send(self.request(Method::GET, url)).await?;

        if !response.is_success() {
            return Err(InventoryError::Api {
                status: response.status,
                body: response.body,
            });
        }

        let list: ListCommitmentsResponse = serde_json::from_str(&response.body)
            .map_err(|e| InventoryError::Decode(e.to_string()))?;
        Ok(list.commitments)
    }

    async fn create_commitment(
        &self,
        payload: &CommitmentImport,
    ) -> Result<ApiResponse, TransportError> {
        let url = self.collection_url()?;
        self.send(self.request(Method::POST, url).json(payload)).await
    }

    async fn update_commitment(
        &self,
        id: &str,
        update: &CommitmentAssignmentUpdate,
    ) -> Result<ApiResponse, TransportError> {
        let url = self.item_url(id)?;
        self.send(self.request(Method::PATCH, url).json(update)).await
    }

    async fn delete_commitment(&self, id: &str) -> Result<ApiResponse, TransportError> {
        let url = self.item_url(id)?;
        self.send(self.request(Method::DELETE, url)).await
    }
}

/// Builder for [`HttpInventoryClient`]
pub struct HttpInventoryClientBuilder {
    config: ClientConfig,
}

impl HttpInventoryClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<HttpInventoryClient, InventoryError> {
        let mut endpoint = self.config.endpoint.trim().to_string();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        let base_url = Url::parse(&endpoint)
            .map_err(|e| InventoryError::InvalidRequest(format!("invalid endpoint {endpoint}: {e}")))?;

        let client = Client::builder()
            .timeout(self.config.request_timeout)
            .connect_timeout(self.config.connect_timeout)
            .build()
            .map_err(|e| InventoryError::InvalidRequest(format!("failed to build HTTP client: {e}")))?;

        Ok(HttpInventoryClient {
            client,
            base_url,
            api_key: self.config.api_key,
            request_timeout: self.config.request_timeout,
        })
    }
}

impl Default for HttpInventoryClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
