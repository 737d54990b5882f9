//! Product API Client
//!
//! Async client for the backend's product CRUD endpoints. Every call carries
//! the bearer token and is bounded by the configured request timeout; the
//! response is mapped onto the shared failure taxonomy so callers can decide
//! between surfacing an error and queueing the mutation for later replay.

use crate::client::config::Config;
use crate::shared::error::SyncError;
use crate::shared::product::Product;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;

/// Remote data client for the product collection
#[derive(Debug, Clone)]
pub struct ProductApi {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl ProductApi {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.server_url().to_string(),
            timeout: config.get_request_timeout(),
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/api/product", self.base_url)
    }

    fn item_url(&self, id: &str) -> String {
        format!("{}/api/product/{}", self.base_url, id)
    }

    /// Fetch the full product collection
    pub async fn list(&self, token: &str) -> Result<Vec<Product>, SyncError> {
        let response = self
            .send(self.client.get(self.collection_url()), token)
            .await?;
        Ok(response.json::<Vec<Product>>().await?)
    }

    /// Create a product; the returned record carries the server-assigned id
    pub async fn create(&self, token: &str, product: &Product) -> Result<Product, SyncError> {
        let response = self
            .send(self.client.post(self.collection_url()).json(product), token)
            .await?;
        Ok(response.json::<Product>().await?)
    }

    /// Update a product by id; returns the canonical record
    pub async fn update(&self, token: &str, product: &Product) -> Result<Product, SyncError> {
        let id = product
            .id
            .as_deref()
            .ok_or_else(|| SyncError::decode("update requires a product id"))?;
        let response = self
            .send(self.client.put(self.item_url(id)).json(product), token)
            .await?;
        Ok(response.json::<Product>().await?)
    }

    /// Delete a product by id
    pub async fn delete(&self, token: &str, id: &str) -> Result<(), SyncError> {
        self.send(self.client.delete(self.item_url(id)), token)
            .await?;
        Ok(())
    }

    /// Attach auth + timeout, send, and map the outcome onto the taxonomy.
    async fn send(&self, request: RequestBuilder, token: &str) -> Result<Response, SyncError> {
        if token.trim().is_empty() {
            return Err(SyncError::auth("no token available"));
        }

        let response = request
            .header("Authorization", format!("Bearer {}", token))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SyncError::network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SyncError::auth(format!("server returned {}", status)));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            return Err(SyncError::server(status.as_u16(), message));
        }
        Ok(response)
    }
}
