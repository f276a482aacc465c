//! Upload Node Client
//!
//! HTTP client for a storage upload node.
//!
//! # Routes
//! - `GET  {node}/price/{token}/{bytes}` → price in atomic units (plain number)
//! - `POST {node}/account/fund/{token}` with `{ amount, payer, signature }`
//! - `POST {node}/tx/{token}` with the raw bytes → `{ "id": "..." }`
//!
//! Upload and funding requests carry the payer address and an ed25519
//! signature over the request body.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{ContentId, ContentStore};
use crate::config::StorageConfig;
use crate::error::StoreError;
use crate::ledger::Keypair;

pub struct GatewayStore {
    node_url: String,
    token: String,
    keypair: Keypair,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct UploadReceipt {
    id: ContentId,
}

impl GatewayStore {
    pub fn new(config: &StorageConfig, keypair: Keypair) -> Self {
        Self {
            node_url: config.node_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            keypair,
            http: reqwest::Client::new(),
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Gateway {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ContentStore for GatewayStore {
    async fn price(&self, bytes: u64) -> Result<u64, StoreError> {
        let url = format!("{}/price/{}/{}", self.node_url, self.token, bytes);
        let response = Self::check(self.http.get(&url).send().await?).await?;
        let text = response.text().await?;
        text.trim()
            .parse::<u64>()
            .map_err(|_| StoreError::Gateway {
                status: 200,
                body: format!("unparseable price: {text}"),
            })
    }

    async fn fund(&self, amount: u64) -> Result<(), StoreError> {
        let url = format!("{}/account/fund/{}", self.node_url, self.token);
        let payer = self.keypair.address();
        let message = format!("fund:{}:{}", self.token, amount);
        let body = json!({
            "amount": amount,
            "payer": payer,
            "signature": self.keypair.sign(message.as_bytes()),
        });
        debug!("funding upload node with {} atomic units", amount);
        Self::check(self.http.post(&url).json(&body).send().await?)
            .await
            .map_err(|e| StoreError::Funding(e.to_string()))?;
        Ok(())
    }

    async fn upload(&self, data: Vec<u8>, content_type: &str) -> Result<ContentId, StoreError> {
        let url = format!("{}/tx/{}", self.node_url, self.token);
        let signature = self.keypair.sign(&data);
        let response = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-payer", self.keypair.address().to_string())
            .header("x-signature", signature)
            .body(data)
            .send()
            .await?;
        let receipt: UploadReceipt = Self::check(response)
            .await
            .map_err(|e| StoreError::Upload(e.to_string()))?
            .json()
            .await?;
        Ok(receipt.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> GatewayStore {
        let config = StorageConfig {
            node_url: format!("{}/", server.uri()),
            ..StorageConfig::default()
        };
        GatewayStore::new(&config, Keypair::from_seed([1u8; 32]))
    }

    #[tokio::test]
    async fn test_price_fund_and_upload_routes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/price/solana/11"))
            .respond_with(ResponseTemplate::new(200).set_body_string("1234\n"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/account/fund/solana"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/tx/solana"))
            .and(header("content-type", "text/plain"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "id": "Ml6USN0ep4STMJuJ" })),
            )
            .mount(&server)
            .await;

        let store = store(&server);
        assert_eq!(store.price(11).await.unwrap(), 1234);
        store.fund(1234).await.unwrap();
        let id = store.upload(b"hello world".to_vec(), "text/plain").await.unwrap();
        assert_eq!(id, ContentId("Ml6USN0ep4STMJuJ".to_string()));
    }

    #[tokio::test]
    async fn test_rejected_upload_is_an_upload_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tx/solana"))
            .respond_with(ResponseTemplate::new(402).set_body_string("Not enough balance"))
            .mount(&server)
            .await;

        let err = store(&server)
            .upload(vec![1, 2, 3], "application/octet-stream")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Upload(msg) if msg.contains("402")));
    }
}
