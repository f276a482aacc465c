//! Upload Flow
//!
//! Every upload follows the same three steps: ask the store for the price
//! of the payload, fund exactly that amount, then upload. The result is the
//! public gateway URL of the stored content.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::ContentStore;
use crate::amount::{NATIVE_DECIMALS, from_base_units};
use crate::error::StoreError;

/// Off-chain metadata document referenced by a token or NFT uri
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMetadata {
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub image: String,
}

pub struct Uploader {
    store: Arc<dyn ContentStore>,
    gateway_url: String,
}

impl Uploader {
    pub fn new(store: Arc<dyn ContentStore>, gateway_url: &str) -> Self {
        Self {
            store,
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
        }
    }

    /// Upload a file from disk and return its gateway URL
    pub async fn upload_file(&self, path: impl AsRef<Path>) -> Result<String, StoreError> {
        let path = path.as_ref();
        info!("Uploading file {}", path.display());
        let data = tokio::fs::read(path).await?;
        self.upload_bytes(data, content_type_for(path)).await
    }

    /// Upload a metadata document as JSON and return its gateway URL
    pub async fn upload_metadata(&self, metadata: &AssetMetadata) -> Result<String, StoreError> {
        info!("Uploading metadata for {} ({})", metadata.name, metadata.symbol);
        let data = serde_json::to_vec(metadata)?;
        self.upload_bytes(data, "application/json").await
    }

    async fn upload_bytes(&self, data: Vec<u8>, content_type: &str) -> Result<String, StoreError> {
        let size = data.len() as u64;
        let price = self.store.price(size).await?;
        info!(
            "Uploading {} bytes costs {}",
            size,
            from_base_units(price, NATIVE_DECIMALS)
        );
        self.store.fund(price).await?;

        let id = self.store.upload(data, content_type).await?;
        let url = format!("{}/{}", self.gateway_url, id);
        info!("Content uploaded ==> {}", url);
        Ok(url)
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ContentId, MemoryStore};

    fn uploader(store: &MemoryStore) -> Uploader {
        Uploader::new(Arc::new(store.clone()), "https://gateway.irys.xyz/")
    }

    #[tokio::test]
    async fn test_upload_file_funds_exact_price() {
        let store = MemoryStore::new(3);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("icon.PNG");
        std::fs::write(&path, [0u8; 10]).unwrap();

        let url = uploader(&store).upload_file(&path).await.unwrap();

        let id = url.strip_prefix("https://gateway.irys.xyz/").unwrap();
        let (content_type, data) = store.get(&ContentId(id.to_string())).await.unwrap();
        assert_eq!(content_type, "image/png");
        assert_eq!(data.len(), 10);
        // Funded 30, spent 30
        assert_eq!(store.balance().await, 0);
    }

    #[tokio::test]
    async fn test_upload_metadata_stores_json_document() {
        let store = MemoryStore::new(1);
        let metadata = AssetMetadata {
            name: "TT1".to_string(),
            symbol: "TT1".to_string(),
            description: "this is a test token".to_string(),
            image: "https://gateway.irys.xyz/abc".to_string(),
        };

        let url = uploader(&store).upload_metadata(&metadata).await.unwrap();
        let id = url.rsplit('/').next().unwrap();
        let (content_type, data) = store.get(&ContentId(id.to_string())).await.unwrap();

        assert_eq!(content_type, "application/json");
        let decoded: AssetMetadata = serde_json::from_slice(&data).unwrap();
        assert_eq!(decoded, metadata);
    }

    #[tokio::test]
    async fn test_upload_failure_is_returned() {
        let store = MemoryStore::new(1);
        store.fail_next_uploads(1).await;
        let metadata = AssetMetadata {
            name: "a".to_string(),
            symbol: "b".to_string(),
            description: "c".to_string(),
            image: "d".to_string(),
        };
        assert!(matches!(
            uploader(&store).upload_metadata(&metadata).await,
            Err(StoreError::Upload(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let store = MemoryStore::new(1);
        let result = uploader(&store).upload_file("/nonexistent/file.png").await;
        assert!(matches!(result, Err(StoreError::Io(_))));
    }

    #[test]
    fn test_content_type_by_extension() {
        assert_eq!(content_type_for(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("a.json")), "application/json");
        assert_eq!(content_type_for(Path::new("noext")), "application/octet-stream");
    }
}
