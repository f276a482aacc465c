use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::StoreError;

/// Identifier assigned to uploaded content by the store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub String);

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Paid, content-addressed storage
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Cost in atomic payment units to store `bytes` bytes
    async fn price(&self, bytes: u64) -> Result<u64, StoreError>;

    /// Fund the uploader's balance on the store
    async fn fund(&self, amount: u64) -> Result<(), StoreError>;

    /// Store `data` and return its content id
    async fn upload(&self, data: Vec<u8>, content_type: &str) -> Result<ContentId, StoreError>;
}
