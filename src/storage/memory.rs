use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{ContentId, ContentStore};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct StoreState {
    balance: u64,
    objects: HashMap<ContentId, (String, Vec<u8>)>,
    fail_uploads: u32,
}

/// In-process content store
///
/// Prices at a flat rate per byte and charges uploads against the funded
/// balance, so an unfunded upload fails the way a real node does.
#[derive(Clone)]
pub struct MemoryStore {
    price_per_byte: u64,
    state: Arc<RwLock<StoreState>>,
}

impl MemoryStore {
    pub fn new(price_per_byte: u64) -> Self {
        Self {
            price_per_byte,
            state: Arc::new(RwLock::new(StoreState::default())),
        }
    }

    pub async fn balance(&self) -> u64 {
        self.state.read().await.balance
    }

    pub async fn get(&self, id: &ContentId) -> Option<(String, Vec<u8>)> {
        self.state.read().await.objects.get(id).cloned()
    }

    /// Make the next `count` uploads fail
    pub async fn fail_next_uploads(&self, count: u32) {
        self.state.write().await.fail_uploads = count;
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn price(&self, bytes: u64) -> Result<u64, StoreError> {
        Ok(bytes.saturating_mul(self.price_per_byte))
    }

    async fn fund(&self, amount: u64) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.balance = state.balance.saturating_add(amount);
        Ok(())
    }

    async fn upload(&self, data: Vec<u8>, content_type: &str) -> Result<ContentId, StoreError> {
        let mut state = self.state.write().await;
        if state.fail_uploads > 0 {
            state.fail_uploads -= 1;
            return Err(StoreError::Upload("injected upload failure".to_string()));
        }
        let cost = (data.len() as u64).saturating_mul(self.price_per_byte);
        if state.balance < cost {
            return Err(StoreError::Funding(format!(
                "balance {} below upload cost {}",
                state.balance, cost
            )));
        }
        state.balance -= cost;
        let id = ContentId(bs58::encode(Sha256::digest(&data)).into_string());
        state.objects.insert(id.clone(), (content_type.to_string(), data));
        Ok(id)
    }
}
