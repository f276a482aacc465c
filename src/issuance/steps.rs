//! Inscription NFT Steps
//!
//! Production implementation of the issuance steps: a fresh mint keypair
//! per entity, collection verification, then an inscription whose rank is
//! read back once confirmed.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use super::IssuanceSteps;
use crate::config::IssuanceConfig;
use crate::error::IssuanceError;
use crate::ledger::{Keypair, LedgerClient};
use crate::types::{Address, Instruction, Operation, TokenMetadata};

pub struct InscriptionSteps {
    ledger: Arc<dyn LedgerClient>,
    collection: Address,
    name: String,
    symbol: String,
    uri: String,
    /// Inscription payload; empty means the NFT's own metadata as JSON
    payload: String,
}

impl InscriptionSteps {
    /// Creates the steps for NFTs in `collection`
    pub fn new(ledger: Arc<dyn LedgerClient>, collection: Address, config: &IssuanceConfig) -> Self {
        Self {
            ledger,
            collection,
            name: config.name.clone(),
            symbol: config.symbol.clone(),
            uri: config.uri.clone(),
            payload: config.inscription.clone(),
        }
    }

    fn metadata(&self, index: u32) -> TokenMetadata {
        TokenMetadata {
            name: format!("{} #{}", self.name, index + 1),
            symbol: self.symbol.clone(),
            uri: self.uri.clone(),
        }
    }

    fn payload_for(&self, handle: &Address) -> String {
        if !self.payload.is_empty() {
            return self.payload.clone();
        }
        json!({
            "mint": handle,
            "name": self.name,
            "symbol": self.symbol,
            "uri": self.uri,
        })
        .to_string()
    }
}

#[async_trait]
impl IssuanceSteps for InscriptionSteps {
    async fn create(&self, index: u32) -> Result<Address, IssuanceError> {
        let mint = Keypair::generate();
        let handle = mint.address();
        let operation = Operation::new()
            .with(Instruction::CreateNft {
                mint: handle.clone(),
                metadata: self.metadata(index),
                collection: Some(self.collection.clone()),
                is_collection: false,
            })
            .signed_by(mint);
        let receipt = self.ledger.submit_and_confirm(&operation).await?;
        info!("Created NFT {} ({})", handle, receipt.signature);
        Ok(handle)
    }

    async fn verify_collection(&self, handle: &Address) -> Result<(), IssuanceError> {
        let operation = Operation::new().with(Instruction::VerifyCollection {
            mint: handle.clone(),
            collection: self.collection.clone(),
        });
        let receipt = self.ledger.submit_and_confirm(&operation).await?;
        info!("Verified {} in {} ({})", handle, self.collection, receipt.signature);
        Ok(())
    }

    async fn inscribe(&self, handle: &Address) -> Result<(), IssuanceError> {
        let operation = Operation::new().with(Instruction::Inscribe {
            mint: handle.clone(),
            data: self.payload_for(handle),
        });
        let receipt = self.ledger.submit_and_confirm(&operation).await?;
        match self.ledger.inscription_rank(handle).await? {
            Some(rank) => info!("Inscribed {} as #{} ({})", handle, rank, receipt.signature),
            None => info!("Inscribed {} ({}), rank not yet assigned", handle, receipt.signature),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issuance::IssuanceWorkflow;
    use crate::ledger::MemoryLedger;
    use crate::retry::RetryPolicy;
    use std::time::Duration;

    async fn ledger_with_collection() -> (MemoryLedger, Address) {
        let payer = Keypair::from_seed([1u8; 32]);
        let ledger = MemoryLedger::new(&payer);
        let collection = Keypair::from_seed([50u8; 32]);
        let op = Operation::new()
            .with(Instruction::CreateNft {
                mint: collection.address(),
                metadata: TokenMetadata {
                    name: "Scribes".to_string(),
                    symbol: "SCRB".to_string(),
                    uri: "https://example.com/collection.json".to_string(),
                },
                collection: None,
                is_collection: true,
            })
            .signed_by(collection.clone());
        ledger.submit_and_confirm(&op).await.unwrap();
        (ledger, collection.address())
    }

    fn config() -> IssuanceConfig {
        IssuanceConfig {
            name: "Scribe".to_string(),
            symbol: "SCRB".to_string(),
            uri: "https://example.com/scribe.json".to_string(),
            ..IssuanceConfig::default()
        }
    }

    #[tokio::test]
    async fn test_issues_verified_inscribed_nfts() {
        let (ledger, collection) = ledger_with_collection().await;
        let steps = InscriptionSteps::new(Arc::new(ledger.clone()), collection.clone(), &config());
        let workflow = IssuanceWorkflow::new(Box::new(steps), RetryPolicy::fixed(3, Duration::ZERO));

        let summary = workflow.run(3).await;
        assert_eq!(summary.completed.len(), 3);

        let mut ranks = Vec::new();
        for entity in &summary.completed {
            let nft = ledger.nft(&entity.handle).await.unwrap();
            assert!(nft.verified);
            assert_eq!(nft.collection.as_ref(), Some(&collection));
            assert!(nft.inscription.unwrap().contains(entity.handle.as_str()));
            ranks.push(nft.rank.unwrap());
        }
        assert_eq!(ranks, vec![0, 1, 2]);
        assert_eq!(ledger.nft(&summary.completed[1].handle).await.unwrap().metadata.name, "Scribe #2");
    }

    #[tokio::test]
    async fn test_transient_inscribe_failure_keeps_the_same_mint() {
        let (ledger, collection) = ledger_with_collection().await;
        ledger.fail_instruction("inscribe", 2).await;
        let steps = InscriptionSteps::new(Arc::new(ledger.clone()), collection, &config());
        let workflow = IssuanceWorkflow::new(Box::new(steps), RetryPolicy::fixed(3, Duration::ZERO));

        let summary = workflow.run(1).await;
        assert!(summary.is_complete());

        let creates = ledger
            .submitted()
            .await
            .iter()
            .filter(|op| matches!(op[0], Instruction::CreateNft { is_collection: false, .. }))
            .count();
        assert_eq!(creates, 1);
    }

    #[tokio::test]
    async fn test_unknown_collection_abandons_after_create() {
        let (ledger, _) = ledger_with_collection().await;
        let missing = Keypair::from_seed([77u8; 32]).address();
        let steps = InscriptionSteps::new(Arc::new(ledger.clone()), missing, &config());
        let workflow = IssuanceWorkflow::new(Box::new(steps), RetryPolicy::fixed(3, Duration::ZERO));

        let summary = workflow.run(1).await;
        assert_eq!(summary.abandoned.len(), 1);
        assert_eq!(summary.abandoned[0].steps_done, [true, false, false]);
        assert!(summary.abandoned[0].handle.is_some());
    }
}
