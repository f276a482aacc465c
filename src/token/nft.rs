//! NFT Service
//!
//! Collection creation and the single-NFT transfer and burn operations.

use std::sync::Arc;
use tracing::info;

use crate::error::LedgerError;
use crate::ledger::{Keypair, LedgerClient};
use crate::types::{Address, Instruction, Operation, Signature, TokenMetadata};

pub struct NftService {
    ledger: Arc<dyn LedgerClient>,
}

impl NftService {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    /// Create a collection NFT that issued NFTs can be verified into
    ///
    /// # Returns
    /// The collection's mint address and the confirming signature
    pub async fn create_collection(&self, metadata: TokenMetadata) -> Result<(Address, Signature), LedgerError> {
        let mint = Keypair::generate();
        let address = mint.address();
        let operation = Operation::new()
            .with(Instruction::CreateNft {
                mint: address.clone(),
                metadata,
                collection: None,
                is_collection: true,
            })
            .signed_by(mint);
        let receipt = self.ledger.submit_and_confirm(&operation).await?;
        info!("Created collection {} ({})", address, receipt.signature);
        Ok((address, receipt.signature))
    }

    pub async fn transfer_nft(&self, mint: &Address, to: &Address) -> Result<Signature, LedgerError> {
        let operation = Operation::new().with(Instruction::TransferNft {
            mint: mint.clone(),
            to: to.clone(),
        });
        let receipt = self.ledger.submit_and_confirm(&operation).await?;
        info!("Transferred {} to {} ({})", mint, to, receipt.signature);
        Ok(receipt.signature)
    }

    /// Burn an NFT; verified collection members need their `collection`
    pub async fn burn_nft(&self, mint: &Address, collection: Option<&Address>) -> Result<Signature, LedgerError> {
        let operation = Operation::new().with(Instruction::BurnNft {
            mint: mint.clone(),
            collection: collection.cloned(),
        });
        let receipt = self.ledger.submit_and_confirm(&operation).await?;
        info!("Burned {} ({})", mint, receipt.signature);
        Ok(receipt.signature)
    }
}
