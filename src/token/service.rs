//! Fungible Token Service
//!
//! Each method builds one operation (or one per page of owners), submits it
//! and returns the confirmed signature. Amounts are already in base units.

use std::sync::Arc;
use tracing::{debug, info};

use crate::batch::paginate;
use crate::error::LedgerError;
use crate::ledger::{Keypair, LedgerClient};
use crate::types::{Address, Asset, AuthorityType, Instruction, Operation, Signature, TokenMetadata};

/// Outcome of creating token accounts for a list of owners
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountsReport {
    pub created: Vec<Address>,
    /// Owners that already had an account
    pub existing: Vec<Address>,
    pub signatures: Vec<Signature>,
}

pub struct TokenService {
    ledger: Arc<dyn LedgerClient>,
}

impl TokenService {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    /// Whether `owner` already has a token account for `mint`
    pub async fn has_token_account(&self, owner: &Address, mint: &Address) -> Result<bool, LedgerError> {
        let account = self.ledger.token_account(owner, mint).await?;
        Ok(self.ledger.account_state(&account).await?.is_some())
    }

    /// Create a mint with metadata and the payer's token account
    ///
    /// # Arguments
    /// * `metadata` - Name, symbol and uri attached to the mint
    /// * `decimals` - Decimal exponent of the new token
    /// * `initial_supply` - Base units minted to the payer, if any
    ///
    /// # Returns
    /// The new mint address and the confirming signature
    pub async fn create_token(
        &self,
        metadata: TokenMetadata,
        decimals: u8,
        initial_supply: Option<u64>,
    ) -> Result<(Address, Signature), LedgerError> {
        let mint = Keypair::generate();
        let mint_address = mint.address();
        let payer = self.ledger.payer();

        let mut operation = Operation::new()
            .with(Instruction::CreateMint {
                mint: mint_address.clone(),
                decimals,
            })
            .with(Instruction::CreateMetadata {
                mint: mint_address.clone(),
                metadata,
            })
            .with(Instruction::CreateTokenAccount {
                owner: payer.clone(),
                mint: mint_address.clone(),
            })
            .signed_by(mint);
        if let Some(amount) = initial_supply.filter(|amount| *amount > 0) {
            operation.push(Instruction::MintTo {
                mint: mint_address.clone(),
                to: payer,
                amount,
            });
        }

        let receipt = self.ledger.submit_and_confirm(&operation).await?;
        info!("Created token {} ({})", mint_address, receipt.signature);
        Ok((mint_address, receipt.signature))
    }

    /// Mint `amount` base units to `to`, creating its token account if needed
    pub async fn mint_to(&self, mint: &Address, to: &Address, amount: u64) -> Result<Signature, LedgerError> {
        let mut operation = Operation::new();
        if !self.has_token_account(to, mint).await? {
            debug!("Creating token account for {}", to);
            operation.push(Instruction::CreateTokenAccount {
                owner: to.clone(),
                mint: mint.clone(),
            });
        }
        operation.push(Instruction::MintTo {
            mint: mint.clone(),
            to: to.clone(),
            amount,
        });
        let receipt = self.ledger.submit_and_confirm(&operation).await?;
        info!("Minted {} to {} ({})", amount, to, receipt.signature);
        Ok(receipt.signature)
    }

    /// Burn `amount` base units from the payer's token account
    pub async fn burn(&self, mint: &Address, amount: u64) -> Result<Signature, LedgerError> {
        let operation = Operation::new().with(Instruction::Burn {
            mint: mint.clone(),
            amount,
        });
        let receipt = self.ledger.submit_and_confirm(&operation).await?;
        info!("Burned {} of {} ({})", amount, mint, receipt.signature);
        Ok(receipt.signature)
    }

    pub async fn update_metadata(&self, mint: &Address, metadata: TokenMetadata) -> Result<Signature, LedgerError> {
        let operation = Operation::new().with(Instruction::UpdateMetadata {
            mint: mint.clone(),
            metadata,
        });
        let receipt = self.ledger.submit_and_confirm(&operation).await?;
        info!("Updated metadata of {} ({})", mint, receipt.signature);
        Ok(receipt.signature)
    }

    /// Set the given authority of `mint` to none
    pub async fn revoke_authority(&self, mint: &Address, authority: AuthorityType) -> Result<Signature, LedgerError> {
        let operation = Operation::new().with(Instruction::SetAuthority {
            mint: mint.clone(),
            authority,
            new_authority: None,
        });
        let receipt = self.ledger.submit_and_confirm(&operation).await?;
        info!("Revoked {:?} authority of {} ({})", authority, mint, receipt.signature);
        Ok(receipt.signature)
    }

    /// Create token accounts for every owner that lacks one
    ///
    /// Missing accounts are created `page_size` per operation; owners listed
    /// more than once are only considered once.
    pub async fn create_token_accounts(
        &self,
        mint: &Address,
        owners: &[Address],
        page_size: usize,
    ) -> Result<AccountsReport, LedgerError> {
        let mut report = AccountsReport::default();
        let mut missing: Vec<Address> = Vec::new();
        for owner in owners {
            if missing.contains(owner) || report.existing.contains(owner) {
                continue;
            }
            if self.has_token_account(owner, mint).await? {
                report.existing.push(owner.clone());
            } else {
                missing.push(owner.clone());
            }
        }
        info!(
            "{} owner(s) need a token account, {} already have one",
            missing.len(),
            report.existing.len()
        );

        for page in paginate(&missing, page_size) {
            let operation = Operation {
                instructions: page
                    .entries
                    .iter()
                    .map(|owner| Instruction::CreateTokenAccount {
                        owner: owner.clone(),
                        mint: mint.clone(),
                    })
                    .collect(),
                signers: Vec::new(),
            };
            let receipt = self.ledger.submit_and_confirm(&operation).await?;
            info!(
                "Created {} token account(s) ({})",
                page.entries.len(),
                receipt.signature
            );
            report.created.extend_from_slice(page.entries);
            report.signatures.push(receipt.signature);
        }
        Ok(report)
    }

    /// Balances of `mint` for each owner, keeping only holders
    pub async fn check_balances(&self, mint: &Address, owners: &[Address]) -> Result<Vec<(Address, u64)>, LedgerError> {
        let asset = Asset::Token { mint: mint.clone() };
        let mut holders = Vec::new();
        for owner in owners {
            let balance = self.ledger.balance(owner, &asset).await?;
            debug!("{}: {}", owner, balance);
            if balance > 0 {
                holders.push((owner.clone(), balance));
            }
        }
        Ok(holders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;

    fn metadata(name: &str) -> TokenMetadata {
        TokenMetadata {
            name: name.to_string(),
            symbol: "TKN".to_string(),
            uri: "https://example.com/token.json".to_string(),
        }
    }

    fn owner(seed: u8) -> Address {
        Keypair::from_seed([seed; 32]).address()
    }

    async fn service_with_token(supply: u64) -> (TokenService, MemoryLedger, Address) {
        let payer = Keypair::from_seed([1u8; 32]);
        let ledger = MemoryLedger::new(&payer);
        let service = TokenService::new(Arc::new(ledger.clone()));
        let (mint, _) = service
            .create_token(metadata("Token"), 6, Some(supply))
            .await
            .unwrap();
        (service, ledger, mint)
    }

    #[tokio::test]
    async fn test_create_token_mints_initial_supply_to_payer() {
        let (service, ledger, mint) = service_with_token(1_000).await;
        let state = ledger.mint(&mint).await.unwrap();
        assert_eq!(state.decimals, 6);
        assert_eq!(state.supply, 1_000);
        assert_eq!(state.metadata.unwrap().name, "Token");

        let holders = service.check_balances(&mint, &[owner(1), owner(2)]).await.unwrap();
        assert_eq!(holders, vec![(owner(1), 1_000)]);
    }

    #[tokio::test]
    async fn test_mint_to_creates_account_only_when_missing() {
        let (service, ledger, mint) = service_with_token(0).await;
        service.mint_to(&mint, &owner(2), 5).await.unwrap();
        service.mint_to(&mint, &owner(2), 7).await.unwrap();

        let submitted = ledger.submitted().await;
        assert_eq!(submitted[1].len(), 2);
        assert_eq!(submitted[2].len(), 1);
        let holders = service.check_balances(&mint, &[owner(2)]).await.unwrap();
        assert_eq!(holders, vec![(owner(2), 12)]);
    }

    #[tokio::test]
    async fn test_burn_and_revoke() {
        let (service, ledger, mint) = service_with_token(100).await;
        service.burn(&mint, 40).await.unwrap();
        assert_eq!(ledger.mint(&mint).await.unwrap().supply, 60);

        service.revoke_authority(&mint, AuthorityType::MintTokens).await.unwrap();
        assert_eq!(ledger.mint(&mint).await.unwrap().mint_authority, None);
        assert!(service.mint_to(&mint, &owner(1), 1).await.is_err());
        assert!(service.burn(&mint, 1_000).await.is_err());
    }

    #[tokio::test]
    async fn test_update_metadata() {
        let (service, ledger, mint) = service_with_token(0).await;
        service.update_metadata(&mint, metadata("Renamed")).await.unwrap();
        assert_eq!(ledger.mint(&mint).await.unwrap().metadata.unwrap().name, "Renamed");
    }

    #[tokio::test]
    async fn test_create_token_accounts_skips_existing() {
        let (service, ledger, mint) = service_with_token(0).await;
        let owners = vec![owner(1), owner(2), owner(3), owner(2), owner(4)];

        let report = service.create_token_accounts(&mint, &owners, 2).await.unwrap();
        assert_eq!(report.existing, vec![owner(1)]);
        assert_eq!(report.created, vec![owner(2), owner(3), owner(4)]);
        assert_eq!(report.signatures.len(), 2);

        let again = service.create_token_accounts(&mint, &owners, 2).await.unwrap();
        assert!(again.created.is_empty());
        assert_eq!(ledger.submitted().await.len(), 3);
    }
}
