//! Disbursement Engine Module
//!
//! This module turns one page of recipients into a single ledger operation.
//! Amounts are scaled to base units exactly; for token disbursements the
//! recipient's token account is created in the same operation when absent.

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;

use crate::amount::{NATIVE_DECIMALS, checked_total, to_base_units};
use crate::batch::Page;
use crate::error::DisbursementError;
use crate::ledger::LedgerClient;
use crate::types::{Address, DisbursementEntry, Instruction, Operation, Signature};

/// What a disbursement pays out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisbursementAsset {
    /// Native coin, amounts given in whole coins
    Native,
    /// Fungible token, amounts given in whole tokens of `decimals` precision
    Token { mint: Address, decimals: u8 },
}

impl DisbursementAsset {
    /// Exponent applied when scaling amounts
    pub fn decimals(&self) -> u8 {
        match self {
            DisbursementAsset::Native => NATIVE_DECIMALS,
            DisbursementAsset::Token { decimals, .. } => *decimals,
        }
    }
}

/// Operation for one page, ready to submit
#[derive(Debug, Clone)]
pub struct PreparedPage {
    pub index: usize,
    pub operation: Operation,
    /// Sum of the page's scaled amounts
    pub total: u64,
    pub recipients: usize,
}

/// Page-to-operation builder
///
/// Holds the ledger it submits to and the asset being paid.
pub struct DisbursementEngine {
    ledger: Arc<dyn LedgerClient>,
    asset: DisbursementAsset,
}

impl DisbursementEngine {
    /// Creates a new disbursement engine
    ///
    /// # Arguments
    /// * `ledger` - Ledger client that confirms page operations
    /// * `asset` - Native coin or token being paid out
    pub fn new(ledger: Arc<dyn LedgerClient>, asset: DisbursementAsset) -> Self {
        Self { ledger, asset }
    }

    pub fn asset(&self) -> &DisbursementAsset {
        &self.asset
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        &self.ledger
    }

    /// Scale every entry up front and return the grand total
    ///
    /// Rejects the whole list on the first malformed amount so that no page
    /// is submitted for a list that cannot be paid in full.
    pub fn validate(&self, entries: &[DisbursementEntry]) -> Result<u64, DisbursementError> {
        let decimals = self.asset.decimals();
        let scaled = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                to_base_units(&entry.amount, decimals).map_err(|source| {
                    DisbursementError::InvalidEntry {
                        index,
                        address: entry.address.clone(),
                        source,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        checked_total(scaled).ok_or(DisbursementError::TotalOverflow)
    }

    /// Digest identifying a disbursement: asset, paging and the ordered list
    ///
    /// Two runs share page indices only if they share this fingerprint.
    pub fn fingerprint(&self, entries: &[DisbursementEntry], page_size: usize) -> String {
        let mut hasher = Sha256::new();
        match &self.asset {
            DisbursementAsset::Native => hasher.update(b"native"),
            DisbursementAsset::Token { mint, decimals } => {
                hasher.update(format!("token:{mint}:{decimals}").as_bytes())
            }
        }
        hasher.update(format!("\npage_size:{page_size}").as_bytes());
        for entry in entries {
            hasher.update(format!("\n{}:{}", entry.address, entry.amount.trim()).as_bytes());
        }
        bs58::encode(hasher.finalize()).into_string()
    }

    /// Build the operation that pays every entry of `page`
    ///
    /// # Returns
    /// A `PreparedPage` holding one transfer per entry, preceded by a token
    /// account creation for each token recipient that has none yet
    pub async fn prepare(
        &self,
        page: Page<'_, DisbursementEntry>,
    ) -> Result<PreparedPage, DisbursementError> {
        let decimals = self.asset.decimals();
        let mut operation = Operation::new();
        let mut amounts = Vec::with_capacity(page.entries.len());
        // Owners whose token account this operation already creates
        let mut creating: HashSet<&Address> = HashSet::new();

        for (offset, entry) in page.entries.iter().enumerate() {
            let amount = to_base_units(&entry.amount, decimals).map_err(|source| {
                DisbursementError::InvalidEntry {
                    index: offset,
                    address: entry.address.clone(),
                    source,
                }
            })?;
            amounts.push(amount);

            // One transfer per entry, in list order
            match &self.asset {
                DisbursementAsset::Native => operation.push(Instruction::TransferNative {
                    to: entry.address.clone(),
                    lamports: amount,
                }),
                DisbursementAsset::Token { mint, .. } => {
                    // Create the recipient's token account in the same operation if absent
                    if !creating.contains(&entry.address) {
                        let account = self.ledger.token_account(&entry.address, mint).await?;
                        if self.ledger.account_state(&account).await?.is_none() {
                            operation.push(Instruction::CreateTokenAccount {
                                owner: entry.address.clone(),
                                mint: mint.clone(),
                            });
                            creating.insert(&entry.address);
                        }
                    }
                    operation.push(Instruction::TransferToken {
                        mint: mint.clone(),
                        to: entry.address.clone(),
                        amount,
                    });
                }
            }
        }

        let total = checked_total(amounts).ok_or(DisbursementError::TotalOverflow)?;
        Ok(PreparedPage {
            index: page.index,
            operation,
            total,
            recipients: page.entries.len(),
        })
    }

    /// Prepare `page` and submit it, returning the confirmed signature
    pub async fn submit(
        &self,
        page: Page<'_, DisbursementEntry>,
    ) -> Result<(PreparedPage, Signature), DisbursementError> {
        let prepared = self.prepare(page).await?;
        let receipt = self.ledger.submit_and_confirm(&prepared.operation).await?;
        Ok((prepared, receipt.signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::paginate;
    use crate::ledger::{Keypair, MemoryLedger};

    fn entry(seed: u8, amount: &str) -> DisbursementEntry {
        DisbursementEntry {
            address: Keypair::from_seed([seed; 32]).address(),
            amount: amount.to_string(),
        }
    }

    async fn token_ledger(payer: &Keypair, supply: u64) -> (MemoryLedger, Address) {
        let ledger = MemoryLedger::new(payer);
        let mint = Keypair::from_seed([200u8; 32]);
        let op = Operation::new()
            .with(Instruction::CreateMint {
                mint: mint.address(),
                decimals: 2,
            })
            .with(Instruction::CreateTokenAccount {
                owner: payer.address(),
                mint: mint.address(),
            })
            .with(Instruction::MintTo {
                mint: mint.address(),
                to: payer.address(),
                amount: supply,
            })
            .signed_by(mint.clone());
        ledger.submit_and_confirm(&op).await.unwrap();
        (ledger, mint.address())
    }

    #[test]
    fn test_validate_totals_and_rejects_bad_entries() {
        let payer = Keypair::from_seed([1u8; 32]);
        let engine = DisbursementEngine::new(
            Arc::new(MemoryLedger::new(&payer)),
            DisbursementAsset::Token {
                mint: payer.address(),
                decimals: 2,
            },
        );
        assert_eq!(engine.validate(&[entry(2, "1.5"), entry(3, "0.25")]).unwrap(), 175);
        assert!(matches!(
            engine.validate(&[entry(2, "1"), entry(3, "0.001")]),
            Err(DisbursementError::InvalidEntry { index: 1, .. })
        ));
    }

    #[test]
    fn test_fingerprint_tracks_list_and_paging() {
        let payer = Keypair::from_seed([1u8; 32]);
        let engine = DisbursementEngine::new(Arc::new(MemoryLedger::new(&payer)), DisbursementAsset::Native);
        let entries = vec![entry(2, "1"), entry(3, "2")];

        let base = engine.fingerprint(&entries, 2);
        assert_eq!(base, engine.fingerprint(&entries.clone(), 2));
        assert_ne!(base, engine.fingerprint(&entries, 3));
        assert_ne!(base, engine.fingerprint(&[entry(3, "2"), entry(2, "1")], 2));
        assert_ne!(base, engine.fingerprint(&[entry(2, "1"), entry(3, "3")], 2));

        let token = DisbursementEngine::new(
            Arc::new(MemoryLedger::new(&payer)),
            DisbursementAsset::Token {
                mint: payer.address(),
                decimals: 9,
            },
        );
        assert_ne!(base, token.fingerprint(&entries, 2));
    }

    #[tokio::test]
    async fn test_native_page_is_one_transfer_per_entry() {
        let payer = Keypair::from_seed([1u8; 32]);
        let engine = DisbursementEngine::new(
            Arc::new(MemoryLedger::new(&payer)),
            DisbursementAsset::Native,
        );
        let entries = vec![entry(2, "1"), entry(3, "0.5")];
        let page = paginate(&entries, 10).next().unwrap();

        let prepared = engine.prepare(page).await.unwrap();
        assert_eq!(prepared.recipients, 2);
        assert_eq!(prepared.total, 1_500_000_000);
        assert_eq!(prepared.operation.len(), 2);
        assert!(prepared.operation.signers.is_empty());
    }

    #[tokio::test]
    async fn test_token_page_creates_missing_accounts_once() {
        let payer = Keypair::from_seed([1u8; 32]);
        let (ledger, mint) = token_ledger(&payer, 10_000).await;
        let engine = DisbursementEngine::new(
            Arc::new(ledger.clone()),
            DisbursementAsset::Token {
                mint: mint.clone(),
                decimals: 2,
            },
        );
        // Recipient 2 appears twice and has no account yet; the payer has one
        let entries = vec![entry(2, "1"), entry(1, "2"), entry(2, "3")];
        let page = paginate(&entries, 10).next().unwrap();

        let prepared = engine.prepare(page).await.unwrap();
        let creates = prepared
            .operation
            .instructions
            .iter()
            .filter(|i| matches!(i, Instruction::CreateTokenAccount { .. }))
            .count();
        assert_eq!(creates, 1);
        assert_eq!(prepared.operation.len(), 4);
        assert_eq!(prepared.total, 600);

        engine.submit(page).await.unwrap();
        let recipient = Keypair::from_seed([2u8; 32]).address();
        let balance = ledger
            .balance(&recipient, &crate::types::Asset::Token { mint })
            .await
            .unwrap();
        assert_eq!(balance, 400);
    }
}
