//! In-Memory Ledger
//!
//! A complete ledger kept in process memory: native balances, mints,
//! token accounts, NFTs with their collections and inscriptions.
//! Operations are applied to a scratch copy of the state and committed only
//! if every instruction succeeds, so a failed submission leaves no trace.
//!
//! Failures can be injected to exercise the retry paths of the engines.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::{Keypair, LedgerClient};
use crate::error::LedgerError;
use crate::types::{
    AccountState, Address, Asset, AuthorityType, Instruction, Operation, Receipt, Signature,
    TokenMetadata,
};

const SYSTEM_PROGRAM: &str = "system";
const TOKEN_PROGRAM: &str = "token";
const METADATA_PROGRAM: &str = "metadata";

/// Fungible mint as tracked by the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintState {
    pub decimals: u8,
    pub supply: u64,
    pub mint_authority: Option<Address>,
    pub freeze_authority: Option<Address>,
    pub metadata: Option<TokenMetadata>,
}

/// Non-fungible token as tracked by the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NftState {
    pub owner: Address,
    pub metadata: TokenMetadata,
    pub collection: Option<Address>,
    pub verified: bool,
    pub is_collection: bool,
    pub inscription: Option<String>,
    pub rank: Option<u64>,
}

#[derive(Debug, Clone)]
struct TokenAccount {
    owner: Address,
    mint: Address,
    amount: u64,
}

#[derive(Debug, Clone, Default)]
struct LedgerState {
    lamports: HashMap<Address, u64>,
    mints: HashMap<Address, MintState>,
    token_accounts: HashMap<Address, TokenAccount>,
    nfts: HashMap<Address, NftState>,
    next_rank: u64,
}

#[derive(Debug, Default)]
struct Faults {
    /// Fail this many upcoming submissions regardless of content
    next_submissions: u32,
    /// Fail submissions containing the named instruction, this many times
    by_instruction: HashMap<&'static str, u32>,
}

/// In-process ledger for one payer
#[derive(Clone)]
pub struct MemoryLedger {
    payer: Address,
    state: Arc<RwLock<LedgerState>>,
    faults: Arc<RwLock<Faults>>,
    submitted: Arc<RwLock<Vec<Vec<Instruction>>>>,
}

/// Deterministic token account address for (owner, mint)
fn derive_token_account(owner: &Address, mint: &Address) -> Address {
    let mut hasher = Sha256::new();
    hasher.update(owner.to_bytes());
    hasher.update(mint.to_bytes());
    hasher.update(b"token-account");
    Address::from_bytes(hasher.finalize().into())
}

impl MemoryLedger {
    /// Creates an empty ledger whose payer is `payer`
    pub fn new(payer: &Keypair) -> Self {
        Self {
            payer: payer.address(),
            state: Arc::new(RwLock::new(LedgerState::default())),
            faults: Arc::new(RwLock::new(Faults::default())),
            submitted: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Credit native balance to an address
    pub async fn airdrop(&self, address: &Address, lamports: u64) {
        let mut state = self.state.write().await;
        let balance = state.lamports.entry(address.clone()).or_insert(0);
        *balance = balance.saturating_add(lamports);
    }

    /// Make the next `count` submissions fail with a submission error
    pub async fn fail_next_submissions(&self, count: u32) {
        self.faults.write().await.next_submissions = count;
    }

    /// Make the next `count` submissions containing `instruction` fail
    pub async fn fail_instruction(&self, instruction: &'static str, count: u32) {
        self.faults.write().await.by_instruction.insert(instruction, count);
    }

    /// Instructions of every confirmed submission, in order
    pub async fn submitted(&self) -> Vec<Vec<Instruction>> {
        self.submitted.read().await.clone()
    }

    pub async fn mint(&self, mint: &Address) -> Option<MintState> {
        self.state.read().await.mints.get(mint).cloned()
    }

    pub async fn nft(&self, mint: &Address) -> Option<NftState> {
        self.state.read().await.nfts.get(mint).cloned()
    }

    async fn take_fault(&self, operation: &Operation) -> Option<String> {
        let mut faults = self.faults.write().await;
        if faults.next_submissions > 0 {
            faults.next_submissions -= 1;
            return Some("injected submission failure".to_string());
        }
        for instruction in &operation.instructions {
            if let Some(remaining) = faults.by_instruction.get_mut(instruction.name()) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Some(format!("injected failure in {}", instruction.name()));
                }
            }
        }
        None
    }

    fn require_signer(&self, operation: &Operation, address: &Address) -> Result<(), LedgerError> {
        if operation.signers.iter().any(|s| &s.address() == address) {
            Ok(())
        } else {
            Err(LedgerError::MissingSigner(address.clone()))
        }
    }

    fn apply(
        &self,
        state: &mut LedgerState,
        operation: &Operation,
        instruction: &Instruction,
    ) -> Result<(), LedgerError> {
        let payer = &self.payer;
        match instruction {
            Instruction::TransferNative { to, lamports } => {
                let available = state.lamports.get(payer).copied().unwrap_or(0);
                if available < *lamports {
                    return Err(LedgerError::InsufficientFunds {
                        required: *lamports,
                        available,
                    });
                }
                state.lamports.insert(payer.clone(), available - lamports);
                let balance = state.lamports.entry(to.clone()).or_insert(0);
                *balance = balance
                    .checked_add(*lamports)
                    .ok_or_else(|| LedgerError::Rejected("balance overflow".to_string()))?;
            }
            Instruction::CreateTokenAccount { owner, mint } => {
                if !state.mints.contains_key(mint) && !state.nfts.contains_key(mint) {
                    return Err(LedgerError::AccountNotFound(mint.clone()));
                }
                let account = derive_token_account(owner, mint);
                if state.token_accounts.contains_key(&account) {
                    return Err(LedgerError::Rejected(format!(
                        "token account {account} already exists"
                    )));
                }
                state.token_accounts.insert(
                    account,
                    TokenAccount {
                        owner: owner.clone(),
                        mint: mint.clone(),
                        amount: 0,
                    },
                );
            }
            Instruction::TransferToken { mint, to, amount } => {
                let source = derive_token_account(payer, mint);
                let destination = derive_token_account(to, mint);
                if !state.token_accounts.contains_key(&destination) {
                    return Err(LedgerError::AccountNotFound(destination));
                }
                let from = state
                    .token_accounts
                    .get_mut(&source)
                    .ok_or_else(|| LedgerError::AccountNotFound(source.clone()))?;
                if from.amount < *amount {
                    return Err(LedgerError::InsufficientFunds {
                        required: *amount,
                        available: from.amount,
                    });
                }
                from.amount -= amount;
                if let Some(dest) = state.token_accounts.get_mut(&destination) {
                    dest.amount = dest
                        .amount
                        .checked_add(*amount)
                        .ok_or_else(|| LedgerError::Rejected("balance overflow".to_string()))?;
                }
            }
            Instruction::CreateMint { mint, decimals } => {
                self.require_signer(operation, mint)?;
                if state.mints.contains_key(mint) || state.nfts.contains_key(mint) {
                    return Err(LedgerError::Rejected(format!("mint {mint} already exists")));
                }
                state.mints.insert(
                    mint.clone(),
                    MintState {
                        decimals: *decimals,
                        supply: 0,
                        mint_authority: Some(payer.clone()),
                        freeze_authority: Some(payer.clone()),
                        metadata: None,
                    },
                );
            }
            Instruction::MintTo { mint, to, amount } => {
                let account = derive_token_account(to, mint);
                let state_mint = state
                    .mints
                    .get_mut(mint)
                    .ok_or_else(|| LedgerError::AccountNotFound(mint.clone()))?;
                if state_mint.mint_authority.as_ref() != Some(payer) {
                    return Err(LedgerError::Rejected(format!(
                        "payer is not the mint authority of {mint}"
                    )));
                }
                state_mint.supply = state_mint
                    .supply
                    .checked_add(*amount)
                    .ok_or_else(|| LedgerError::Rejected("supply overflow".to_string()))?;
                let holder = state
                    .token_accounts
                    .get_mut(&account)
                    .ok_or(LedgerError::AccountNotFound(account))?;
                holder.amount += amount;
            }
            Instruction::Burn { mint, amount } => {
                let account = derive_token_account(payer, mint);
                let holder = state
                    .token_accounts
                    .get_mut(&account)
                    .ok_or_else(|| LedgerError::AccountNotFound(account.clone()))?;
                if holder.amount < *amount {
                    return Err(LedgerError::InsufficientFunds {
                        required: *amount,
                        available: holder.amount,
                    });
                }
                holder.amount -= amount;
                if let Some(m) = state.mints.get_mut(mint) {
                    m.supply = m.supply.saturating_sub(*amount);
                }
            }
            Instruction::CreateMetadata { mint, metadata } => {
                let m = state
                    .mints
                    .get_mut(mint)
                    .ok_or_else(|| LedgerError::AccountNotFound(mint.clone()))?;
                if m.metadata.is_some() {
                    return Err(LedgerError::Rejected(format!("metadata for {mint} already exists")));
                }
                m.metadata = Some(metadata.clone());
            }
            Instruction::UpdateMetadata { mint, metadata } => {
                let m = state
                    .mints
                    .get_mut(mint)
                    .ok_or_else(|| LedgerError::AccountNotFound(mint.clone()))?;
                if m.metadata.is_none() {
                    return Err(LedgerError::Rejected(format!("{mint} has no metadata")));
                }
                m.metadata = Some(metadata.clone());
            }
            Instruction::SetAuthority {
                mint,
                authority,
                new_authority,
            } => {
                let m = state
                    .mints
                    .get_mut(mint)
                    .ok_or_else(|| LedgerError::AccountNotFound(mint.clone()))?;
                let slot = match authority {
                    AuthorityType::MintTokens => &mut m.mint_authority,
                    AuthorityType::FreezeAccount => &mut m.freeze_authority,
                };
                if slot.as_ref() != Some(payer) {
                    return Err(LedgerError::Rejected(format!(
                        "payer does not hold {authority:?} authority of {mint}"
                    )));
                }
                *slot = new_authority.clone();
            }
            Instruction::CreateNft {
                mint,
                metadata,
                collection,
                is_collection,
            } => {
                self.require_signer(operation, mint)?;
                if state.nfts.contains_key(mint) || state.mints.contains_key(mint) {
                    return Err(LedgerError::Rejected(format!("mint {mint} already exists")));
                }
                state.nfts.insert(
                    mint.clone(),
                    NftState {
                        owner: payer.clone(),
                        metadata: metadata.clone(),
                        collection: collection.clone(),
                        verified: false,
                        is_collection: *is_collection,
                        inscription: None,
                        rank: None,
                    },
                );
            }
            Instruction::VerifyCollection { mint, collection } => {
                let is_collection = state
                    .nfts
                    .get(collection)
                    .map(|c| c.is_collection)
                    .ok_or_else(|| LedgerError::AccountNotFound(collection.clone()))?;
                if !is_collection {
                    return Err(LedgerError::Rejected(format!("{collection} is not a collection")));
                }
                let nft = state
                    .nfts
                    .get_mut(mint)
                    .ok_or_else(|| LedgerError::AccountNotFound(mint.clone()))?;
                if nft.collection.as_ref() != Some(collection) {
                    return Err(LedgerError::Rejected(format!(
                        "{mint} does not belong to collection {collection}"
                    )));
                }
                nft.verified = true;
            }
            Instruction::Inscribe { mint, data } => {
                let rank = state.next_rank;
                let nft = state
                    .nfts
                    .get_mut(mint)
                    .ok_or_else(|| LedgerError::AccountNotFound(mint.clone()))?;
                if &nft.owner != payer {
                    return Err(LedgerError::Rejected(format!("payer does not own {mint}")));
                }
                if nft.inscription.is_some() {
                    return Err(LedgerError::Rejected(format!("{mint} is already inscribed")));
                }
                nft.inscription = Some(data.clone());
                nft.rank = Some(rank);
                state.next_rank += 1;
            }
            Instruction::TransferNft { mint, to } => {
                let nft = state
                    .nfts
                    .get_mut(mint)
                    .ok_or_else(|| LedgerError::AccountNotFound(mint.clone()))?;
                if &nft.owner != payer {
                    return Err(LedgerError::Rejected(format!("payer does not own {mint}")));
                }
                nft.owner = to.clone();
            }
            Instruction::BurnNft { mint, collection } => {
                let nft = state
                    .nfts
                    .get(mint)
                    .ok_or_else(|| LedgerError::AccountNotFound(mint.clone()))?;
                if &nft.owner != payer {
                    return Err(LedgerError::Rejected(format!("payer does not own {mint}")));
                }
                if nft.verified && collection.is_none() {
                    return Err(LedgerError::Rejected(format!(
                        "{mint} is a verified collection member; collection required"
                    )));
                }
                state.nfts.remove(mint);
            }
        }
        Ok(())
    }

    fn signature_for(&self, sequence: usize, operation: &Operation) -> Signature {
        let mut hasher = Sha256::new();
        hasher.update(self.payer.to_bytes());
        hasher.update(sequence.to_be_bytes());
        for instruction in &operation.instructions {
            hasher.update(format!("{instruction:?}").as_bytes());
        }
        let digest = hasher.finalize();
        // Two digests give the 64-byte shape of a real signature
        let mut raw = digest.to_vec();
        raw.extend_from_slice(&Sha256::digest(digest));
        Signature(bs58::encode(raw).into_string())
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    fn payer(&self) -> Address {
        self.payer.clone()
    }

    async fn submit_and_confirm(&self, operation: &Operation) -> Result<Receipt, LedgerError> {
        if operation.is_empty() {
            return Err(LedgerError::Rejected("operation has no instructions".to_string()));
        }
        if let Some(reason) = self.take_fault(operation).await {
            return Err(LedgerError::Submission(reason));
        }

        let mut state = self.state.write().await;
        let mut scratch = state.clone();
        for instruction in &operation.instructions {
            self.apply(&mut scratch, operation, instruction)?;
        }
        *state = scratch;
        drop(state);

        let mut submitted = self.submitted.write().await;
        let signature = self.signature_for(submitted.len(), operation);
        submitted.push(operation.instructions.clone());
        debug!(
            "memory ledger confirmed {} instruction(s) as {}",
            operation.len(),
            signature
        );
        Ok(Receipt { signature })
    }

    async fn account_state(&self, address: &Address) -> Result<Option<AccountState>, LedgerError> {
        let state = self.state.read().await;
        let owner_program = if state.token_accounts.contains_key(address) || state.mints.contains_key(address) {
            TOKEN_PROGRAM
        } else if state.nfts.contains_key(address) {
            METADATA_PROGRAM
        } else if state.lamports.contains_key(address) {
            SYSTEM_PROGRAM
        } else {
            return Ok(None);
        };
        Ok(Some(AccountState {
            address: address.clone(),
            lamports: state.lamports.get(address).copied().unwrap_or(0),
            owner_program: owner_program.to_string(),
        }))
    }

    async fn balance(&self, owner: &Address, asset: &Asset) -> Result<u64, LedgerError> {
        let state = self.state.read().await;
        let balance = match asset {
            Asset::Native => state.lamports.get(owner).copied().unwrap_or(0),
            Asset::Token { mint } => state
                .token_accounts
                .get(&derive_token_account(owner, mint))
                .filter(|account| &account.owner == owner && &account.mint == mint)
                .map(|account| account.amount)
                .unwrap_or(0),
        };
        Ok(balance)
    }

    async fn token_account(&self, owner: &Address, mint: &Address) -> Result<Address, LedgerError> {
        Ok(derive_token_account(owner, mint))
    }

    async fn inscription_rank(&self, mint: &Address) -> Result<Option<u64>, LedgerError> {
        Ok(self.state.read().await.nfts.get(mint).and_then(|nft| nft.rank))
    }
}
