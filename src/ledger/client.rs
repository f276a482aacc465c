use async_trait::async_trait;

use crate::error::LedgerError;
use crate::types::{AccountState, Address, Asset, Operation, Receipt, Signature};

/// Access to the ledger for one signing identity
///
/// A client is built once per process from the configured secret and
/// endpoint and shared read-only by every engine. Submission is atomic:
/// either every instruction of the operation is confirmed or none is.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Address of the signing identity that pays for submissions
    fn payer(&self) -> Address;

    /// Submit an operation and wait for its confirmation
    async fn submit_and_confirm(&self, operation: &Operation) -> Result<Receipt, LedgerError>;

    /// Current state of an account, `None` when it does not exist
    async fn account_state(&self, address: &Address) -> Result<Option<AccountState>, LedgerError>;

    /// Balance of `owner` in `asset`, in base units
    async fn balance(&self, owner: &Address, asset: &Asset) -> Result<u64, LedgerError>;

    /// Token account that holds `mint` for `owner`
    async fn token_account(&self, owner: &Address, mint: &Address) -> Result<Address, LedgerError>;

    /// Rank assigned to the inscription attached to `mint`, if inscribed
    async fn inscription_rank(&self, mint: &Address) -> Result<Option<u64>, LedgerError>;
}

/// Explorer link for a confirmed signature
pub fn explorer_link(explorer_url: &str, signature: &Signature) -> String {
    format!("{}/{}", explorer_url.trim_end_matches('/'), signature)
}
