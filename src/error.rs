//! Error Types
//!
//! One error enum per concern. Library code returns these; the binary and
//! the run drivers wrap them in `anyhow` at the edge.

use thiserror::Error;

use crate::types::Address;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,
    #[error("address is not valid base58: {0}")]
    InvalidBase58(String),
    #[error("address must decode to 32 bytes, got {0}")]
    InvalidLength(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("invalid decimal amount: {0:?}")]
    Invalid(String),
    #[error("amount {amount:?} has more than {decimals} fractional digits")]
    TooPrecise { amount: String, decimals: u8 },
    #[error("amount {0:?} overflows the base-unit range")]
    Overflow(String),
    #[error("decimals exponent {0} is out of range")]
    Decimals(u8),
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("secret key is not valid base58: {0}")]
    Encoding(String),
    #[error("secret key must be 32 or 64 bytes, got {0}")]
    Length(usize),
    #[error("secret key does not match its embedded public key")]
    Mismatch,
}

/// Failures reported by a ledger client
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The operation was rejected or could not be confirmed
    #[error("submission failed: {0}")]
    Submission(String),
    /// The operation was well formed but violates ledger state
    #[error("operation rejected: {0}")]
    Rejected(String),
    #[error("account not found: {0}")]
    AccountNotFound(Address),
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },
    #[error("missing signature for {0}")]
    MissingSigner(Address),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl LedgerError {
    /// Whether resubmitting the same operation may succeed
    ///
    /// Rejections that follow from ledger state (missing accounts, funds,
    /// signers) fail identically on every attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LedgerError::Submission(_) | LedgerError::Transport(_) | LedgerError::Rpc { .. }
        )
    }
}

/// Failures reported by a content store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("upload failed: {0}")]
    Upload(String),
    #[error("funding failed: {0}")]
    Funding(String),
    #[error("gateway returned {status}: {body}")]
    Gateway { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Failures of a single issuance step
#[derive(Debug, Error)]
pub enum IssuanceError {
    /// A dependent step was reached without the handle from the create step
    #[error("precondition failed: {0}")]
    Precondition(&'static str),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt checkpoint: {0}")]
    Corrupt(String),
}

/// Failures of a disbursement run
#[derive(Debug, Error)]
pub enum DisbursementError {
    #[error("entry {index} ({address}): {source}")]
    InvalidEntry {
        index: usize,
        address: Address,
        source: AmountError,
    },
    #[error("total amount overflows the base-unit range")]
    TotalOverflow,
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// A page could not be confirmed; pages before it were
    #[error("page {page} failed after {} confirmed page(s): {source}", .completed.len())]
    PageFailed {
        page: usize,
        completed: Vec<crate::types::PageReceipt>,
        source: Box<DisbursementError>,
    },
    /// Every page in `completed` is confirmed, the last one without a checkpoint
    #[error("checkpoint write failed after {} confirmed page(s): {source}", .completed.len())]
    CheckpointFailed {
        completed: Vec<crate::types::PageReceipt>,
        source: RegistryError,
    },
    /// The run id was checkpointed for a different list, paging or asset
    #[error("run {run_id} was recorded for a different disbursement; use a new run id")]
    RunMismatch { run_id: String },
}

impl DisbursementError {
    /// Whether the failed page may succeed on another attempt
    pub fn is_transient(&self) -> bool {
        match self {
            DisbursementError::Ledger(e) => e.is_transient(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_delivery_failures_are_transient() {
        assert!(LedgerError::Submission("timeout".to_string()).is_transient());
        assert!(LedgerError::Rpc { code: -32002, message: "blockhash".to_string() }.is_transient());
        assert!(!LedgerError::Rejected("exists".to_string()).is_transient());
        assert!(!LedgerError::InsufficientFunds { required: 2, available: 1 }.is_transient());

        let page: DisbursementError = LedgerError::Submission("timeout".to_string()).into();
        assert!(page.is_transient());
        assert!(!DisbursementError::TotalOverflow.is_transient());
    }
}
