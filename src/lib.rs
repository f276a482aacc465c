//! solscribe
//!
//! Operational tooling for a Solana-style ledger and an Irys-style storage
//! gateway: paged disbursements, resumable inscription NFT issuance, token
//! and NFT administration, and paid uploads.

pub mod amount; // Exact decimal ↔ base-unit scaling.
pub mod batch; // Paged disbursement engine and orchestrator.
pub mod cli; // Command line parsing and command execution.
pub mod config; // TOML configuration and list files.
pub mod error; // Error enums per concern.
pub mod issuance; // Resumable create → verify → inscribe workflow.
pub mod ledger; // Ledger client trait, signer and implementations.
pub mod registry; // SQLite checkpoint registry.
pub mod retry; // Shared retry policy.
pub mod storage; // Content store trait, gateway client and uploader.
pub mod token; // One-shot token and NFT operations.
pub mod types; // Addresses, instructions, operations and receipts.

// Re-export commonly used types and configurations for easier access.
pub use config::Config;
pub use error::{DisbursementError, IssuanceError, LedgerError, StoreError};
pub use ledger::{Keypair, LedgerClient};
pub use types::*;
