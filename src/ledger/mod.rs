//! Ledger Module
//!
//! This module is the boundary to the chain:
//! - `LedgerClient`: submit-and-confirm an operation, read account state and balances
//! - `Keypair`: the process signing identity (and freshly generated mint keys)
//! - `MemoryLedger`: in-process ledger with all-or-nothing semantics
//! - `RpcLedger`: JSON-RPC client for a ledger gateway

mod client;
mod memory;
mod rpc;
mod signer;

pub use client::{LedgerClient, explorer_link};
pub use memory::{MemoryLedger, MintState, NftState};
pub use rpc::RpcLedger;
pub use signer::{Keypair, verify_signature};
