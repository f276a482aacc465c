//! Token and NFT Services
//!
//! One-shot ledger operations behind the CLI subcommands that are not part
//! of a paged or multi-step run.

mod nft;
mod service;

pub use nft::NftService;
pub use service::{AccountsReport, TokenService};
