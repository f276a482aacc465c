//! Batch Disbursement Module
//!
//! This module turns a long recipient list into bounded ledger submissions:
//! - `paginate`: splits the ordered list into fixed-size pages
//! - `DisbursementEngine`: builds and submits the operation for one page
//! - `DisbursementOrchestrator`: drives every page in order with retries,
//!   inter-page delay and checkpointing

mod engine;
mod orchestrator;
mod pager;

pub use engine::{DisbursementAsset, DisbursementEngine, PreparedPage};
pub use orchestrator::{DisbursementOrchestrator, DisbursementReport};
pub use pager::{Page, Pages, page_count, paginate};
