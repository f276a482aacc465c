//! Checkpoint Registry Module
//!
//! This module provides a database registry recording completed
//! disbursement pages and issuance step progress, so a rerun with the same
//! run id skips work that already reached the ledger.

mod database;
pub use database::Registry;
