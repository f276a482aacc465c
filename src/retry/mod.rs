//! Retry Module
//!
//! A single parameterized retry policy consumed by both the disbursement
//! and the issuance engines:
//! - `Backoff::Fixed`: the same delay between every attempt
//! - `Backoff::Exponential`: doubling delay, capped at a maximum

mod policy;

pub use policy::{Backoff, RetryPolicy};
