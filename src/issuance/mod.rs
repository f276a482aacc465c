//! Issuance Workflow Module
//!
//! Drives entities through the dependent create → verify collection →
//! inscribe sequence, resuming from the first incomplete step after a
//! failure instead of starting over.
//!
//! - `IssuanceWorkflow`: per-entity retry loop and the outer N-entity driver
//! - `IssuanceSteps`: the three steps as a trait, so the workflow can be
//!   exercised without a ledger
//! - `InscriptionSteps`: production steps over a `LedgerClient`

mod steps;
mod workflow;

pub use steps::InscriptionSteps;
pub use workflow::{
    AbandonedEntity, CompletedEntity, IssuanceAttempt, IssuanceSteps, IssuanceSummary,
    IssuanceWorkflow, Step,
};
