//! Resumable Issuance Workflow
//!
//! Each entity carries an `IssuanceAttempt`: one completion flag per step,
//! the handle produced by the create step, and a failure counter. The loop
//! body runs only the steps whose flag is still false, in order. Any
//! failure bumps the counter, waits, and re-enters the body; once the retry
//! policy is exhausted the entity is abandoned and the driver moves on.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::IssuanceError;
use crate::registry::Registry;
use crate::retry::RetryPolicy;
use crate::types::{Address, EntityCheckpoint, EntityStatus};

/// One step of the issuance sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Create,
    VerifyCollection,
    Inscribe,
}

impl Step {
    /// All steps in execution order
    pub const ALL: [Step; 3] = [Step::Create, Step::VerifyCollection, Step::Inscribe];

    fn slot(self) -> usize {
        match self {
            Step::Create => 0,
            Step::VerifyCollection => 1,
            Step::Inscribe => 2,
        }
    }
}

/// Progress of one entity through the steps
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssuanceAttempt {
    pub steps_done: [bool; 3],
    /// Mint address assigned by the create step
    pub handle: Option<Address>,
    /// Failed passes through the loop body so far
    pub retries: u32,
}

impl IssuanceAttempt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a stored checkpoint with a fresh retry budget
    pub fn from_checkpoint(checkpoint: &EntityCheckpoint) -> Self {
        Self {
            steps_done: checkpoint.steps_done,
            handle: checkpoint.handle.clone(),
            retries: 0,
        }
    }

    pub fn is_done(&self, step: Step) -> bool {
        self.steps_done[step.slot()]
    }

    pub fn is_complete(&self) -> bool {
        self.steps_done.iter().all(|done| *done)
    }

    fn mark_done(&mut self, step: Step) {
        self.steps_done[step.slot()] = true;
    }

    fn checkpoint(&self, status: EntityStatus) -> EntityCheckpoint {
        EntityCheckpoint {
            handle: self.handle.clone(),
            steps_done: self.steps_done,
            status,
        }
    }
}

/// The three dependent steps
///
/// `create` returns the handle the later steps operate on.
#[async_trait]
pub trait IssuanceSteps: Send + Sync {
    async fn create(&self, index: u32) -> Result<Address, IssuanceError>;
    async fn verify_collection(&self, handle: &Address) -> Result<(), IssuanceError>;
    async fn inscribe(&self, handle: &Address) -> Result<(), IssuanceError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedEntity {
    pub index: u32,
    pub handle: Address,
}

/// An entity given up on after its retries ran out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbandonedEntity {
    pub index: u32,
    pub steps_done: [bool; 3],
    pub handle: Option<Address>,
    pub error: String,
}

/// Outcome of an issuance run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssuanceSummary {
    pub completed: Vec<CompletedEntity>,
    pub abandoned: Vec<AbandonedEntity>,
    /// Entities a previous run already finished
    pub skipped: Vec<u32>,
}

impl IssuanceSummary {
    pub fn is_complete(&self) -> bool {
        self.abandoned.is_empty()
    }
}

enum EntityOutcome {
    Completed(Address),
    Abandoned { attempt: IssuanceAttempt, error: IssuanceError },
}

/// Issuance workflow
///
/// Owns the steps, the retry policy bounding each entity, and an optional
/// checkpoint registry.
pub struct IssuanceWorkflow {
    steps: Box<dyn IssuanceSteps>,
    retry: RetryPolicy,
    checkpoints: Option<(Registry, String)>,
}

impl IssuanceWorkflow {
    /// Creates a new issuance workflow
    ///
    /// # Arguments
    /// * `steps` - Implementation of the three steps
    /// * `retry` - Bounds the failed passes per entity
    pub fn new(steps: Box<dyn IssuanceSteps>, retry: RetryPolicy) -> Self {
        Self {
            steps,
            retry,
            checkpoints: None,
        }
    }

    /// Persist progress under `run_id` after every step and resume from it
    pub fn with_registry(mut self, registry: Registry, run_id: impl Into<String>) -> Self {
        self.checkpoints = Some((registry, run_id.into()));
        self
    }

    /// Issue `count` entities one after another
    ///
    /// Never fails: entities that exhaust their retries are reported in the
    /// summary and the driver continues with the next one.
    pub async fn run(&self, count: u32) -> IssuanceSummary {
        info!("Issuing {} entit(ies)", count);
        let mut summary = IssuanceSummary::default();

        for index in 0..count {
            // Start fresh, or pick up where a previous run left this entity
            let attempt = match self.load(index).await {
                Some(checkpoint) if checkpoint.status == EntityStatus::Completed => {
                    info!("Entity {} already completed, skipping", index);
                    summary.skipped.push(index);
                    continue;
                }
                Some(checkpoint) => {
                    info!("Entity {} resuming with steps {:?}", index, checkpoint.steps_done);
                    IssuanceAttempt::from_checkpoint(&checkpoint)
                }
                None => IssuanceAttempt::new(),
            };

            // Failures stay with the entity; the driver always moves on
            match self.run_entity(index, attempt).await {
                EntityOutcome::Completed(handle) => {
                    info!("Entity {} completed: {}", index, handle);
                    summary.completed.push(CompletedEntity { index, handle });
                }
                EntityOutcome::Abandoned { attempt, error } => {
                    warn!(
                        "Entity {} abandoned after {} attempt(s), steps {:?}: {}",
                        index, attempt.retries, attempt.steps_done, error
                    );
                    self.save(index, &attempt, EntityStatus::Abandoned).await;
                    summary.abandoned.push(AbandonedEntity {
                        index,
                        steps_done: attempt.steps_done,
                        handle: attempt.handle,
                        error: error.to_string(),
                    });
                }
            }
        }

        info!(
            "Issuance finished: {} completed, {} abandoned, {} skipped",
            summary.completed.len(),
            summary.abandoned.len(),
            summary.skipped.len()
        );
        summary
    }

    /// Drive one entity until it completes or its retries run out
    async fn run_entity(&self, index: u32, mut attempt: IssuanceAttempt) -> EntityOutcome {
        loop {
            match self.advance(index, &mut attempt).await {
                Ok(handle) => {
                    self.save(index, &attempt, EntityStatus::Completed).await;
                    return EntityOutcome::Completed(handle);
                }
                Err(error) => {
                    // Steps already done keep their flags, so the next pass resumes
                    attempt.retries += 1;
                    if !self.retry.allows_retry(attempt.retries) {
                        return EntityOutcome::Abandoned { attempt, error };
                    }
                    warn!(
                        "Entity {} attempt {}/{} failed: {}",
                        index,
                        attempt.retries,
                        self.retry.max_attempts(),
                        error
                    );
                    self.retry.wait(attempt.retries).await;
                }
            }
        }
    }

    /// One pass through the loop body: run every step not yet done
    async fn advance(&self, index: u32, attempt: &mut IssuanceAttempt) -> Result<Address, IssuanceError> {
        for step in Step::ALL {
            if attempt.is_done(step) {
                continue;
            }
            match step {
                Step::Create => {
                    let handle = self.steps.create(index).await?;
                    info!("Entity {} created: {}", index, handle);
                    attempt.handle = Some(handle);
                }
                Step::VerifyCollection => {
                    // Dependent steps never run without the created handle
                    let handle = attempt
                        .handle
                        .as_ref()
                        .ok_or(IssuanceError::Precondition("collection verification needs a handle"))?;
                    self.steps.verify_collection(handle).await?;
                    info!("Entity {} verified in collection", index);
                }
                Step::Inscribe => {
                    let handle = attempt
                        .handle
                        .as_ref()
                        .ok_or(IssuanceError::Precondition("inscription needs a handle"))?;
                    self.steps.inscribe(handle).await?;
                    info!("Entity {} inscribed", index);
                }
            }
            // Flag and checkpoint each step as soon as the ledger confirms it
            attempt.mark_done(step);
            self.save(index, attempt, EntityStatus::InProgress).await;
        }
        attempt
            .handle
            .clone()
            .ok_or(IssuanceError::Precondition("completed entity has no handle"))
    }

    async fn load(&self, index: u32) -> Option<EntityCheckpoint> {
        let (registry, run_id) = self.checkpoints.as_ref()?;
        match registry.load_entity(run_id, index).await {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                warn!("Could not load checkpoint for entity {}: {}", index, e);
                None
            }
        }
    }

    // A failed write only costs resumability; the ledger already holds the step
    async fn save(&self, index: u32, attempt: &IssuanceAttempt, status: EntityStatus) {
        if let Some((registry, run_id)) = &self.checkpoints {
            if let Err(e) = registry.save_entity(run_id, index, &attempt.checkpoint(status)).await {
                warn!("Could not checkpoint entity {}: {}", index, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::ledger::Keypair;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Steps that record every call and fail on demand
    #[derive(Clone, Default)]
    struct ScriptedSteps {
        calls: Arc<Mutex<Vec<Step>>>,
        failures: Arc<Mutex<HashMap<Step, u32>>>,
        always_fail: Option<Step>,
    }

    impl ScriptedSteps {
        fn failing(step: Step, times: u32) -> Self {
            let steps = Self::default();
            steps.failures.lock().unwrap().insert(step, times);
            steps
        }

        fn calls(&self) -> Vec<Step> {
            self.calls.lock().unwrap().clone()
        }

        fn call(&self, step: Step) -> Result<(), IssuanceError> {
            self.calls.lock().unwrap().push(step);
            if self.always_fail == Some(step) {
                return Err(LedgerError::Submission("always".to_string()).into());
            }
            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(&step) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(LedgerError::Submission("transient".to_string()).into());
                }
            }
            Ok(())
        }
    }

    #[async_trait]
    impl IssuanceSteps for ScriptedSteps {
        async fn create(&self, index: u32) -> Result<Address, IssuanceError> {
            self.call(Step::Create)?;
            Ok(Keypair::from_seed([index as u8 + 1; 32]).address())
        }

        async fn verify_collection(&self, _handle: &Address) -> Result<(), IssuanceError> {
            self.call(Step::VerifyCollection)
        }

        async fn inscribe(&self, _handle: &Address) -> Result<(), IssuanceError> {
            self.call(Step::Inscribe)
        }
    }

    fn workflow(steps: &ScriptedSteps) -> IssuanceWorkflow {
        IssuanceWorkflow::new(Box::new(steps.clone()), RetryPolicy::fixed(3, Duration::ZERO))
    }

    fn handle() -> Address {
        Keypair::from_seed([9u8; 32]).address()
    }

    #[tokio::test]
    async fn test_runs_all_steps_in_order() {
        let steps = ScriptedSteps::default();
        let summary = workflow(&steps).run(1).await;

        assert_eq!(summary.completed.len(), 1);
        assert!(summary.is_complete());
        assert_eq!(steps.calls(), Step::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_done_steps_are_not_rerun() {
        let steps = ScriptedSteps::default();
        let attempt = IssuanceAttempt {
            steps_done: [true, false, false],
            handle: Some(handle()),
            retries: 0,
        };

        let outcome = workflow(&steps).run_entity(0, attempt).await;
        assert!(matches!(outcome, EntityOutcome::Completed(h) if h == handle()));
        assert_eq!(steps.calls(), vec![Step::VerifyCollection, Step::Inscribe]);
    }

    #[tokio::test]
    async fn test_failure_resumes_from_failed_step() {
        let steps = ScriptedSteps::failing(Step::VerifyCollection, 1);
        let summary = workflow(&steps).run(1).await;

        assert!(summary.is_complete());
        assert_eq!(
            steps.calls(),
            vec![Step::Create, Step::VerifyCollection, Step::VerifyCollection, Step::Inscribe]
        );
    }

    #[tokio::test]
    async fn test_exhaustion_abandons_entity_and_continues() {
        let steps = ScriptedSteps {
            always_fail: Some(Step::Create),
            ..ScriptedSteps::default()
        };
        let summary = workflow(&steps).run(2).await;

        assert!(summary.completed.is_empty());
        assert_eq!(summary.abandoned.len(), 2);
        // Exactly three attempts per entity
        assert_eq!(steps.calls(), vec![Step::Create; 6]);
        assert_eq!(summary.abandoned[0].steps_done, [false, false, false]);
    }

    #[tokio::test]
    async fn test_missing_handle_never_reaches_dependent_steps() {
        let steps = ScriptedSteps::default();
        for flags in [[true, false, false], [true, true, false]] {
            let attempt = IssuanceAttempt {
                steps_done: flags,
                handle: None,
                retries: 0,
            };
            let outcome = workflow(&steps).run_entity(0, attempt).await;
            match outcome {
                EntityOutcome::Abandoned { attempt, error } => {
                    assert!(matches!(error, IssuanceError::Precondition(_)));
                    assert_eq!(attempt.retries, 3);
                }
                EntityOutcome::Completed(_) => panic!("entity without handle completed"),
            }
        }
        assert!(steps.calls().is_empty());
    }

    #[tokio::test]
    async fn test_checkpoints_resume_across_runs() {
        let registry = Registry::connect("sqlite::memory:").await.unwrap();
        let steps = ScriptedSteps {
            always_fail: Some(Step::Inscribe),
            ..ScriptedSteps::default()
        };
        let first = workflow(&steps).with_registry(registry.clone(), "run-7").run(1).await;
        assert_eq!(first.abandoned.len(), 1);
        assert_eq!(first.abandoned[0].steps_done, [true, true, false]);

        let stored = registry.load_entity("run-7", 0).await.unwrap().unwrap();
        assert_eq!(stored.status, EntityStatus::Abandoned);
        assert!(stored.handle.is_some());

        // Second run only needs the inscription
        let healthy = ScriptedSteps::default();
        let second = workflow(&healthy).with_registry(registry.clone(), "run-7").run(1).await;
        assert!(second.is_complete());
        assert_eq!(healthy.calls(), vec![Step::Inscribe]);
        assert_eq!(second.completed[0].handle, stored.handle.unwrap());

        // Third run has nothing left to do
        let idle = ScriptedSteps::default();
        let third = workflow(&idle).with_registry(registry, "run-7").run(1).await;
        assert_eq!(third.skipped, vec![0]);
        assert!(idle.calls().is_empty());
    }
}
