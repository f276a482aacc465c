//! Disbursement Orchestrator Module
//!
//! This module drives a full disbursement run. Pages are submitted strictly
//! in order, one at a time, each through the retry policy.
//!
//! # Run Flow
//! 1. Scale every amount and log the grand total (nothing is sent on error)
//! 2. Check the run id against the registry and load its completed pages
//! 3. For each remaining page: prepare, submit and confirm, record, log link
//! 4. Pause for the configured delay before the next page
//! 5. Stop at the first page that fails for good

use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::amount::from_base_units;
use crate::batch::{DisbursementEngine, page_count, paginate};
use crate::config::BatchConfig;
use crate::error::DisbursementError;
use crate::ledger::explorer_link;
use crate::registry::Registry;
use crate::retry::RetryPolicy;
use crate::types::{DisbursementEntry, PageReceipt};

/// Result of a run in which every page was confirmed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisbursementReport {
    /// Pages confirmed by this run, in order
    pub pages: Vec<PageReceipt>,
    /// Pages skipped because the registry already had them
    pub skipped: Vec<usize>,
    pub recipients: usize,
    /// Grand total of the whole list in base units
    pub total: u64,
}

/// Disbursement orchestrator
///
/// Owns the engine and the pacing parameters of a run.
pub struct DisbursementOrchestrator {
    engine: DisbursementEngine,
    page_size: usize,
    page_delay: Duration,
    retry: RetryPolicy,
    /// Registry plus the run id checkpoints are filed under
    checkpoints: Option<(Registry, String)>,
    explorer_url: Option<String>,
}

impl DisbursementOrchestrator {
    /// Creates a new disbursement orchestrator
    ///
    /// # Arguments
    /// * `engine` - Builds and submits page operations
    /// * `config` - Page size and inter-page delay
    /// * `retry` - Policy applied to every page submission
    pub fn new(engine: DisbursementEngine, config: &BatchConfig, retry: RetryPolicy) -> Self {
        Self {
            engine,
            page_size: config.page_size,
            page_delay: config.page_delay(),
            retry,
            checkpoints: None,
            explorer_url: None,
        }
    }

    /// Record confirmed pages under `run_id` and skip those already recorded
    pub fn with_registry(mut self, registry: Registry, run_id: impl Into<String>) -> Self {
        self.checkpoints = Some((registry, run_id.into()));
        self
    }

    /// Log an explorer link next to each confirmed signature
    pub fn with_explorer(mut self, explorer_url: impl Into<String>) -> Self {
        self.explorer_url = Some(explorer_url.into());
        self
    }

    /// Pay every entry of `entries`, page by page
    ///
    /// # Returns
    /// * `Ok(DisbursementReport)` once every page is confirmed
    /// * `Err(DisbursementError::PageFailed)` when a page fails for good;
    ///   it carries the receipts of the pages confirmed before it
    /// * `Err(DisbursementError::CheckpointFailed)` when a confirmed page
    ///   could not be recorded
    /// * any other error if the run was rejected before submitting anything
    pub async fn run(
        &self,
        entries: &[DisbursementEntry],
    ) -> Result<DisbursementReport, DisbursementError> {
        // Scale the whole list first so a bad amount sends nothing
        let decimals = self.engine.asset().decimals();
        let total = self.engine.validate(entries)?;
        let pages = page_count(entries.len(), self.page_size);
        info!(
            "Disbursing {} to {} recipient(s) over {} page(s)",
            from_base_units(total, decimals),
            entries.len(),
            pages
        );

        // Page indices from a checkpointed run only mean something for the
        // same list, paging and asset
        let completed = self.completed_pages(entries).await?;
        let mut report = DisbursementReport {
            recipients: entries.len(),
            total,
            ..DisbursementReport::default()
        };

        for page in paginate(entries, self.page_size) {
            if completed.contains(&page.index) {
                info!("Page {}/{} already confirmed, skipping", page.index + 1, pages);
                report.skipped.push(page.index);
                continue;
            }

            // Submit the page; only delivery failures are worth another attempt
            let label = format!("page {}/{}", page.index + 1, pages);
            let engine = &self.engine;
            let outcome = self
                .retry
                .run_while(
                    &label,
                    move |attempt| {
                        debug!("Submitting page {} (attempt {})", page.index + 1, attempt);
                        engine.submit(page)
                    },
                    DisbursementError::is_transient,
                )
                .await;

            let (prepared, signature) = match outcome {
                Ok(done) => done,
                Err(e) => {
                    error!(
                        "Page {}/{} failed, aborting after {} confirmed page(s)",
                        page.index + 1,
                        pages,
                        report.pages.len()
                    );
                    return Err(DisbursementError::PageFailed {
                        page: page.index,
                        completed: report.pages,
                        source: Box::new(e),
                    });
                }
            };

            let receipt = PageReceipt {
                page: page.index,
                recipients: prepared.recipients,
                total: prepared.total,
                signature,
            };
            info!(
                "Page {}/{}: {} recipient(s), total {}, signature {}",
                page.index + 1,
                pages,
                receipt.recipients,
                from_base_units(receipt.total, decimals),
                receipt.signature
            );
            if let Some(explorer_url) = &self.explorer_url {
                info!("  {}", explorer_link(explorer_url, &receipt.signature));
            }

            // Record before moving on; a resume without this row would pay the page twice
            if let Some((registry, run_id)) = &self.checkpoints {
                if let Err(source) = registry.record_page(run_id, &receipt).await {
                    error!("Page {} confirmed but not checkpointed: {}", page.index + 1, source);
                    report.pages.push(receipt);
                    return Err(DisbursementError::CheckpointFailed {
                        completed: report.pages,
                        source,
                    });
                }
            }
            report.pages.push(receipt);

            // Pace the ledger between pages, not after the last one
            if page.index + 1 < pages && !self.page_delay.is_zero() {
                sleep(self.page_delay).await;
            }
        }

        info!(
            "Disbursement complete: {} page(s) confirmed, {} skipped",
            report.pages.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Pages already confirmed for this run, after checking the run id
    /// belongs to this disbursement
    async fn completed_pages(
        &self,
        entries: &[DisbursementEntry],
    ) -> Result<HashSet<usize>, DisbursementError> {
        let Some((registry, run_id)) = &self.checkpoints else {
            return Ok(HashSet::new());
        };
        let fingerprint = self.engine.fingerprint(entries, self.page_size);
        if !registry.claim_run(run_id, &fingerprint).await? {
            return Err(DisbursementError::RunMismatch {
                run_id: run_id.clone(),
            });
        }
        Ok(registry.completed_pages(run_id).await?)
    }
}
