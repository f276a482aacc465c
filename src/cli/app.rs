//! Command Execution
//!
//! `App` holds the collaborators built once per process and runs a single
//! command against them. Fatal failures come back as errors; batch
//! failures the operator must act on come back as an `Outcome`.

use anyhow::{Context, bail};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{Cli, Command, MetadataArgs};
use crate::amount::{from_base_units, to_base_units};
use crate::batch::{DisbursementAsset, DisbursementEngine, DisbursementOrchestrator};
use crate::config::{Config, SECRET_KEY_ENV, load_addresses, load_recipients};
use crate::error::DisbursementError;
use crate::issuance::{InscriptionSteps, IssuanceWorkflow};
use crate::ledger::{Keypair, LedgerClient, RpcLedger, explorer_link};
use crate::registry::Registry;
use crate::storage::{AssetMetadata, ContentStore, GatewayStore, Uploader};
use crate::token::{NftService, TokenService};
use crate::types::{DisbursementEntry, TokenMetadata};

/// How a command ended when it did not fail outright
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// A disbursement stopped at a page that exhausted its retries
    PartialBatch,
    /// One or more issuance entities were abandoned
    Exhausted,
}

impl Outcome {
    pub fn code(self) -> u8 {
        match self {
            Outcome::Success => 0,
            Outcome::PartialBatch => 2,
            Outcome::Exhausted => 3,
        }
    }

    pub fn exit_code(self) -> ExitCode {
        ExitCode::from(self.code())
    }
}

/// Collaborators shared by every command of one process
pub struct App {
    config: Config,
    ledger: Arc<dyn LedgerClient>,
    store: Option<Arc<dyn ContentStore>>,
    registry: Option<Registry>,
    run_id: Option<String>,
}

impl App {
    /// Creates an app over explicit collaborators
    pub fn new(config: Config, ledger: Arc<dyn LedgerClient>) -> Self {
        Self {
            config,
            ledger,
            store: None,
            registry: None,
            run_id: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ContentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_registry(mut self, registry: Registry, run_id: Option<String>) -> Self {
        self.registry = Some(registry);
        self.run_id = run_id;
        self
    }

    /// Build the production collaborators from the configuration file and
    /// the environment
    ///
    /// # Returns
    /// * `Ok(App)` wired to the RPC ledger, the gateway store and, when
    ///   configured, the checkpoint registry
    /// * `Err` if the config, the secret key or the registry is unusable
    pub async fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let config = Config::load(&cli.config)
            .with_context(|| format!("loading config {}", cli.config.display()))?;
        info!("Loaded configuration from {}", cli.config.display());

        let secret = std::env::var(SECRET_KEY_ENV)
            .with_context(|| format!("{SECRET_KEY_ENV} is not set"))?;
        let keypair = Keypair::from_base58(secret.trim()).context("decoding signing key")?;
        info!("Signing as {}", keypair.address());

        let ledger = RpcLedger::new(&config.ledger, keypair.clone())?;
        // Only upload commands talk to the storage node
        let store = cli
            .command
            .uses_store()
            .then(|| GatewayStore::new(&config.storage, keypair));
        let registry = match &config.registry.url {
            Some(url) => Some(Registry::connect(url).await.context("opening checkpoint registry")?),
            None => None,
        };

        let mut app = App::new(config, Arc::new(ledger));
        if let Some(store) = store {
            app = app.with_store(Arc::new(store));
        }
        if let Some(registry) = registry {
            app = app.with_registry(registry, cli.run_id.clone());
        }
        Ok(app)
    }

    /// Run one command to completion
    pub async fn execute(&self, command: &Command) -> anyhow::Result<Outcome> {
        match command {
            Command::TransferNative { recipients } => {
                let entries = self.recipients(recipients.as_deref())?;
                self.disburse(command, DisbursementAsset::Native, &entries).await
            }
            Command::TransferToken {
                mint,
                decimals,
                recipients,
            } => {
                let entries = self.recipients(recipients.as_deref())?;
                let asset = DisbursementAsset::Token {
                    mint: mint.clone(),
                    decimals: decimals.unwrap_or(self.config.batch.decimals),
                };
                self.disburse(command, asset, &entries).await
            }
            Command::CreateToken {
                metadata,
                decimals,
                initial_supply,
            } => {
                let supply = initial_supply
                    .as_deref()
                    .map(|amount| to_base_units(amount, *decimals))
                    .transpose()?;
                let (mint, signature) = self
                    .tokens()
                    .create_token(token_metadata(metadata), *decimals, supply)
                    .await?;
                info!("Token mint: {}", mint);
                self.log_link(&signature);
                Ok(Outcome::Success)
            }
            Command::MintTo {
                mint,
                to,
                amount,
                decimals,
            } => {
                let amount = to_base_units(amount, decimals.unwrap_or(self.config.batch.decimals))?;
                let signature = self.tokens().mint_to(mint, to, amount).await?;
                self.log_link(&signature);
                Ok(Outcome::Success)
            }
            Command::Burn {
                mint,
                amount,
                decimals,
            } => {
                let amount = to_base_units(amount, decimals.unwrap_or(self.config.batch.decimals))?;
                let signature = self.tokens().burn(mint, amount).await?;
                self.log_link(&signature);
                Ok(Outcome::Success)
            }
            Command::UpdateMetadata { mint, metadata } => {
                let signature = self
                    .tokens()
                    .update_metadata(mint, token_metadata(metadata))
                    .await?;
                self.log_link(&signature);
                Ok(Outcome::Success)
            }
            Command::RevokeAuthority { mint, authority } => {
                let signature = self.tokens().revoke_authority(mint, *authority).await?;
                self.log_link(&signature);
                Ok(Outcome::Success)
            }
            Command::CreateTokenAccounts { mint, owners } => {
                let owners = load_addresses(owners)?;
                let page_size = self.config.batch.page_size;
                let report = self.tokens().create_token_accounts(mint, &owners, page_size).await?;
                info!(
                    "Created {} token account(s), {} already existed",
                    report.created.len(),
                    report.existing.len()
                );
                for signature in &report.signatures {
                    self.log_link(signature);
                }
                Ok(Outcome::Success)
            }
            Command::CreateCollection { metadata } => {
                let (collection, signature) = NftService::new(self.ledger.clone())
                    .create_collection(token_metadata(metadata))
                    .await?;
                info!("Collection: {}", collection);
                self.log_link(&signature);
                Ok(Outcome::Success)
            }
            Command::Inscribe { count, collection } => {
                let Some(collection) = collection.clone().or_else(|| self.config.issuance.collection.clone())
                else {
                    bail!("inscribe needs a collection (--collection or issuance.collection)");
                };
                let steps = InscriptionSteps::new(self.ledger.clone(), collection, &self.config.issuance);
                let mut workflow = IssuanceWorkflow::new(Box::new(steps), self.config.retry.policy()?);
                if let Some((registry, run_id)) = self.checkpoints(command) {
                    workflow = workflow.with_registry(registry, run_id);
                }

                let summary = workflow.run(count.unwrap_or(self.config.issuance.count)).await;
                for entity in &summary.completed {
                    info!("  #{} {}", entity.index, entity.handle);
                }
                if summary.is_complete() {
                    return Ok(Outcome::Success);
                }
                for entity in &summary.abandoned {
                    error!(
                        "  #{} abandoned at steps {:?}: {}",
                        entity.index, entity.steps_done, entity.error
                    );
                }
                Ok(Outcome::Exhausted)
            }
            Command::TransferNft { mint, to } => {
                let signature = NftService::new(self.ledger.clone()).transfer_nft(mint, to).await?;
                self.log_link(&signature);
                Ok(Outcome::Success)
            }
            Command::BurnNft { mint, collection } => {
                let signature = NftService::new(self.ledger.clone())
                    .burn_nft(mint, collection.as_ref())
                    .await?;
                self.log_link(&signature);
                Ok(Outcome::Success)
            }
            Command::UploadFile { path } => {
                let url = self.uploader()?.upload_file(path).await?;
                info!("File uploaded: {}", url);
                Ok(Outcome::Success)
            }
            Command::UploadMetadata {
                name,
                symbol,
                description,
                image,
            } => {
                let metadata = AssetMetadata {
                    name: name.clone(),
                    symbol: symbol.clone(),
                    description: description.clone(),
                    image: image.clone(),
                };
                let url = self.uploader()?.upload_metadata(&metadata).await?;
                info!("Metadata uploaded: {}", url);
                Ok(Outcome::Success)
            }
            Command::CheckBalances { mint, owners } => {
                let owners = load_addresses(owners)?;
                let holders = self.tokens().check_balances(mint, &owners).await?;
                info!("{} of {} owner(s) hold {}", holders.len(), owners.len(), mint);
                for (owner, balance) in &holders {
                    info!("  {}: {}", owner, balance);
                }
                Ok(Outcome::Success)
            }
        }
    }

    async fn disburse(
        &self,
        command: &Command,
        asset: DisbursementAsset,
        entries: &[DisbursementEntry],
    ) -> anyhow::Result<Outcome> {
        let decimals = asset.decimals();
        let engine = DisbursementEngine::new(self.ledger.clone(), asset);
        let mut orchestrator =
            DisbursementOrchestrator::new(engine, &self.config.batch, self.config.retry.policy()?)
                .with_explorer(&self.config.ledger.explorer_url);
        if let Some((registry, run_id)) = self.checkpoints(command) {
            orchestrator = orchestrator.with_registry(registry, run_id);
        }

        match orchestrator.run(entries).await {
            Ok(report) => {
                info!(
                    "Paid {} to {} recipient(s)",
                    from_base_units(report.total, decimals),
                    report.recipients
                );
                Ok(Outcome::Success)
            }
            Err(DisbursementError::PageFailed {
                page,
                completed,
                source,
            }) => {
                error!("Disbursement aborted at page {}: {}", page + 1, source);
                for receipt in &completed {
                    error!("  page {} confirmed as {}", receipt.page + 1, receipt.signature);
                }
                Ok(Outcome::PartialBatch)
            }
            Err(DisbursementError::CheckpointFailed { completed, source }) => {
                error!("Disbursement stopped, checkpoint write failed: {}", source);
                for receipt in &completed {
                    error!("  page {} confirmed as {}", receipt.page + 1, receipt.signature);
                }
                Ok(Outcome::PartialBatch)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Registry and run id for `command`, generating a run id if none was given
    fn checkpoints(&self, command: &Command) -> Option<(Registry, String)> {
        let registry = self.registry.clone()?;
        let run_id = match &self.run_id {
            Some(run_id) => run_id.clone(),
            None => {
                let run_id = format!(
                    "{}-{}",
                    command.name(),
                    chrono::Utc::now().format("%Y%m%dT%H%M%S")
                );
                warn!("No --run-id given; checkpointing as {} (pass it to resume)", run_id);
                run_id
            }
        };
        Some((registry, run_id))
    }

    fn recipients(&self, path: Option<&Path>) -> anyhow::Result<Vec<DisbursementEntry>> {
        match path {
            Some(path) => load_recipients(path)
                .with_context(|| format!("loading recipients from {}", path.display())),
            None => Ok(self.config.batch.recipients.clone()),
        }
    }

    fn tokens(&self) -> TokenService {
        TokenService::new(self.ledger.clone())
    }

    fn uploader(&self) -> anyhow::Result<Uploader> {
        let Some(store) = &self.store else {
            bail!("no content store configured");
        };
        Ok(Uploader::new(store.clone(), &self.config.storage.gateway_url))
    }

    fn log_link(&self, signature: &crate::types::Signature) {
        info!("Confirmed: {}", explorer_link(&self.config.ledger.explorer_url, signature));
    }
}

fn token_metadata(args: &MetadataArgs) -> TokenMetadata {
    TokenMetadata {
        name: args.name.clone(),
        symbol: args.symbol.clone(),
        uri: args.uri.clone(),
    }
}
