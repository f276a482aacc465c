//! Command Line Interface
//!
//! One invocation runs one operation and exits. Parsing lives here; the
//! wiring of ledger, store and registry into the engines lives in `app`.

mod app;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::types::{Address, AuthorityType};

pub use app::{App, Outcome};

#[derive(Debug, Parser)]
#[command(name = "solscribe", version, about = "Token disbursement, inscription and upload tooling")]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "SOLSCRIBE_CONFIG", default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Checkpoint run id; rerunning with the same id resumes the run
    #[arg(long, global = true)]
    pub run_id: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Token name, symbol and metadata uri
#[derive(Debug, Clone, clap::Args)]
pub struct MetadataArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub symbol: String,
    #[arg(long)]
    pub uri: String,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Pay native currency to a recipient list, page by page
    TransferNative {
        /// JSON or TOML recipient list; defaults to `batch.recipients`
        #[arg(long)]
        recipients: Option<PathBuf>,
    },
    /// Pay a fungible token to a recipient list, page by page
    TransferToken {
        #[arg(long)]
        mint: Address,
        /// Token decimals; defaults to `batch.decimals`
        #[arg(long)]
        decimals: Option<u8>,
        #[arg(long)]
        recipients: Option<PathBuf>,
    },
    /// Create a mint with metadata and an optional initial supply
    CreateToken {
        #[command(flatten)]
        metadata: MetadataArgs,
        #[arg(long, default_value_t = 9)]
        decimals: u8,
        /// Initial supply minted to the signer, in whole tokens
        #[arg(long)]
        initial_supply: Option<String>,
    },
    /// Mint tokens to an owner, creating its token account if needed
    MintTo {
        #[arg(long)]
        mint: Address,
        #[arg(long)]
        to: Address,
        #[arg(long)]
        amount: String,
        #[arg(long)]
        decimals: Option<u8>,
    },
    /// Burn tokens from the signer's token account
    Burn {
        #[arg(long)]
        mint: Address,
        #[arg(long)]
        amount: String,
        #[arg(long)]
        decimals: Option<u8>,
    },
    /// Replace a token's metadata
    UpdateMetadata {
        #[arg(long)]
        mint: Address,
        #[command(flatten)]
        metadata: MetadataArgs,
    },
    /// Set a mint or freeze authority to none
    RevokeAuthority {
        #[arg(long)]
        mint: Address,
        /// `mint` or `freeze`
        #[arg(long, default_value = "mint")]
        authority: AuthorityType,
    },
    /// Create token accounts for every owner in a list that lacks one
    CreateTokenAccounts {
        #[arg(long)]
        mint: Address,
        /// One owner address per line
        #[arg(long)]
        owners: PathBuf,
    },
    /// Create an NFT collection
    CreateCollection {
        #[command(flatten)]
        metadata: MetadataArgs,
    },
    /// Issue inscription NFTs into a collection
    Inscribe {
        /// Number of NFTs; defaults to `issuance.count`
        #[arg(long)]
        count: Option<u32>,
        /// Collection address; defaults to `issuance.collection`
        #[arg(long)]
        collection: Option<Address>,
    },
    /// Transfer an NFT to a new owner
    TransferNft {
        #[arg(long)]
        mint: Address,
        #[arg(long)]
        to: Address,
    },
    /// Burn an NFT
    BurnNft {
        #[arg(long)]
        mint: Address,
        /// Collection the NFT is a verified member of
        #[arg(long)]
        collection: Option<Address>,
    },
    /// Upload a file to the content store
    UploadFile { path: PathBuf },
    /// Upload a JSON metadata document to the content store
    UploadMetadata {
        #[arg(long)]
        name: String,
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Image URL, usually from `upload-file`
        #[arg(long)]
        image: String,
    },
    /// Report owners holding a non-zero balance of a token
    CheckBalances {
        #[arg(long)]
        mint: Address,
        #[arg(long)]
        owners: PathBuf,
    },
}

impl Command {
    /// Subcommand name, used as the prefix of generated run ids
    pub fn name(&self) -> &'static str {
        match self {
            Command::TransferNative { .. } => "transfer-native",
            Command::TransferToken { .. } => "transfer-token",
            Command::CreateToken { .. } => "create-token",
            Command::MintTo { .. } => "mint-to",
            Command::Burn { .. } => "burn",
            Command::UpdateMetadata { .. } => "update-metadata",
            Command::RevokeAuthority { .. } => "revoke-authority",
            Command::CreateTokenAccounts { .. } => "create-token-accounts",
            Command::CreateCollection { .. } => "create-collection",
            Command::Inscribe { .. } => "inscribe",
            Command::TransferNft { .. } => "transfer-nft",
            Command::BurnNft { .. } => "burn-nft",
            Command::UploadFile { .. } => "upload-file",
            Command::UploadMetadata { .. } => "upload-metadata",
            Command::CheckBalances { .. } => "check-balances",
        }
    }

    /// Whether the command touches the content store instead of the ledger
    pub fn uses_store(&self) -> bool {
        matches!(self, Command::UploadFile { .. } | Command::UploadMetadata { .. })
    }
}

/// Exit code for a command line that could not be parsed
///
/// Help and version requests end successfully; every other parse error is
/// fatal (1), keeping 2 for disbursements that stopped part way.
pub fn parse_error_code(err: &clap::Error) -> u8 {
    use clap::error::ErrorKind;

    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "11111111111111111111111111111111";

    #[test]
    fn test_parses_transfer_token() {
        let cli = Cli::try_parse_from([
            "solscribe",
            "--config",
            "ops.toml",
            "transfer-token",
            "--mint",
            ADDR,
            "--decimals",
            "6",
            "--run-id",
            "airdrop-1",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("ops.toml"));
        assert_eq!(cli.run_id.as_deref(), Some("airdrop-1"));
        match cli.command {
            Command::TransferToken { mint, decimals, recipients } => {
                assert_eq!(mint.as_str(), ADDR);
                assert_eq!(decimals, Some(6));
                assert!(recipients.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parses_authority_and_rejects_bad_address() {
        let cli = Cli::try_parse_from([
            "solscribe",
            "revoke-authority",
            "--mint",
            ADDR,
            "--authority",
            "freeze",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::RevokeAuthority { authority: AuthorityType::FreezeAccount, .. }
        ));

        assert!(Cli::try_parse_from(["solscribe", "transfer-nft", "--mint", "0OIl", "--to", ADDR]).is_err());
    }

    #[test]
    fn test_command_names_match_subcommands() {
        let cli = Cli::try_parse_from(["solscribe", "inscribe", "--count", "4"]).unwrap();
        assert_eq!(cli.command.name(), "inscribe");
        assert!(!cli.command.uses_store());

        let cli = Cli::try_parse_from(["solscribe", "upload-file", "cat.png"]).unwrap();
        assert_eq!(cli.command.name(), "upload-file");
        assert!(cli.command.uses_store());
    }

    #[test]
    fn test_parse_errors_do_not_collide_with_outcome_codes() {
        let missing_mint = Cli::try_parse_from(["solscribe", "transfer-token"]).unwrap_err();
        assert_eq!(parse_error_code(&missing_mint), 1);
        assert_ne!(parse_error_code(&missing_mint), Outcome::PartialBatch.code());

        let unknown = Cli::try_parse_from(["solscribe", "teleport"]).unwrap_err();
        assert_eq!(parse_error_code(&unknown), 1);

        let help = Cli::try_parse_from(["solscribe", "--help"]).unwrap_err();
        assert_eq!(parse_error_code(&help), 0);
        let version = Cli::try_parse_from(["solscribe", "--version"]).unwrap_err();
        assert_eq!(parse_error_code(&version), 0);
    }
}
