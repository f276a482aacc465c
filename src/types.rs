use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AddressError;
use crate::ledger::Keypair;

/// Base58 account address (32-byte public key)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse and validate a base58 address
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(AddressError::Empty);
        }
        let bytes = bs58::decode(trimmed)
            .into_vec()
            .map_err(|e| AddressError::InvalidBase58(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(AddressError::InvalidLength(bytes.len()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bs58::encode(bytes).into_string())
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        // Validated on construction
        if let Ok(bytes) = bs58::decode(&self.0).into_vec() {
            out.copy_from_slice(&bytes);
        }
        out
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

/// Confirmation handle returned by the ledger for a submitted operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(pub String);

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One line of a disbursement list
///
/// `amount` is kept as the human decimal string it was read as and is only
/// scaled to base units when the page is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisbursementEntry {
    #[serde(alias = "recipient")]
    pub address: Address,
    pub amount: String,
}

/// Asset whose balance or transfer is being handled
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Asset {
    /// Native currency, amounts in lamports
    Native,
    /// Fungible token identified by its mint
    Token { mint: Address },
}

/// Name, symbol and off-chain uri attached to a mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub uri: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorityType {
    MintTokens,
    FreezeAccount,
}

impl FromStr for AuthorityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mint" | "mint_tokens" | "MintTokens" => Ok(Self::MintTokens),
            "freeze" | "freeze_account" | "FreezeAccount" => Ok(Self::FreezeAccount),
            other => Err(format!("unknown authority type: {other}")),
        }
    }
}

/// A single ledger instruction
///
/// Every amount is already in base units. Token instructions act on the
/// payer's token account unless a recipient owner is named, in which case
/// they act on that owner's token account for the mint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Instruction {
    TransferNative {
        to: Address,
        lamports: u64,
    },
    CreateTokenAccount {
        owner: Address,
        mint: Address,
    },
    TransferToken {
        mint: Address,
        to: Address,
        amount: u64,
    },
    CreateMint {
        mint: Address,
        decimals: u8,
    },
    MintTo {
        mint: Address,
        to: Address,
        amount: u64,
    },
    Burn {
        mint: Address,
        amount: u64,
    },
    CreateMetadata {
        mint: Address,
        metadata: TokenMetadata,
    },
    UpdateMetadata {
        mint: Address,
        metadata: TokenMetadata,
    },
    SetAuthority {
        mint: Address,
        authority: AuthorityType,
        new_authority: Option<Address>,
    },
    CreateNft {
        mint: Address,
        metadata: TokenMetadata,
        collection: Option<Address>,
        is_collection: bool,
    },
    VerifyCollection {
        mint: Address,
        collection: Address,
    },
    Inscribe {
        mint: Address,
        data: String,
    },
    TransferNft {
        mint: Address,
        to: Address,
    },
    BurnNft {
        mint: Address,
        collection: Option<Address>,
    },
}

impl Instruction {
    pub fn name(&self) -> &'static str {
        match self {
            Instruction::TransferNative { .. } => "transfer_native",
            Instruction::CreateTokenAccount { .. } => "create_token_account",
            Instruction::TransferToken { .. } => "transfer_token",
            Instruction::CreateMint { .. } => "create_mint",
            Instruction::MintTo { .. } => "mint_to",
            Instruction::Burn { .. } => "burn",
            Instruction::CreateMetadata { .. } => "create_metadata",
            Instruction::UpdateMetadata { .. } => "update_metadata",
            Instruction::SetAuthority { .. } => "set_authority",
            Instruction::CreateNft { .. } => "create_nft",
            Instruction::VerifyCollection { .. } => "verify_collection",
            Instruction::Inscribe { .. } => "inscribe",
            Instruction::TransferNft { .. } => "transfer_nft",
            Instruction::BurnNft { .. } => "burn_nft",
        }
    }
}

/// Ordered bundle of instructions submitted and confirmed as one unit
///
/// `signers` holds keypairs beyond the payer that must co-sign, such as a
/// freshly generated mint. They never leave the process.
#[derive(Debug, Clone, Default)]
pub struct Operation {
    pub instructions: Vec<Instruction>,
    pub signers: Vec<Keypair>,
}

impl Operation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    pub fn signed_by(mut self, signer: Keypair) -> Self {
        self.signers.push(signer);
        self
    }

    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Result of a confirmed operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub signature: Signature,
}

/// Account state as reported by the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    pub address: Address,
    pub lamports: u64,
    pub owner_program: String,
}

/// Outcome of a single page submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageReceipt {
    pub page: usize,
    pub recipients: usize,
    pub total: u64,
    pub signature: Signature,
}

/// Lifecycle of one issuance entity as recorded in the checkpoint registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    InProgress,
    Completed,
    Abandoned,
}

impl EntityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityStatus::InProgress => "in_progress",
            EntityStatus::Completed => "completed",
            EntityStatus::Abandoned => "abandoned",
        }
    }
}

impl FromStr for EntityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "abandoned" => Ok(Self::Abandoned),
            other => Err(format!("unknown entity status: {other}")),
        }
    }
}

/// Persisted progress of one issuance entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCheckpoint {
    pub handle: Option<Address>,
    pub steps_done: [bool; 3],
    pub status: EntityStatus,
}
