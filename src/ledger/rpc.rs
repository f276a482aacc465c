//! JSON-RPC Ledger Client
//!
//! Talks JSON-RPC 2.0 over HTTP to a ledger gateway. The gateway owns wire
//! encoding and confirmation; this client signs the serialized instruction
//! list with the payer and every co-signer and waits for the gateway's
//! confirmed signature.
//!
//! # Methods
//! - `sendOperation`: `{ payer, message, signatures }` → `{ signature }`
//! - `getAccountState`: `[address]` → account state or `null`
//! - `getBalance`: `{ owner, asset }` → base units
//! - `getTokenAccountAddress`: `{ owner, mint }` → address
//! - `getInscriptionRank`: `[mint]` → rank or `null`

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use super::{Keypair, LedgerClient};
use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::types::{AccountState, Address, Asset, Operation, Receipt, Signature};

/// JSON-RPC 2.0 request structure
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a, P> {
    jsonrpc: &'static str,
    method: &'a str,
    params: P,
    id: u64,
}

/// JSON-RPC 2.0 response structure
///
/// Either `result` or `error` is populated. A missing `result` without an
/// error is read as `null`.
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Serialize)]
struct SignedEnvelope<'a> {
    payer: &'a Address,
    /// Exact JSON bytes every signature covers
    message: String,
    signatures: Vec<EnvelopeSignature>,
}

#[derive(Debug, Serialize)]
struct EnvelopeSignature {
    signer: Address,
    signature: String,
}

#[derive(Debug, Deserialize)]
struct SendResult {
    signature: Signature,
}

/// Ledger client backed by a JSON-RPC gateway
pub struct RpcLedger {
    endpoint: String,
    keypair: Keypair,
    payer: Address,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl RpcLedger {
    /// Creates a new client for `keypair` against the configured endpoint
    pub fn new(config: &LedgerConfig, keypair: Keypair) -> Result<Self, LedgerError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            payer: keypair.address(),
            keypair,
            http,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<P, R>(&self, method: &str, params: P) -> Result<R, LedgerError>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        debug!("rpc call {} #{}", method, request.id);

        let response: JsonRpcResponse = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(LedgerError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(serde_json::from_value(response.result.unwrap_or(Value::Null))?)
    }

    fn envelope<'a>(&'a self, operation: &Operation) -> Result<SignedEnvelope<'a>, LedgerError> {
        let message = serde_json::to_string(&operation.instructions)?;
        let signatures = std::iter::once(&self.keypair)
            .chain(operation.signers.iter())
            .map(|signer| EnvelopeSignature {
                signer: signer.address(),
                signature: signer.sign(message.as_bytes()),
            })
            .collect();
        Ok(SignedEnvelope {
            payer: &self.payer,
            message,
            signatures,
        })
    }
}

#[async_trait]
impl LedgerClient for RpcLedger {
    fn payer(&self) -> Address {
        self.payer.clone()
    }

    async fn submit_and_confirm(&self, operation: &Operation) -> Result<Receipt, LedgerError> {
        if operation.is_empty() {
            return Err(LedgerError::Rejected("operation has no instructions".to_string()));
        }
        let envelope = self.envelope(operation)?;
        let result: SendResult = self
            .call("sendOperation", &envelope)
            .await
            .map_err(|e| match e {
                LedgerError::Rpc { code, message } => {
                    LedgerError::Submission(format!("rpc error {code}: {message}"))
                }
                other => other,
            })?;
        Ok(Receipt {
            signature: result.signature,
        })
    }

    async fn account_state(&self, address: &Address) -> Result<Option<AccountState>, LedgerError> {
        self.call("getAccountState", [address]).await
    }

    async fn balance(&self, owner: &Address, asset: &Asset) -> Result<u64, LedgerError> {
        self.call("getBalance", json!({ "owner": owner, "asset": asset })).await
    }

    async fn token_account(&self, owner: &Address, mint: &Address) -> Result<Address, LedgerError> {
        self.call("getTokenAccountAddress", json!({ "owner": owner, "mint": mint }))
            .await
    }

    async fn inscription_rank(&self, mint: &Address) -> Result<Option<u64>, LedgerError> {
        self.call("getInscriptionRank", [mint]).await
    }
}
