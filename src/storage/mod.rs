//! Content Storage Module
//!
//! This module handles uploads to the decentralized storage network:
//! - `ContentStore`: price, fund and upload primitives
//! - `GatewayStore`: HTTP client for an upload node
//! - `MemoryStore`: in-process store
//! - `Uploader`: the price → fund → upload flow used by the upload commands

mod gateway;
mod memory;
mod store;
mod uploader;

pub use gateway::GatewayStore;
pub use memory::MemoryStore;
pub use store::{ContentId, ContentStore};
pub use uploader::{AssetMetadata, Uploader};
