/*
 * Chain collaborator seams: on-chain reads and transaction submission
 */

pub mod evm;

use async_trait::async_trait;
use ethers::types::U256;
use uuid::Uuid;

use crate::models::Result;

pub use evm::EvmChainReader;

/// Read-only access to AMM pair state on one chain.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Returns `(reserve0, reserve1, block_timestamp_last)` for a pair.
    async fn get_reserves(&self, pair_address: &str) -> Result<(U256, U256, u32)>;

    /// Resolves the pair address for two tokens via the factory.
    /// Fails with `NotFound` when no pair has been created.
    async fn get_pair_address(
        &self,
        factory: &str,
        token_a: &str,
        token_b: &str,
    ) -> Result<String>;
}

/// Submits signed transactions. This is the seam where a signing
/// pipeline plugs in; failures are treated as step failures by the
/// orchestrator.
#[async_trait]
pub trait ChainWriter: Send + Sync {
    async fn submit_swap(
        &self,
        chain_id: u64,
        token_in: &str,
        token_out: &str,
        amount_in: U256,
        min_amount_out: U256,
        recipient: &str,
    ) -> Result<String>;

    async fn submit_refund(
        &self,
        chain_id: u64,
        token: &str,
        amount: U256,
        recipient: &str,
    ) -> Result<String>;
}

/// Placeholder writer that fabricates transaction hashes until a real
/// signing pipeline is wired in.
pub struct StubChainWriter;

#[async_trait]
impl ChainWriter for StubChainWriter {
    async fn submit_swap(
        &self,
        chain_id: u64,
        token_in: &str,
        token_out: &str,
        _amount_in: U256,
        _min_amount_out: U256,
        _recipient: &str,
    ) -> Result<String> {
        tracing::info!(
            "Submitting swap on chain {}: {} -> {}",
            chain_id,
            token_in,
            token_out
        );
        Ok(mock_tx_hash())
    }

    async fn submit_refund(
        &self,
        chain_id: u64,
        token: &str,
        _amount: U256,
        recipient: &str,
    ) -> Result<String> {
        tracing::info!(
            "Submitting refund of {} to {} on chain {}",
            token,
            recipient,
            chain_id
        );
        Ok(mock_tx_hash())
    }
}

#[must_use]
pub fn mock_tx_hash() -> String {
    format!("0x{}", Uuid::new_v4().simple())
}
