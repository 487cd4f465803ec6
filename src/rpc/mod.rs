/*
 * RPC client module for interacting with EVM chains
 */

use crate::models::{HermesError, Result};
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, Bytes};
use std::sync::Arc;

pub struct RpcClient {
    provider: Arc<Provider<Http>>,
}

impl RpcClient {
    pub async fn new(rpc_url: &str, chain_id: u64) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| HermesError::RpcError(format!("Failed to create provider: {e}")))?;

        let chain = provider
            .get_chainid()
            .await
            .map_err(|e| HermesError::RpcError(format!("Failed to get chain ID: {e}")))?;

        if chain.as_u64() != chain_id {
            return Err(HermesError::RpcError(format!(
                "Chain ID mismatch: expected {}, got {}",
                chain_id,
                chain.as_u64()
            )));
        }

        Ok(Self {
            provider: Arc::new(provider),
        })
    }

    /// Executes a read-only contract call and returns the raw return data.
    pub async fn call(&self, to: Address, call_data: Vec<u8>) -> Result<Vec<u8>> {
        let tx = ethers::types::TransactionRequest::new()
            .to(to)
            .data(Bytes::from(call_data));

        let result = self
            .provider
            .call(&tx.into(), None)
            .await
            .map_err(|e| HermesError::ContractError(format!("Contract call failed: {e}")))?;

        Ok(result.to_vec())
    }
}
