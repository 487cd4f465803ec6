/*
 * Data models and types for the cross-chain swap service
 */

pub mod crosschain;

use ethers::types::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crosschain::*;

/// Snapshot of a pair's reserves, fetched fresh for every quote.
/// Reserves move every block, so these are never cached across calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolReserve {
    pub pair_address: String,
    pub token0: String,
    pub token1: String,
    pub reserve0: U256,
    pub reserve1: U256,
    pub total_supply: U256,
}

/// Result of a single-chain route search: the token path, quoted output
/// and the reserves each hop was priced against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteCandidate {
    pub path: Vec<String>,
    pub amount_out: U256,
    pub min_amount_out: U256,
    pub price_impact: Decimal,
    pub reserves: Vec<U256>,
    pub is_direct: bool,
    pub hops: u32,
}

#[derive(Debug, Error)]
pub enum HermesError {
    #[error("No available route found")]
    NoRouteFound,

    #[error("Insufficient liquidity")]
    InsufficientLiquidity,

    #[error("Bridge path not supported: {0} -> {1}")]
    BridgePathUnsupported(u64, u64),

    #[error("Circuit breaker is open for this route")]
    CircuitBreakerOpen,

    #[error("Daily outflow limit exceeded for chain {0}")]
    DailyLimitExceeded(u64),

    #[error("Timeout waiting for bridge completion: {0}")]
    BridgeTimeout(String),

    #[error("Bridge transfer failed: {0}")]
    BridgeFailed(String),

    #[error("Refund failed: {0}")]
    RefundFailed(String),

    #[error("Invalid or unavailable route: {0}")]
    InvalidRoute(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transaction is not retryable: {0}")]
    NotRetryable(String),

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Contract interaction error: {0}")]
    ContractError(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HermesError>;
