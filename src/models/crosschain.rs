/*
 * Cross-chain route and transaction models
 */

use chrono::{DateTime, Utc};
use ethers::types::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Maximum number of times a stuck or failed transaction may be retried.
pub const MAX_RETRY_COUNT: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepType {
    Swap,
    Bridge,
    Receive,
}

/// One leg of a cross-chain execution plan. Steps are ordered; the
/// `amount_out` of one step feeds the `amount_in` of the next.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStep {
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub chain_id: u64,
    pub protocol: String,
    pub token_in: String,
    pub token_out: String,
    pub amount_in: U256,
    pub amount_out: U256,
    pub fee: U256,
    pub description: String,
}

/// Fee components for a cross-chain route, all denominated in the
/// fee-accounting token's smallest unit. `total_fee` is the sum of the
/// other five fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeBreakdown {
    pub source_chain_gas_fee: U256,
    pub bridge_fee: U256,
    pub target_chain_gas_fee: U256,
    pub service_fee: U256,
    pub third_party_fee: U256,
    pub total_fee: U256,
}

impl FeeBreakdown {
    #[must_use]
    pub fn zero() -> Self {
        Self {
            source_chain_gas_fee: U256::zero(),
            bridge_fee: U256::zero(),
            target_chain_gas_fee: U256::zero(),
            service_fee: U256::zero(),
            third_party_fee: U256::zero(),
            total_fee: U256::zero(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteType {
    Fastest,
    Cheapest,
    Balanced,
}

/// A fully built cross-chain route. Immutable after construction;
/// re-search for a fresh quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossChainRoute {
    pub source_chain_id: u64,
    pub target_chain_id: u64,
    pub source_token: String,
    pub target_token: String,
    pub amount_in: U256,
    pub estimated_amount_out: U256,
    pub min_amount_out: U256,
    pub steps: Vec<RouteStep>,
    pub fee_breakdown: FeeBreakdown,
    pub estimated_time_seconds: u64,
    pub route_type: RouteType,
    pub price_impact_percent: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    PendingSourceConfirmation,
    SourceConfirmed,
    BridgeInitiated,
    BridgeInProgress,
    TargetExecuting,
    Completed,
    PartiallyCompleted,
    Failed,
    Refunded,
}

impl TransactionStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed
                | TransactionStatus::PartiallyCompleted
                | TransactionStatus::Failed
                | TransactionStatus::Refunded
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusHistory {
    pub status: TransactionStatus,
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

/// Ledger record for one cross-chain transaction. Owned exclusively by
/// the transaction ledger; every state change appends to `status_history`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossChainTransaction {
    pub transaction_id: String,
    pub user_address: String,
    pub source_chain_id: u64,
    pub target_chain_id: u64,
    pub source_token: String,
    pub target_token: String,
    pub amount_in: U256,
    pub amount_out: Option<U256>,
    pub status: TransactionStatus,
    pub status_history: Vec<StatusHistory>,
    pub source_tx_hash: Option<String>,
    pub bridge_message_id: Option<String>,
    pub target_tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub estimated_time_seconds: Option<u64>,
    pub actual_time_seconds: Option<u64>,
    pub error_message: Option<String>,
    pub retry_count: u32,
}

impl CrossChainTransaction {
    /// A transaction can be retried while it is failed or stuck bridging
    /// and has not exhausted its retry budget.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        (self.status == TransactionStatus::Failed
            || self.status == TransactionStatus::BridgeInProgress)
            && self.retry_count < MAX_RETRY_COUNT
    }
}

/// Status of a bridge message as reported by the bridge network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Completed,
    Failed,
}
