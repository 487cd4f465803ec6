/*
 * Cross-chain fee estimator: gas, bridge, service and pass-through fees
 */

use ethers::types::U256;
use std::collections::HashMap;
use std::sync::Arc;

use crate::bridge::BridgeNetwork;
use crate::config::ChainConfig;
use crate::models::{FeeBreakdown, RouteStep, StepType};

const SWAP_GAS_LIMIT: u64 = 150_000;
const BRIDGE_GAS_LIMIT: u64 = 200_000;
const RELAY_GAS_LIMIT: u64 = 100_000;

/// Fallback gas price for chains without a configured entry: 30 gwei.
const DEFAULT_GAS_PRICE_WEI: u64 = 30_000_000_000;

const GWEI: u64 = 1_000_000_000;

/// Estimates fees from a static per-chain gas price table, not a live
/// oracle. Service fee is 0.05% of the input amount.
pub struct FeeEstimator {
    bridge: Arc<BridgeNetwork>,
    gas_price_wei: HashMap<u64, U256>,
}

impl FeeEstimator {
    pub fn new(bridge: Arc<BridgeNetwork>, chains: &[ChainConfig]) -> Self {
        let gas_price_wei = chains
            .iter()
            .map(|c| (c.chain_id, U256::from(c.gas_price_gwei) * U256::from(GWEI)))
            .collect();
        Self {
            bridge,
            gas_price_wei,
        }
    }

    pub fn calculate_fee_breakdown(
        &self,
        source_chain_id: u64,
        target_chain_id: u64,
        amount_in: U256,
        steps: &[RouteStep],
    ) -> FeeBreakdown {
        if steps.is_empty() {
            return FeeBreakdown::zero();
        }

        let source_chain_gas_fee = self.source_chain_gas_fee(source_chain_id, steps);
        let target_chain_gas_fee = self.target_chain_gas_fee(target_chain_id, steps);
        let bridge_fee = self.bridge.get_bridge_fee(source_chain_id, target_chain_id);
        let service_fee = service_fee(amount_in);

        // Bridge-step fees are passed through unmarked.
        let third_party_fee = steps
            .iter()
            .filter(|s| s.step_type == StepType::Bridge)
            .fold(U256::zero(), |acc, s| acc.saturating_add(s.fee));

        let total_fee = source_chain_gas_fee
            .saturating_add(bridge_fee)
            .saturating_add(target_chain_gas_fee)
            .saturating_add(service_fee)
            .saturating_add(third_party_fee);

        FeeBreakdown {
            source_chain_gas_fee,
            bridge_fee,
            target_chain_gas_fee,
            service_fee,
            third_party_fee,
            total_fee,
        }
    }

    fn source_chain_gas_fee(&self, chain_id: u64, steps: &[RouteStep]) -> U256 {
        let mut total_gas = U256::zero();
        for step in steps.iter().filter(|s| s.chain_id == chain_id) {
            total_gas += match step.step_type {
                StepType::Swap => U256::from(SWAP_GAS_LIMIT),
                StepType::Bridge => U256::from(BRIDGE_GAS_LIMIT),
                // Receiving costs nothing on the source chain.
                StepType::Receive => U256::zero(),
            };
        }
        total_gas * self.gas_price(chain_id)
    }

    fn target_chain_gas_fee(&self, chain_id: u64, steps: &[RouteStep]) -> U256 {
        let mut total_gas = U256::zero();
        for step in steps.iter().filter(|s| s.chain_id == chain_id) {
            total_gas += match step.step_type {
                StepType::Swap => U256::from(SWAP_GAS_LIMIT),
                StepType::Receive => U256::from(RELAY_GAS_LIMIT),
                // Bridge sends never execute on the target chain.
                StepType::Bridge => U256::zero(),
            };
        }
        total_gas * self.gas_price(chain_id)
    }

    fn gas_price(&self, chain_id: u64) -> U256 {
        self.gas_price_wei
            .get(&chain_id)
            .copied()
            .unwrap_or_else(|| U256::from(DEFAULT_GAS_PRICE_WEI))
    }
}

/// 0.05% of the input. Multiply-first keeps full precision; amounts too
/// large for that fall back to divide-first instead of overflowing.
fn service_fee(amount_in: U256) -> U256 {
    amount_in
        .checked_mul(U256::from(5u64))
        .map(|v| v / U256::from(10_000u64))
        .unwrap_or_else(|| amount_in / U256::from(10_000u64) * U256::from(5u64))
}
