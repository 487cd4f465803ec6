/*
 * Cross-chain route planner: direct-bridge and stablecoin-relay candidates
 */

use ethers::types::U256;
use rust_decimal::{Decimal, RoundingStrategy};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::bridge::BridgeNetwork;
use crate::config::PlannerConfig;
use crate::fees::FeeEstimator;
use crate::models::{CrossChainRoute, RouteStep, RouteType, StepType};
use crate::router::apply_slippage;
use crate::utils::{same_token, u256_to_decimal};

/// Flat AMM fee taken by each swap leg: 3 / 1000 = 0.3%.
const SWAP_FEE_NUMERATOR: u64 = 3;
const SWAP_FEE_DENOMINATOR: u64 = 1000;

pub struct RoutePlanner {
    bridge: Arc<BridgeNetwork>,
    fees: Arc<FeeEstimator>,
    stablecoins: HashMap<u64, String>,
    config: PlannerConfig,
}

impl RoutePlanner {
    pub fn new(
        bridge: Arc<BridgeNetwork>,
        fees: Arc<FeeEstimator>,
        stablecoins: HashMap<u64, String>,
        config: PlannerConfig,
    ) -> Self {
        Self {
            bridge,
            fees,
            stablecoins,
            config,
        }
    }

    /// Builds candidate routes between two chains, ranked by the
    /// requested policy. An unsupported bridge path yields an empty
    /// list, not an error.
    pub fn search_routes(
        &self,
        source_chain_id: u64,
        target_chain_id: u64,
        source_token: &str,
        target_token: &str,
        amount_in: U256,
        route_type: RouteType,
    ) -> Vec<CrossChainRoute> {
        info!(
            "Searching cross-chain routes: {}->{}, token: {}->{}, amount: {}",
            source_chain_id, target_chain_id, source_token, target_token, amount_in
        );

        if !self
            .bridge
            .is_bridge_path_supported(source_chain_id, target_chain_id)
        {
            warn!(
                "Bridge path not supported: {} -> {}",
                source_chain_id, target_chain_id
            );
            return Vec::new();
        }

        if self
            .bridge
            .is_circuit_breaker_open(source_chain_id, target_chain_id)
        {
            warn!(
                "Circuit breaker open, no routes offered: {} -> {}",
                source_chain_id, target_chain_id
            );
            return Vec::new();
        }

        let mut routes = Vec::new();

        if let Some(direct) = self.build_direct_bridge_route(
            source_chain_id,
            target_chain_id,
            source_token,
            target_token,
            amount_in,
        ) {
            routes.push(direct);
        }

        if let Some(relay) = self.build_stablecoin_relay_route(
            source_chain_id,
            target_chain_id,
            source_token,
            target_token,
            amount_in,
        ) {
            routes.push(relay);
        }

        self.sort_routes_by_type(&mut routes, route_type);

        if routes.is_empty() {
            error!(
                "No cross-chain route found for: {} -> {}",
                source_chain_id, target_chain_id
            );
        }

        routes
    }

    /// A single BRIDGE step. Only valid when both tokens are assets the
    /// bridge carries natively.
    fn build_direct_bridge_route(
        &self,
        source_chain_id: u64,
        target_chain_id: u64,
        source_token: &str,
        target_token: &str,
        amount_in: U256,
    ) -> Option<CrossChainRoute> {
        if !self.bridge.is_bridge_asset(source_chain_id, source_token)
            || !self.bridge.is_bridge_asset(target_chain_id, target_token)
        {
            return None;
        }

        let bridge_fee = self.bridge.get_bridge_fee(source_chain_id, target_chain_id);
        let amount_after_bridge = amount_in.checked_sub(bridge_fee)?;

        let steps = vec![RouteStep {
            step_type: StepType::Bridge,
            chain_id: source_chain_id,
            protocol: self.bridge.bridge_name().to_string(),
            token_in: source_token.to_string(),
            token_out: target_token.to_string(),
            amount_in,
            amount_out: amount_after_bridge,
            fee: bridge_fee,
            description: format!(
                "Bridge from chain {source_chain_id} to chain {target_chain_id}"
            ),
        }];

        let fee_breakdown =
            self.fees
                .calculate_fee_breakdown(source_chain_id, target_chain_id, amount_in, &steps);
        let estimated_time_seconds = self
            .bridge
            .get_estimated_bridge_time(source_chain_id, target_chain_id);

        Some(CrossChainRoute {
            source_chain_id,
            target_chain_id,
            source_token: source_token.to_string(),
            target_token: target_token.to_string(),
            amount_in,
            estimated_amount_out: amount_after_bridge,
            min_amount_out: self.min_amount(amount_after_bridge)?,
            steps,
            fee_breakdown,
            estimated_time_seconds,
            route_type: RouteType::Fastest,
            price_impact_percent: Decimal::ZERO,
        })
    }

    /// Swap into the stablecoin on the source chain, bridge it, swap out
    /// on the target chain. Swap legs are skipped when the endpoint
    /// token already is the stablecoin.
    fn build_stablecoin_relay_route(
        &self,
        source_chain_id: u64,
        target_chain_id: u64,
        source_token: &str,
        target_token: &str,
        amount_in: U256,
    ) -> Option<CrossChainRoute> {
        let source_stable = self.stablecoins.get(&source_chain_id)?.clone();
        let target_stable = self.stablecoins.get(&target_chain_id)?.clone();

        let mut steps = Vec::new();
        let mut current_amount = amount_in;

        if !same_token(source_token, &source_stable) {
            let swap_fee = current_amount.checked_mul(U256::from(SWAP_FEE_NUMERATOR))?
                / U256::from(SWAP_FEE_DENOMINATOR);
            let amount_out = current_amount - swap_fee;

            steps.push(RouteStep {
                step_type: StepType::Swap,
                chain_id: source_chain_id,
                protocol: "Uniswap V2".to_string(),
                token_in: source_token.to_string(),
                token_out: source_stable.clone(),
                amount_in: current_amount,
                amount_out,
                fee: swap_fee,
                description: "Swap to stablecoin on source chain".to_string(),
            });

            current_amount = amount_out;
        }

        let bridge_fee = self.bridge.get_bridge_fee(source_chain_id, target_chain_id);
        let amount_after_bridge = current_amount.checked_sub(bridge_fee)?;

        steps.push(RouteStep {
            step_type: StepType::Bridge,
            chain_id: source_chain_id,
            protocol: self.bridge.bridge_name().to_string(),
            token_in: source_stable,
            token_out: target_stable.clone(),
            amount_in: current_amount,
            amount_out: amount_after_bridge,
            fee: bridge_fee,
            description: "Bridge stablecoin across chains".to_string(),
        });

        current_amount = amount_after_bridge;

        if !same_token(target_token, &target_stable) {
            let swap_fee = current_amount.checked_mul(U256::from(SWAP_FEE_NUMERATOR))?
                / U256::from(SWAP_FEE_DENOMINATOR);
            let amount_out = current_amount - swap_fee;

            steps.push(RouteStep {
                step_type: StepType::Swap,
                chain_id: target_chain_id,
                protocol: "Uniswap V2".to_string(),
                token_in: target_stable,
                token_out: target_token.to_string(),
                amount_in: current_amount,
                amount_out,
                fee: swap_fee,
                description: "Swap from stablecoin on target chain".to_string(),
            });

            current_amount = amount_out;
        }

        let fee_breakdown =
            self.fees
                .calculate_fee_breakdown(source_chain_id, target_chain_id, amount_in, &steps);
        let estimated_time_seconds = self
            .bridge
            .get_estimated_bridge_time(source_chain_id, target_chain_id)
            + self.config.relay_extra_seconds;

        Some(CrossChainRoute {
            source_chain_id,
            target_chain_id,
            source_token: source_token.to_string(),
            target_token: target_token.to_string(),
            amount_in,
            estimated_amount_out: current_amount,
            min_amount_out: self.min_amount(current_amount)?,
            steps,
            fee_breakdown,
            estimated_time_seconds,
            route_type: RouteType::Cheapest,
            price_impact_percent: relay_price_impact(amount_in, current_amount),
        })
    }

    fn sort_routes_by_type(&self, routes: &mut [CrossChainRoute], route_type: RouteType) {
        match route_type {
            RouteType::Fastest => {
                routes.sort_by_key(|r| r.estimated_time_seconds);
            }
            RouteType::Cheapest => {
                routes.sort_by(|a, b| a.fee_breakdown.total_fee.cmp(&b.fee_breakdown.total_fee));
            }
            RouteType::Balanced => {
                routes.sort_by(|a, b| {
                    self.balanced_score(a)
                        .partial_cmp(&self.balanced_score(b))
                        .unwrap_or(Ordering::Equal)
                });
            }
        }
    }

    /// Weighted time/fee score; both terms are normalized against the
    /// configured reference bases. Lower is better.
    fn balanced_score(&self, route: &CrossChainRoute) -> f64 {
        let normalized_time =
            route.estimated_time_seconds as f64 / self.config.balanced_time_base_seconds;
        let normalized_fee = route
            .fee_breakdown
            .total_fee
            .to_string()
            .parse::<f64>()
            .unwrap_or(f64::MAX)
            / self.config.balanced_fee_base;

        self.config.balanced_time_weight * normalized_time
            + self.config.balanced_fee_weight * normalized_fee
    }

    fn min_amount(&self, amount: U256) -> Option<U256> {
        apply_slippage(amount, self.config.default_slippage_percent / 100.0).ok()
    }

    /// A route is executable while its breaker is closed and the amount
    /// sits inside the bridge's limits.
    #[must_use]
    pub fn validate_route(&self, route: &CrossChainRoute) -> bool {
        if self
            .bridge
            .is_circuit_breaker_open(route.source_chain_id, route.target_chain_id)
        {
            return false;
        }

        let (min, max) = self.bridge.amount_bounds();
        route.amount_in >= min && route.amount_in <= max
    }
}

/// Overall value lost across the relay, as a percentage of the input,
/// at 4 decimal places (half-up).
fn relay_price_impact(amount_in: U256, amount_out: U256) -> Decimal {
    if amount_in.is_zero() {
        return Decimal::ZERO;
    }

    let d_in = match u256_to_decimal(amount_in) {
        Ok(v) => v,
        Err(_) => return Decimal::ZERO,
    };
    let d_out = match u256_to_decimal(amount_out) {
        Ok(v) => v,
        Err(_) => return Decimal::ZERO,
    };

    ((d_in - d_out) / d_in).round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
        * Decimal::from(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::StubBridgeMessenger;
    use crate::config::{BridgeSettings, ChainConfig};

    const USDC_ETH: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
    const USDC_BSC: &str = "0x8AC76a51cc950d9822D68b83fE1Ad97B32Cd580d";
    const WETH: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";
    const CAKE: &str = "0x0E09FaBB73Bd3Ade0a17ECC321fD13a19e81cE82";

    fn chains() -> Vec<ChainConfig> {
        vec![
            ChainConfig {
                name: "ethereum".to_string(),
                chain_id: 1,
                rpc_url: String::new(),
                factory_address: String::new(),
                gas_price_gwei: 60,
                stablecoin: Some(USDC_ETH.to_string()),
            },
            ChainConfig {
                name: "bsc".to_string(),
                chain_id: 56,
                rpc_url: String::new(),
                factory_address: String::new(),
                gas_price_gwei: 10,
                stablecoin: Some(USDC_BSC.to_string()),
            },
        ]
    }

    fn planner() -> (RoutePlanner, Arc<BridgeNetwork>) {
        let bridge = Arc::new(
            BridgeNetwork::from_config(&BridgeSettings::default(), Arc::new(StubBridgeMessenger))
                .unwrap(),
        );
        let fees = Arc::new(FeeEstimator::new(bridge.clone(), &chains()));
        let stablecoins = HashMap::from([
            (1u64, USDC_ETH.to_string()),
            (56u64, USDC_BSC.to_string()),
        ]);
        (
            RoutePlanner::new(
                bridge.clone(),
                fees,
                stablecoins,
                PlannerConfig::default(),
            ),
            bridge,
        )
    }

    fn amount() -> U256 {
        U256::from(100_000_000u64) // 100 USDC
    }

    #[test]
    fn unsupported_path_returns_empty_list() {
        let (planner, _) = planner();
        let routes = planner.search_routes(56, 1, USDC_BSC, USDC_ETH, amount(), RouteType::Fastest);
        assert!(routes.is_empty());
    }

    #[test]
    fn open_breaker_returns_empty_list() {
        let (planner, bridge) = planner();
        bridge.open_circuit_breaker("incident", vec!["1->56".to_string()]);
        let routes = planner.search_routes(1, 56, USDC_ETH, USDC_BSC, amount(), RouteType::Fastest);
        assert!(routes.is_empty());
    }

    #[test]
    fn oversized_amount_returns_empty_list_without_panicking() {
        let (planner, _) = planner();
        // Far beyond any bridge bound; candidate math must drop these
        // rather than overflow.
        let routes = planner.search_routes(1, 56, WETH, CAKE, U256::MAX, RouteType::Cheapest);
        assert!(routes.is_empty());

        let routes =
            planner.search_routes(1, 56, USDC_ETH, USDC_BSC, U256::MAX, RouteType::Cheapest);
        assert!(routes.is_empty());
    }

    #[test]
    fn direct_route_requires_bridge_assets() {
        let (planner, _) = planner();
        let routes = planner.search_routes(1, 56, WETH, CAKE, amount(), RouteType::Fastest);
        assert!(routes.iter().all(|r| r.steps.len() == 3));
    }

    #[test]
    fn stable_endpoints_skip_swap_legs() {
        let (planner, _) = planner();
        let routes =
            planner.search_routes(1, 56, USDC_ETH, USDC_BSC, amount(), RouteType::Fastest);
        // Direct bridge plus a relay degenerated to a bare bridge.
        assert!(!routes.is_empty());
        for route in &routes {
            assert_eq!(route.steps.len(), 1);
            assert_eq!(route.steps[0].step_type, StepType::Bridge);
        }
    }

    #[test]
    fn relay_route_shape_and_amounts() {
        let (planner, _) = planner();
        let routes = planner.search_routes(1, 56, WETH, CAKE, amount(), RouteType::Cheapest);
        let relay = &routes[0];

        assert_eq!(relay.steps[0].step_type, StepType::Swap);
        assert_eq!(relay.steps[1].step_type, StepType::Bridge);
        assert_eq!(relay.steps[2].step_type, StepType::Swap);

        // Each step's output feeds the next step's input.
        assert_eq!(relay.steps[0].amount_out, relay.steps[1].amount_in);
        assert_eq!(relay.steps[1].amount_out, relay.steps[2].amount_in);

        // First leg: 0.3% of 100_000_000 = 300_000.
        assert_eq!(relay.steps[0].fee, U256::from(300_000u64));
        // Bridge leg: configured 1->56 base fee.
        assert_eq!(relay.steps[1].fee, U256::from(5_000_000u64));

        assert!(relay.estimated_amount_out < relay.amount_in);
        assert!(relay.price_impact_percent > Decimal::ZERO);
    }

    #[test]
    fn cheapest_ranking_puts_lowest_fee_first() {
        let (planner, _) = planner();
        let routes =
            planner.search_routes(1, 56, USDC_ETH, CAKE, amount(), RouteType::Cheapest);
        assert!(routes.len() >= 2);
        for route in &routes {
            assert!(routes[0].fee_breakdown.total_fee <= route.fee_breakdown.total_fee);
        }
    }

    #[test]
    fn fastest_ranking_puts_lowest_time_first() {
        let (planner, _) = planner();
        let routes =
            planner.search_routes(1, 56, USDC_ETH, CAKE, amount(), RouteType::Fastest);
        assert!(routes.len() >= 2);
        for route in &routes {
            assert!(routes[0].estimated_time_seconds <= route.estimated_time_seconds);
        }
    }

    #[test]
    fn balanced_ranking_is_consistent_with_score() {
        let (planner, _) = planner();
        let routes =
            planner.search_routes(1, 56, USDC_ETH, CAKE, amount(), RouteType::Balanced);
        for pair in routes.windows(2) {
            assert!(planner.balanced_score(&pair[0]) <= planner.balanced_score(&pair[1]));
        }
    }

    #[test]
    fn validate_route_enforces_amount_bounds() {
        let (planner, _) = planner();
        let mut routes =
            planner.search_routes(1, 56, USDC_ETH, USDC_BSC, amount(), RouteType::Fastest);
        let mut route = routes.remove(0);
        assert!(planner.validate_route(&route));

        route.amount_in = U256::from(1u64); // below min bridge amount
        assert!(!planner.validate_route(&route));
    }

    #[test]
    fn validate_route_respects_breaker() {
        let (planner, bridge) = planner();
        let routes =
            planner.search_routes(1, 56, USDC_ETH, USDC_BSC, amount(), RouteType::Fastest);
        bridge.open_circuit_breaker("halt", vec!["1->56".to_string()]);
        assert!(!planner.validate_route(&routes[0]));
    }
}
