/*
 * AMM route search engine: constant-product quotes, direct and two-hop paths
 */

use ethers::types::U256;
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::chain::ChainReader;
use crate::models::{HermesError, Result, RouteCandidate};
use crate::utils::{decimal_to_u256, u256_to_decimal};

const FEE_NUMERATOR: u64 = 997;
const FEE_DENOMINATOR: u64 = 1000;

pub struct RouteSearchEngine {
    reader: Arc<dyn ChainReader>,
    factory_address: String,
}

impl RouteSearchEngine {
    pub fn new(reader: Arc<dyn ChainReader>, factory_address: String) -> Self {
        Self {
            reader,
            factory_address,
        }
    }

    /// Searches direct and two-hop routes and returns the one with the
    /// largest output. Direct is evaluated first, so it wins ties.
    pub async fn find_best_route(
        &self,
        token_in: &str,
        token_out: &str,
        amount_in: U256,
        slippage_tolerance: f64,
        intermediate_tokens: &[String],
    ) -> Result<RouteCandidate> {
        let direct = self
            .find_direct_route(token_in, token_out, amount_in, slippage_tolerance)
            .await;

        let mut best = direct;

        for intermediate in intermediate_tokens {
            match self
                .find_two_hop_route(token_in, intermediate, token_out, amount_in, slippage_tolerance)
                .await
            {
                Ok(route) if route.amount_out > best.amount_out => best = route,
                Ok(_) => {}
                Err(e) => {
                    debug!("Two-hop route via {} failed: {}", intermediate, e);
                }
            }
        }

        // A zero-size trade legitimately quotes zero on every candidate.
        if best.amount_out.is_zero() && !amount_in.is_zero() {
            return Err(HermesError::NoRouteFound);
        }

        info!(
            "Best route found: {} hops, output: {}",
            best.hops, best.amount_out
        );
        Ok(best)
    }

    /// Builds the direct-pair candidate. A missing pair or empty pool
    /// degrades to a zero-output candidate instead of aborting the
    /// whole search.
    async fn find_direct_route(
        &self,
        token_in: &str,
        token_out: &str,
        amount_in: U256,
        slippage_tolerance: f64,
    ) -> RouteCandidate {
        match self
            .quote_direct(token_in, token_out, amount_in, slippage_tolerance)
            .await
        {
            Ok(route) => route,
            Err(e) => {
                warn!("Direct route not available: {}", e);
                RouteCandidate {
                    path: vec![token_in.to_string(), token_out.to_string()],
                    amount_out: U256::zero(),
                    min_amount_out: U256::zero(),
                    price_impact: Decimal::ZERO,
                    reserves: vec![U256::zero(), U256::zero()],
                    is_direct: true,
                    hops: 1,
                }
            }
        }
    }

    async fn quote_direct(
        &self,
        token_in: &str,
        token_out: &str,
        amount_in: U256,
        slippage_tolerance: f64,
    ) -> Result<RouteCandidate> {
        let pair = self
            .reader
            .get_pair_address(&self.factory_address, token_in, token_out)
            .await?;
        let (reserve_in, reserve_out, _) = self.reader.get_reserves(&pair).await?;

        let amount_out = calculate_amount_out(amount_in, reserve_in, reserve_out)?;
        let price_impact = calculate_price_impact(amount_in, reserve_in, reserve_out)?;
        let min_amount_out = apply_slippage(amount_out, slippage_tolerance)?;

        Ok(RouteCandidate {
            path: vec![token_in.to_string(), token_out.to_string()],
            amount_out,
            min_amount_out,
            price_impact,
            reserves: vec![reserve_in, reserve_out],
            is_direct: true,
            hops: 1,
        })
    }

    async fn find_two_hop_route(
        &self,
        token_in: &str,
        intermediate: &str,
        token_out: &str,
        amount_in: U256,
        slippage_tolerance: f64,
    ) -> Result<RouteCandidate> {
        let pair1 = self
            .reader
            .get_pair_address(&self.factory_address, token_in, intermediate)
            .await?;
        let (r1_in, r1_out, _) = self.reader.get_reserves(&pair1).await?;
        let amount_mid = calculate_amount_out(amount_in, r1_in, r1_out)?;

        let pair2 = self
            .reader
            .get_pair_address(&self.factory_address, intermediate, token_out)
            .await?;
        let (r2_in, r2_out, _) = self.reader.get_reserves(&pair2).await?;
        let amount_out = calculate_amount_out(amount_mid, r2_in, r2_out)?;

        // Compounded impact is approximated as the sum of the per-hop
        // impacts, not the exact geometric composition. Callers depend
        // on this magnitude for high-impact warnings.
        let impact1 = calculate_price_impact(amount_in, r1_in, r1_out)?;
        let impact2 = calculate_price_impact(amount_mid, r2_in, r2_out)?;
        let price_impact = impact1 + impact2;

        let min_amount_out = apply_slippage(amount_out, slippage_tolerance)?;

        Ok(RouteCandidate {
            path: vec![
                token_in.to_string(),
                intermediate.to_string(),
                token_out.to_string(),
            ],
            amount_out,
            min_amount_out,
            price_impact,
            reserves: vec![r1_in, r1_out, r2_in, r2_out],
            is_direct: false,
            hops: 2,
        })
    }
}

/// Constant-product output with the 0.3% protocol fee:
/// `amount_out = amount_in * 997 * reserve_out / (reserve_in * 1000 + amount_in * 997)`.
pub fn calculate_amount_out(amount_in: U256, reserve_in: U256, reserve_out: U256) -> Result<U256> {
    if amount_in.is_zero() {
        return Ok(U256::zero());
    }

    if reserve_in.is_zero() || reserve_out.is_zero() {
        return Err(HermesError::InsufficientLiquidity);
    }

    let amount_in_with_fee = amount_in
        .checked_mul(U256::from(FEE_NUMERATOR))
        .ok_or_else(|| HermesError::CalculationError("amount_in overflow".to_string()))?;
    let numerator = amount_in_with_fee
        .checked_mul(reserve_out)
        .ok_or_else(|| HermesError::CalculationError("numerator overflow".to_string()))?;
    let denominator = reserve_in
        .checked_mul(U256::from(FEE_DENOMINATOR))
        .and_then(|v| v.checked_add(amount_in_with_fee))
        .ok_or_else(|| HermesError::CalculationError("denominator overflow".to_string()))?;

    Ok(numerator / denominator)
}

/// Price impact in percent: `|price_after - price_before| / price_before * 100`,
/// where price = reserve_out / reserve_in at 18-decimal precision.
pub fn calculate_price_impact(
    amount_in: U256,
    reserve_in: U256,
    reserve_out: U256,
) -> Result<Decimal> {
    if reserve_in.is_zero() || reserve_out.is_zero() {
        return Ok(Decimal::ZERO);
    }

    let d_reserve_in = u256_to_decimal(reserve_in)?;
    let d_reserve_out = u256_to_decimal(reserve_out)?;

    let price_before = (d_reserve_out / d_reserve_in)
        .round_dp_with_strategy(18, RoundingStrategy::MidpointAwayFromZero);

    let amount_out = calculate_amount_out(amount_in, reserve_in, reserve_out)?;
    let new_reserve_in = u256_to_decimal(reserve_in + amount_in)?;
    let new_reserve_out = u256_to_decimal(reserve_out - amount_out)?;

    let price_after = (new_reserve_out / new_reserve_in)
        .round_dp_with_strategy(18, RoundingStrategy::MidpointAwayFromZero);

    let impact = ((price_after - price_before) / price_before)
        .round_dp_with_strategy(6, RoundingStrategy::MidpointAwayFromZero)
        * Decimal::from(100);

    Ok(impact.abs())
}

/// Minimum acceptable output after slippage, truncated toward zero.
/// `slippage_tolerance` is a fraction, e.g. 0.005 for 0.5%.
pub fn apply_slippage(amount: U256, slippage_tolerance: f64) -> Result<U256> {
    let tolerance = Decimal::from_f64_retain(slippage_tolerance).ok_or_else(|| {
        HermesError::CalculationError(format!("Invalid slippage: {slippage_tolerance}"))
    })?;
    let multiplier = Decimal::ONE - tolerance;
    decimal_to_u256(u256_to_decimal(amount)? * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct MockReader {
        // (tokenA, tokenB) -> (reserve_in, reserve_out)
        pools: HashMap<(String, String), (U256, U256)>,
    }

    impl MockReader {
        fn new() -> Self {
            Self {
                pools: HashMap::new(),
            }
        }

        fn with_pool(mut self, a: &str, b: &str, reserve_in: u64, reserve_out: u64) -> Self {
            self.pools.insert(
                (a.to_string(), b.to_string()),
                (U256::from(reserve_in), U256::from(reserve_out)),
            );
            self
        }
    }

    #[async_trait]
    impl ChainReader for MockReader {
        async fn get_reserves(&self, pair_address: &str) -> Result<(U256, U256, u32)> {
            let (a, b) = pair_address
                .split_once('|')
                .ok_or_else(|| HermesError::NotFound(pair_address.to_string()))?;
            let (r0, r1) = self
                .pools
                .get(&(a.to_string(), b.to_string()))
                .ok_or_else(|| HermesError::NotFound(pair_address.to_string()))?;
            Ok((*r0, *r1, 0))
        }

        async fn get_pair_address(
            &self,
            _factory: &str,
            token_a: &str,
            token_b: &str,
        ) -> Result<String> {
            let key = (token_a.to_string(), token_b.to_string());
            if self.pools.contains_key(&key) {
                Ok(format!("{token_a}|{token_b}"))
            } else {
                Err(HermesError::NotFound(format!("{token_a}/{token_b}")))
            }
        }
    }

    fn engine(reader: MockReader) -> RouteSearchEngine {
        RouteSearchEngine::new(Arc::new(reader), "0xfactory".to_string())
    }

    #[test]
    fn amount_out_matches_reference_scenario() {
        let out = calculate_amount_out(
            U256::from(10_000u64),
            U256::from(1_000_000u64),
            U256::from(2_000_000u64),
        )
        .unwrap();
        // floor(10_000 * 997 * 2_000_000 / (1_000_000 * 1000 + 10_000 * 997))
        assert_eq!(out, U256::from(19_743u64));
    }

    #[test]
    fn amount_out_never_exceeds_opposing_reserve() {
        let cases = [
            (1u64, 1_000u64, 1_000u64),
            (1_000, 1_000, 1_000),
            (u64::MAX / 2, 1_000, 1_000),
            (500, 1, 1_000_000),
        ];
        for (amount, r_in, r_out) in cases {
            let out =
                calculate_amount_out(U256::from(amount), U256::from(r_in), U256::from(r_out))
                    .unwrap();
            assert!(out < U256::from(r_out), "out {out} for input {amount}");
        }
    }

    #[test]
    fn zero_amount_quotes_zero() {
        let out = calculate_amount_out(U256::zero(), U256::from(10u64), U256::from(10u64)).unwrap();
        assert!(out.is_zero());
    }

    #[test]
    fn zero_reserve_is_insufficient_liquidity() {
        let err = calculate_amount_out(U256::from(10u64), U256::zero(), U256::from(10u64))
            .unwrap_err();
        assert!(matches!(err, HermesError::InsufficientLiquidity));
    }

    #[test]
    fn price_impact_moves_with_trade_size() {
        let small = calculate_price_impact(
            U256::from(1_000u64),
            U256::from(1_000_000u64),
            U256::from(2_000_000u64),
        )
        .unwrap();
        let large = calculate_price_impact(
            U256::from(100_000u64),
            U256::from(1_000_000u64),
            U256::from(2_000_000u64),
        )
        .unwrap();
        assert!(large > small);
        assert!(small > Decimal::ZERO);
    }

    #[test]
    fn slippage_truncates_toward_zero() {
        let min = apply_slippage(U256::from(19_743u64), 0.005).unwrap();
        // 19_743 * 0.995 = 19_644.285
        assert_eq!(min, U256::from(19_644u64));
    }

    #[tokio::test]
    async fn direct_route_preferred_on_tie() {
        // Identical pools: two-hop output is strictly worse (double fee),
        // so direct must win.
        let reader = MockReader::new()
            .with_pool("A", "B", 1_000_000, 2_000_000)
            .with_pool("A", "M", 1_000_000, 1_000_000)
            .with_pool("M", "B", 1_000_000, 2_000_000);
        let route = engine(reader)
            .find_best_route("A", "B", U256::from(10_000u64), 0.005, &["M".to_string()])
            .await
            .unwrap();
        assert!(route.is_direct);
        assert_eq!(route.hops, 1);
    }

    #[tokio::test]
    async fn two_hop_composes_single_hop_formula() {
        let reader = MockReader::new()
            .with_pool("A", "M", 1_000_000, 3_000_000)
            .with_pool("M", "B", 2_000_000, 1_000_000);
        let route = engine(reader)
            .find_best_route("A", "B", U256::from(10_000u64), 0.0, &["M".to_string()])
            .await
            .unwrap();

        let hop1 = calculate_amount_out(
            U256::from(10_000u64),
            U256::from(1_000_000u64),
            U256::from(3_000_000u64),
        )
        .unwrap();
        let hop2 =
            calculate_amount_out(hop1, U256::from(2_000_000u64), U256::from(1_000_000u64)).unwrap();

        assert_eq!(route.amount_out, hop2);
        assert!(!route.is_direct);
        assert_eq!(route.hops, 2);
    }

    #[tokio::test]
    async fn missing_pair_without_intermediates_is_no_route() {
        let err = engine(MockReader::new())
            .find_best_route("A", "B", U256::from(10_000u64), 0.005, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, HermesError::NoRouteFound));
    }

    #[tokio::test]
    async fn zero_amount_in_returns_zero_without_error() {
        let reader = MockReader::new().with_pool("A", "B", 1_000_000, 2_000_000);
        let route = engine(reader)
            .find_best_route("A", "B", U256::zero(), 0.005, &[])
            .await
            .unwrap();
        assert!(route.amount_out.is_zero());
    }

    #[tokio::test]
    async fn empty_pool_does_not_abort_other_candidates() {
        // Intermediate M1 has a drained pool; M2 works. The search must
        // still return the M2 route.
        let reader = MockReader::new()
            .with_pool("A", "M1", 0, 0)
            .with_pool("M1", "B", 1_000_000, 1_000_000)
            .with_pool("A", "M2", 1_000_000, 1_000_000)
            .with_pool("M2", "B", 1_000_000, 1_000_000);
        let route = engine(reader)
            .find_best_route(
                "A",
                "B",
                U256::from(10_000u64),
                0.005,
                &["M1".to_string(), "M2".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(route.path, vec!["A", "M2", "B"]);
    }
}
