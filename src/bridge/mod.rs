/*
 * Bridge network adapter: path support, fees, circuit breaker, daily limits
 */

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ethers::types::U256;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::BridgeSettings;
use crate::metrics;
use crate::models::{HermesError, MessageStatus, Result};

/// Transport seam for the bridge network. A production client submits
/// to the connector contract and reads message state from the bridge
/// chain; the stub fabricates both.
#[async_trait]
pub trait BridgeMessenger: Send + Sync {
    async fn send(&self, source_chain_id: u64, target_chain_id: u64, payload: &str)
        -> Result<String>;

    async fn query_status(&self, message_id: &str) -> Result<MessageStatus>;
}

pub struct StubBridgeMessenger;

#[async_trait]
impl BridgeMessenger for StubBridgeMessenger {
    async fn send(
        &self,
        source_chain_id: u64,
        target_chain_id: u64,
        _payload: &str,
    ) -> Result<String> {
        info!(
            "Sending cross-chain message: {} -> {}",
            source_chain_id, target_chain_id
        );
        Ok(Uuid::new_v4().to_string())
    }

    async fn query_status(&self, _message_id: &str) -> Result<MessageStatus> {
        Ok(MessageStatus::Completed)
    }
}

#[derive(Debug, Clone)]
pub struct ChainPair {
    pub source_chain_id: u64,
    pub target_chain_id: u64,
    pub enabled: bool,
    pub base_fee: U256,
    pub average_time_seconds: u64,
}

#[derive(Debug, Clone, Default)]
pub struct CircuitBreakerStatus {
    pub is_open: bool,
    pub reason: Option<String>,
    pub opened_at: Option<DateTime<Utc>>,
    /// Routes the breaker applies to, as "src->dst" strings. Empty
    /// means all routes.
    pub affected_routes: Vec<String>,
}

/// Process-wide mutable bridge state. Constructed once at startup and
/// mutated only through `BridgeNetwork`'s own operations.
struct BridgeState {
    enabled: bool,
    supported_chain_pairs: Vec<ChainPair>,
    daily_outflow_limit: HashMap<u64, U256>,
    current_daily_outflow: HashMap<u64, U256>,
    circuit_breaker: CircuitBreakerStatus,
    min_bridge_amount: U256,
    max_bridge_amount: U256,
    bridge_assets: HashMap<u64, Vec<String>>,
}

pub struct BridgeNetwork {
    bridge_name: String,
    state: Mutex<BridgeState>,
    messenger: Arc<dyn BridgeMessenger>,
}

impl BridgeNetwork {
    pub fn from_config(
        settings: &BridgeSettings,
        messenger: Arc<dyn BridgeMessenger>,
    ) -> Result<Self> {
        let parse = |v: &str| {
            U256::from_dec_str(v)
                .map_err(|e| HermesError::ConfigError(format!("Invalid bridge amount {v}: {e}")))
        };

        let mut supported_chain_pairs = Vec::new();
        let mut daily_outflow_limit = HashMap::new();
        let cap = parse(&settings.daily_outflow_cap)?;

        for pair in &settings.chain_pairs {
            supported_chain_pairs.push(ChainPair {
                source_chain_id: pair.source_chain_id,
                target_chain_id: pair.target_chain_id,
                enabled: pair.enabled,
                base_fee: parse(&pair.base_fee)?,
                average_time_seconds: pair.average_time_seconds,
            });
            daily_outflow_limit.insert(pair.source_chain_id, cap);
            daily_outflow_limit.insert(pair.target_chain_id, cap);
        }

        let bridge_assets = settings
            .bridge_assets
            .iter()
            .map(|(chain, assets)| (*chain, assets.clone()))
            .collect();

        Ok(Self {
            bridge_name: settings.bridge_name.clone(),
            state: Mutex::new(BridgeState {
                enabled: settings.enabled,
                supported_chain_pairs,
                daily_outflow_limit,
                current_daily_outflow: HashMap::new(),
                circuit_breaker: CircuitBreakerStatus::default(),
                min_bridge_amount: parse(&settings.min_bridge_amount)?,
                max_bridge_amount: parse(&settings.max_bridge_amount)?,
                bridge_assets,
            }),
            messenger,
        })
    }

    #[must_use]
    pub fn bridge_name(&self) -> &str {
        &self.bridge_name
    }

    #[must_use]
    pub fn is_bridge_path_supported(&self, source_chain_id: u64, target_chain_id: u64) -> bool {
        let state = self.state.lock().unwrap();
        state.enabled
            && state.supported_chain_pairs.iter().any(|pair| {
                pair.source_chain_id == source_chain_id
                    && pair.target_chain_id == target_chain_id
                    && pair.enabled
            })
    }

    #[must_use]
    pub fn get_bridge_fee(&self, source_chain_id: u64, target_chain_id: u64) -> U256 {
        let state = self.state.lock().unwrap();
        state
            .supported_chain_pairs
            .iter()
            .find(|pair| {
                pair.source_chain_id == source_chain_id && pair.target_chain_id == target_chain_id
            })
            .map(|pair| pair.base_fee)
            .unwrap_or_else(U256::zero)
    }

    /// Estimated bridge completion time in seconds; defaults to five
    /// minutes for unknown pairs.
    #[must_use]
    pub fn get_estimated_bridge_time(&self, source_chain_id: u64, target_chain_id: u64) -> u64 {
        let state = self.state.lock().unwrap();
        state
            .supported_chain_pairs
            .iter()
            .find(|pair| {
                pair.source_chain_id == source_chain_id && pair.target_chain_id == target_chain_id
            })
            .map(|pair| pair.average_time_seconds)
            .unwrap_or(300)
    }

    #[must_use]
    pub fn is_circuit_breaker_open(&self, source_chain_id: u64, target_chain_id: u64) -> bool {
        let state = self.state.lock().unwrap();
        breaker_applies(&state.circuit_breaker, source_chain_id, target_chain_id)
    }

    #[must_use]
    pub fn is_daily_limit_exceeded(&self, chain_id: u64) -> bool {
        let state = self.state.lock().unwrap();
        daily_limit_exceeded(&state, chain_id)
    }

    pub fn update_daily_outflow(&self, chain_id: u64, amount: U256) {
        let mut state = self.state.lock().unwrap();
        let current = state
            .current_daily_outflow
            .entry(chain_id)
            .or_insert_with(U256::zero);
        *current = current.saturating_add(amount);
        tracing::debug!("Updated daily outflow for chain {}: {}", chain_id, current);
    }

    pub fn open_circuit_breaker(&self, reason: &str, affected_routes: Vec<String>) {
        warn!("Opening circuit breaker: {}", reason);
        let mut state = self.state.lock().unwrap();
        state.circuit_breaker = CircuitBreakerStatus {
            is_open: true,
            reason: Some(reason.to_string()),
            opened_at: Some(Utc::now()),
            affected_routes,
        };
    }

    pub fn close_circuit_breaker(&self) {
        info!("Closing circuit breaker");
        let mut state = self.state.lock().unwrap();
        state.circuit_breaker = CircuitBreakerStatus::default();
    }

    /// Clears the outflow counters. Invoked by the daily reset job.
    pub fn reset_daily_limits(&self) {
        info!("Resetting daily outflow limits");
        let mut state = self.state.lock().unwrap();
        state.current_daily_outflow.clear();
    }

    #[must_use]
    pub fn amount_bounds(&self) -> (U256, U256) {
        let state = self.state.lock().unwrap();
        (state.min_bridge_amount, state.max_bridge_amount)
    }

    #[must_use]
    pub fn is_bridge_asset(&self, chain_id: u64, token: &str) -> bool {
        let state = self.state.lock().unwrap();
        state
            .bridge_assets
            .get(&chain_id)
            .map(|assets| assets.iter().any(|a| a.eq_ignore_ascii_case(token)))
            .unwrap_or(false)
    }

    /// Sends a cross-chain message. The breaker check, the daily-limit
    /// check and the outflow reservation happen in one critical section
    /// so a guard cannot trip between validation and send. A failed send
    /// releases the reservation.
    pub async fn send_cross_chain_message(
        &self,
        source_chain_id: u64,
        target_chain_id: u64,
        amount: U256,
        payload: &str,
    ) -> Result<String> {
        {
            let mut state = self.state.lock().unwrap();

            if breaker_applies(&state.circuit_breaker, source_chain_id, target_chain_id) {
                metrics::BRIDGE_REJECTIONS
                    .with_label_values(&["circuit_breaker"])
                    .inc();
                return Err(HermesError::CircuitBreakerOpen);
            }
            if daily_limit_exceeded(&state, source_chain_id) {
                metrics::BRIDGE_REJECTIONS
                    .with_label_values(&["daily_limit"])
                    .inc();
                return Err(HermesError::DailyLimitExceeded(source_chain_id));
            }

            let current = state
                .current_daily_outflow
                .entry(source_chain_id)
                .or_insert_with(U256::zero);
            *current = current.saturating_add(amount);
        }

        match self
            .messenger
            .send(source_chain_id, target_chain_id, payload)
            .await
        {
            Ok(message_id) => {
                info!("Bridge message sent: {}", message_id);
                Ok(message_id)
            }
            Err(e) => {
                let mut state = self.state.lock().unwrap();
                if let Some(current) = state.current_daily_outflow.get_mut(&source_chain_id) {
                    *current = current.saturating_sub(amount);
                }
                Err(e)
            }
        }
    }

    pub async fn query_message_status(&self, message_id: &str) -> Result<MessageStatus> {
        self.messenger.query_status(message_id).await
    }
}

fn breaker_applies(breaker: &CircuitBreakerStatus, source: u64, target: u64) -> bool {
    if !breaker.is_open {
        return false;
    }
    // An open breaker with no route list halts everything.
    breaker.affected_routes.is_empty()
        || breaker
            .affected_routes
            .iter()
            .any(|r| r == &format!("{source}->{target}"))
}

fn daily_limit_exceeded(state: &BridgeState, chain_id: u64) -> bool {
    match state.daily_outflow_limit.get(&chain_id) {
        Some(cap) => {
            let used = state
                .current_daily_outflow
                .get(&chain_id)
                .copied()
                .unwrap_or_else(U256::zero);
            used >= *cap
        }
        // No cap configured means the chain is not rate-limited.
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BridgeSettings, ChainPairConfig};

    fn settings(cap: &str) -> BridgeSettings {
        BridgeSettings {
            bridge_name: "ZetaChain".to_string(),
            enabled: true,
            min_bridge_amount: "1000000".to_string(),
            max_bridge_amount: "1000000000000000000000".to_string(),
            daily_outflow_cap: cap.to_string(),
            chain_pairs: vec![ChainPairConfig {
                source_chain_id: 1,
                target_chain_id: 56,
                enabled: true,
                base_fee: "5000000".to_string(),
                average_time_seconds: 300,
            }],
            bridge_assets: vec![(1, vec!["0xUSDC".to_string()])],
        }
    }

    fn network(cap: &str) -> BridgeNetwork {
        BridgeNetwork::from_config(&settings(cap), Arc::new(StubBridgeMessenger)).unwrap()
    }

    struct FailingMessenger;

    #[async_trait]
    impl BridgeMessenger for FailingMessenger {
        async fn send(&self, _s: u64, _t: u64, _p: &str) -> Result<String> {
            Err(HermesError::BridgeFailed("connector revert".to_string()))
        }

        async fn query_status(&self, _m: &str) -> Result<MessageStatus> {
            Ok(MessageStatus::Failed)
        }
    }

    #[test]
    fn path_support_and_fee_lookup() {
        let net = network("100000000");
        assert!(net.is_bridge_path_supported(1, 56));
        assert!(!net.is_bridge_path_supported(56, 1));
        assert_eq!(net.get_bridge_fee(1, 56), U256::from(5_000_000u64));
        assert_eq!(net.get_bridge_fee(56, 1), U256::zero());
        assert_eq!(net.get_estimated_bridge_time(1, 56), 300);
        assert_eq!(net.get_estimated_bridge_time(9, 9), 300);
    }

    #[test]
    fn breaker_scopes_to_affected_routes() {
        let net = network("100000000");
        net.open_circuit_breaker("exploit reported", vec!["1->56".to_string()]);
        assert!(net.is_circuit_breaker_open(1, 56));
        assert!(!net.is_circuit_breaker_open(56, 137));

        net.close_circuit_breaker();
        assert!(!net.is_circuit_breaker_open(1, 56));
    }

    #[test]
    fn breaker_without_routes_halts_everything() {
        let net = network("100000000");
        net.open_circuit_breaker("total halt", vec![]);
        assert!(net.is_circuit_breaker_open(1, 56));
        assert!(net.is_circuit_breaker_open(56, 137));
    }

    #[tokio::test]
    async fn send_rejected_when_breaker_open() {
        let net = network("100000000");
        net.open_circuit_breaker("halt", vec![]);
        let err = net
            .send_cross_chain_message(1, 56, U256::from(10u64), "payload")
            .await
            .unwrap_err();
        assert!(matches!(err, HermesError::CircuitBreakerOpen));
    }

    #[tokio::test]
    async fn send_reserves_outflow_and_enforces_cap() {
        let net = network("100");
        net.send_cross_chain_message(1, 56, U256::from(100u64), "p")
            .await
            .unwrap();
        assert!(net.is_daily_limit_exceeded(1));

        let err = net
            .send_cross_chain_message(1, 56, U256::from(1u64), "p")
            .await
            .unwrap_err();
        assert!(matches!(err, HermesError::DailyLimitExceeded(1)));

        net.reset_daily_limits();
        assert!(!net.is_daily_limit_exceeded(1));
    }

    #[tokio::test]
    async fn guard_rejections_increment_the_rejection_counter() {
        let breaker_before = metrics::BRIDGE_REJECTIONS
            .with_label_values(&["circuit_breaker"])
            .get();
        let limit_before = metrics::BRIDGE_REJECTIONS
            .with_label_values(&["daily_limit"])
            .get();

        let net = network("100");
        net.send_cross_chain_message(1, 56, U256::from(100u64), "p")
            .await
            .unwrap();
        net.send_cross_chain_message(1, 56, U256::from(1u64), "p")
            .await
            .unwrap_err();

        net.reset_daily_limits();
        net.open_circuit_breaker("halt", vec![]);
        net.send_cross_chain_message(1, 56, U256::from(1u64), "p")
            .await
            .unwrap_err();

        assert!(
            metrics::BRIDGE_REJECTIONS
                .with_label_values(&["daily_limit"])
                .get()
                > limit_before
        );
        assert!(
            metrics::BRIDGE_REJECTIONS
                .with_label_values(&["circuit_breaker"])
                .get()
                > breaker_before
        );
    }

    #[tokio::test]
    async fn failed_send_releases_reservation() {
        let net =
            BridgeNetwork::from_config(&settings("100"), Arc::new(FailingMessenger)).unwrap();
        let err = net
            .send_cross_chain_message(1, 56, U256::from(100u64), "p")
            .await
            .unwrap_err();
        assert!(matches!(err, HermesError::BridgeFailed(_)));
        assert!(!net.is_daily_limit_exceeded(1));
    }

    #[test]
    fn bridge_asset_lookup_is_case_insensitive() {
        let net = network("100000000");
        assert!(net.is_bridge_asset(1, "0xusdc"));
        assert!(!net.is_bridge_asset(56, "0xUSDC"));
    }
}
