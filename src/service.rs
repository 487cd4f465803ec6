/*
 * Main swap service that coordinates all components
 */

use ethers::types::U256;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::{
    bridge::{BridgeNetwork, StubBridgeMessenger},
    chain::{EvmChainReader, StubChainWriter},
    config::Config,
    crosschain::{Orchestrator, RoutePlanner, TransactionLedger},
    fees::FeeEstimator,
    metrics,
    models::{
        CrossChainRoute, CrossChainTransaction, HermesError, Result, RouteCandidate, RouteType,
    },
    router::RouteSearchEngine,
    rpc::RpcClient,
};

pub struct SwapService {
    engines: HashMap<u64, RouteSearchEngine>,
    intermediates: HashMap<u64, Vec<String>>,
    bridge: Arc<BridgeNetwork>,
    planner: Arc<RoutePlanner>,
    ledger: Arc<TransactionLedger>,
    orchestrator: Orchestrator,
    default_slippage_percent: f64,
}

impl SwapService {
    pub async fn new(config: Config) -> Result<Self> {
        info!("Initializing Hermes swap service");

        let mut engines = HashMap::new();
        let mut intermediates = HashMap::new();
        let mut stablecoins = HashMap::new();

        for chain in &config.chains {
            let rpc = Arc::new(RpcClient::new(&chain.rpc_url, chain.chain_id).await?);
            info!("Connected to {} RPC", chain.name);

            let reader = Arc::new(EvmChainReader::new(rpc));
            engines.insert(
                chain.chain_id,
                RouteSearchEngine::new(reader, chain.factory_address.clone()),
            );

            if let Some(stable) = &chain.stablecoin {
                intermediates.insert(chain.chain_id, vec![stable.clone()]);
                stablecoins.insert(chain.chain_id, stable.clone());
            }
        }

        // Message delivery and transaction signing are stubbed until
        // the connector contracts are deployed.
        let bridge = Arc::new(BridgeNetwork::from_config(
            &config.bridge,
            Arc::new(StubBridgeMessenger),
        )?);
        info!("Bridge network initialized: {}", bridge.bridge_name());

        let fees = Arc::new(FeeEstimator::new(bridge.clone(), &config.chains));
        let planner = Arc::new(RoutePlanner::new(
            bridge.clone(),
            fees,
            stablecoins,
            config.planner.clone(),
        ));
        let ledger = Arc::new(TransactionLedger::new(
            bridge.clone(),
            config.jobs.retention_days,
        ));
        let orchestrator = Orchestrator::new(
            ledger.clone(),
            bridge.clone(),
            Arc::new(StubChainWriter),
            config.orchestrator.clone(),
        );

        Ok(Self {
            engines,
            intermediates,
            bridge,
            planner,
            ledger,
            orchestrator,
            default_slippage_percent: config.planner.default_slippage_percent,
        })
    }

    /// Best single-chain route for a token pair, using the chain's
    /// configured relay assets as two-hop intermediates.
    pub async fn find_best_route(
        &self,
        chain_id: u64,
        token_in: &str,
        token_out: &str,
        amount_in: U256,
        slippage_tolerance: f64,
    ) -> Result<RouteCandidate> {
        let engine = self
            .engines
            .get(&chain_id)
            .ok_or_else(|| HermesError::NotFound(format!("Unknown chain: {chain_id}")))?;

        let intermediates = self
            .intermediates
            .get(&chain_id)
            .cloned()
            .unwrap_or_default();

        metrics::ROUTE_SEARCHES.inc();
        engine
            .find_best_route(token_in, token_out, amount_in, slippage_tolerance, &intermediates)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    pub fn search_cross_chain_routes(
        &self,
        source_chain_id: u64,
        target_chain_id: u64,
        source_token: &str,
        target_token: &str,
        amount_in: U256,
        route_type: RouteType,
    ) -> Vec<CrossChainRoute> {
        metrics::ROUTE_SEARCHES.inc();
        self.planner.search_routes(
            source_chain_id,
            target_chain_id,
            source_token,
            target_token,
            amount_in,
            route_type,
        )
    }

    pub async fn execute_cross_chain_swap(
        &self,
        route: CrossChainRoute,
        user_address: &str,
        slippage_percent: Option<f64>,
    ) -> Result<String> {
        let slippage = slippage_percent.unwrap_or(self.default_slippage_percent);
        self.orchestrator
            .execute_cross_chain_swap(route, user_address, slippage)
            .await
    }

    pub async fn get_transaction(&self, transaction_id: &str) -> Option<CrossChainTransaction> {
        self.ledger.get_transaction(transaction_id).await
    }

    pub async fn get_user_transactions(&self, user_address: &str) -> Vec<CrossChainTransaction> {
        self.ledger.get_user_transactions(user_address).await
    }

    pub async fn retry_transaction(&self, transaction_id: &str) -> Result<CrossChainTransaction> {
        self.orchestrator.retry_transaction(transaction_id).await
    }

    /// A route is available while the path is configured and its
    /// breaker is closed.
    #[must_use]
    pub fn is_route_available(&self, source_chain_id: u64, target_chain_id: u64) -> bool {
        self.bridge
            .is_bridge_path_supported(source_chain_id, target_chain_id)
            && !self
                .bridge
                .is_circuit_breaker_open(source_chain_id, target_chain_id)
    }

    pub async fn check_pending_transactions(&self) {
        self.ledger.check_pending_transactions().await;
    }

    pub async fn cleanup_old_transactions(&self) {
        self.ledger.cleanup_old_transactions().await;
    }

    pub fn reset_daily_limits(&self) {
        self.bridge.reset_daily_limits();
    }
}
