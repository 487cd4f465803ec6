/*
 * Configuration management for the Hermes service
 */

use crate::models::{HermesError, Result};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub chains: Vec<ChainConfig>,
    pub bridge: BridgeSettings,
    pub planner: PlannerConfig,
    pub orchestrator: OrchestratorConfig,
    pub jobs: JobsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    pub factory_address: String,
    /// Static gas price used for fee estimation, in gwei. Not a live
    /// oracle; a fixed per-chain table.
    pub gas_price_gwei: u64,
    /// Canonical stablecoin used as the relay asset, when one exists.
    pub stablecoin: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainPairConfig {
    pub source_chain_id: u64,
    pub target_chain_id: u64,
    pub enabled: bool,
    /// Flat bridge fee in the fee token's smallest unit.
    pub base_fee: String,
    pub average_time_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BridgeSettings {
    pub bridge_name: String,
    pub enabled: bool,
    pub min_bridge_amount: String,
    pub max_bridge_amount: String,
    /// Per-chain daily outflow cap, applied to every configured chain.
    pub daily_outflow_cap: String,
    pub chain_pairs: Vec<ChainPairConfig>,
    /// Assets that the bridge can carry natively, per chain.
    pub bridge_assets: Vec<(u64, Vec<String>)>,
}

/// Tuning for balanced-route scoring. The weights and normalization
/// bases are operational defaults with no derivation behind them.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlannerConfig {
    pub balanced_time_weight: f64,
    pub balanced_fee_weight: f64,
    pub balanced_time_base_seconds: f64,
    pub balanced_fee_base: f64,
    /// Slippage protection applied to planned routes, in percent.
    pub default_slippage_percent: f64,
    /// Extra time budgeted for swap legs on a stablecoin relay.
    pub relay_extra_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrchestratorConfig {
    pub max_receive_attempts: u32,
    pub receive_poll_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobsConfig {
    pub pending_check_secs: u64,
    pub cleanup_interval_secs: u64,
    pub retention_days: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|e| HermesError::ConfigError(format!("Invalid port: {e}")))?,
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
            chains: vec![
                ChainConfig {
                    name: "ethereum".to_string(),
                    chain_id: 1,
                    rpc_url: env::var("ETHEREUM_RPC_URL").map_err(|_| {
                        HermesError::ConfigError("ETHEREUM_RPC_URL not set".to_string())
                    })?,
                    factory_address: env::var("ETHEREUM_FACTORY").unwrap_or_else(|_| {
                        "0x5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f".to_string()
                    }),
                    gas_price_gwei: 60,
                    stablecoin: Some("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".to_string()),
                },
                ChainConfig {
                    name: "bsc".to_string(),
                    chain_id: 56,
                    rpc_url: env::var("BSC_RPC_URL").map_err(|_| {
                        HermesError::ConfigError("BSC_RPC_URL not set".to_string())
                    })?,
                    factory_address: env::var("BSC_FACTORY").unwrap_or_else(|_| {
                        "0xcA143Ce32Fe78f1f7019d7d551a6402fC5350c73".to_string()
                    }),
                    gas_price_gwei: 10,
                    stablecoin: Some("0x8AC76a51cc950d9822D68b83fE1Ad97B32Cd580d".to_string()),
                },
                ChainConfig {
                    name: "polygon".to_string(),
                    chain_id: 137,
                    rpc_url: env::var("POLYGON_RPC_URL").map_err(|_| {
                        HermesError::ConfigError("POLYGON_RPC_URL not set".to_string())
                    })?,
                    factory_address: env::var("POLYGON_FACTORY").unwrap_or_else(|_| {
                        "0x5757371414417b8C6CAad45bAeF941aBc7d3Ab32".to_string()
                    }),
                    gas_price_gwei: 15,
                    stablecoin: Some("0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174".to_string()),
                },
            ],
            bridge: BridgeSettings::default(),
            planner: PlannerConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            jobs: JobsConfig::default(),
        })
    }

    #[must_use]
    pub fn chain(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }

    #[must_use]
    pub fn stablecoin(&self, chain_id: u64) -> Option<&str> {
        self.chain(chain_id).and_then(|c| c.stablecoin.as_deref())
    }
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            bridge_name: "ZetaChain".to_string(),
            enabled: true,
            min_bridge_amount: "1000000".to_string(), // 1 USDC
            max_bridge_amount: "1000000000000000000000".to_string(), // 1000 tokens
            daily_outflow_cap: "100000000000000000000000".to_string(), // 100k tokens
            chain_pairs: vec![
                ChainPairConfig {
                    source_chain_id: 1,
                    target_chain_id: 56,
                    enabled: true,
                    base_fee: "5000000".to_string(),
                    average_time_seconds: 300,
                },
                ChainPairConfig {
                    source_chain_id: 1,
                    target_chain_id: 137,
                    enabled: true,
                    base_fee: "3000000".to_string(),
                    average_time_seconds: 180,
                },
                ChainPairConfig {
                    source_chain_id: 56,
                    target_chain_id: 137,
                    enabled: true,
                    base_fee: "2000000".to_string(),
                    average_time_seconds: 240,
                },
            ],
            bridge_assets: vec![
                (1, vec!["0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".to_string()]),
                (56, vec!["0x8AC76a51cc950d9822D68b83fE1Ad97B32Cd580d".to_string()]),
                (137, vec!["0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174".to_string()]),
            ],
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            balanced_time_weight: 0.4,
            balanced_fee_weight: 0.6,
            balanced_time_base_seconds: 600.0,
            balanced_fee_base: 10_000_000.0,
            default_slippage_percent: 0.5,
            relay_extra_seconds: 60,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_receive_attempts: 3,
            receive_poll_delay_ms: 5000,
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            pending_check_secs: 30,
            cleanup_interval_secs: 86_400,
            retention_days: 30,
        }
    }
}
