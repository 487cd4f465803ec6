/*
 * Hermes - Cross-Chain Swap Routing Service
 * Core library exports and module declarations
 */

pub mod api;
pub mod bridge;
pub mod chain;
pub mod config;
pub mod crosschain;
pub mod fees;
pub mod metrics;
pub mod models;
pub mod router;
pub mod rpc;
pub mod service;
pub mod utils;

pub use config::Config;
pub use models::*;
pub use service::SwapService;
