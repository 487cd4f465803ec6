/*
 * Prometheus counters for route search and swap execution
 */

use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};

pub static ROUTE_SEARCHES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "hermes_route_searches_total",
        "route search requests served"
    )
    .unwrap()
});

pub static SWAPS_EXECUTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "hermes_swaps_executed_total",
        "cross-chain swaps accepted for execution"
    )
    .unwrap()
});

pub static SWAP_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "hermes_swap_outcomes_total",
        "terminal swap outcomes",
        &["outcome"]
    )
    .unwrap()
});

pub static BRIDGE_REJECTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "hermes_bridge_rejections_total",
        "bridge sends rejected by a guard",
        &["reason"]
    )
    .unwrap()
});

/// Renders the default registry in the Prometheus text format.
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder
        .encode(&prometheus::gather(), &mut buffer)
        .is_err()
    {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
