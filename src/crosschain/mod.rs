/*
 * Cross-chain subsystem: route planning, orchestration, transaction ledger
 */

pub mod ledger;
pub mod orchestrator;
pub mod planner;

pub use ledger::TransactionLedger;
pub use orchestrator::Orchestrator;
pub use planner::RoutePlanner;
