/*
 * Transaction orchestrator: drives a planned route through the
 * cross-chain state machine
 */

use ethers::types::U256;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::bridge::BridgeNetwork;
use crate::chain::{mock_tx_hash, ChainWriter};
use crate::config::OrchestratorConfig;
use crate::crosschain::ledger::TransactionLedger;
use crate::metrics;
use crate::models::{
    CrossChainRoute, CrossChainTransaction, HermesError, MessageStatus, Result, RouteStep,
    StepType,
};
use crate::router::apply_slippage;

/// Executes planned routes step by step. Execution runs detached from
/// the caller; progress is observable only through the ledger.
#[derive(Clone)]
pub struct Orchestrator {
    ledger: Arc<TransactionLedger>,
    bridge: Arc<BridgeNetwork>,
    writer: Arc<dyn ChainWriter>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        ledger: Arc<TransactionLedger>,
        bridge: Arc<BridgeNetwork>,
        writer: Arc<dyn ChainWriter>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            ledger,
            bridge,
            writer,
            config,
        }
    }

    /// Validates the route, books a ledger entry and launches execution
    /// in the background. Returns the transaction ID immediately; the
    /// caller polls the ledger for progress.
    pub async fn execute_cross_chain_swap(
        &self,
        route: CrossChainRoute,
        user_address: &str,
        slippage_percent: f64,
    ) -> Result<String> {
        if self
            .bridge
            .is_circuit_breaker_open(route.source_chain_id, route.target_chain_id)
        {
            metrics::BRIDGE_REJECTIONS
                .with_label_values(&["circuit_breaker"])
                .inc();
            return Err(HermesError::CircuitBreakerOpen);
        }

        let (min, max) = self.bridge.amount_bounds();
        if route.amount_in < min || route.amount_in > max {
            return Err(HermesError::InvalidRoute(format!(
                "Amount {} outside bridge limits [{}, {}]",
                route.amount_in, min, max
            )));
        }

        let transaction = self
            .ledger
            .create_transaction(
                route.source_chain_id,
                route.target_chain_id,
                &route.source_token,
                &route.target_token,
                route.amount_in,
                user_address,
                Some(route.estimated_time_seconds),
            )
            .await;

        metrics::SWAPS_EXECUTED.inc();

        let transaction_id = transaction.transaction_id.clone();
        let orchestrator = self.clone();
        let user = user_address.to_string();
        tokio::spawn(async move {
            orchestrator
                .execute_flow(&transaction_id, &route, &user, slippage_percent)
                .await;
        });

        Ok(transaction.transaction_id)
    }

    async fn execute_flow(
        &self,
        transaction_id: &str,
        route: &CrossChainRoute,
        user_address: &str,
        slippage_percent: f64,
    ) {
        info!(
            "Executing cross-chain swap {}: {} steps",
            transaction_id,
            route.steps.len()
        );

        // Set once the bridge has accepted the message; decides which
        // side a refund lands on.
        let mut bridged = false;

        for (index, step) in route.steps.iter().enumerate() {
            let outcome = match step.step_type {
                StepType::Swap => self.execute_swap_step(transaction_id, route, step, user_address, slippage_percent).await,
                StepType::Bridge => {
                    let result = self
                        .execute_bridge_step(transaction_id, route, step, user_address)
                        .await;
                    if result.is_ok() {
                        bridged = true;
                    }
                    result
                }
                StepType::Receive => self.await_bridge_delivery(transaction_id).await,
            };

            if let Err(e) = outcome {
                error!(
                    "Step {} ({:?}) failed for {}: {}",
                    index, step.step_type, transaction_id, e
                );
                self.handle_failure(transaction_id, route, step, index, bridged, user_address, &e)
                    .await;
                return;
            }
        }

        self.ledger
            .complete_transaction(transaction_id, route.estimated_amount_out)
            .await;
        metrics::SWAP_OUTCOMES
            .with_label_values(&["completed"])
            .inc();
    }

    async fn execute_swap_step(
        &self,
        transaction_id: &str,
        route: &CrossChainRoute,
        step: &RouteStep,
        user_address: &str,
        slippage_percent: f64,
    ) -> Result<()> {
        let min_amount_out = apply_slippage(step.amount_out, slippage_percent / 100.0)?;
        let tx_hash = self
            .writer
            .submit_swap(
                step.chain_id,
                &step.token_in,
                &step.token_out,
                step.amount_in,
                min_amount_out,
                user_address,
            )
            .await?;

        if step.chain_id == route.source_chain_id {
            self.ledger
                .update_source_tx_hash(transaction_id, &tx_hash)
                .await;
        } else {
            self.ledger
                .update_target_tx_hash(transaction_id, &tx_hash)
                .await;
        }
        Ok(())
    }

    /// Sends the bridge message and waits for delivery before any
    /// later step runs on the target chain.
    async fn execute_bridge_step(
        &self,
        transaction_id: &str,
        route: &CrossChainRoute,
        step: &RouteStep,
        user_address: &str,
    ) -> Result<()> {
        let payload = build_bridge_payload(user_address, step.amount_in);
        let message_id = self
            .bridge
            .send_cross_chain_message(
                step.chain_id,
                route.target_chain_id,
                step.amount_in,
                &payload,
            )
            .await?;

        self.ledger
            .update_bridge_message_id(transaction_id, &message_id)
            .await;

        self.await_bridge_delivery(transaction_id).await
    }

    /// Bounded polling of the bridge message status. Exhaustion is a
    /// timeout, an explicit failed status is a bridge failure; both are
    /// step failures.
    async fn await_bridge_delivery(&self, transaction_id: &str) -> Result<()> {
        let message_id = self
            .ledger
            .get_transaction(transaction_id)
            .await
            .and_then(|tx| tx.bridge_message_id)
            .ok_or_else(|| {
                HermesError::BridgeFailed("No bridge message to wait for".to_string())
            })?;

        for attempt in 1..=self.config.max_receive_attempts {
            match self.bridge.query_message_status(&message_id).await {
                Ok(MessageStatus::Completed) => {
                    self.ledger
                        .update_target_tx_hash(transaction_id, &mock_tx_hash())
                        .await;
                    return Ok(());
                }
                Ok(MessageStatus::Failed) => {
                    return Err(HermesError::BridgeFailed(format!(
                        "Bridge message {message_id} failed"
                    )));
                }
                Ok(MessageStatus::Pending) => {
                    info!(
                        "Bridge message {} still pending, attempt {}/{}",
                        message_id, attempt, self.config.max_receive_attempts
                    );
                }
                Err(e) => {
                    warn!("Error querying bridge message {}: {}", message_id, e);
                }
            }

            // Delay between polls only; the first poll fires right away.
            if attempt < self.config.max_receive_attempts {
                tokio::time::sleep(Duration::from_millis(self.config.receive_poll_delay_ms)).await;
            }
        }

        Err(HermesError::BridgeTimeout(message_id))
    }

    /// Failure policy. Nothing executed yet means there is nothing to
    /// refund. Once funds have crossed the bridge the refund must land
    /// on the target chain. A failed refund leaves the record flagged
    /// for manual intervention rather than silently dropping it.
    #[allow(clippy::too_many_arguments)]
    async fn handle_failure(
        &self,
        transaction_id: &str,
        route: &CrossChainRoute,
        failed_step: &RouteStep,
        failed_index: usize,
        bridged: bool,
        user_address: &str,
        error: &HermesError,
    ) {
        if failed_index == 0 && !bridged {
            self.ledger
                .fail_transaction(transaction_id, &error.to_string())
                .await;
            metrics::SWAP_OUTCOMES.with_label_values(&["failed"]).inc();
            return;
        }

        let (refund_chain_id, refund_token) = if bridged {
            // Funds already crossed; refund the target-side asset.
            let token = match failed_step.step_type {
                StepType::Bridge => failed_step.token_out.clone(),
                _ => failed_step.token_in.clone(),
            };
            (route.target_chain_id, token)
        } else {
            (route.source_chain_id, route.source_token.clone())
        };

        match self
            .writer
            .submit_refund(
                refund_chain_id,
                &refund_token,
                failed_step.amount_in,
                user_address,
            )
            .await
        {
            Ok(refund_tx_hash) => {
                self.ledger
                    .refund_transaction(transaction_id, &refund_tx_hash)
                    .await;
                metrics::SWAP_OUTCOMES
                    .with_label_values(&["refunded"])
                    .inc();
            }
            Err(refund_error) => {
                self.ledger
                    .partially_complete_transaction(
                        transaction_id,
                        &format!(
                            "Refund failed after step error ({error}): {refund_error}. \
                             Manual intervention required."
                        ),
                    )
                    .await;
                metrics::SWAP_OUTCOMES
                    .with_label_values(&["partially_completed"])
                    .inc();
            }
        }
    }

    /// Re-attempts bridging for a failed or stuck transaction. The
    /// retry budget lives on the ledger record.
    pub async fn retry_transaction(&self, transaction_id: &str) -> Result<CrossChainTransaction> {
        let transaction = self.ledger.retry_transaction(transaction_id).await?;

        let orchestrator = self.clone();
        let retried = transaction.clone();
        tokio::spawn(async move {
            let payload = build_bridge_payload(&retried.user_address, retried.amount_in);
            match orchestrator
                .bridge
                .send_cross_chain_message(
                    retried.source_chain_id,
                    retried.target_chain_id,
                    retried.amount_in,
                    &payload,
                )
                .await
            {
                Ok(message_id) => {
                    orchestrator
                        .ledger
                        .update_bridge_message_id(&retried.transaction_id, &message_id)
                        .await;
                }
                Err(e) => {
                    orchestrator
                        .ledger
                        .fail_transaction(
                            &retried.transaction_id,
                            &format!("Retry bridging failed: {e}"),
                        )
                        .await;
                }
            }
        });

        Ok(transaction)
    }
}

/// ERC-20 `transfer(recipient, amount)` calldata carried as the bridge
/// message payload.
fn build_bridge_payload(recipient: &str, amount: U256) -> String {
    let recipient = recipient.trim_start_matches("0x").to_lowercase();
    format!("0xa9059cbb{recipient:0>64}{amount:064x}")
}
