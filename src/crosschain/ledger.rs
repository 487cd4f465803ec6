/*
 * Transaction ledger: state tracking and status history for cross-chain swaps
 */

use chrono::{Duration, Utc};
use ethers::types::U256;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::bridge::BridgeNetwork;
use crate::models::{
    CrossChainTransaction, HermesError, MessageStatus, Result, StatusHistory, TransactionStatus,
};

/// In-memory transaction store. Each record is owned exclusively by the
/// ledger; callers always receive clones and mutate through the
/// transition methods below, which are the only paths that change
/// `status` and which append to the audit history.
pub struct TransactionLedger {
    transactions: RwLock<HashMap<String, CrossChainTransaction>>,
    bridge: Arc<BridgeNetwork>,
    retention_days: i64,
}

impl TransactionLedger {
    pub fn new(bridge: Arc<BridgeNetwork>, retention_days: i64) -> Self {
        Self {
            transactions: RwLock::new(HashMap::new()),
            bridge,
            retention_days,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_transaction(
        &self,
        source_chain_id: u64,
        target_chain_id: u64,
        source_token: &str,
        target_token: &str,
        amount_in: U256,
        user_address: &str,
        estimated_time_seconds: Option<u64>,
    ) -> CrossChainTransaction {
        let transaction_id = generate_transaction_id();

        let mut transaction = CrossChainTransaction {
            transaction_id: transaction_id.clone(),
            user_address: user_address.to_string(),
            source_chain_id,
            target_chain_id,
            source_token: source_token.to_string(),
            target_token: target_token.to_string(),
            amount_in,
            amount_out: None,
            status: TransactionStatus::PendingSourceConfirmation,
            status_history: Vec::new(),
            source_tx_hash: None,
            bridge_message_id: None,
            target_tx_hash: None,
            created_at: Utc::now(),
            completed_at: None,
            estimated_time_seconds,
            actual_time_seconds: None,
            error_message: None,
            retry_count: 0,
        };

        append_history(
            &mut transaction,
            TransactionStatus::PendingSourceConfirmation,
            "Transaction created, waiting for source chain confirmation".to_string(),
        );

        self.transactions
            .write()
            .await
            .insert(transaction_id.clone(), transaction.clone());

        info!("Created cross-chain transaction: {}", transaction_id);
        transaction
    }

    pub async fn get_transaction(&self, transaction_id: &str) -> Option<CrossChainTransaction> {
        self.transactions.read().await.get(transaction_id).cloned()
    }

    /// All transactions for a user, newest first.
    pub async fn get_user_transactions(&self, user_address: &str) -> Vec<CrossChainTransaction> {
        let mut result: Vec<CrossChainTransaction> = self
            .transactions
            .read()
            .await
            .values()
            .filter(|tx| tx.user_address.eq_ignore_ascii_case(user_address))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        result
    }

    pub async fn update_source_tx_hash(&self, transaction_id: &str, tx_hash: &str) {
        let mut transactions = self.transactions.write().await;
        let Some(transaction) = transactions.get_mut(transaction_id) else {
            warn!("Transaction not found: {}", transaction_id);
            return;
        };

        transaction.source_tx_hash = Some(tx_hash.to_string());
        transaction.status = TransactionStatus::SourceConfirmed;
        let link = explorer_link(transaction.source_chain_id, tx_hash);
        append_history(
            transaction,
            TransactionStatus::SourceConfirmed,
            format!("Source chain transaction confirmed: {link}"),
        );

        info!("Updated source tx hash for {}: {}", transaction_id, tx_hash);
    }

    pub async fn update_bridge_message_id(&self, transaction_id: &str, message_id: &str) {
        let mut transactions = self.transactions.write().await;
        let Some(transaction) = transactions.get_mut(transaction_id) else {
            warn!("Transaction not found: {}", transaction_id);
            return;
        };

        transaction.bridge_message_id = Some(message_id.to_string());
        transaction.status = TransactionStatus::BridgeInProgress;
        append_history(
            transaction,
            TransactionStatus::BridgeInProgress,
            format!("Bridge message created: {message_id}"),
        );

        info!(
            "Updated bridge message ID for {}: {}",
            transaction_id, message_id
        );
    }

    pub async fn update_target_tx_hash(&self, transaction_id: &str, tx_hash: &str) {
        let mut transactions = self.transactions.write().await;
        let Some(transaction) = transactions.get_mut(transaction_id) else {
            warn!("Transaction not found: {}", transaction_id);
            return;
        };

        transaction.target_tx_hash = Some(tx_hash.to_string());
        transaction.status = TransactionStatus::TargetExecuting;
        let link = explorer_link(transaction.target_chain_id, tx_hash);
        append_history(
            transaction,
            TransactionStatus::TargetExecuting,
            format!("Target chain execution started: {link}"),
        );

        info!("Updated target tx hash for {}: {}", transaction_id, tx_hash);
    }

    pub async fn complete_transaction(&self, transaction_id: &str, amount_out: U256) {
        let mut transactions = self.transactions.write().await;
        let Some(transaction) = transactions.get_mut(transaction_id) else {
            warn!("Transaction not found: {}", transaction_id);
            return;
        };

        transaction.amount_out = Some(amount_out);
        transaction.status = TransactionStatus::Completed;
        let completed_at = Utc::now();
        transaction.completed_at = Some(completed_at);
        transaction.actual_time_seconds = Some(
            (completed_at - transaction.created_at)
                .num_seconds()
                .max(0) as u64,
        );

        append_history(
            transaction,
            TransactionStatus::Completed,
            format!("Transaction completed successfully. Amount out: {amount_out}"),
        );

        info!("Completed transaction {}: {}", transaction_id, amount_out);
    }

    /// Funds made it partway but could not be delivered or refunded;
    /// requires operator attention.
    pub async fn partially_complete_transaction(&self, transaction_id: &str, reason: &str) {
        let mut transactions = self.transactions.write().await;
        let Some(transaction) = transactions.get_mut(transaction_id) else {
            warn!("Transaction not found: {}", transaction_id);
            return;
        };

        transaction.status = TransactionStatus::PartiallyCompleted;
        transaction.completed_at = Some(Utc::now());
        append_history(
            transaction,
            TransactionStatus::PartiallyCompleted,
            format!("Transaction partially completed: {reason}"),
        );

        warn!(
            "Partially completed transaction {}: {}",
            transaction_id, reason
        );
    }

    pub async fn fail_transaction(&self, transaction_id: &str, error_message: &str) {
        let mut transactions = self.transactions.write().await;
        let Some(transaction) = transactions.get_mut(transaction_id) else {
            warn!("Transaction not found: {}", transaction_id);
            return;
        };

        transaction.status = TransactionStatus::Failed;
        transaction.error_message = Some(error_message.to_string());
        transaction.completed_at = Some(Utc::now());
        append_history(
            transaction,
            TransactionStatus::Failed,
            format!("Transaction failed: {error_message}"),
        );

        error!("Failed transaction {}: {}", transaction_id, error_message);
    }

    pub async fn refund_transaction(&self, transaction_id: &str, refund_tx_hash: &str) {
        let mut transactions = self.transactions.write().await;
        let Some(transaction) = transactions.get_mut(transaction_id) else {
            warn!("Transaction not found: {}", transaction_id);
            return;
        };

        transaction.status = TransactionStatus::Refunded;
        transaction.completed_at = Some(Utc::now());
        let link = explorer_link(transaction.source_chain_id, refund_tx_hash);
        append_history(
            transaction,
            TransactionStatus::Refunded,
            format!("Transaction refunded: {link}"),
        );

        info!("Refunded transaction {}: {}", transaction_id, refund_tx_hash);
    }

    /// Books a retry attempt: bumps the counter and moves the record
    /// back to bridging. The caller re-drives the bridge send.
    pub async fn retry_transaction(&self, transaction_id: &str) -> Result<CrossChainTransaction> {
        let mut transactions = self.transactions.write().await;
        let transaction = transactions
            .get_mut(transaction_id)
            .ok_or_else(|| HermesError::NotFound(transaction_id.to_string()))?;

        if !transaction.is_retryable() {
            return Err(HermesError::NotRetryable(transaction_id.to_string()));
        }

        transaction.retry_count += 1;
        transaction.status = TransactionStatus::BridgeInProgress;
        let attempt = transaction.retry_count;
        append_history(
            transaction,
            TransactionStatus::BridgeInProgress,
            format!("Transaction retry #{attempt}"),
        );

        info!(
            "Retrying transaction {}, attempt #{}",
            transaction_id, attempt
        );
        Ok(transaction.clone())
    }

    /// Periodic sweep (every 30 s in production): re-polls every
    /// in-flight bridge message and advances the record. Polling is
    /// idempotent, so racing the orchestrator's own RECEIVE polling is
    /// harmless.
    pub async fn check_pending_transactions(&self) {
        debug!("Checking pending transactions...");

        let pending: Vec<(String, String)> = self
            .transactions
            .read()
            .await
            .values()
            .filter(|tx| tx.status == TransactionStatus::BridgeInProgress)
            .filter_map(|tx| {
                tx.bridge_message_id
                    .as_ref()
                    .map(|mid| (tx.transaction_id.clone(), mid.clone()))
            })
            .collect();

        for (transaction_id, message_id) in pending {
            match self.bridge.query_message_status(&message_id).await {
                Ok(MessageStatus::Completed) => {
                    self.update_target_tx_hash(&transaction_id, &format!("0x{message_id}"))
                        .await;
                }
                Ok(MessageStatus::Failed) => {
                    self.fail_transaction(&transaction_id, "Bridge message failed")
                        .await;
                }
                Ok(MessageStatus::Pending) => {}
                Err(e) => {
                    error!(
                        "Error checking bridge status for {}: {}",
                        transaction_id, e
                    );
                }
            }
        }
    }

    /// Daily sweep: drops terminal records older than the retention
    /// window.
    pub async fn cleanup_old_transactions(&self) {
        let cutoff = Utc::now() - Duration::days(self.retention_days);
        let mut transactions = self.transactions.write().await;

        let expired: Vec<String> = transactions
            .iter()
            .filter(|(_, tx)| tx.created_at < cutoff && tx.status.is_terminal())
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            transactions.remove(id);
        }

        info!("Cleaned up {} expired transactions", expired.len());
    }
}

fn append_history(
    transaction: &mut CrossChainTransaction,
    status: TransactionStatus,
    description: String,
) {
    transaction.status_history.push(StatusHistory {
        status,
        timestamp: Utc::now(),
        description,
    });
}

fn generate_transaction_id() -> String {
    let raw = Uuid::new_v4().simple().to_string();
    format!("TX-{}", raw[..16].to_uppercase())
}

fn explorer_link(chain_id: u64, tx_hash: &str) -> String {
    let base = match chain_id {
        1 => "https://etherscan.io/tx/",
        56 => "https://bscscan.com/tx/",
        137 => "https://polygonscan.com/tx/",
        42161 => "https://arbiscan.io/tx/",
        10 => "https://optimistic.etherscan.io/tx/",
        _ => "https://etherscan.io/tx/",
    };
    format!("{base}{tx_hash}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{BridgeMessenger, StubBridgeMessenger};
    use crate::config::BridgeSettings;
    use async_trait::async_trait;

    fn ledger() -> TransactionLedger {
        let bridge = Arc::new(
            BridgeNetwork::from_config(&BridgeSettings::default(), Arc::new(StubBridgeMessenger))
                .unwrap(),
        );
        TransactionLedger::new(bridge, 30)
    }

    fn ledger_with(messenger: Arc<dyn BridgeMessenger>) -> TransactionLedger {
        let bridge = Arc::new(
            BridgeNetwork::from_config(&BridgeSettings::default(), messenger).unwrap(),
        );
        TransactionLedger::new(bridge, 30)
    }

    async fn seed(ledger: &TransactionLedger, user: &str) -> String {
        ledger
            .create_transaction(
                1,
                56,
                "0xAAA",
                "0xBBB",
                U256::from(100_000_000u64),
                user,
                Some(300),
            )
            .await
            .transaction_id
    }

    #[tokio::test]
    async fn creation_seeds_history_and_status() {
        let ledger = ledger();
        let id = seed(&ledger, "0xuser").await;
        let tx = ledger.get_transaction(&id).await.unwrap();

        assert!(tx.transaction_id.starts_with("TX-"));
        assert_eq!(tx.status, TransactionStatus::PendingSourceConfirmation);
        assert_eq!(tx.status_history.len(), 1);
    }

    #[tokio::test]
    async fn each_transition_appends_exactly_one_entry() {
        let ledger = ledger();
        let id = seed(&ledger, "0xuser").await;

        ledger.update_source_tx_hash(&id, "0xhash1").await;
        let tx = ledger.get_transaction(&id).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::SourceConfirmed);
        assert_eq!(tx.status_history.len(), 2);

        ledger.update_bridge_message_id(&id, "msg-1").await;
        let tx = ledger.get_transaction(&id).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::BridgeInProgress);
        assert_eq!(tx.status_history.len(), 3);

        ledger.update_target_tx_hash(&id, "0xhash2").await;
        let tx = ledger.get_transaction(&id).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::TargetExecuting);
        assert_eq!(tx.status_history.len(), 4);

        ledger
            .complete_transaction(&id, U256::from(99_000_000u64))
            .await;
        let tx = ledger.get_transaction(&id).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.status_history.len(), 5);
        assert_eq!(tx.amount_out, Some(U256::from(99_000_000u64)));
        assert!(tx.completed_at.is_some());
        assert!(tx.actual_time_seconds.is_some());
    }

    #[tokio::test]
    async fn user_listing_filters_and_sorts_newest_first() {
        let ledger = ledger();
        let first = seed(&ledger, "0xAbCd").await;
        let second = seed(&ledger, "0xabcd").await;
        seed(&ledger, "0xother").await;

        let txs = ledger.get_user_transactions("0xABCD").await;
        assert_eq!(txs.len(), 2);
        assert!(txs[0].created_at >= txs[1].created_at);
        let ids: Vec<_> = txs.iter().map(|t| t.transaction_id.clone()).collect();
        assert!(ids.contains(&first) && ids.contains(&second));
    }

    #[tokio::test]
    async fn retry_budget_is_enforced() {
        let ledger = ledger();
        let id = seed(&ledger, "0xuser").await;
        ledger.fail_transaction(&id, "boom").await;

        for attempt in 1..=3u32 {
            let tx = ledger.retry_transaction(&id).await.unwrap();
            assert_eq!(tx.retry_count, attempt);
            assert_eq!(tx.status, TransactionStatus::BridgeInProgress);
        }

        let err = ledger.retry_transaction(&id).await.unwrap_err();
        assert!(matches!(err, HermesError::NotRetryable(_)));
    }

    #[tokio::test]
    async fn retry_unknown_id_is_not_found() {
        let err = ledger().retry_transaction("TX-MISSING").await.unwrap_err();
        assert!(matches!(err, HermesError::NotFound(_)));
    }

    #[tokio::test]
    async fn completed_transaction_is_not_retryable() {
        let ledger = ledger();
        let id = seed(&ledger, "0xuser").await;
        ledger.complete_transaction(&id, U256::from(1u64)).await;
        let err = ledger.retry_transaction(&id).await.unwrap_err();
        assert!(matches!(err, HermesError::NotRetryable(_)));
    }

    #[tokio::test]
    async fn pending_sweep_advances_completed_bridges() {
        // Stub messenger reports every message as completed.
        let ledger = ledger();
        let id = seed(&ledger, "0xuser").await;
        ledger.update_bridge_message_id(&id, "msg-42").await;

        ledger.check_pending_transactions().await;

        let tx = ledger.get_transaction(&id).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::TargetExecuting);
        assert_eq!(tx.target_tx_hash, Some("0xmsg-42".to_string()));
    }

    #[tokio::test]
    async fn pending_sweep_fails_failed_bridges() {
        struct FailedMessenger;

        #[async_trait]
        impl BridgeMessenger for FailedMessenger {
            async fn send(&self, _s: u64, _t: u64, _p: &str) -> Result<String> {
                Ok("m".to_string())
            }
            async fn query_status(&self, _m: &str) -> Result<MessageStatus> {
                Ok(MessageStatus::Failed)
            }
        }

        let ledger = ledger_with(Arc::new(FailedMessenger));
        let id = seed(&ledger, "0xuser").await;
        ledger.update_bridge_message_id(&id, "msg-43").await;

        ledger.check_pending_transactions().await;

        let tx = ledger.get_transaction(&id).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Failed);
    }

    #[tokio::test]
    async fn cleanup_only_purges_old_terminal_records() {
        let ledger = ledger();
        let live = seed(&ledger, "0xuser").await;
        let old_done = seed(&ledger, "0xuser").await;
        ledger.complete_transaction(&old_done, U256::from(1u64)).await;
        let old_pending = seed(&ledger, "0xuser").await;

        // Backdate the two "old" records past the retention window.
        {
            let mut txs = ledger.transactions.write().await;
            let backdate = Utc::now() - Duration::days(31);
            txs.get_mut(&old_done).unwrap().created_at = backdate;
            txs.get_mut(&old_pending).unwrap().created_at = backdate;
        }

        ledger.cleanup_old_transactions().await;

        assert!(ledger.get_transaction(&live).await.is_some());
        assert!(ledger.get_transaction(&old_done).await.is_none());
        // Non-terminal records survive regardless of age.
        assert!(ledger.get_transaction(&old_pending).await.is_some());
    }
}
