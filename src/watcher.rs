//! Lifecycle tracking for submitted transactions.
//!
//! [`TransactionWatcher`] is a plain state machine
//! (`Submitted -> Observed(n) -> Finalized | Failed`) that fires its completion
//! effect at most once, when the observed confirmations first reach the
//! required depth. [`watch`] drives it by polling the chain.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::contracts::{ChainClient, ReceiptStatus, TxHash};
use crate::errors::CliError;

pub type CompletionEffect = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    Submitted,
    Observed { confirmations: u64 },
    Finalized { confirmations: u64 },
    Failed { reason: String },
}

impl TxStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxStatus::Finalized { .. } | TxStatus::Failed { .. })
    }
}

pub struct TransactionWatcher {
    hash: TxHash,
    required: u64,
    status: TxStatus,
    effect: Option<CompletionEffect>,
}

impl TransactionWatcher {
    /// A required depth of 0 is treated as 1.
    pub fn new(hash: TxHash, required_confirmations: u64) -> Self {
        Self {
            hash,
            required: required_confirmations.max(1),
            status: TxStatus::Submitted,
            effect: None,
        }
    }

    pub fn on_complete(mut self, effect: impl FnOnce() + Send + 'static) -> Self {
        self.effect = Some(Box::new(effect));
        self
    }

    pub fn hash(&self) -> &TxHash {
        &self.hash
    }

    pub fn required(&self) -> u64 {
        self.required
    }

    pub fn status(&self) -> &TxStatus {
        &self.status
    }

    /// Record a confirmation count reported by the chain.
    ///
    /// Counts lower than one already seen are ignored. Reaching the required
    /// depth finalizes the transaction and runs the completion effect.
    pub fn observe(&mut self, confirmations: u64) -> &TxStatus {
        let seen = match self.status {
            TxStatus::Submitted => 0,
            TxStatus::Observed { confirmations } => confirmations,
            TxStatus::Finalized { .. } | TxStatus::Failed { .. } => return &self.status,
        };
        if confirmations <= seen {
            return &self.status;
        }

        if confirmations >= self.required {
            info!("{} finalized with {} confirmations", self.hash, confirmations);
            self.status = TxStatus::Finalized { confirmations };
            if let Some(effect) = self.effect.take() {
                effect();
            }
        } else {
            debug!("{} has {}/{} confirmations", self.hash, confirmations, self.required);
            self.status = TxStatus::Observed { confirmations };
        }
        &self.status
    }

    /// Terminate without running the completion effect.
    pub fn fail(&mut self, reason: impl Into<String>) -> &TxStatus {
        if !self.status.is_terminal() {
            let reason = reason.into();
            warn!("{} failed: {}", self.hash, reason);
            self.status = TxStatus::Failed { reason };
            self.effect = None;
        }
        &self.status
    }
}

impl fmt::Debug for TransactionWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionWatcher")
            .field("hash", &self.hash)
            .field("required", &self.required)
            .field("status", &self.status)
            .field("effect_pending", &self.effect.is_some())
            .finish()
    }
}

/// Confirmation depth per kind of write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationPolicy {
    pub approval: u64,
    pub vote: u64,
    pub donation: u64,
    pub execution: u64,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            approval: 1,
            vote: 3,
            donation: 3,
            execution: 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WatchOptions {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Poll the chain until the watcher reaches a terminal state.
///
/// Returns the final confirmation count. A revert or drop is a
/// `TransactionFailure`; running out of time is a `ConfirmationTimeout`, since
/// the transaction may still be mined later. Receipt poll errors are logged
/// and polling continues. Failures are never retried here.
pub async fn watch<C>(chain: &C, watcher: &mut TransactionWatcher, options: &WatchOptions) -> Result<u64>
where
    C: ChainClient + ?Sized,
{
    let deadline = Instant::now() + options.timeout;

    loop {
        match chain.receipt_status(watcher.hash()).await {
            Ok(ReceiptStatus::Pending) => {}
            Ok(ReceiptStatus::Included { confirmations }) => {
                watcher.observe(confirmations);
            }
            Ok(ReceiptStatus::Reverted) => {
                watcher.fail("reverted");
            }
            Ok(ReceiptStatus::Dropped) => {
                watcher.fail("dropped by the network");
            }
            Err(e) => warn!("Receipt poll for {} failed: {}", watcher.hash(), e),
        }

        match watcher.status() {
            TxStatus::Finalized { confirmations } => return Ok(*confirmations),
            TxStatus::Failed { reason } => {
                return Err(CliError::TransactionFailure(format!("{} {}", watcher.hash(), reason)).into())
            }
            _ => {}
        }

        if Instant::now() >= deadline {
            watcher.fail(format!("not finalized within {:?}", options.timeout));
            return Err(CliError::ConfirmationTimeout(format!(
                "{} not finalized within {:?}",
                watcher.hash(),
                options.timeout
            ))
            .into());
        }
        tokio::time::sleep(options.poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn hash() -> TxHash {
        TxHash::from_bytes([7; 32])
    }

    fn counting_watcher(required: u64) -> (TransactionWatcher, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let watcher = TransactionWatcher::new(hash(), required).on_complete(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (watcher, fired)
    }

    #[test]
    fn test_fires_once_when_depth_reached() {
        let (mut watcher, fired) = counting_watcher(3);

        assert_eq!(watcher.observe(1), &TxStatus::Observed { confirmations: 1 });
        assert_eq!(watcher.observe(2), &TxStatus::Observed { confirmations: 2 });
        assert_eq!(watcher.observe(2), &TxStatus::Observed { confirmations: 2 });
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        assert_eq!(watcher.observe(3), &TxStatus::Finalized { confirmations: 3 });
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        watcher.observe(4);
        watcher.observe(10);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(watcher.status(), &TxStatus::Finalized { confirmations: 3 });
    }

    #[test]
    fn test_observations_are_monotonic() {
        let (mut watcher, _) = counting_watcher(5);
        watcher.observe(3);
        watcher.observe(1);
        assert_eq!(watcher.status(), &TxStatus::Observed { confirmations: 3 });
    }

    #[test]
    fn test_skipping_past_depth_still_fires_once() {
        let (mut watcher, fired) = counting_watcher(3);
        watcher.observe(7);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(watcher.status().is_terminal());
    }

    #[test]
    fn test_zero_depth_defaults_to_one() {
        let (mut watcher, fired) = counting_watcher(0);
        assert_eq!(watcher.required(), 1);
        watcher.observe(0);
        assert_eq!(watcher.status(), &TxStatus::Submitted);
        watcher.observe(1);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_never_fires() {
        let (mut watcher, fired) = counting_watcher(3);
        watcher.observe(2);
        watcher.fail("reverted");
        watcher.observe(3);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(
            watcher.status(),
            &TxStatus::Failed {
                reason: "reverted".to_string()
            }
        );
    }

    #[test]
    fn test_failure_reachable_from_submitted() {
        let (mut watcher, _) = counting_watcher(1);
        assert!(matches!(watcher.fail("dropped"), TxStatus::Failed { .. }));
    }

    #[test]
    fn test_fail_after_finalized_is_ignored() {
        let (mut watcher, fired) = counting_watcher(1);
        watcher.observe(1);
        watcher.fail("late");
        assert_eq!(watcher.status(), &TxStatus::Finalized { confirmations: 1 });
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_default_policy_depths() {
        let policy = ConfirmationPolicy::default();
        assert_eq!(policy.approval, 1);
        assert_eq!(policy.vote, 3);
        assert_eq!(policy.donation, 3);
        assert_eq!(policy.execution, 1);
    }
}
