use anyhow::Result;
use tracing::{debug, info};

use crate::amount::{self, Amount, MAX_AMOUNT};
use crate::contracts::{Address, ChainClient, ContractCall, DaoFunction, TxHash};
use crate::errors::CliError;
use crate::refresh::Refresher;
use crate::watcher::{self, TransactionWatcher, WatchOptions};

/// An approval the caller must dispatch before spending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApprovalRequest {
    pub token: Address,
    pub spender: Address,
    pub amount: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    NeedsApproval(ApprovalRequest),
}

/// Spending permission of `owner` toward `spender` on one token.
///
/// The cached allowance comes from the chain and is only ever replaced by
/// another read. A confirmed approval clears it instead of assuming the new
/// value.
#[derive(Debug, Clone)]
pub struct AllowanceGate {
    owner: Address,
    token: Address,
    spender: Address,
    granted: Option<Amount>,
    in_flight: Option<TxHash>,
}

impl AllowanceGate {
    pub fn new(owner: Address, token: Address, spender: Address) -> Self {
        Self {
            owner,
            token,
            spender,
            granted: None,
            in_flight: None,
        }
    }

    pub fn token(&self) -> Address {
        self.token
    }

    pub fn granted(&self) -> Option<Amount> {
        self.granted
    }

    /// Hash of the approval currently being watched, if any.
    pub fn pending_approval(&self) -> Option<TxHash> {
        self.in_flight
    }

    /// Re-read the allowance from the chain.
    pub async fn refresh<C: ChainClient + ?Sized>(&mut self, chain: &C) -> Result<Amount> {
        let granted = chain.allowance(self.token, self.owner, self.spender).await?;
        self.record(granted);
        Ok(granted)
    }

    /// Store a value just read from the chain.
    pub fn record(&mut self, granted: Amount) {
        debug!("allowance {} -> {} on {}: {}", self.owner, self.spender, self.token, granted);
        self.granted = Some(granted);
    }

    /// Forget the cached value. The next decision fails closed until refreshed.
    pub fn invalidate(&mut self) {
        self.granted = None;
    }

    pub fn ensure_allowance(&self, required: Amount) -> GateDecision {
        if amount::has_sufficient_allowance(self.granted, required) {
            GateDecision::Proceed
        } else {
            GateDecision::NeedsApproval(ApprovalRequest {
                token: self.token,
                spender: self.spender,
                amount: MAX_AMOUNT,
            })
        }
    }

    pub fn approval_call(&self) -> ContractCall {
        ContractCall {
            from: self.owner,
            to: self.token,
            function: DaoFunction::Approve {
                spender: self.spender,
                amount: MAX_AMOUNT,
            },
        }
    }

    /// Dispatch a maximal approval and wait for it to confirm.
    ///
    /// On confirmation the cache is invalidated and a full reload is
    /// requested; the caller must [`refresh`](Self::refresh) before deciding
    /// again.
    pub async fn raise<C: ChainClient + ?Sized>(
        &mut self,
        chain: &C,
        confirmations: u64,
        options: &WatchOptions,
        refresher: &Refresher,
    ) -> Result<TxHash> {
        if let Some(hash) = self.in_flight {
            return Err(CliError::TransactionFailure(format!("approval {} is still pending", hash)).into());
        }

        let prepared = chain.prepare(&self.approval_call()).await?;
        let hash = chain.send(&prepared).await?;
        info!("approval {} submitted for {} on {}", hash, self.spender, self.token);

        let refresher = refresher.clone();
        let mut tx_watcher =
            TransactionWatcher::new(hash, confirmations).on_complete(move || refresher.request_reload());
        let outcome = {
            let _pending = InFlight::mark(&mut self.in_flight, hash);
            watcher::watch(chain, &mut tx_watcher, options).await
        };
        outcome?;
        self.invalidate();
        Ok(hash)
    }
}

/// Clears the in-flight marker when the watch ends, including when the
/// `raise` future is dropped mid-await.
struct InFlight<'a>(&'a mut Option<TxHash>);

impl<'a> InFlight<'a> {
    fn mark(slot: &'a mut Option<TxHash>, hash: TxHash) -> Self {
        *slot = Some(hash);
        Self(slot)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        *self.0 = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(granted: Option<Amount>) -> AllowanceGate {
        let mut gate = AllowanceGate::new(
            Address::from_bytes([1; 20]),
            Address::from_bytes([2; 20]),
            Address::from_bytes([3; 20]),
        );
        gate.granted = granted;
        gate
    }

    #[test]
    fn test_proceed_when_covered() {
        assert_eq!(gate(Some(9)).ensure_allowance(9), GateDecision::Proceed);
        assert_eq!(gate(Some(MAX_AMOUNT)).ensure_allowance(1), GateDecision::Proceed);
    }

    #[test]
    fn test_needs_maximal_approval_when_short() {
        match gate(Some(5)).ensure_allowance(9) {
            GateDecision::NeedsApproval(request) => {
                assert_eq!(request.amount, MAX_AMOUNT);
                assert_eq!(request.token, Address::from_bytes([2; 20]));
                assert_eq!(request.spender, Address::from_bytes([3; 20]));
            }
            other => panic!("expected approval, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_allowance_fails_closed() {
        assert!(matches!(gate(None).ensure_allowance(1), GateDecision::NeedsApproval(_)));
    }

    #[test]
    fn test_invalidate_forgets_value() {
        let mut g = gate(Some(100));
        g.invalidate();
        assert_eq!(g.granted(), None);
        assert!(matches!(g.ensure_allowance(1), GateDecision::NeedsApproval(_)));
    }

    #[test]
    fn test_in_flight_marker_clears_on_drop() {
        let mut g = gate(None);
        {
            let _pending = InFlight::mark(&mut g.in_flight, TxHash::from_bytes([5; 32]));
        }
        assert_eq!(g.pending_approval(), None);
    }

    #[test]
    fn test_approval_call_is_maximal() {
        let call = gate(None).approval_call();
        assert_eq!(call.to, Address::from_bytes([2; 20]));
        assert_eq!(call.from, Address::from_bytes([1; 20]));
        assert_eq!(
            call.function,
            DaoFunction::Approve {
                spender: Address::from_bytes([3; 20]),
                amount: MAX_AMOUNT
            }
        );
    }
}
