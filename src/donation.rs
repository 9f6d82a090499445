use anyhow::Result;
use tracing::info;

use crate::allowance::{AllowanceGate, ApprovalRequest, GateDecision};
use crate::amount::{self, Amount};
use crate::contracts::{Address, ChainClient, ContractCall, Contracts, TxHash};
use crate::errors::CliError;
use crate::refresh::Refresher;
use crate::watcher::{self, ConfirmationPolicy, TransactionWatcher, WatchOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DonationPlan {
    Dispatch { call: ContractCall, amount: Amount },
    NeedsApproval(ApprovalRequest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DonationOutcome {
    Confirmed { hash: TxHash, amount: Amount },
    NeedsApproval(ApprovalRequest),
}

/// Donations of the payment token to the DAO, which mints DAO tokens in return.
#[derive(Debug, Clone)]
pub struct DonationController {
    donor: Address,
    contracts: Contracts,
    policy: ConfirmationPolicy,
}

impl DonationController {
    pub fn new(donor: Address, contracts: Contracts, policy: ConfirmationPolicy) -> Self {
        Self {
            donor,
            contracts,
            policy,
        }
    }

    /// `human` is a decimal string in whole payment tokens.
    pub fn plan(
        &self,
        human: &str,
        decimals: u8,
        gate: &AllowanceGate,
        balance: Option<Amount>,
    ) -> Result<DonationPlan, CliError> {
        let amount = amount::scaled_amount(human, decimals)?;
        if amount == 0 {
            return Err(CliError::InvalidAmount("Donation amount must be greater than 0".to_string()));
        }
        if let GateDecision::NeedsApproval(approval) = gate.ensure_allowance(amount) {
            return Ok(DonationPlan::NeedsApproval(approval));
        }
        if !amount::has_sufficient_balance(balance, amount) {
            return Err(CliError::InsufficientBalance {
                need: amount,
                have: balance.unwrap_or(0),
            });
        }
        Ok(DonationPlan::Dispatch {
            call: self.contracts.donate(self.donor, amount),
            amount,
        })
    }

    /// Donate and wait for the donation depth. Completion requests a full reload
    /// since both token balances change.
    #[allow(clippy::too_many_arguments)]
    pub async fn donate<C: ChainClient + ?Sized>(
        &self,
        chain: &C,
        human: &str,
        decimals: u8,
        gate: &AllowanceGate,
        balance: Option<Amount>,
        options: &WatchOptions,
        refresher: &Refresher,
    ) -> Result<DonationOutcome> {
        let (call, amount) = match self.plan(human, decimals, gate, balance)? {
            DonationPlan::NeedsApproval(approval) => return Ok(DonationOutcome::NeedsApproval(approval)),
            DonationPlan::Dispatch { call, amount } => (call, amount),
        };

        let prepared = chain.prepare(&call).await?;
        let hash = chain.send(&prepared).await?;
        info!("donation {} submitted: {} base units", hash, amount);

        let refresher = refresher.clone();
        let mut tx_watcher =
            TransactionWatcher::new(hash, self.policy.donation).on_complete(move || refresher.request_reload());
        watcher::watch(chain, &mut tx_watcher, options).await?;

        Ok(DonationOutcome::Confirmed { hash, amount })
    }

    /// Approve the DAO to spend the payment token.
    pub async fn set_allowance<C: ChainClient + ?Sized>(
        &self,
        chain: &C,
        gate: &mut AllowanceGate,
        options: &WatchOptions,
        refresher: &Refresher,
    ) -> Result<TxHash> {
        gate.raise(chain, self.policy.approval, options, refresher).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DONOR: Address = Address::from_bytes([0x0d; 20]);

    fn contracts() -> Contracts {
        Contracts {
            dao: Address::from_bytes([0xda; 20]),
            dao_token: Address::from_bytes([0xd7; 20]),
            payment_token: Address::from_bytes([0x97; 20]),
        }
    }

    fn controller() -> DonationController {
        DonationController::new(DONOR, contracts(), ConfirmationPolicy::default())
    }

    fn gate_with(allowance: Option<Amount>) -> AllowanceGate {
        let mut gate = AllowanceGate::new(DONOR, contracts().payment_token, contracts().dao);
        if let Some(value) = allowance {
            gate.record(value);
        }
        gate
    }

    #[test]
    fn test_plan_scales_by_decimals() {
        let plan = controller()
            .plan("100", 6, &gate_with(Some(amount::MAX_AMOUNT)), Some(200_000_000))
            .unwrap();
        assert_eq!(
            plan,
            DonationPlan::Dispatch {
                call: contracts().donate(DONOR, 100_000_000),
                amount: 100_000_000
            }
        );
    }

    #[test]
    fn test_plan_rejects_zero() {
        let err = controller()
            .plan("0", 6, &gate_with(Some(amount::MAX_AMOUNT)), Some(1))
            .unwrap_err();
        assert!(err.to_string().contains("greater than 0"));
    }

    #[test]
    fn test_plan_compares_scaled_amount_to_allowance() {
        // an allowance of 100 base units does not cover 100 whole tokens
        let plan = controller().plan("100", 6, &gate_with(Some(100)), Some(u128::MAX)).unwrap();
        assert!(matches!(plan, DonationPlan::NeedsApproval(_)));
    }

    #[test]
    fn test_plan_unknown_allowance_needs_approval() {
        let plan = controller().plan("1", 18, &gate_with(None), Some(u128::MAX)).unwrap();
        assert!(matches!(plan, DonationPlan::NeedsApproval(_)));
    }

    #[test]
    fn test_plan_rejects_short_balance() {
        let err = controller()
            .plan("2.5", 2, &gate_with(Some(amount::MAX_AMOUNT)), Some(249))
            .unwrap_err();
        assert_eq!(err, CliError::InsufficientBalance { need: 250, have: 249 });
    }
}
