//! Vote casting for active proposals.
//!
//! Whether a voter has already voted is checked against the fetched feed and
//! against votes this session submitted itself. Both are best effort: the DAO
//! contract is the only place that can enforce one vote per voter.
//!
//! A submitted vote stays marked locally until its transaction reverts or is
//! dropped. A confirmation timeout leaves the mark in place: the vote may
//! still be mined, and once the indexer reports it the feed check takes over.

use anyhow::Result;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

use crate::allowance::{AllowanceGate, ApprovalRequest, GateDecision};
use crate::amount::{self, Amount};
use crate::contracts::{Address, ChainClient, ContractCall, Contracts, TxHash};
use crate::errors::CliError;
use crate::proposals::{Lifecycle, ProposalId, ProposalView};
use crate::refresh::Refresher;
use crate::watcher::{self, ConfirmationPolicy, TransactionWatcher, WatchOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteRequest {
    pub proposal_id: ProposalId,
    pub amount: u64,
    pub in_support: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VotePlan {
    Dispatch { call: ContractCall, cost: Amount },
    NeedsApproval(ApprovalRequest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Confirmed { hash: TxHash, confirmations: u64 },
    NeedsApproval(ApprovalRequest),
}

#[derive(Debug)]
pub struct VotingController {
    voter: Address,
    contracts: Contracts,
    policy: ConfirmationPolicy,
    refetch_delay: Duration,
    submitted: HashSet<ProposalId>,
}

impl VotingController {
    pub fn new(voter: Address, contracts: Contracts, policy: ConfirmationPolicy, refetch_delay: Duration) -> Self {
        Self {
            voter,
            contracts,
            policy,
            refetch_delay,
            submitted: HashSet::new(),
        }
    }

    /// True once this session dispatched a vote on the proposal that has not
    /// reverted or been dropped.
    pub fn has_local_vote(&self, proposal_id: ProposalId) -> bool {
        self.submitted.contains(&proposal_id)
    }

    /// Check every precondition and decide what, if anything, to dispatch.
    pub fn plan(
        &self,
        view: &ProposalView<'_>,
        request: &VoteRequest,
        gate: &AllowanceGate,
        balance: Option<Amount>,
    ) -> Result<VotePlan, CliError> {
        let cost = amount::vote_cost(request.amount)?;
        let proposal_id = view.proposal.proposal_id;
        if request.proposal_id != proposal_id {
            return Err(CliError::ProposalNotFound(request.proposal_id));
        }

        if view.lifecycle != Lifecycle::Active {
            return Err(CliError::ProposalNotActive(proposal_id));
        }
        if let Some(prior) = view.vote_by(self.voter) {
            return Err(CliError::AlreadyVoted {
                proposal_id,
                in_support: prior.in_support,
            });
        }
        if self.has_local_vote(proposal_id) {
            return Err(CliError::VoteInFlight(proposal_id));
        }
        if let GateDecision::NeedsApproval(approval) = gate.ensure_allowance(cost) {
            return Ok(VotePlan::NeedsApproval(approval));
        }
        if !amount::has_sufficient_balance(balance, cost) {
            return Err(CliError::InsufficientBalance {
                need: cost,
                have: balance.unwrap_or(0),
            });
        }

        Ok(VotePlan::Dispatch {
            call: self.contracts.vote(self.voter, proposal_id, request.amount, request.in_support),
            cost,
        })
    }

    /// Cast a vote and wait for it to reach the vote confirmation depth.
    ///
    /// When the allowance is short nothing is dispatched and the approval the
    /// caller needs is returned instead. After confirmation a feed refetch is
    /// scheduled once the refetch delay has passed.
    #[allow(clippy::too_many_arguments)]
    pub async fn cast_vote<C: ChainClient + ?Sized>(
        &mut self,
        chain: &C,
        view: &ProposalView<'_>,
        request: &VoteRequest,
        gate: &AllowanceGate,
        balance: Option<Amount>,
        options: &WatchOptions,
        refresher: &Refresher,
    ) -> Result<VoteOutcome> {
        let call = match self.plan(view, request, gate, balance)? {
            VotePlan::NeedsApproval(approval) => return Ok(VoteOutcome::NeedsApproval(approval)),
            VotePlan::Dispatch { call, .. } => call,
        };

        let proposal_id = view.proposal.proposal_id;
        let prepared = chain.prepare(&call).await?;
        let hash = chain.send(&prepared).await?;
        info!(
            "vote {} submitted: proposal {} amount {} support {}",
            hash, proposal_id, request.amount, request.in_support
        );
        self.submitted.insert(proposal_id);

        let refresher = refresher.clone();
        let delay = self.refetch_delay;
        let mut tx_watcher =
            TransactionWatcher::new(hash, self.policy.vote).on_complete(move || refresher.schedule_refetch(delay));

        match watcher::watch(chain, &mut tx_watcher, options).await {
            Ok(confirmations) => Ok(VoteOutcome::Confirmed { hash, confirmations }),
            Err(e) => {
                let timed_out = matches!(e.downcast_ref::<CliError>(), Some(CliError::ConfirmationTimeout(_)));
                if timed_out {
                    warn!("vote {} on proposal {} still unconfirmed, keeping it marked", hash, proposal_id);
                } else {
                    // re-enable voting on this proposal so the user can retry
                    self.submitted.remove(&proposal_id);
                }
                Err(e)
            }
        }
    }

    /// Approve the DAO to spend the voting token.
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
    use crate::proposals::{Proposal, ProposalMetadata, Vote};
    use chrono::{DateTime, Utc};

    const ME: Address = Address::from_bytes([0x0a; 20]);
    const OTHER: Address = Address::from_bytes([0x0b; 20]);

    fn contracts() -> Contracts {
        Contracts {
            dao: Address::from_bytes([0xda; 20]),
            dao_token: Address::from_bytes([0xd7; 20]),
            payment_token: Address::from_bytes([0x97; 20]),
        }
    }

    fn controller() -> VotingController {
        VotingController::new(ME, contracts(), ConfirmationPolicy::default(), Duration::from_secs(10))
    }

    fn proposal(id: ProposalId) -> Proposal {
        Proposal {
            proposal_id: id,
            metadata: ProposalMetadata::default(),
            deadline: DateTime::<Utc>::from_timestamp(2_000_000_000, 0).unwrap(),
            minimum_votes: 1,
            proposed_donation_amount: 0,
            recipient: OTHER,
        }
    }

    fn gate_with(allowance: Amount) -> AllowanceGate {
        let mut gate = AllowanceGate::new(ME, contracts().dao_token, contracts().dao);
        gate.record(allowance);
        gate
    }

    fn request(id: ProposalId, amount: u64) -> VoteRequest {
        VoteRequest {
            proposal_id: id,
            amount,
            in_support: true,
        }
    }

    #[test]
    fn test_plan_dispatches_when_all_checks_pass() {
        let p = proposal(1);
        let view = ProposalView {
            proposal: &p,
            votes: vec![],
            lifecycle: Lifecycle::Active,
        };
        let plan = controller().plan(&view, &request(1, 3), &gate_with(9), Some(9)).unwrap();
        assert_eq!(
            plan,
            VotePlan::Dispatch {
                call: contracts().vote(ME, 1, 3, true),
                cost: 9
            }
        );
    }

    #[test]
    fn test_plan_rejects_zero_amount() {
        let p = proposal(1);
        let view = ProposalView {
            proposal: &p,
            votes: vec![],
            lifecycle: Lifecycle::Active,
        };
        let err = controller().plan(&view, &request(1, 0), &gate_with(100), Some(100)).unwrap_err();
        assert_eq!(err, CliError::InvalidVoteAmount(0));
    }

    #[test]
    fn test_plan_rejects_expired_proposal() {
        let p = proposal(1);
        let view = ProposalView {
            proposal: &p,
            votes: vec![],
            lifecycle: Lifecycle::Expired,
        };
        let err = controller().plan(&view, &request(1, 1), &gate_with(100), Some(100)).unwrap_err();
        assert_eq!(err, CliError::ProposalNotActive(1));
    }

    #[test]
    fn test_plan_rejects_prior_vote() {
        let p = proposal(7);
        let prior = Vote {
            proposal_id: 7,
            voter: ME,
            amount: 2,
            in_support: false,
        };
        let view = ProposalView {
            proposal: &p,
            votes: vec![&prior],
            lifecycle: Lifecycle::Active,
        };
        let err = controller().plan(&view, &request(7, 1), &gate_with(100), Some(100)).unwrap_err();
        assert_eq!(
            err,
            CliError::AlreadyVoted {
                proposal_id: 7,
                in_support: false
            }
        );
    }

    #[test]
    fn test_other_voters_do_not_block() {
        let p = proposal(7);
        let theirs = Vote {
            proposal_id: 7,
            voter: OTHER,
            amount: 2,
            in_support: true,
        };
        let view = ProposalView {
            proposal: &p,
            votes: vec![&theirs],
            lifecycle: Lifecycle::Active,
        };
        assert!(controller().plan(&view, &request(7, 1), &gate_with(1), Some(1)).is_ok());
    }

    #[test]
    fn test_plan_routes_short_allowance_to_gate() {
        let p = proposal(1);
        let view = ProposalView {
            proposal: &p,
            votes: vec![],
            lifecycle: Lifecycle::Active,
        };
        match controller().plan(&view, &request(1, 3), &gate_with(5), Some(100)).unwrap() {
            VotePlan::NeedsApproval(approval) => assert_eq!(approval.amount, amount::MAX_AMOUNT),
            other => panic!("expected approval, got {:?}", other),
        }
    }

    #[test]
    fn test_plan_rejects_short_balance() {
        let p = proposal(1);
        let view = ProposalView {
            proposal: &p,
            votes: vec![],
            lifecycle: Lifecycle::Active,
        };
        let err = controller().plan(&view, &request(1, 4), &gate_with(100), Some(15)).unwrap_err();
        assert_eq!(err, CliError::InsufficientBalance { need: 16, have: 15 });
        let err = controller().plan(&view, &request(1, 1), &gate_with(100), None).unwrap_err();
        assert_eq!(err, CliError::InsufficientBalance { need: 1, have: 0 });
    }

    #[test]
    fn test_plan_rejects_mismatched_request() {
        let p = proposal(4);
        let view = ProposalView {
            proposal: &p,
            votes: vec![],
            lifecycle: Lifecycle::Active,
        };
        let err = controller().plan(&view, &request(5, 1), &gate_with(100), Some(100)).unwrap_err();
        assert_eq!(err, CliError::ProposalNotFound(5));
    }

    #[test]
    fn test_local_vote_blocks_second_dispatch() {
        let p = proposal(3);
        let view = ProposalView {
            proposal: &p,
            votes: vec![],
            lifecycle: Lifecycle::Active,
        };
        let mut controller = controller();
        controller.submitted.insert(3);
        let err = controller.plan(&view, &request(3, 1), &gate_with(100), Some(100)).unwrap_err();
        assert_eq!(err, CliError::VoteInFlight(3));
    }
}
