use std::fmt;

use crate::contracts::{Address, ContractCall, Contracts};
use crate::proposals::{Lifecycle, ProposalView, Vote};

/// Count of YES and NO vote records. Weights are not summed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tally {
    pub yes: usize,
    pub no: usize,
}

impl Tally {
    pub fn of<'a>(votes: impl IntoIterator<Item = &'a Vote>) -> Self {
        votes.into_iter().fold(Tally::default(), |mut tally, vote| {
            if vote.in_support {
                tally.yes += 1;
            } else {
                tally.no += 1;
            }
            tally
        })
    }

    pub fn total(&self) -> usize {
        self.yes + self.no
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    StillActive,
    AlreadyExecuted,
    QuorumNotMet { votes: usize, required: u64 },
    MajorityNotReached { yes: usize, no: usize },
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible)
    }
}

impl fmt::Display for Eligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Eligibility::Eligible => write!(f, "passed voting and can be executed"),
            Eligibility::StillActive => write!(f, "voting is still open"),
            Eligibility::AlreadyExecuted => write!(f, "already executed"),
            Eligibility::QuorumNotMet { votes, required } => {
                write!(f, "quorum not met ({} of {} votes)", votes, required)
            }
            Eligibility::MajorityNotReached { yes, no } => {
                write!(f, "no majority ({} YES vs {} NO)", yes, no)
            }
        }
    }
}

/// Recomputed from the current votes on every call.
pub fn evaluate(view: &ProposalView<'_>) -> Eligibility {
    match view.lifecycle {
        Lifecycle::Active => return Eligibility::StillActive,
        Lifecycle::Executed => return Eligibility::AlreadyExecuted,
        Lifecycle::Expired => {}
    }

    let tally = Tally::of(view.votes.iter().copied());
    let quorum_met = u64::try_from(tally.total()).map_or(true, |n| n >= view.proposal.minimum_votes);
    if !quorum_met {
        return Eligibility::QuorumNotMet {
            votes: tally.total(),
            required: view.proposal.minimum_votes,
        };
    }
    if tally.yes <= tally.no {
        return Eligibility::MajorityNotReached {
            yes: tally.yes,
            no: tally.no,
        };
    }
    Eligibility::Eligible
}

/// The `executeProposal` call, only when the proposal is eligible.
pub fn prepare_execution(view: &ProposalView<'_>, contracts: &Contracts, from: Address) -> Option<ContractCall> {
    evaluate(view)
        .is_eligible()
        .then(|| contracts.execute_proposal(from, view.proposal.proposal_id))
}
