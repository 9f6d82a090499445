use thiserror::Error;

use crate::amount::Amount;
use crate::proposals::ProposalId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CliError {
    #[error("No account configured. Run 'charity-dao-cli config set-account <ADDRESS>' first")]
    AccountNotConfigured,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Vote amount must be at least 1, got {0}")]
    InvalidVoteAmount(u64),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Proposal {0} not found in the event feed")]
    ProposalNotFound(ProposalId),

    #[error("Proposal {0} is no longer accepting votes")]
    ProposalNotActive(ProposalId),

    #[error("You already voted {} on proposal {proposal_id}", yes_no(.in_support))]
    AlreadyVoted {
        proposal_id: ProposalId,
        in_support: bool,
    },

    #[error("A vote on proposal {0} is already in flight")]
    VoteInFlight(ProposalId),

    #[error("Insufficient allowance: need {need}, have {have}")]
    InsufficientAllowance { need: Amount, have: Amount },

    #[error("Insufficient balance: need {need}, have {have}")]
    InsufficientBalance { need: Amount, have: Amount },

    #[error("Proposal {proposal_id} cannot be executed: {reason}")]
    NotExecutable {
        proposal_id: ProposalId,
        reason: String,
    },

    #[error("Action unavailable: {0}")]
    PrepareFailure(String),

    #[error("Transaction failed: {0}")]
    TransactionFailure(String),

    #[error("Transaction not confirmed in time, it may still be mined: {0}")]
    ConfirmationTimeout(String),

    #[error("Failed to load events: {0}")]
    FeedError(String),

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

fn yes_no(in_support: &bool) -> &'static str {
    if *in_support {
        "YES"
    } else {
        "NO"
    }
}

impl CliError {
    /// Local precondition failures. Nothing was dispatched.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CliError::InvalidVoteAmount(_)
                | CliError::InvalidAmount(_)
                | CliError::ProposalNotFound(_)
                | CliError::ProposalNotActive(_)
                | CliError::AlreadyVoted { .. }
                | CliError::VoteInFlight(_)
                | CliError::InsufficientAllowance { .. }
                | CliError::InsufficientBalance { .. }
                | CliError::NotExecutable { .. }
                | CliError::InvalidAddress(_)
                | CliError::AccountNotConfigured
        )
    }
}
