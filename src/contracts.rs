use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::abi::{self, Token};
use crate::amount::Amount;
use crate::errors::CliError;
use crate::proposals::ProposalId;

// =============================================================================
// PRIMITIVES
// =============================================================================

/// 20-byte account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address([u8; 20]);

impl Address {
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl FromStr for Address {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = decode_fixed::<20>(s).ok_or_else(|| CliError::InvalidAddress(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Hash of a submitted transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHash([u8; 32]);

impl TxHash {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl FromStr for TxHash {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<32>(s)
            .map(Self)
            .ok_or_else(|| CliError::RpcError(format!("invalid transaction hash: {}", s)))
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", self)
    }
}

fn decode_fixed<const N: usize>(s: &str) -> Option<[u8; N]> {
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    let bytes = hex::decode(digits).ok()?;
    bytes.try_into().ok()
}

// =============================================================================
// CONTRACT CALLS
// =============================================================================

/// Addresses of the deployed contracts the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Contracts {
    pub dao: Address,
    pub dao_token: Address,
    pub payment_token: Address,
}

/// State-changing functions the client can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaoFunction {
    Approve { spender: Address, amount: Amount },
    Donate { amount: Amount },
    Vote {
        proposal_id: ProposalId,
        amount: u64,
        in_support: bool,
    },
    ExecuteProposal { proposal_id: ProposalId },
}

impl DaoFunction {
    pub fn name(&self) -> &'static str {
        match self {
            DaoFunction::Approve { .. } => "approve",
            DaoFunction::Donate { .. } => "donate",
            DaoFunction::Vote { .. } => "vote",
            DaoFunction::ExecuteProposal { .. } => "executeProposal",
        }
    }

    pub fn calldata(&self) -> Vec<u8> {
        match *self {
            DaoFunction::Approve { spender, amount } => {
                abi::encode_call(abi::APPROVE, &[Token::Address(spender), Token::Uint(amount)])
            }
            DaoFunction::Donate { amount } => abi::encode_call(abi::DONATE, &[Token::Uint(amount)]),
            DaoFunction::Vote {
                proposal_id,
                amount,
                in_support,
            } => abi::encode_call(
                abi::VOTE,
                &[
                    Token::Uint(Amount::from(proposal_id)),
                    Token::Uint(Amount::from(amount)),
                    Token::Bool(in_support),
                ],
            ),
            DaoFunction::ExecuteProposal { proposal_id } => {
                abi::encode_call(abi::EXECUTE_PROPOSAL, &[Token::Uint(Amount::from(proposal_id))])
            }
        }
    }
}

/// A write bound to its target contract and sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractCall {
    pub from: Address,
    pub to: Address,
    pub function: DaoFunction,
}

impl Contracts {
    pub fn donate(&self, from: Address, amount: Amount) -> ContractCall {
        ContractCall {
            from,
            to: self.dao,
            function: DaoFunction::Donate { amount },
        }
    }

    pub fn vote(&self, from: Address, proposal_id: ProposalId, amount: u64, in_support: bool) -> ContractCall {
        ContractCall {
            from,
            to: self.dao,
            function: DaoFunction::Vote {
                proposal_id,
                amount,
                in_support,
            },
        }
    }

    pub fn execute_proposal(&self, from: Address, proposal_id: ProposalId) -> ContractCall {
        ContractCall {
            from,
            to: self.dao,
            function: DaoFunction::ExecuteProposal { proposal_id },
        }
    }
}

/// A call whose simulation succeeded and which may be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCall {
    pub call: ContractCall,
    pub gas: Option<u64>,
}

// =============================================================================
// CHAIN COLLABORATOR
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
}

/// What the chain currently knows about a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptStatus {
    /// Known to the network but not yet in a block.
    Pending,
    /// Included and successful, with this many confirmations (1 = its own block).
    Included { confirmations: u64 },
    /// Included but reverted.
    Reverted,
    /// No longer known to the network.
    Dropped,
}

/// Reads and writes against the ledger. Signing belongs to the connected wallet.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn token_info(&self, token: Address) -> Result<TokenInfo>;

    async fn balance_of(&self, token: Address, owner: Address) -> Result<Amount>;

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<Amount>;

    /// Simulate the call. Failure means the action is unavailable.
    async fn prepare(&self, call: &ContractCall) -> Result<PreparedCall>;

    async fn send(&self, prepared: &PreparedCall) -> Result<TxHash>;

    async fn receipt_status(&self, hash: &TxHash) -> Result<ReceiptStatus>;
}
