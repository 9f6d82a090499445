//! Client-side engine for a charity DAO: quadratic voting on funding
//! proposals, donations that mint governance tokens, and execution of
//! proposals that passed.

pub mod abi;
pub mod allowance;
pub mod amount;
pub mod config;
pub mod contracts;
pub mod donation;
pub mod eligibility;
pub mod errors;
pub mod feed;
pub mod proposals;
pub mod refresh;
pub mod rpc;
pub mod session;
pub mod voting;
pub mod watcher;

pub use contracts::{Address, ChainClient, Contracts, TxHash};
pub use errors::CliError;
pub use session::Session;
