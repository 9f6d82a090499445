//! One connected account's view of the DAO.
//!
//! The session owns every piece of cached state (token metadata, balances,
//! allowances, the proposal board) and the receiving end of the refresh
//! channel. Transaction completion effects only ever send on that channel;
//! the session applies the requested refresh when the caller drains it.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::allowance::AllowanceGate;
use crate::amount::Amount;
use crate::config::Config;
use crate::contracts::{Address, ChainClient, Contracts, TokenInfo, TxHash};
use crate::donation::{DonationController, DonationOutcome};
use crate::eligibility::{self, Eligibility};
use crate::errors::CliError;
use crate::feed::{FeedSource, ProposalBoard};
use crate::proposals::{Classification, ProposalId};
use crate::refresh::{RefreshRequest, Refresher};
use crate::voting::{VoteOutcome, VoteRequest, VotingController};
use crate::watcher::{self, ConfirmationPolicy, TransactionWatcher, WatchOptions};

/// Balance and metadata of one token for the session's account.
#[derive(Debug, Clone, Default)]
pub struct TokenState {
    pub info: Option<TokenInfo>,
    pub balance: Option<Amount>,
}

impl TokenState {
    pub fn decimals(&self) -> Option<u8> {
        self.info.as_ref().map(|i| i.decimals)
    }

    pub fn symbol(&self) -> &str {
        self.info.as_ref().map(|i| i.symbol.as_str()).unwrap_or("?")
    }
}

pub struct Session<C, F> {
    chain: C,
    feed: F,
    account: Address,
    contracts: Contracts,
    policy: ConfirmationPolicy,
    options: WatchOptions,

    dao_token: TokenState,
    payment_token: TokenState,
    vote_gate: AllowanceGate,
    donation_gate: AllowanceGate,
    board: ProposalBoard,

    voting: VotingController,
    donation: DonationController,
    refresher: Refresher,
    refresh_rx: UnboundedReceiver<RefreshRequest>,
}

fn logged<T>(what: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Failed to read {}: {:#}", what, e);
            None
        }
    }
}

impl<C: ChainClient, F: FeedSource> Session<C, F> {
    /// Build a session for the configured account. Nothing is read until
    /// [`reload`](Self::reload).
    pub fn new(chain: C, feed: F, config: &Config) -> Result<Self> {
        let account = config.account()?;
        let contracts = config.require_contracts()?;
        let policy = config.confirmations;
        let (refresher, refresh_rx) = Refresher::channel();

        Ok(Self {
            chain,
            feed,
            account,
            contracts,
            policy,
            options: config.watch_options(),
            dao_token: TokenState::default(),
            payment_token: TokenState::default(),
            vote_gate: AllowanceGate::new(account, contracts.dao_token, contracts.dao),
            donation_gate: AllowanceGate::new(account, contracts.payment_token, contracts.dao),
            board: ProposalBoard::new(),
            voting: VotingController::new(account, contracts, policy, config.refetch_delay()),
            donation: DonationController::new(account, contracts, policy),
            refresher,
            refresh_rx,
        })
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn contracts(&self) -> &Contracts {
        &self.contracts
    }

    pub fn dao_token(&self) -> &TokenState {
        &self.dao_token
    }

    pub fn payment_token(&self) -> &TokenState {
        &self.payment_token
    }

    pub fn vote_gate(&self) -> &AllowanceGate {
        &self.vote_gate
    }

    pub fn donation_gate(&self) -> &AllowanceGate {
        &self.donation_gate
    }

    pub fn board(&self) -> &ProposalBoard {
        &self.board
    }

    pub fn voting(&self) -> &VotingController {
        &self.voting
    }

    // ===== LOADING =====

    /// Re-read token metadata, balances, both allowances and the feed.
    ///
    /// Individual read failures leave the value unknown, which every gate
    /// treats as insufficient.
    pub async fn reload(&mut self) {
        self.reload_chain().await;
        self.resync_feed().await;
    }

    async fn reload_chain(&mut self) {
        let account = self.account;
        for (state, token) in [
            (&mut self.dao_token, self.contracts.dao_token),
            (&mut self.payment_token, self.contracts.payment_token),
        ] {
            state.info = logged("token metadata", self.chain.token_info(token).await);
            state.balance = logged("token balance", self.chain.balance_of(token, account).await);
        }

        for gate in [&mut self.vote_gate, &mut self.donation_gate] {
            if let Err(e) = gate.refresh(&self.chain).await {
                warn!("Failed to read allowance on {}: {:#}", gate.token(), e);
                gate.invalidate();
            }
        }
        debug!("chain state reloaded for {}", account);
    }

    pub async fn resync_feed(&mut self) {
        self.board.load(&self.feed).await;
    }

    pub fn proposals(&self, now: DateTime<Utc>) -> Classification<'_> {
        self.board.classify(now)
    }

    // ===== REFRESH CHANNEL =====

    pub async fn apply_refresh(&mut self, request: RefreshRequest) {
        info!("applying refresh: {:?}", request);
        match request {
            RefreshRequest::ReloadState => self.reload().await,
            RefreshRequest::RefetchFeed => self.resync_feed().await,
        }
    }

    /// Apply every refresh already queued. Returns how many were applied.
    pub async fn drain_refresh(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(request) = self.refresh_rx.try_recv() {
            self.apply_refresh(request).await;
            applied += 1;
        }
        applied
    }

    /// Wait up to `timeout` for the next refresh request and apply it.
    pub async fn await_refresh(&mut self, timeout: Duration) -> Option<RefreshRequest> {
        match tokio::time::timeout(timeout, self.refresh_rx.recv()).await {
            Ok(Some(request)) => {
                self.apply_refresh(request).await;
                Some(request)
            }
            _ => None,
        }
    }

    // ===== ACTIONS =====

    /// Cast a vote on a proposal from the current board.
    ///
    /// A short allowance comes back as [`VoteOutcome::NeedsApproval`] with
    /// nothing dispatched.
    pub async fn cast_vote(&mut self, request: VoteRequest, now: DateTime<Utc>) -> Result<VoteOutcome> {
        let classification = self.board.classify(now);
        let view = classification
            .find(request.proposal_id)
            .ok_or(CliError::ProposalNotFound(request.proposal_id))?;

        self.voting
            .cast_vote(
                &self.chain,
                view,
                &request,
                &self.vote_gate,
                self.dao_token.balance,
                &self.options,
                &self.refresher,
            )
            .await
    }

    pub async fn approve_voting(&mut self) -> Result<TxHash> {
        self.voting
            .set_allowance(&self.chain, &mut self.vote_gate, &self.options, &self.refresher)
            .await
    }

    pub async fn approve_donation(&mut self) -> Result<TxHash> {
        self.donation
            .set_allowance(&self.chain, &mut self.donation_gate, &self.options, &self.refresher)
            .await
    }

    /// Donate `human` whole payment tokens.
    pub async fn donate(&mut self, human: &str) -> Result<DonationOutcome> {
        let decimals = self
            .payment_token
            .decimals()
            .ok_or_else(|| CliError::RpcError("payment token metadata unavailable".into()))?;

        self.donation
            .donate(
                &self.chain,
                human,
                decimals,
                &self.donation_gate,
                self.payment_token.balance,
                &self.options,
                &self.refresher,
            )
            .await
    }

    pub fn eligibility(&self, proposal_id: ProposalId, now: DateTime<Utc>) -> Result<Eligibility, CliError> {
        let classification = self.board.classify(now);
        let view = classification
            .find(proposal_id)
            .ok_or(CliError::ProposalNotFound(proposal_id))?;
        Ok(eligibility::evaluate(view))
    }

    /// Execute a proposal that passed voting. Anyone may trigger this.
    pub async fn execute_proposal(&mut self, proposal_id: ProposalId, now: DateTime<Utc>) -> Result<TxHash> {
        let call = {
            let classification = self.board.classify(now);
            let view = classification
                .find(proposal_id)
                .ok_or(CliError::ProposalNotFound(proposal_id))?;
            match eligibility::prepare_execution(view, &self.contracts, self.account) {
                Some(call) => call,
                None => {
                    return Err(CliError::NotExecutable {
                        proposal_id,
                        reason: eligibility::evaluate(view).to_string(),
                    }
                    .into())
                }
            }
        };

        let prepared = self.chain.prepare(&call).await?;
        let hash = self.chain.send(&prepared).await?;
        info!("execution {} submitted for proposal {}", hash, proposal_id);

        let refresher = self.refresher.clone();
        let mut tx_watcher =
            TransactionWatcher::new(hash, self.policy.execution).on_complete(move || refresher.request_reload());
        watcher::watch(&self.chain, &mut tx_watcher, &self.options).await?;
        Ok(hash)
    }
}
