pub mod approve;
pub mod donate;
pub mod execute;
pub mod proposals;
pub mod status;
pub mod vote;

use anyhow::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use charity_dao_cli::amount::{self, Amount};
use charity_dao_cli::config::Config;
use charity_dao_cli::feed::HttpFeed;
use charity_dao_cli::rpc::RpcClient;
use charity_dao_cli::session::TokenState;
use charity_dao_cli::{CliError, Session};

pub type CliSession = Session<RpcClient, HttpFeed>;

/// Load config and build a session with chain and feed state already read.
pub async fn connect() -> Result<(Config, CliSession)> {
    let config = Config::load()?;
    let mut session = Session::new(RpcClient::new(&config.rpc_url), HttpFeed::new(&config.feed_url), &config)?;

    let pb = spinner("Loading chain state and events...");
    session.reload().await;
    pb.finish_and_clear();

    Ok((config, session))
}

pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Human amount for a token, or "unknown" when the read failed.
pub fn format_token(state: &TokenState, value: Option<Amount>) -> String {
    match (value, state.decimals()) {
        (Some(v), Some(decimals)) => format!("{} {}", amount::format_units(v, decimals), state.symbol()),
        _ => "unknown".to_string(),
    }
}

pub fn format_allowance(state: &TokenState, value: Option<Amount>) -> String {
    match value {
        Some(amount::MAX_AMOUNT) => "unlimited".to_string(),
        _ => format_token(state, value),
    }
}

pub fn print_header(title: &str) {
    println!("{}", "═══════════════════════════════════════════════════".bright_cyan());
    println!("{}", format!("        {}", title).bright_cyan().bold());
    println!("{}", "═══════════════════════════════════════════════════".bright_cyan());
    println!();
}

/// Hints for failures that are not the user's input.
pub fn print_troubleshooting(error: &anyhow::Error) {
    let is_input = error.downcast_ref::<CliError>().is_some_and(CliError::is_validation);
    if is_input {
        return;
    }
    println!();
    println!("{}", "Troubleshooting:".bright_yellow());
    println!("  • Check the RPC endpoint is reachable: charity-dao-cli config show");
    println!("  • Ensure the connected wallet can sign for your account");
    println!("  • Ensure the account holds native currency for gas");
}
