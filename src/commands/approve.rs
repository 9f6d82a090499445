use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;

use charity_dao_cli::TxHash;

use super::{connect, format_allowance, print_troubleshooting, spinner, CliSession};

/// Which spending permission to grant the DAO
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ApprovalTarget {
    /// DAO token, spent when voting
    Voting,
    /// Payment token, spent when donating
    Donation,
}

pub async fn execute(target: ApprovalTarget) -> Result<()> {
    let (_config, mut session) = connect().await?;
    match target {
        ApprovalTarget::Voting => grant_voting(&mut session).await?,
        ApprovalTarget::Donation => grant_donation(&mut session).await?,
    };
    Ok(())
}

pub async fn grant_voting(session: &mut CliSession) -> Result<TxHash> {
    println!("{}", "Approving the DAO to spend your voting tokens...".bright_cyan());
    let pb = spinner("Waiting for confirmation...");
    let result = session.approve_voting().await;
    pb.finish_and_clear();
    let hash = report(result)?;

    session.drain_refresh().await;
    println!(
        "  Allowance now: {}",
        format_allowance(session.dao_token(), session.vote_gate().granted())
    );
    println!();
    Ok(hash)
}

pub async fn grant_donation(session: &mut CliSession) -> Result<TxHash> {
    println!("{}", "Approving the DAO to spend your payment tokens...".bright_cyan());
    let pb = spinner("Waiting for confirmation...");
    let result = session.approve_donation().await;
    pb.finish_and_clear();
    let hash = report(result)?;

    session.drain_refresh().await;
    println!(
        "  Allowance now: {}",
        format_allowance(session.payment_token(), session.donation_gate().granted())
    );
    println!();
    Ok(hash)
}

fn report(result: Result<TxHash>) -> Result<TxHash> {
    match result {
        Ok(hash) => {
            println!("{}", "✅ Approval confirmed".bright_green());
            println!("  Transaction: {}", hash.to_string().bright_yellow());
            Ok(hash)
        }
        Err(e) => {
            println!("{}", "❌ Approval failed".bright_red());
            println!("  Error: {}", e);
            print_troubleshooting(&e);
            Err(e)
        }
    }
}
