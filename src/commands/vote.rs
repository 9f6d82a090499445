use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use std::time::Duration;

use charity_dao_cli::amount;
use charity_dao_cli::eligibility::Tally;
use charity_dao_cli::proposals::ProposalId;
use charity_dao_cli::voting::{VoteOutcome, VoteRequest};
use charity_dao_cli::CliError;

use super::{approve, connect, format_token, print_troubleshooting, spinner};

/// Cast a quadratic vote on an active proposal
pub async fn execute(proposal_id: ProposalId, votes: u64, in_support: bool, auto_approve: bool) -> Result<()> {
    // reject before touching the network
    let cost = amount::vote_cost(votes)?;

    let (config, mut session) = connect().await?;
    let request = VoteRequest {
        proposal_id,
        amount: votes,
        in_support,
    };

    println!("{}", "Casting vote...".bright_cyan());
    println!("  Proposal: #{}", proposal_id.to_string().bright_yellow());
    println!("  Side:     {}", if in_support { "YES".green() } else { "NO".red() });
    println!("  Votes:    {}", votes);
    println!("  Cost:     {}", format_token(session.dao_token(), Some(cost)).bright_yellow());
    println!();

    let mut outcome = send_vote(&mut session, request).await?;

    if let VoteOutcome::NeedsApproval(_) = outcome {
        if !auto_approve {
            println!("{}", "The DAO is not allowed to spend your voting tokens yet".yellow());
            println!("  Run 'charity-dao-cli approve voting' first, or pass --approve");
            return Err(CliError::InsufficientAllowance {
                need: cost,
                have: session.vote_gate().granted().unwrap_or(0),
            }
            .into());
        }
        approve::grant_voting(&mut session).await?;
        outcome = send_vote(&mut session, request).await?;
    }

    match outcome {
        VoteOutcome::Confirmed { hash, confirmations } => {
            println!("{}", "✅ Vote confirmed!".bright_green());
            println!("  Transaction:   {}", hash.to_string().bright_yellow());
            println!("  Confirmations: {}", confirmations);
        }
        VoteOutcome::NeedsApproval(_) => {
            return Err(CliError::InsufficientAllowance {
                need: cost,
                have: session.vote_gate().granted().unwrap_or(0),
            }
            .into());
        }
    }

    println!();
    let pb = spinner("Waiting for the indexer to pick up the vote...");
    let refreshed = session.await_refresh(config.refetch_delay() + Duration::from_secs(5)).await;
    pb.finish_and_clear();

    if refreshed.is_some() {
        if let Some(view) = session.proposals(Utc::now()).find(proposal_id) {
            let tally = Tally::of(view.votes.iter().copied());
            println!(
                "  Current tally: {} YES / {} NO",
                tally.yes.to_string().green(),
                tally.no.to_string().red()
            );
        }
    }

    Ok(())
}

async fn send_vote(session: &mut super::CliSession, request: VoteRequest) -> Result<VoteOutcome> {
    let pb = spinner("Waiting for confirmations...");
    let result = session.cast_vote(request, Utc::now()).await;
    pb.finish_and_clear();

    if let Err(e) = &result {
        println!("{}", "❌ Vote failed".bright_red());
        println!("  Error: {}", e);
        print_troubleshooting(e);
    }
    result
}
