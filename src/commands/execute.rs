use anyhow::Result;
use chrono::Utc;
use colored::Colorize;

use charity_dao_cli::proposals::ProposalId;

use super::{connect, print_troubleshooting, spinner};

/// Release the funds of a proposal that passed voting
pub async fn execute(proposal_id: ProposalId) -> Result<()> {
    let (_config, mut session) = connect().await?;

    println!("{}", format!("Executing proposal #{}...", proposal_id).bright_cyan());
    let verdict = session.eligibility(proposal_id, Utc::now())?;
    println!("  Status: {}", verdict);
    println!();

    let pb = spinner("Waiting for confirmation...");
    let result = session.execute_proposal(proposal_id, Utc::now()).await;
    pb.finish_and_clear();

    match result {
        Ok(hash) => {
            println!("{}", "✅ Proposal executed, funds released to the recipient".bright_green());
            println!("  Transaction: {}", hash.to_string().bright_yellow());
            session.drain_refresh().await;
            Ok(())
        }
        Err(e) => {
            println!("{}", "❌ Execution failed".bright_red());
            println!("  Error: {}", e);
            print_troubleshooting(&e);
            Err(e)
        }
    }
}
