use anyhow::Result;
use colored::Colorize;

use charity_dao_cli::amount;
use charity_dao_cli::donation::DonationOutcome;
use charity_dao_cli::CliError;

use super::{approve, connect, format_token, print_troubleshooting, spinner, CliSession};

/// Donate payment tokens to the DAO in exchange for voting tokens
pub async fn execute(amount: String, auto_approve: bool) -> Result<()> {
    let (_config, mut session) = connect().await?;

    println!("{}", "Donating to the DAO...".bright_cyan());
    println!("  Amount:  {} {}", amount.bright_yellow(), session.payment_token().symbol());
    println!(
        "  Balance: {}",
        format_token(session.payment_token(), session.payment_token().balance)
    );
    println!();

    let mut outcome = send_donation(&mut session, &amount).await?;
    if let DonationOutcome::NeedsApproval(_) = outcome {
        if !auto_approve {
            println!("{}", "The DAO is not allowed to spend your payment tokens yet".yellow());
            println!("  Run 'charity-dao-cli approve donation' first, or pass --approve");
            return Err(short_allowance(&session, &amount));
        }
        approve::grant_donation(&mut session).await?;
        outcome = send_donation(&mut session, &amount).await?;
    }

    match outcome {
        DonationOutcome::Confirmed { hash, .. } => {
            println!("{}", "✅ Donation confirmed, thank you!".bright_green());
            println!("  Transaction: {}", hash.to_string().bright_yellow());
        }
        DonationOutcome::NeedsApproval(_) => return Err(short_allowance(&session, &amount)),
    }

    // balances of both tokens changed
    session.drain_refresh().await;
    println!();
    println!(
        "  Payment token: {}",
        format_token(session.payment_token(), session.payment_token().balance).bright_green()
    );
    println!(
        "  DAO token:     {}",
        format_token(session.dao_token(), session.dao_token().balance).bright_green()
    );

    Ok(())
}

fn short_allowance(session: &CliSession, human: &str) -> anyhow::Error {
    let need = session
        .payment_token()
        .decimals()
        .and_then(|d| amount::scaled_amount(human, d).ok())
        .unwrap_or(0);
    CliError::InsufficientAllowance {
        need,
        have: session.donation_gate().granted().unwrap_or(0),
    }
    .into()
}

async fn send_donation(session: &mut CliSession, amount: &str) -> Result<DonationOutcome> {
    let pb = spinner("Waiting for confirmations...");
    let result = session.donate(amount).await;
    pb.finish_and_clear();

    if let Err(e) = &result {
        println!("{}", "❌ Donation failed".bright_red());
        println!("  Error: {}", e);
        print_troubleshooting(e);
    }
    result
}
