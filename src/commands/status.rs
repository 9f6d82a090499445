use anyhow::Result;
use colored::Colorize;

use super::{connect, format_allowance, format_token, print_header};

/// Show balances, allowances and how many proposals are open
pub async fn execute() -> Result<()> {
    let (config, session) = connect().await?;

    print_header("Charity DAO Account Status");
    println!("  Account: {}", session.account().to_string().bright_yellow());
    println!("  DAO:     {}", session.contracts().dao);
    println!("  RPC:     {}", config.rpc_url.dimmed());
    println!();

    let payment = session.payment_token();
    let dao = session.dao_token();

    println!("{}", "═══ Balances ═══".bright_cyan());
    println!("  Payment token: {}", format_token(payment, payment.balance).bright_green());
    println!("  DAO token:     {}", format_token(dao, dao.balance).bright_green());
    println!();

    println!("{}", "═══ Allowances granted to the DAO ═══".bright_cyan());
    println!(
        "  For voting:    {}",
        format_allowance(dao, session.vote_gate().granted())
    );
    println!(
        "  For donations: {}",
        format_allowance(payment, session.donation_gate().granted())
    );
    println!();

    println!("{}", "═══ Proposals ═══".bright_cyan());
    let board = session.board();
    if let Some(error) = board.last_error() {
        println!("  {}", format!("Failed to load events: {}", error).bright_red());
    }
    let buckets = session.proposals(chrono::Utc::now());
    if board.feed().is_some() {
        println!("  Active:   {}", buckets.active.len().to_string().bright_green());
        println!("  Expired:  {}", buckets.expired.len());
        println!("  Executed: {}", buckets.executed.len());
    }
    println!();
    println!("{}", "Use 'charity-dao-cli proposals' to browse and vote".dimmed());

    Ok(())
}
