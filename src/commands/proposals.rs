use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use std::time::Duration;

use charity_dao_cli::amount;
use charity_dao_cli::eligibility::{self, Tally};
use charity_dao_cli::proposals::{Lifecycle, ProposalView};
use charity_dao_cli::Address;

use super::{connect, print_header, CliSession};

/// List proposals by lifecycle. With `watch`, re-poll the feed every `watch` seconds.
pub async fn execute(watch: Option<u64>) -> Result<()> {
    let (_config, mut session) = connect().await?;

    render(&session);

    if let Some(secs) = watch {
        let interval = Duration::from_secs(secs.max(1));
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                _ = tokio::time::sleep(interval) => {}
            }
            session.resync_feed().await;
            println!();
            render(&session);
        }
    }

    Ok(())
}

fn render(session: &CliSession) {
    let now = Utc::now();
    let board = session.board();

    print_header(&format!("Charity DAO Proposals ({})", now.format("%H:%M:%S UTC")));

    if let Some(error) = board.last_error() {
        println!("{}", format!("⚠ Failed to load events: {}", error).bright_red());
        if board.is_stale() {
            println!("{}", "  Showing the last data that loaded successfully".dimmed());
        }
        println!();
    }
    if board.feed().is_none() {
        println!("{}", "No proposal data available".yellow());
        return;
    }

    let buckets = session.proposals(now);
    let me = session.account();
    let decimals = session.payment_token().decimals();
    let symbol = session.payment_token().symbol().to_string();

    for (title, views) in [
        ("Active", &buckets.active),
        ("Expired", &buckets.expired),
        ("Executed", &buckets.executed),
    ] {
        println!("{}", format!("═══ {} ({}) ═══", title, views.len()).bright_cyan());
        if views.is_empty() {
            println!("  {}", "None".dimmed());
        }
        for view in views.iter() {
            print_proposal(view, me, decimals, &symbol, session.voting().has_local_vote(view.proposal.proposal_id));
        }
        println!();
    }
}

fn print_proposal(view: &ProposalView<'_>, me: Address, decimals: Option<u8>, symbol: &str, local_vote: bool) {
    let p = view.proposal;
    let tally = Tally::of(view.votes.iter().copied());

    let title = if p.metadata.title.is_empty() {
        "(untitled)".to_string()
    } else {
        p.metadata.title.clone()
    };
    println!("  #{} {}", p.proposal_id.to_string().bright_yellow(), title.bold());
    if !p.metadata.description.is_empty() {
        println!("     {}", p.metadata.description.dimmed());
    }

    let requested = match decimals {
        Some(d) => format!("{} {}", amount::format_units(p.proposed_donation_amount, d), symbol),
        None => format!("{} base units", p.proposed_donation_amount),
    };
    println!("     Requested: {} → {}", requested, p.recipient);
    println!("     Deadline:  {}", p.deadline.format("%Y-%m-%d %H:%M UTC"));
    println!(
        "     Votes:     {} YES / {} NO (quorum {})",
        tally.yes.to_string().green(),
        tally.no.to_string().red(),
        p.minimum_votes
    );

    match view.vote_by(me) {
        Some(mine) => {
            let side = if mine.in_support { "YES".green() } else { "NO".red() };
            println!("     Your vote: {} with {} votes", side, mine.amount);
        }
        None if local_vote => println!("     Your vote: {}", "submitted, waiting for the indexer".yellow()),
        None => {}
    }

    match view.lifecycle {
        Lifecycle::Active => {
            if view.vote_by(me).is_none() && !local_vote {
                println!("     {}", format!("Vote: charity-dao-cli vote {} --amount N --yes|--no", p.proposal_id).dimmed());
            }
        }
        Lifecycle::Expired => {
            let verdict = eligibility::evaluate(view);
            if verdict.is_eligible() {
                println!("     {} {}", "✓".bright_green(), format!("Ready: charity-dao-cli execute {}", p.proposal_id).bright_green());
            } else {
                println!("     {}", format!("Not executable: {}", verdict).dimmed());
            }
        }
        Lifecycle::Executed => println!("     {}", "Funds released".bright_green()),
    }
}
