mod commands;

use anyhow::Result;
use clap::{ArgGroup, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use charity_dao_cli::config;
use charity_dao_cli::proposals::ProposalId;
use commands::approve::ApprovalTarget;

#[derive(Parser)]
#[command(name = "charity-dao-cli")]
#[command(author = "Charity DAO Team")]
#[command(version = "0.1.0")]
#[command(about = "Donate to the Charity DAO, vote on proposals and release funds", long_about = None)]
struct Cli {
    /// Log engine activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show balances, allowances and proposal counts
    Status,

    /// List proposals grouped as active, expired and executed
    Proposals {
        /// Re-poll the event feed every SECS seconds until interrupted
        #[arg(long, value_name = "SECS")]
        watch: Option<u64>,
    },

    /// Vote on an active proposal (costs amount² voting tokens)
    #[command(group(ArgGroup::new("side").required(true).args(["yes", "no"])))]
    Vote {
        /// Proposal ID
        proposal_id: ProposalId,

        /// Number of votes to cast
        #[arg(long)]
        amount: u64,

        /// Vote in support
        #[arg(long)]
        yes: bool,

        /// Vote against
        #[arg(long)]
        no: bool,

        /// Grant the DAO an allowance first if needed
        #[arg(long)]
        approve: bool,
    },

    /// Allow the DAO to spend your tokens
    Approve {
        #[arg(value_enum)]
        target: ApprovalTarget,
    },

    /// Donate payment tokens and receive voting tokens
    Donate {
        /// Amount in whole payment tokens (e.g. "12.5")
        amount: String,

        /// Grant the DAO an allowance first if needed
        #[arg(long)]
        approve: bool,
    },

    /// Execute a proposal that passed voting
    Execute {
        /// Proposal ID
        proposal_id: ProposalId,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Set the account used for reads and transactions
    SetAccount {
        /// 0x-prefixed address
        address: String,
    },

    /// Set the JSON-RPC endpoint
    SetRpc {
        url: String,
    },

    /// Set the event feed URL
    SetFeed {
        url: String,
    },

    /// Set the deployed contract addresses
    SetContracts {
        #[arg(long)]
        dao: String,

        #[arg(long)]
        dao_token: String,

        #[arg(long)]
        payment_token: String,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "charity_dao_cli=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Status => {
            commands::status::execute().await?;
        }
        Commands::Proposals { watch } => {
            commands::proposals::execute(watch).await?;
        }
        Commands::Vote {
            proposal_id,
            amount,
            yes,
            no: _,
            approve,
        } => {
            commands::vote::execute(proposal_id, amount, yes, approve).await?;
        }
        Commands::Approve { target } => {
            commands::approve::execute(target).await?;
        }
        Commands::Donate { amount, approve } => {
            commands::donate::execute(amount, approve).await?;
        }
        Commands::Execute { proposal_id } => {
            commands::execute::execute(proposal_id).await?;
        }
        Commands::Config { action } => match action {
            ConfigCommands::Show => config::show()?,
            ConfigCommands::SetAccount { address } => config::set_account(&address)?,
            ConfigCommands::SetRpc { url } => config::set_rpc(&url)?,
            ConfigCommands::SetFeed { url } => config::set_feed(&url)?,
            ConfigCommands::SetContracts {
                dao,
                dao_token,
                payment_token,
            } => config::set_contracts(&dao, &dao_token, &payment_token)?,
        },
    }

    Ok(())
}
