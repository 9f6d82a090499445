use anyhow::{Context, Result};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::contracts::{Address, Contracts};
use crate::errors::CliError;
use crate::feed::DEFAULT_FEED_URL;
use crate::watcher::{ConfirmationPolicy, WatchOptions};

/// Configuration for the Charity DAO CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rpc_url: String,
    pub feed_url: String,
    pub account: Option<Address>,
    pub contracts: Contracts,
    pub confirmations: ConfirmationPolicy,
    pub refetch_delay_secs: u64,
    pub poll_interval_ms: u64,
    pub confirmation_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            feed_url: DEFAULT_FEED_URL.to_string(),
            account: None,
            contracts: Contracts::default(),
            confirmations: ConfirmationPolicy::default(),
            refetch_delay_secs: 10,
            poll_interval_ms: 2_000,
            confirmation_timeout_secs: 300,
        }
    }
}

impl Config {
    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| CliError::ConfigError("Cannot find config directory".into()))?;
        Ok(config_dir.join("charity-dao-cli").join("config.toml"))
    }

    /// Load config, creating the default file on first use
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;
        Ok(())
    }

    /// The configured account, or an error telling the user how to set one.
    pub fn account(&self) -> Result<Address, CliError> {
        self.account.ok_or(CliError::AccountNotConfigured)
    }

    pub fn refetch_delay(&self) -> Duration {
        Duration::from_secs(self.refetch_delay_secs)
    }

    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            timeout: Duration::from_secs(self.confirmation_timeout_secs),
        }
    }

    fn check_url(url: &str) -> Result<(), CliError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            Ok(())
        } else {
            Err(CliError::ConfigError(format!("URL must start with http:// or https://, got {}", url)))
        }
    }

    pub fn set_rpc(&mut self, url: &str) -> Result<(), CliError> {
        Self::check_url(url)?;
        self.rpc_url = url.to_string();
        Ok(())
    }

    pub fn set_feed(&mut self, url: &str) -> Result<(), CliError> {
        Self::check_url(url)?;
        self.feed_url = url.to_string();
        Ok(())
    }

    pub fn set_account(&mut self, address: &str) -> Result<(), CliError> {
        self.account = Some(address.parse()?);
        Ok(())
    }

    pub fn set_contracts(&mut self, dao: &str, dao_token: &str, payment_token: &str) -> Result<(), CliError> {
        self.contracts = Contracts {
            dao: dao.parse()?,
            dao_token: dao_token.parse()?,
            payment_token: payment_token.parse()?,
        };
        Ok(())
    }

    /// Fails when any contract address is still unset.
    pub fn require_contracts(&self) -> Result<Contracts, CliError> {
        let c = self.contracts;
        if c.dao.is_zero() || c.dao_token.is_zero() || c.payment_token.is_zero() {
            return Err(CliError::ConfigError(
                "Contract addresses not configured. Run 'charity-dao-cli config set-contracts' first".into(),
            ));
        }
        Ok(c)
    }
}

// =============================================================================
// COMMANDS
// =============================================================================

fn update(apply: impl FnOnce(&mut Config) -> Result<(), CliError>) -> Result<Config> {
    let mut config = Config::load()?;
    apply(&mut config)?;
    config.save()?;
    Ok(config)
}

pub fn set_account(address: &str) -> Result<()> {
    let config = update(|c| c.set_account(address))?;
    println!("{}", "✓ Account set".green());
    println!("  Address: {}", config.account()?);
    Ok(())
}

pub fn set_rpc(url: &str) -> Result<()> {
    update(|c| c.set_rpc(url))?;
    println!("{}", format!("✓ RPC URL set to: {}", url).green());
    Ok(())
}

pub fn set_feed(url: &str) -> Result<()> {
    update(|c| c.set_feed(url))?;
    println!("{}", format!("✓ Feed URL set to: {}", url).green());
    Ok(())
}

pub fn set_contracts(dao: &str, dao_token: &str, payment_token: &str) -> Result<()> {
    let config = update(|c| c.set_contracts(dao, dao_token, payment_token))?;
    println!("{}", "✓ Contract addresses updated".green());
    print_contracts(&config.contracts);
    Ok(())
}

fn print_contracts(contracts: &Contracts) {
    println!("  DAO:           {}", contracts.dao);
    println!("  DAO token:     {}", contracts.dao_token);
    println!("  Payment token: {}", contracts.payment_token);
}

/// Show current configuration
pub fn show() -> Result<()> {
    let config = Config::load()?;

    println!("{}", "Charity DAO CLI Configuration".bright_cyan().bold());
    println!("  RPC URL:       {}", config.rpc_url.bright_yellow());
    println!("  Feed URL:      {}", config.feed_url);
    println!(
        "  Account:       {}",
        config
            .account
            .map(|a| a.to_string())
            .unwrap_or_else(|| "Not set".to_string())
    );
    print_contracts(&config.contracts);
    println!(
        "  Confirmations: approval {}, vote {}, donation {}, execution {}",
        config.confirmations.approval,
        config.confirmations.vote,
        config.confirmations.donation,
        config.confirmations.execution
    );
    println!("  Refetch delay: {}s", config.refetch_delay_secs);

    Ok(())
}
