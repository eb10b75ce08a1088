use crate::derivation::AddressBook;
use crate::model::{Address, Seed};
use anyhow::{anyhow, Context};
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountConfig {
    pub seed: Seed,
    pub horizon: usize,
    /// Pre-derived addresses in derivation order, checksummed or raw.
    pub addresses: Vec<Address>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransferConfig {
    pub label: String,
    pub seed: Seed,
    pub destination: Address,
    pub value: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    pub output_path: PathBuf,
    #[serde(default = "default_security")]
    pub security: u8,
    #[serde(default = "default_pow_level")]
    pub pow_level: u32,
    pub accounts: Vec<AccountConfig>,
    #[serde(default)]
    pub transfers: Vec<TransferConfig>,
    /// 1-based account numbers whose bundle transactions are listed.
    #[serde(default)]
    pub account_bundles: Vec<usize>,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_security() -> u8 {
    2
}

fn default_pow_level() -> u32 {
    9
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let file = File::open(path).with_context(|| {
            format!("Cannot read config file {path}", path = path.display())
        })?;
        let config: Config = serde_yaml::from_reader(file).with_context(|| {
            format!("Cannot read config file {path}", path = path.display())
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(1..=3).contains(&self.security) {
            return Err(anyhow!("security level must be 1, 2 or 3, got {}", self.security));
        }
        if self.timeout_secs == 0 {
            return Err(anyhow!("timeout_secs must be positive"));
        }
        for (number, account) in self.accounts.iter().enumerate() {
            if account.horizon == 0 {
                return Err(anyhow!("account {} has a horizon of 0", number + 1));
            }
            if account.addresses.len() < account.horizon {
                return Err(anyhow!(
                    "account {} lists {} addresses for a horizon of {}",
                    number + 1,
                    account.addresses.len(),
                    account.horizon
                ));
            }
        }
        for number in self.account_bundles.iter() {
            if *number == 0 || *number > self.accounts.len() {
                return Err(anyhow!("account_bundles refers to unknown account {}", number));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn address_book(&self) -> AddressBook {
        let mut book = AddressBook::new();
        for account in self.accounts.iter() {
            book.insert(&account.seed, account.addresses.clone());
        }
        book
    }
}
