use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{read_keypair_file, Keypair};

use crate::error::LiquidatorError;

pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
pub const DEFAULT_PROGRAM_ID: &str = "So1endDq2YkqhipRh3WViPa8hdiSpxWy6z3Z6tMCpAo";
pub const DEFAULT_MAX_ROUNDS: usize = 10;

/// Raw settings as they arrive from the command line or environment.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub rpc_url: Option<String>,
    pub payer: Option<PathBuf>,
    pub market: Option<String>,
    pub program_id: Option<String>,
    pub throttle_ms: Option<u64>,
    pub max_rounds: Option<usize>,
    pub market_config: Option<PathBuf>,
}

/// Runtime configuration, resolved once at startup.
pub struct Config {
    pub rpc_url: String,
    pub payer_path: PathBuf,
    pub payer: Keypair,
    pub market: Pubkey,
    pub program_id: Pubkey,
    pub epoch_delay: Option<Duration>,
    pub max_rounds: usize,
    pub market_config: MarketConfig,
}

impl Config {
    /// Resolve settings, load the payer keypair and the optional market config.
    pub fn load(settings: Settings) -> Result<Self> {
        let market = parse_market(settings.market.as_deref())?;
        let program_id = parse_pubkey(
            "program id",
            settings.program_id.as_deref().unwrap_or(DEFAULT_PROGRAM_ID),
        )?;

        let max_rounds = parse_max_rounds(settings.max_rounds)?;

        let rpc_url = settings.rpc_url.unwrap_or_else(|| DEFAULT_RPC_URL.to_string());

        let payer_path = match settings.payer {
            Some(path) => path,
            None => dirs::home_dir()
                .context("No home directory to locate the default keypair; pass --payer")?
                .join(".config/solana/id.json"),
        };
        let payer = read_keypair_file(&payer_path)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("Failed to load payer keypair from {}", payer_path.display()))?;

        let market_config = match settings.market_config {
            Some(path) => MarketConfig::from_file(&path)?,
            None => MarketConfig::default(),
        };

        Ok(Self {
            rpc_url,
            payer_path,
            payer,
            market,
            program_id,
            epoch_delay: settings.throttle_ms.filter(|ms| *ms > 0).map(Duration::from_millis),
            max_rounds,
            market_config,
        })
    }
}

fn parse_market(market: Option<&str>) -> Result<Pubkey, LiquidatorError> {
    match market.map(str::trim).filter(|m| !m.is_empty()) {
        Some(m) => parse_pubkey("market", m),
        None => Err(LiquidatorError::MissingMarket),
    }
}

fn parse_max_rounds(max_rounds: Option<usize>) -> Result<usize, LiquidatorError> {
    match max_rounds {
        Some(0) => Err(LiquidatorError::InvalidMaxRounds),
        Some(n) => Ok(n),
        None => Ok(DEFAULT_MAX_ROUNDS),
    }
}

fn parse_pubkey(field: &'static str, value: &str) -> Result<Pubkey, LiquidatorError> {
    value.parse().map_err(|_| LiquidatorError::InvalidPubkey {
        field,
        value: value.to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct MarketConfigFile {
    #[serde(default)]
    reserves: Vec<ReserveEntry>,
}

#[derive(Debug, Deserialize)]
struct ReserveEntry {
    address: String,
    symbol: String,
}

/// Human-readable reserve symbols, which are not stored on chain.
#[derive(Debug, Clone, Default)]
pub struct MarketConfig {
    symbols: HashMap<Pubkey, String>,
}

impl MarketConfig {
    /// Load a JSON file of the form `{"reserves": [{"address": "...", "symbol": "SOL"}]}`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read market config {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("Invalid market config {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let file: MarketConfigFile = serde_json::from_str(raw)?;
        let symbols = file
            .reserves
            .into_iter()
            .map(|entry| Ok((parse_pubkey("reserve", &entry.address)?, entry.symbol)))
            .collect::<Result<HashMap<_, _>, LiquidatorError>>()?;
        Ok(Self { symbols })
    }

    /// Symbol for a reserve, falling back to a shortened mint address.
    pub fn symbol(&self, reserve: &Pubkey, mint: &Pubkey) -> String {
        self.symbols.get(reserve).cloned().unwrap_or_else(|| {
            let mint = mint.to_string();
            mint[..mint.len().min(8)].to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_market_is_a_configuration_error() {
        assert!(matches!(parse_market(None), Err(LiquidatorError::MissingMarket)));
        assert!(matches!(parse_market(Some("  ")), Err(LiquidatorError::MissingMarket)));
        assert!(matches!(
            parse_market(Some("not-a-key")),
            Err(LiquidatorError::InvalidPubkey { field: "market", .. })
        ));

        let market = Pubkey::new_unique();
        assert_eq!(parse_market(Some(&market.to_string())).unwrap(), market);
    }

    #[test]
    fn load_fails_fast_without_market() {
        let err = Config::load(Settings::default()).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<LiquidatorError>(),
            Some(LiquidatorError::MissingMarket)
        ));
    }

    #[test]
    fn zero_max_rounds_is_rejected() {
        let settings = Settings {
            market: Some(Pubkey::new_unique().to_string()),
            max_rounds: Some(0),
            ..Settings::default()
        };
        let err = Config::load(settings).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<LiquidatorError>(),
            Some(LiquidatorError::InvalidMaxRounds)
        ));

        assert_eq!(parse_max_rounds(None).unwrap(), DEFAULT_MAX_ROUNDS);
        assert_eq!(parse_max_rounds(Some(1)).unwrap(), 1);
    }

    #[test]
    fn market_config_maps_reserve_symbols() {
        let reserve = Pubkey::new_unique();
        let other = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let raw = format!(r#"{{"reserves": [{{"address": "{reserve}", "symbol": "SOL"}}]}}"#);

        let config = MarketConfig::from_json(&raw).unwrap();
        assert_eq!(config.symbol(&reserve, &mint), "SOL");
        assert_eq!(config.symbol(&other, &mint), &mint.to_string()[..8]);
    }

    #[test]
    fn market_config_rejects_bad_addresses() {
        assert!(MarketConfig::from_json(r#"{"reserves": [{"address": "x", "symbol": "SOL"}]}"#).is_err());
    }
}
