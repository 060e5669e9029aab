use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{ArgAction, Parser};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::signature::Signer;
use tracing::{info, warn};

mod collaborators;
mod config;
mod driver;
mod dry_run;
mod error;
mod health;
mod layout;
mod model;
mod oracle;
mod redeem;
mod rpc;
mod scanner;
mod selector;
#[cfg(test)]
mod testing;

use crate::config::{Config, Settings};
use crate::driver::{DriverConfig, EpochDriver};
use crate::dry_run::DryRunExecutor;
use crate::redeem::RedemptionSweep;
use crate::rpc::{RpcMarket, RpcWallet};
use crate::scanner::{LiquidationScanner, ScannerConfig};

/// Solend liquidation bot entrypoint.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// RPC URL for Solana cluster
    #[arg(long, env = "RPC_URL")]
    rpc_url: Option<String>,

    /// Path to payer keypair
    #[arg(long, env = "PAYER", value_name = "FILE")]
    payer: Option<PathBuf>,

    /// Lending market address to liquidate in
    #[arg(long, env = "MARKET")]
    market: Option<String>,

    /// Lending program id
    #[arg(long, env = "PROGRAM_ID")]
    program_id: Option<String>,

    /// Delay between epochs in milliseconds
    #[arg(long, env = "THROTTLE")]
    throttle_ms: Option<u64>,

    /// Liquidation rounds allowed per obligation per epoch
    #[arg(long, env = "MAX_ROUNDS")]
    max_rounds: Option<usize>,

    /// JSON file naming the market's reserves
    #[arg(long, env = "MARKET_CONFIG", value_name = "FILE")]
    market_config: Option<PathBuf>,

    /// Run one epoch then exit
    #[arg(long, action = ArgAction::SetTrue)]
    once: bool,
}

impl Cli {
    fn settings(&self) -> Settings {
        Settings {
            rpc_url: self.rpc_url.clone(),
            payer: self.payer.clone(),
            market: self.market.clone(),
            program_id: self.program_id.clone(),
            throttle_ms: self.throttle_ms,
            max_rounds: self.max_rounds,
            market_config: self.market_config.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(cli.settings())?;
    let wallet = cfg.payer.pubkey();

    info!(
        rpc = %cfg.rpc_url,
        market = %cfg.market,
        program = %cfg.program_id,
        wallet = %wallet,
        payer = %cfg.payer_path.display(),
        "Starting Solend liquidation bot"
    );
    warn!("Transaction submission runs in dry-run mode; liquidations and redemptions are logged only");

    let rpc = Arc::new(RpcClient::new_with_commitment(
        cfg.rpc_url.clone(),
        CommitmentConfig::confirmed(),
    ));
    let market = Arc::new(RpcMarket::new(rpc.clone(), cfg.program_id, cfg.market_config.clone()));
    let wallet_reader = Arc::new(RpcWallet::new(rpc));
    let executor = Arc::new(DryRunExecutor);

    let scanner = LiquidationScanner::new(
        market.clone(),
        wallet_reader.clone(),
        executor.clone(),
        ScannerConfig {
            market: cfg.market,
            wallet,
            max_rounds: cfg.max_rounds,
        },
    );
    let redemption = RedemptionSweep::new(wallet_reader, executor, wallet, cfg.market);
    let driver = EpochDriver::new(
        market,
        scanner,
        redemption,
        DriverConfig {
            market: cfg.market,
            epoch_delay: cfg.epoch_delay,
            once: cli.once,
        },
    );

    driver
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(())
}
