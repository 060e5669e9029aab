use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use solana_sdk::pubkey::Pubkey;
use tracing::{error, info};

use crate::collaborators::MarketSnapshotProvider;
use crate::error::LiquidatorError;
use crate::redeem::{RedemptionStats, RedemptionSweep};
use crate::scanner::{EpochStats, LiquidationScanner};

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub market: Pubkey,
    /// Pause between epochs. `None` starts the next epoch immediately.
    pub epoch_delay: Option<Duration>,
    /// Stop after a single epoch.
    pub once: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochReport {
    pub epoch: u64,
    pub obligations: EpochStats,
    pub redemptions: RedemptionStats,
}

/// Repeats snapshot, obligation sweep and redemption sweep until shut down.
pub struct EpochDriver {
    provider: Arc<dyn MarketSnapshotProvider>,
    scanner: LiquidationScanner,
    redemption: RedemptionSweep,
    config: DriverConfig,
}

impl EpochDriver {
    pub fn new(
        provider: Arc<dyn MarketSnapshotProvider>,
        scanner: LiquidationScanner,
        redemption: RedemptionSweep,
        config: DriverConfig,
    ) -> Self {
        Self { provider, scanner, redemption, config }
    }

    /// Run one epoch. Only a failed snapshot is returned as an error.
    pub async fn run_epoch(&self, epoch: u64) -> Result<EpochReport, LiquidatorError> {
        let start = Instant::now();
        info!(epoch, "Starting epoch");

        let snapshot = self.provider.snapshot(&self.config.market).await?;
        info!(
            oracles = snapshot.oracles.len(),
            obligations = snapshot.obligations.len(),
            reserves = snapshot.reserves.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Market snapshot fetched"
        );

        let obligations = self.scanner.sweep(&snapshot).await;
        info!(
            epoch,
            total = obligations.total,
            healthy = obligations.healthy,
            toxic = obligations.toxic,
            failed = obligations.failed,
            liquidations = obligations.liquidations,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Obligation sweep finished"
        );

        let redemptions = self.redemption.run(&snapshot.reserves).await;
        info!(
            epoch,
            submitted = redemptions.submitted,
            failed = redemptions.failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Redemption sweep finished"
        );

        Ok(EpochReport { epoch, obligations, redemptions })
    }

    /// Run epochs until `shutdown` resolves, or after one epoch with `once`.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        for epoch in 0.. {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(epoch, "Shutdown requested, stopping");
                    return;
                }
                result = self.run_epoch(epoch) => {
                    if let Err(e) = result {
                        error!(epoch, error = %e, "Epoch aborted");
                    }
                }
            }

            if self.config.once {
                return;
            }

            // Throttle to stay under RPC rate limits
            if let Some(delay) = self.config.epoch_delay {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => {
                        info!(epoch, "Shutdown requested, stopping");
                        return;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Obligation;
    use crate::scanner::ScannerConfig;
    use crate::testing::{obligation, oracle, reserve, FakeChain};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn driver(chain: &Arc<FakeChain>, once: bool) -> EpochDriver {
        let market = Pubkey::new_unique();
        let scanner = LiquidationScanner::new(
            chain.clone(),
            chain.clone(),
            chain.clone(),
            ScannerConfig { market, wallet: chain.wallet, max_rounds: 3 },
        );
        let redemption = RedemptionSweep::new(chain.clone(), chain.clone(), chain.wallet, market);
        EpochDriver::new(
            chain.clone(),
            scanner,
            redemption,
            DriverConfig { market, epoch_delay: None, once },
        )
    }

    #[tokio::test]
    async fn epoch_liquidates_then_redeems_seized_collateral() {
        let usdc = reserve("USDC", 0, 50, 60);
        let sol = reserve("SOL", 0, 50, 60);
        let chain = Arc::new(FakeChain::default());

        let underwater = obligation(vec![(&sol, 200)], vec![(&usdc, Decimal::new(150, 0))]);
        let healthy = obligation(vec![(&sol, 200)], vec![(&usdc, Decimal::new(10, 0))]);
        chain.set_snapshot(
            vec![oracle(&usdc, Decimal::ONE), oracle(&sol, Decimal::ONE)],
            vec![underwater.clone(), healthy],
            vec![usdc.clone(), sol.clone()],
        );
        chain.set_balance(usdc.liquidity_mint, 1_000);
        chain.set_balance(sol.collateral_mint, 42);
        chain.queue_refetch(Obligation {
            borrows: obligation(vec![], vec![(&usdc, Decimal::new(75, 0))]).borrows,
            ..underwater
        });

        let report = driver(&chain, true).run_epoch(0).await.unwrap();

        assert_eq!(report.obligations.total, 2);
        assert_eq!(report.obligations.healthy, 2);
        assert_eq!(report.obligations.liquidations, 1);
        assert_eq!(report.redemptions, RedemptionStats { submitted: 1, failed: 0 });
    }

    #[tokio::test]
    async fn failed_snapshot_aborts_only_the_epoch() {
        let chain = Arc::new(FakeChain::default());
        chain.fail_snapshot();

        let d = driver(&chain, true);
        assert!(d.run_epoch(0).await.is_err());
        // `run` logs the failure and returns after the single epoch.
        d.run(std::future::pending()).await;
        assert!(chain.redemptions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_snapshot_is_retried_after_the_epoch_delay() {
        let sol = reserve("SOL", 0, 50, 60);
        let chain = Arc::new(FakeChain::default());
        chain.set_snapshot(vec![oracle(&sol, Decimal::ONE)], vec![], vec![sol.clone()]);
        chain.set_balance(sol.collateral_mint, 7);
        chain.fail_next_snapshots(1);

        let mut d = driver(&chain, false);
        d.config.epoch_delay = Some(Duration::from_secs(1));

        // Epoch 0 fails at t=0, epoch 1 runs at t=1s, shutdown lands mid-delay.
        d.run(tokio::time::sleep(Duration::from_millis(1_500))).await;

        assert_eq!(chain.snapshots(), 2);
        assert_eq!(chain.redemptions().len(), 1);
        assert_eq!(chain.redemptions()[0].amount, 7);
    }

    #[tokio::test]
    async fn shutdown_stops_the_driver() {
        let chain = Arc::new(FakeChain::default());
        let d = driver(&chain, false);
        tokio::time::timeout(Duration::from_secs(5), d.run(async {}))
            .await
            .expect("driver should stop on shutdown");
    }
}
