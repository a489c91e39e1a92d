//! Fixed-interval fan-out over every configured instrument.
//!
//! A cycle runs immediately at startup and then on every tick. Each tick
//! spawns one task per target without waiting on earlier ticks, so slow
//! cycles may overlap. Every spawned task lives in one `JoinSet`, which is
//! what makes shutdown explicit: in-flight work is either drained for a
//! bounded grace period or aborted.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinError, JoinSet};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::collector::task::{run_cycle, CycleOutcome};
use crate::collector::InstrumentTarget;
use crate::market_data::adapters::QuoteSource;
use crate::persist::LevelSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPolicy {
    /// Wait up to `grace` for in-flight cycles, then abort the stragglers.
    Drain { grace: Duration },
    /// Abort everything still running as soon as shutdown is requested.
    Abandon,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    /// Cycles launched, the startup run included.
    pub cycles: u64,
    /// Instrument tasks that ran to completion and persisted their snapshot.
    pub succeeded: u64,
    /// Instrument tasks that ran to completion with a failure (or panicked).
    pub failed: u64,
    /// Instrument tasks aborted at shutdown.
    pub abandoned: u64,
}

pub struct Scheduler {
    targets: Vec<Arc<InstrumentTarget>>,
    source: Arc<dyn QuoteSource>,
    sink: Arc<dyn LevelSink>,
    interval: Duration,
    shutdown_policy: ShutdownPolicy,
}

impl Scheduler {
    pub fn new(
        targets: Vec<InstrumentTarget>,
        source: Arc<dyn QuoteSource>,
        sink: Arc<dyn LevelSink>,
        interval: Duration,
        shutdown_policy: ShutdownPolicy,
    ) -> Self {
        Self {
            targets: targets.into_iter().map(Arc::new).collect(),
            source,
            sink,
            interval,
            shutdown_policy,
        }
    }

    /// Run until `shutdown` resolves. Failures inside a cycle never end the loop.
    pub async fn run<F>(self, shutdown: F) -> SchedulerReport
    where
        F: Future<Output = ()>,
    {
        let mut report = SchedulerReport::default();
        let mut in_flight: JoinSet<CycleOutcome> = JoinSet::new();
        tokio::pin!(shutdown);

        info!(
            instruments = self.targets.len(),
            interval_secs = self.interval.as_secs_f64(),
            "scheduler started"
        );
        self.launch_cycle(&mut in_flight, &mut report);

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!(in_flight = in_flight.len(), "shutdown requested");
                    break;
                }
                _ = ticker.tick() => self.launch_cycle(&mut in_flight, &mut report),
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    record(&mut report, joined);
                }
            }
        }

        self.wind_down(in_flight, &mut report).await;
        info!(?report, "scheduler stopped");
        report
    }

    fn launch_cycle(&self, in_flight: &mut JoinSet<CycleOutcome>, report: &mut SchedulerReport) {
        report.cycles += 1;
        debug!(cycle = report.cycles, in_flight = in_flight.len(), "launching cycle");

        for target in &self.targets {
            let target = Arc::clone(target);
            let source = Arc::clone(&self.source);
            let sink = Arc::clone(&self.sink);
            in_flight.spawn(async move { run_cycle(&target, source.as_ref(), sink.as_ref()).await });
        }
    }

    async fn wind_down(&self, mut in_flight: JoinSet<CycleOutcome>, report: &mut SchedulerReport) {
        // tasks that finished while shutdown won the select keep their outcome
        while let Some(joined) = in_flight.try_join_next() {
            record(report, joined);
        }
        if in_flight.is_empty() {
            return;
        }

        if let ShutdownPolicy::Drain { grace } = self.shutdown_policy {
            let drain = async {
                while let Some(joined) = in_flight.join_next().await {
                    record(report, joined);
                }
            };
            if time::timeout(grace, drain).await.is_ok() {
                return;
            }
            warn!(grace_secs = grace.as_secs_f64(), remaining = in_flight.len(), "grace period elapsed");
        }

        report.abandoned += in_flight.len() as u64;
        warn!(tasks = in_flight.len(), "abandoning in-flight cycles");
        in_flight.shutdown().await;
    }
}

fn record(report: &mut SchedulerReport, joined: Result<CycleOutcome, JoinError>) {
    match joined {
        Ok(outcome) if outcome.is_success() => report.succeeded += 1,
        Ok(_) => report.failed += 1,
        Err(e) if e.is_panic() => {
            error!(error = %e, "instrument task panicked");
            report.failed += 1;
        }
        // cancelled tasks are counted by wind_down
        Err(_) => {}
    }
}
