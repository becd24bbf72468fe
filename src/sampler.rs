// Hyper-V sampler: every interval, sample network and storage counters, aggregate, commit.
// Cycle: Idle -> Sampling -> Aggregating -> Persisting -> Idle. A failed counter domain
// contributes nothing to that cycle; a failed commit drops the batch. Neither stops the loop.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{Instrument, debug, info, warn};

use crate::error::IngestError;
use crate::models::StatBatch;
use crate::perf_counter::{
    CommandRunner, CounterDomain, CounterSample, VirtualMachines, aggregate_network,
    aggregate_storage,
};
use crate::stat_repo::StatSink;

/// Sampler timing and counter selection. The VM map is injected here, never read globally.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub interval: Duration,
    /// Upper bound for one counter command; on expiry the domain counts as failed.
    pub command_timeout: Duration,
    pub program: String,
    pub virtual_machines: VirtualMachines,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Sampling,
    Aggregating,
    Persisting,
}

/// What one cycle did. Rows are counted whether or not the commit succeeded.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub network_rows: usize,
    pub storage_rows: usize,
    pub failures: Vec<IngestError>,
    pub committed: bool,
}

/// Wait before the next cycle so the period tracks the clock, not the processing time.
pub fn next_delay(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

pub struct PeriodicSampler<R, S> {
    runner: Arc<R>,
    sink: Arc<S>,
    network: CounterDomain,
    storage: CounterDomain,
    virtual_machines: VirtualMachines,
    interval: Duration,
    command_timeout: Duration,
}

impl<R: CommandRunner, S: StatSink> PeriodicSampler<R, S> {
    pub fn new(config: SamplerConfig, runner: Arc<R>, sink: Arc<S>) -> anyhow::Result<Self> {
        let network = CounterDomain::network(&config.program, &config.virtual_machines)?;
        let storage = CounterDomain::storage(&config.program, &config.virtual_machines)?;
        Ok(Self {
            runner,
            sink,
            network,
            storage,
            virtual_machines: config.virtual_machines,
            interval: config.interval,
            command_timeout: config.command_timeout,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One full cycle. Contains every error it meets; see `CycleReport::failures`.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        debug!(phase = ?CyclePhase::Sampling, "sampler phase");
        let observed_at = Utc::now();
        let (network, storage) = tokio::join!(
            self.network.collect(self.runner.as_ref(), self.command_timeout),
            self.storage.collect(self.runner.as_ref(), self.command_timeout),
        );
        let network = self.samples_or_empty(network, &mut report);
        let storage = self.samples_or_empty(storage, &mut report);

        debug!(phase = ?CyclePhase::Aggregating, "sampler phase");
        let batch = StatBatch {
            network: aggregate_network(&network, &self.virtual_machines, observed_at),
            storage: aggregate_storage(&storage, &self.virtual_machines, observed_at),
        };
        report.network_rows = batch.network.len();
        report.storage_rows = batch.storage.len();

        debug!(phase = ?CyclePhase::Persisting, "sampler phase");
        match self.sink.commit(&batch).await {
            Ok(()) => {
                report.committed = true;
                info!(
                    network_rows = report.network_rows,
                    storage_rows = report.storage_rows,
                    "{} new Hyper-V records added",
                    batch.len()
                );
            }
            Err(e) => {
                warn!(kind = e.kind(), error = %e, rows = batch.len(), "dropping Hyper-V batch");
                report.failures.push(e);
            }
        }
        debug!(phase = ?CyclePhase::Idle, "sampler phase");
        report
    }

    fn samples_or_empty(
        &self,
        result: Result<Vec<CounterSample>, IngestError>,
        report: &mut CycleReport,
    ) -> Vec<CounterSample> {
        match result {
            Ok(samples) => samples,
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "counter sampling failed, domain skipped this cycle");
                report.failures.push(e);
                Vec::new()
            }
        }
    }
}

/// Spawns the sampling loop. Runs until `shutdown_rx` fires (or its sender is dropped).
pub fn spawn<R, S>(
    sampler: PeriodicSampler<R, S>,
    mut shutdown_rx: oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()>
where
    R: CommandRunner + 'static,
    S: StatSink + 'static,
{
    let interval = sampler.interval();
    let sampler_span = tracing::span!(
        tracing::Level::DEBUG,
        "sampler",
        interval_secs = interval.as_secs()
    );

    tokio::spawn(
        async move {
            loop {
                let start = Instant::now();
                let report = sampler.run_cycle().await;
                let delay = next_delay(interval, start.elapsed());
                debug!(
                    failures = report.failures.len(),
                    delay_ms = delay.as_millis() as u64,
                    "cycle done"
                );

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = &mut shutdown_rx => {
                        debug!("Sampler shutting down");
                        break;
                    }
                }
            }
        }
        .instrument(sampler_span),
    )
}
