//! System wiring: build the producer/consumer pair and drive it.
//!
//! [`init`] replaces process-wide singletons with one explicitly owned
//! [`SystemContext`]. [`spawn_acquisition`] puts the producer on a periodic
//! timer and applies the sensor fault policy; [`run`] drives both sides until
//! shutdown or the first fatal error.
use crate::acquisition::consumer::{WindowConsumer, WindowReport};
use crate::acquisition::producer::{AcquisitionLoop, TickOutcome};
use crate::acquisition::signal::ReadySignal;
use crate::acquisition::timer::PeriodicTimer;
use crate::config::{DaqConfig, FaultPolicy};
use crate::data::pipeline::SignalPipeline;
use crate::data::ring_buffer::RingBuffer;
use crate::error::{AppResult, DaqError};
use crate::hardware::SampleSource;
use crate::inference::InferenceEngine;
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};

/// Everything the application owns once the system is initialised.
pub struct SystemContext<S, E> {
    /// Producer side, to be driven by a periodic tick.
    pub acquisition: AcquisitionLoop<S>,
    /// Consumer side, to be driven by an async task.
    pub consumer: WindowConsumer<E>,
    /// The readiness signal shared by both.
    pub ready: Arc<ReadySignal>,
}

/// Validate `config` and wire `source` and `engine` into a producer/consumer pair.
///
/// # Errors
/// `Configuration` for an invalid config, `FormatMismatch` if the engine does
/// not accept what the pipeline produces, `BadArgument` if the sensor axis
/// count does not match the pipeline.
pub fn init<S, E>(config: &DaqConfig, source: S, engine: E) -> AppResult<SystemContext<S, E>>
where
    S: SampleSource,
    E: InferenceEngine,
{
    config.validate()?;

    let capacity = config.ring_capacity()?;
    let pipeline = SignalPipeline::new(config.pipeline_config()?)?;
    let ring = RingBuffer::<i16>::with_capacity(capacity, source.axes())?;
    let (producer, consumer) = ring.split();
    let ready = Arc::new(ReadySignal::new());

    let consumer = WindowConsumer::new(
        consumer,
        Arc::clone(&ready),
        pipeline,
        engine,
        config.classifier()?,
    )?;
    let acquisition = AcquisitionLoop::new(
        source,
        producer,
        Arc::clone(&ready),
        config.window.samples,
    )?;

    info!(
        window = config.window.samples,
        capacity,
        rate_hz = config.sensor.sample_rate_hz,
        variant = ?config.sensor.variant,
        input = %config.model.input,
        "acquisition system initialised"
    );

    Ok(SystemContext {
        acquisition,
        consumer,
        ready,
    })
}

/// A producer running on its timer thread.
pub struct AcquisitionDriver {
    timer: PeriodicTimer,
    skipped: Arc<AtomicU64>,
}

impl AcquisitionDriver {
    /// Ticks delivered so far.
    pub fn ticks(&self) -> u64 {
        self.timer.ticks()
    }

    /// Ticks dropped under [`FaultPolicy::SkipTick`].
    pub fn skipped_ticks(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Ticks that started more than one period late.
    pub fn overruns(&self) -> u64 {
        self.timer.overruns()
    }

    /// Whether the producer is still sampling.
    pub fn is_running(&self) -> bool {
        self.timer.is_running()
    }

    /// Stop sampling and wait for the timer thread.
    pub fn stop(&mut self) {
        self.timer.stop();
    }
}

/// Drive `acquisition` at `rate_hz` on a dedicated timer thread.
///
/// The first fatal error stops the timer and is delivered on the returned
/// receiver. Sensor errors are fatal under [`FaultPolicy::Abort`] and skipped
/// under [`FaultPolicy::SkipTick`].
pub fn spawn_acquisition<S>(
    mut acquisition: AcquisitionLoop<S>,
    rate_hz: f64,
    policy: FaultPolicy,
) -> AppResult<(AcquisitionDriver, oneshot::Receiver<DaqError>)>
where
    S: SampleSource + 'static,
{
    let (fault_tx, fault_rx) = oneshot::channel();
    let mut fault_tx = Some(fault_tx);
    let skipped = Arc::new(AtomicU64::new(0));
    let tick_skipped = Arc::clone(&skipped);

    let timer = PeriodicTimer::spawn("imu-acquisition", rate_hz, move || {
        match acquisition.on_tick() {
            Ok(TickOutcome::Sampling { .. }) => ControlFlow::Continue(()),
            Ok(TickOutcome::WindowReady { sequence }) => {
                trace!(window = sequence, "window ready");
                ControlFlow::Continue(())
            }
            Err(e) if !e.is_fatal() && policy == FaultPolicy::SkipTick => {
                let n = tick_skipped.fetch_add(1, Ordering::Relaxed) + 1;
                if n == 1 {
                    warn!(error = %e, "sensor read failed, skipping tick");
                } else {
                    debug!(error = %e, skipped = n, "sensor read failed, skipping tick");
                }
                ControlFlow::Continue(())
            }
            Err(e) => {
                error!(
                    error = %e,
                    samples = acquisition.samples_written(),
                    "acquisition stopped"
                );
                if let Some(tx) = fault_tx.take() {
                    let _ = tx.send(e);
                }
                ControlFlow::Break(())
            }
        }
    })?;

    Ok((AcquisitionDriver { timer, skipped }, fault_rx))
}

/// Counters from a completed [`run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Windows classified by the consumer.
    pub windows: u64,
    /// Timer ticks delivered to the producer.
    pub ticks: u64,
    /// Ticks dropped by the fault policy.
    pub skipped_ticks: u64,
    /// Ticks that started more than one period late.
    pub overruns: u64,
}

/// Run the system until `shutdown` resolves or either side fails.
///
/// Reports for every window are sent on `reports`.
pub async fn run<S, E, F>(
    context: SystemContext<S, E>,
    config: &DaqConfig,
    shutdown: F,
    reports: mpsc::Sender<WindowReport>,
) -> AppResult<RunSummary>
where
    S: SampleSource + 'static,
    E: InferenceEngine,
    F: Future<Output = ()>,
{
    let SystemContext {
        acquisition,
        mut consumer,
        ready: _,
    } = context;

    let (mut driver, mut fault_rx) = spawn_acquisition(
        acquisition,
        config.sensor.sample_rate_hz,
        config.sensor.fault_policy,
    )?;

    let mut producer_fault = None;
    let stop = async {
        tokio::select! {
            _ = shutdown => {}
            fault = &mut fault_rx => producer_fault = fault.ok(),
        }
    };
    let consumed = consumer.run_until(stop, reports).await;
    driver.stop();

    let summary = RunSummary {
        windows: consumer.windows_processed(),
        ticks: driver.ticks(),
        skipped_ticks: driver.skipped_ticks(),
        overruns: driver.overruns(),
    };
    info!(
        windows = summary.windows,
        ticks = summary.ticks,
        skipped = summary.skipped_ticks,
        overruns = summary.overruns,
        "acquisition finished"
    );

    if let Some(fault) = producer_fault {
        return Err(fault);
    }
    consumed?;
    Ok(summary)
}
