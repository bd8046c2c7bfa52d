//! Periodic timer source standing in for the hardware tick interrupt.
//!
//! The callback runs on a dedicated thread at a fixed rate. Each deadline is
//! the previous deadline plus one period, so a late tick does not push every
//! later tick back.
use crate::error::DaqError;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Handle to a running [`PeriodicTimer`] thread.
pub struct PeriodicTimer {
    running: Arc<AtomicBool>,
    ticks: Arc<AtomicU64>,
    overruns: Arc<AtomicU64>,
    period: Duration,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTimer {
    /// Start calling `on_tick` every `1 / rate_hz` seconds until it breaks or
    /// the timer is stopped.
    ///
    /// # Errors
    /// `BadArgument` if the rate is not a positive finite number, `Io` if the
    /// thread cannot be spawned.
    pub fn spawn<F>(name: &str, rate_hz: f64, mut on_tick: F) -> Result<Self, DaqError>
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let period = tick_period(rate_hz)?;
        let running = Arc::new(AtomicBool::new(true));
        let ticks = Arc::new(AtomicU64::new(0));
        let overruns = Arc::new(AtomicU64::new(0));

        let thread_running = Arc::clone(&running);
        let thread_ticks = Arc::clone(&ticks);
        let thread_overruns = Arc::clone(&overruns);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut deadline = Instant::now();
                while thread_running.load(Ordering::Acquire) {
                    deadline += period;
                    let now = Instant::now();
                    if deadline > now {
                        thread::sleep(deadline - now);
                    } else if now - deadline > period {
                        thread_overruns.fetch_add(1, Ordering::Relaxed);
                    }
                    if !thread_running.load(Ordering::Acquire) {
                        break;
                    }

                    thread_ticks.fetch_add(1, Ordering::Relaxed);
                    if on_tick().is_break() {
                        thread_running.store(false, Ordering::Release);
                        break;
                    }
                }
                debug!(ticks = thread_ticks.load(Ordering::Relaxed), "timer thread exiting");
            })?;

        Ok(Self {
            running,
            ticks,
            overruns,
            period,
            handle: Some(handle),
        })
    }

    /// The tick period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Ticks delivered so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Ticks that started more than one period late.
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    /// Whether the timer thread is still delivering ticks.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop delivering ticks and wait for the thread to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("timer thread panicked");
            }
        }
    }
}

impl Drop for PeriodicTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Period of a tick at `rate_hz`.
pub fn tick_period(rate_hz: f64) -> Result<Duration, DaqError> {
    if !rate_hz.is_finite() || rate_hz <= 0.0 {
        return Err(DaqError::BadArgument(format!(
            "timer rate must be positive, got {rate_hz}"
        )));
    }
    Ok(Duration::from_secs_f64(1.0 / rate_hz))
}
