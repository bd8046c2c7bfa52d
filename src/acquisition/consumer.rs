//! Task-context consumer: one conditioned, classified window per readiness signal.
use crate::acquisition::signal::ReadySignal;
use crate::data::pipeline::{ConditionedWindow, SignalPipeline};
use crate::data::ring_buffer::Consumer;
use crate::error::{DaqError, RingBufferError};
use crate::inference::classify::{Classification, Classifier};
use crate::inference::InferenceEngine;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// What happened to one window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowReport {
    /// 1-based window number on the consumer side.
    pub sequence: u64,
    /// Classifier decision, `None` if the engine produced no output.
    pub classification: Option<Classification>,
    /// Samples still buffered after the window was drained.
    pub backlog: usize,
    /// Time from drain to classification.
    pub latency: Duration,
}

/// Drains windows from the ring buffer and runs them through the pipeline and
/// the inference engine.
pub struct WindowConsumer<E> {
    consumer: Consumer<i16>,
    ready: Arc<ReadySignal>,
    pipeline: SignalPipeline,
    engine: E,
    classifier: Classifier,
    raw: Vec<i16>,
    window: ConditionedWindow,
    windows: u64,
}

impl<E: InferenceEngine> WindowConsumer<E> {
    /// Wire the read half of the ring buffer to a pipeline and an engine.
    ///
    /// # Errors
    /// `BadArgument` if the ring item size differs from the pipeline channel
    /// count, `FormatMismatch` if the engine's input slot differs from what the
    /// pipeline produces.
    pub fn new(
        consumer: Consumer<i16>,
        ready: Arc<ReadySignal>,
        pipeline: SignalPipeline,
        engine: E,
        classifier: Classifier,
    ) -> Result<Self, DaqError> {
        if consumer.item_size() != pipeline.channels() {
            return Err(DaqError::BadArgument(format!(
                "ring items hold {} values, pipeline expects {} channels",
                consumer.item_size(),
                pipeline.channels()
            )));
        }
        check_engine(&pipeline, &engine)?;

        let raw = vec![0; pipeline.window_elements()];
        let window = pipeline.allocate_output()?;
        Ok(Self {
            consumer,
            ready,
            pipeline,
            engine,
            classifier,
            raw,
            window,
            windows: 0,
        })
    }

    /// Read one window from the buffer and classify it, without waiting.
    ///
    /// # Errors
    /// `Desync` if fewer than a window of samples is buffered, or any
    /// pipeline or engine failure.
    pub fn drain_window(&mut self) -> Result<WindowReport, DaqError> {
        match self.consumer.read(&mut self.raw) {
            Ok(()) => {}
            Err(RingBufferError::Underflow {
                requested,
                available,
            }) => {
                return Err(DaqError::Desync {
                    required: requested,
                    available,
                })
            }
            Err(e) => return Err(e.into()),
        }
        let started = Instant::now();
        self.windows += 1;

        self.pipeline.process(&self.raw, &mut self.window)?;
        self.engine.run(&self.window)?;
        let classification = self.classifier.classify(self.engine.output());

        Ok(WindowReport {
            sequence: self.windows,
            classification,
            backlog: self.consumer.count(),
            latency: started.elapsed(),
        })
    }

    /// Wait for the next readiness signal and process that window.
    pub async fn next_window(&mut self) -> Result<WindowReport, DaqError> {
        self.ready.wait().await;
        self.drain_window()
    }

    /// Process windows until `shutdown` resolves or a fatal error occurs.
    ///
    /// Each report is sent on `reports`. A closed receiver ends the loop
    /// cleanly. Returns the number of windows processed.
    pub async fn run_until<F>(
        &mut self,
        shutdown: F,
        reports: mpsc::Sender<WindowReport>,
    ) -> Result<u64, DaqError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            window_len = self.pipeline.window_len(),
            format = %self.pipeline.output_format(),
            "window consumer started"
        );

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(windows = self.windows, "window consumer stopping");
                    return Ok(self.windows);
                }
                result = self.next_window() => {
                    let report = match result {
                        Ok(report) => report,
                        Err(e) => {
                            warn!(error = %e, windows = self.windows, "window consumer failed");
                            return Err(e);
                        }
                    };
                    match &report.classification {
                        Some(c) if c.detected => info!(
                            window = report.sequence,
                            class = c.class_index,
                            confidence = c.confidence,
                            "{c}"
                        ),
                        _ => debug!(
                            window = report.sequence,
                            backlog = report.backlog,
                            latency_us = report.latency.as_micros() as u64,
                            "window processed"
                        ),
                    }
                    if reports.send(report).await.is_err() {
                        debug!("report receiver dropped");
                        return Ok(self.windows);
                    }
                }
            }
        }
    }

    /// Windows processed since start.
    pub fn windows_processed(&self) -> u64 {
        self.windows
    }

    /// Samples currently buffered.
    pub fn buffered(&self) -> usize {
        self.consumer.count()
    }

    /// The last conditioned window handed to the engine.
    pub fn last_window(&self) -> &ConditionedWindow {
        &self.window
    }

    /// The conditioning pipeline.
    pub fn pipeline(&self) -> &SignalPipeline {
        &self.pipeline
    }

    /// The inference engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Mutable access to the inference engine.
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}

/// Verify that `engine` accepts exactly what `pipeline` produces.
pub fn check_engine<E: InferenceEngine>(
    pipeline: &SignalPipeline,
    engine: &E,
) -> Result<(), DaqError> {
    let (samples, channels) = engine.input_shape();
    let format_ok = engine.input_format() == pipeline.output_format();
    let shape_ok = samples == pipeline.window_len() && channels == pipeline.channels();
    if format_ok && shape_ok {
        return Ok(());
    }
    Err(DaqError::FormatMismatch {
        pipeline: format!(
            "{} [{} x {}]",
            pipeline.output_format(),
            pipeline.window_len(),
            pipeline.channels()
        ),
        engine: format!("{} [{samples} x {channels}]", engine.input_format()),
    })
}
