//! Producer/consumer integration tests
//!
//! Drives the acquisition loop tick by tick from the test thread and drains
//! windows with the consumer, checking the counting discipline between them.
//!
//! # Test Coverage
//!
//! - One readiness signal per completed window, none before
//! - Exact buffer occupancy around a window boundary
//! - FIFO ordering with no gaps across many windows
//! - Latency budget: a lagging consumer and an overflowing buffer are both fatal

use imu_daq::acquisition::{AcquisitionLoop, ReadySignal, TickOutcome, WindowConsumer};
use imu_daq::data::iir_filter::{FilterCoefficients, FilterDesign};
use imu_daq::data::pipeline::{ConditionedWindow, PipelineConfig, SignalPipeline, TensorFormat};
use imu_daq::data::ring_buffer::RingBuffer;
use imu_daq::error::{DaqError, InferenceError, RingBufferError};
use imu_daq::hardware::mock::{CountingImu, MockImu};
use imu_daq::hardware::SampleSource;
use imu_daq::inference::classify::Classifier;
use imu_daq::inference::{InferenceEngine, ModelOutput};
use std::sync::Arc;

const W: usize = 128;
const AXES: usize = 6;

// =============================================================================
// Test Helper Functions
// =============================================================================

/// Engine that keeps a copy of every window it is given.
struct Recorder {
    window_len: usize,
    windows: Vec<Vec<f32>>,
}

impl InferenceEngine for Recorder {
    fn input_format(&self) -> TensorFormat {
        TensorFormat::Float32
    }

    fn input_shape(&self) -> (usize, usize) {
        (self.window_len, AXES)
    }

    fn run(&mut self, input: &ConditionedWindow) -> Result<(), InferenceError> {
        let values = input
            .as_f32()
            .ok_or_else(|| InferenceError::InputMismatch("float input expected".into()))?;
        self.windows.push(values.to_vec());
        Ok(())
    }

    fn output(&self) -> ModelOutput<'_> {
        ModelOutput::Float32(&[0.1, 0.9])
    }
}

/// Unit-gain filter and a `2^15` range, so every value comes out as `raw / 32768` exactly.
fn passthrough(window_len: usize) -> SignalPipeline {
    SignalPipeline::new(PipelineConfig {
        channels: AXES,
        window_len,
        filter: FilterCoefficients::new(&[1.0], &[1.0]).unwrap(),
        sensor_min: -32768.0,
        sensor_max: 32768.0,
        remap: Vec::new(),
        output: TensorFormat::Float32,
    })
    .unwrap()
}

fn build<S: SampleSource>(
    source: S,
    window_len: usize,
) -> (AcquisitionLoop<S>, WindowConsumer<Recorder>, Arc<ReadySignal>) {
    let (producer, consumer) = RingBuffer::<i16>::with_capacity(2 * window_len, AXES)
        .unwrap()
        .split();
    let ready = Arc::new(ReadySignal::new());
    let acq = AcquisitionLoop::new(source, producer, Arc::clone(&ready), window_len).unwrap();
    let recorder = Recorder {
        window_len,
        windows: Vec::new(),
    };
    let wc = WindowConsumer::new(
        consumer,
        Arc::clone(&ready),
        passthrough(window_len),
        recorder,
        Classifier::default(),
    )
    .unwrap();
    (acq, wc, ready)
}

// =============================================================================
// Window boundary
// =============================================================================

#[test]
fn test_128_ticks_raise_exactly_one_signal() {
    let (mut acq, mut wc, ready) = build(MockImu::new(1), W);

    for tick in 1..=W {
        assert!(!acq.is_buffer_full());
        assert_eq!(acq.buffered(), tick - 1);
        let outcome = acq.on_tick().unwrap();
        if tick < W {
            assert_eq!(outcome, TickOutcome::Sampling { fill: tick });
            assert!(!ready.is_pending());
        } else {
            assert_eq!(outcome, TickOutcome::WindowReady { sequence: 1 });
        }
    }

    assert_eq!(ready.raised_count(), 1);
    assert!(ready.try_take());
    assert_eq!(wc.buffered(), W);

    let report = wc.drain_window().unwrap();
    assert_eq!(report.backlog, 0);
    assert_eq!(wc.buffered(), 0);
    assert_eq!(report.classification.unwrap().class_index, 1);
}

#[test]
fn test_windows_arrive_in_order_without_gaps() {
    let (mut acq, mut wc, ready) = build(CountingImu::new(AXES), 16);

    for _ in 0..10 {
        for _ in 0..16 {
            acq.on_tick().unwrap();
        }
        assert!(ready.try_take());
        wc.drain_window().unwrap();
    }

    let all: Vec<f32> = wc.engine().windows.iter().flatten().copied().collect();
    assert_eq!(all.len(), 10 * 16 * AXES);
    for (i, &v) in all.iter().enumerate() {
        assert_eq!(v * 32768.0, i as f32);
    }
}

#[test]
fn test_second_window_fills_while_first_drains() {
    let (mut acq, mut wc, ready) = build(CountingImu::new(AXES), 8);
    for _ in 0..8 {
        acq.on_tick().unwrap();
    }
    assert!(ready.try_take());

    // Producer keeps sampling into the second half before the consumer runs.
    for _ in 0..5 {
        acq.on_tick().unwrap();
    }
    let report = wc.drain_window().unwrap();
    assert_eq!(report.backlog, 5);
    assert_eq!(wc.engine().windows[0][0], 0.0);
}

// =============================================================================
// Latency budget
// =============================================================================

#[test]
fn test_lagging_consumer_then_overflow() {
    let (mut acq, _wc, ready) = build(CountingImu::new(AXES), 4);

    for _ in 0..4 {
        acq.on_tick().unwrap();
    }
    assert!(ready.is_pending());

    for _ in 0..3 {
        acq.on_tick().unwrap();
    }
    let err = acq.on_tick().unwrap_err();
    assert!(matches!(err, DaqError::ConsumerLagging { window: 2 }));
    assert!(err.is_fatal());

    // Buffer now holds two full windows.
    assert!(acq.is_buffer_full());
    let err = acq.on_tick().unwrap_err();
    assert!(matches!(
        err,
        DaqError::RingBuffer(RingBufferError::Overflow {
            requested: 1,
            available: 0
        })
    ));
    assert_eq!(acq.samples_written(), 8);
}

#[test]
fn test_consumer_without_data_is_desync() {
    let (_acq, mut wc, _ready) = build(CountingImu::new(AXES), 4);
    assert!(matches!(
        wc.drain_window(),
        Err(DaqError::Desync {
            required: 4,
            available: 0
        })
    ));
}

#[test]
fn test_conditioning_runs_with_real_filter() {
    let (producer, consumer) = RingBuffer::<i16>::with_capacity(2 * W, AXES).unwrap().split();
    let ready = Arc::new(ReadySignal::new());
    let mut acq =
        AcquisitionLoop::new(MockImu::new(3).with_noise(0.0), producer, Arc::clone(&ready), W)
            .unwrap();
    let pipeline = SignalPipeline::new(PipelineConfig {
        channels: AXES,
        window_len: W,
        filter: FilterCoefficients::from_design(&FilterDesign::Butterworth3, 128.0).unwrap(),
        sensor_min: -32768.0,
        sensor_max: 32768.0,
        remap: Vec::new(),
        output: TensorFormat::Float32,
    })
    .unwrap();
    let recorder = Recorder {
        window_len: W,
        windows: Vec::new(),
    };
    let mut wc =
        WindowConsumer::new(consumer, ready, pipeline, recorder, Classifier::default()).unwrap();

    for _ in 0..W {
        acq.on_tick().unwrap();
    }
    wc.drain_window().unwrap();

    // Gravity on Z settles towards 16384 / 32768 = 0.5 after the filter transient.
    let window = &wc.engine().windows[0];
    let last_z = window[(W - 1) * AXES + 2];
    assert!((last_z - 0.5).abs() < 1e-3, "z settled at {last_z}");
}
