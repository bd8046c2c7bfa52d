//! CLI Entry Point for imu_daq
//!
//! Provides command-line interface for:
//! - Classifying gestures live with the mock IMU and mock model
//! - Collecting conditioned windows as CSV for model training
//!
//! # Usage
//!
//! Classify for ten seconds:
//! ```bash
//! imu_daq run --motion circle --duration 10
//! ```
//!
//! Record twenty windows:
//! ```bash
//! imu_daq collect --motion square --windows 20 > square.csv
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use imu_daq::acquisition::WindowReport;
use imu_daq::config::DaqConfig;
use imu_daq::data::pipeline::{ConditionedWindow, TensorFormat};
use imu_daq::error::InferenceError;
use imu_daq::hardware::mock::{MockImu, Motion};
use imu_daq::hardware::IMU_AXES;
use imu_daq::inference::mock::MockGestureModel;
use imu_daq::inference::{InferenceEngine, ModelOutput};
use imu_daq::{logging, system};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::info;

#[derive(Parser)]
#[command(name = "imu_daq")]
#[command(about = "IMU acquisition and gesture classification", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = imu_daq::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify windows with the mock gesture model
    Run {
        /// Simulated motion (overrides the config)
        #[arg(long, value_enum)]
        motion: Option<MotionArg>,

        /// Seconds to run; until Ctrl+C when absent
        #[arg(long)]
        duration: Option<f64>,
    },

    /// Print conditioned windows as CSV
    Collect {
        /// Simulated motion (overrides the config)
        #[arg(long, value_enum)]
        motion: Option<MotionArg>,

        /// Windows to record
        #[arg(long, default_value = "10")]
        windows: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MotionArg {
    Idle,
    Circle,
    SideToSide,
    Square,
}

impl From<MotionArg> for Motion {
    fn from(arg: MotionArg) -> Self {
        match arg {
            MotionArg::Idle => Motion::Idle,
            MotionArg::Circle => Motion::Circle,
            MotionArg::SideToSide => Motion::SideToSide,
            MotionArg::Square => Motion::Square,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = DaqConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    config.validate()?;
    logging::init_from_config(&config)?;

    match cli.command {
        Commands::Run { motion, duration } => {
            if let Some(m) = motion {
                config.sensor.motion = m.into();
            }
            let duration = duration
                .map(Duration::try_from_secs_f64)
                .transpose()
                .context("invalid --duration")?;
            run_classifier(config, duration).await
        }
        Commands::Collect { motion, windows } => {
            if let Some(m) = motion {
                config.sensor.motion = m.into();
            }
            collect(config, windows).await
        }
    }
}

fn mock_imu(config: &DaqConfig) -> MockImu {
    MockImu::new(config.sensor.seed)
        .with_motion(config.sensor.motion)
        .with_noise(config.sensor.noise)
        .with_period(config.sensor.sample_rate_hz.round() as u32)
}

async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn run_classifier(config: DaqConfig, duration: Option<Duration>) -> Result<()> {
    let engine = MockGestureModel::new(config.model.input, config.window.samples, IMU_AXES)?
        .with_output_format(config.model.output)?;
    let ctx = system::init(&config, mock_imu(&config), engine)?;

    info!(motion = ?config.sensor.motion, "classifying, press Ctrl+C to stop");
    let shutdown = async move {
        match duration {
            Some(d) => tokio::select! {
                _ = tokio::time::sleep(d) => {}
                _ = ctrl_c() => {}
            },
            None => ctrl_c().await,
        }
    };

    let classifier = config.classifier()?;
    let (tx, mut rx) = mpsc::channel::<WindowReport>(8);
    let printer = async move {
        while let Some(report) = rx.recv().await {
            match report.classification {
                Some(c) => println!("window {:>4}\n{}", report.sequence, classifier.table(&c)),
                None => println!("window {:>4}: no output", report.sequence),
            }
        }
    };

    let (summary, ()) = tokio::join!(system::run(ctx, &config, shutdown, tx), printer);
    let summary = summary?;
    info!(windows = summary.windows, ticks = summary.ticks, "done");
    Ok(())
}

/// Engine that prints each window as CSV instead of classifying it.
struct CsvRecorder {
    window_len: usize,
    channels: usize,
}

impl InferenceEngine for CsvRecorder {
    fn input_format(&self) -> TensorFormat {
        TensorFormat::Float32
    }

    fn input_shape(&self) -> (usize, usize) {
        (self.window_len, self.channels)
    }

    fn run(&mut self, input: &ConditionedWindow) -> Result<(), InferenceError> {
        let values = input
            .as_f32()
            .ok_or_else(|| InferenceError::InputMismatch(input.format().to_string()))?;
        let mut out = std::io::stdout().lock();
        let write = |out: &mut std::io::StdoutLock<'_>| -> std::io::Result<()> {
            writeln!(out, "{}", vec!["-"; self.channels].join(","))?;
            for sample in values.chunks_exact(self.channels) {
                let row: Vec<String> = sample.iter().map(|v| format!("{v:.6}")).collect();
                writeln!(out, "{}", row.join(","))?;
            }
            out.flush()
        };
        write(&mut out).map_err(|e| InferenceError::Failed(e.to_string()))
    }

    fn output(&self) -> ModelOutput<'_> {
        ModelOutput::Float32(&[])
    }
}

async fn collect(mut config: DaqConfig, windows: u64) -> Result<()> {
    config.model.input = TensorFormat::Float32;
    let recorder = CsvRecorder {
        window_len: config.window.samples,
        channels: IMU_AXES,
    };
    let ctx = system::init(&config, mock_imu(&config), recorder)?;

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let shutdown = async move {
        tokio::select! {
            _ = stop_rx => {}
            _ = ctrl_c() => {}
        }
    };

    let (tx, mut rx) = mpsc::channel::<WindowReport>(8);
    let counter = async move {
        let mut stop = Some(stop_tx);
        while let Some(report) = rx.recv().await {
            if report.sequence >= windows {
                if let Some(tx) = stop.take() {
                    let _ = tx.send(());
                }
            }
        }
    };

    let (summary, ()) = tokio::join!(system::run(ctx, &config, shutdown, tx), counter);
    let summary = summary?;
    info!(windows = summary.windows, "collection finished");
    Ok(())
}
