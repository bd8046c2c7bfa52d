//! # IMU DAQ Core Library
//!
//! Real-time acquisition and signal conditioning for a 6-axis inertial sensor
//! feeding a windowed gesture classifier. A periodic tick samples the sensor
//! into a lock-free ring buffer; once a full window has accumulated, an async
//! consumer drains it, filters, normalizes, remaps and quantizes it, and hands
//! it to an inference engine.
//!
//! ## Crate Structure
//!
//! - **`acquisition`**: The per-tick producer, the window consumer, the readiness
//!   signal between them and the periodic timer driving the producer.
//! - **`config`**: Layered `figment` configuration (`DaqConfig`) with validation.
//! - **`data`**: The SPSC ring buffer and the signal-conditioning stages.
//! - **`error`**: The `DaqError` enum and the `Copy` leaf errors of the tick path.
//! - **`hardware`**: The `SampleSource` sensor capability and mock IMUs.
//! - **`inference`**: The `InferenceEngine` capability, classification and a mock model.
//! - **`logging`**: `tracing-subscriber` initialisation.
//! - **`system`**: Wiring everything into an owned `SystemContext` and running it.

pub mod acquisition;
pub mod config;
pub mod data;
pub mod error;
pub mod hardware;
pub mod inference;
pub mod logging;
pub mod system;
