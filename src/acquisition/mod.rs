//! Producer/consumer acquisition core.
//!
//! - [`producer`]: per-tick state machine writing one sample into the ring
//! - [`consumer`]: async task draining, conditioning and classifying windows
//! - [`signal`]: the readiness event between the two
//! - [`timer`]: periodic tick source driving the producer
pub mod consumer;
pub mod producer;
pub mod signal;
pub mod timer;

pub use consumer::{WindowConsumer, WindowReport};
pub use producer::{AcquisitionLoop, TickOutcome};
pub use signal::ReadySignal;
pub use timer::PeriodicTimer;
