//! Ring buffer and window signal-conditioning stages.
pub mod iir_filter;
pub mod normalize;
pub mod orientation;
pub mod pipeline;
pub mod quantize;
pub mod ring_buffer;

/// A floating-point stage applied in place to one sample-major window.
///
/// Implementors keep whatever per-channel state they need between calls; the
/// pipeline never resets a stage once it is constructed.
pub trait WindowStage: Send + Sync {
    /// Short identifier of the stage.
    fn name(&self) -> &'static str;

    /// Transform the window in place.
    fn apply(&mut self, window: &mut [f32]);
}
