//! Processing stage trait shared by every node in the effect graph

/// A single audio processing stage
pub trait Stage: Send {
    /// Process audio samples in place (stereo interleaved)
    fn process(&mut self, samples: &mut [f32]);

    /// Reset internal state (delay lines, envelopes, filter memory)
    fn reset(&mut self);

    /// Get stage name
    fn name(&self) -> &'static str;
}
