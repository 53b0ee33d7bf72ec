//! Gain stage - the graph's entry point, always present
//!
//! The target gain comes from the active preset; the Normal preset runs a
//! higher output gain to compensate for the perceived loudness loss of the
//! processed presets. Per-frame smoothing keeps gain changes click-free.

use crate::stage::Stage;

/// Per-frame smoothing coefficient (~5ms at 48kHz)
const GAIN_SMOOTH_COEFF: f32 = 0.995;

/// Smoothed linear gain stage
pub struct GainStage {
    target: f32,
    smoothed: f32,
}

impl GainStage {
    pub fn new(gain: f32) -> Self {
        Self {
            target: gain,
            smoothed: gain,
        }
    }

    /// Set the target gain; the processed value ramps toward it
    pub fn set_gain(&mut self, gain: f32) {
        self.target = gain.max(0.0);
    }

    pub fn gain(&self) -> f32 {
        self.target
    }
}

impl Stage for GainStage {
    fn process(&mut self, samples: &mut [f32]) {
        for frame in samples.chunks_mut(2) {
            self.smoothed =
                GAIN_SMOOTH_COEFF * self.smoothed + (1.0 - GAIN_SMOOTH_COEFF) * self.target;
            for sample in frame {
                *sample *= self.smoothed;
            }
        }
    }

    fn reset(&mut self) {
        self.smoothed = self.target;
    }

    fn name(&self) -> &'static str {
        "Gain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unity_gain_passes_through() {
        let mut stage = GainStage::new(1.0);
        let mut samples = vec![0.5, -0.5, 0.25, -0.25];
        stage.process(&mut samples);
        assert_eq!(samples, vec![0.5, -0.5, 0.25, -0.25]);
    }

    #[test]
    fn test_gain_ramps_toward_target() {
        let mut stage = GainStage::new(1.0);
        stage.set_gain(2.0);
        let mut samples = vec![1.0; 2000];
        stage.process(&mut samples);
        // Early frames near 1.0, late frames approach 2.0
        assert!(samples[0] < 1.1);
        assert!(*samples.last().unwrap() > 1.8);
    }

    #[test]
    fn test_negative_gain_clamped_to_zero() {
        let mut stage = GainStage::new(1.0);
        stage.set_gain(-3.0);
        assert_eq!(stage.gain(), 0.0);
    }
}
