//! Dynamics compression stage
//!
//! Feed-forward compressor with a soft knee and program-level attack and
//! release. The preset table drives only the threshold; ratio and timing
//! are fixed at values that behave well on full mixes. A threshold of
//! 0 dB leaves the signal untouched.

use crate::stage::Stage;

/// Fixed compression ratio applied above the knee
const RATIO: f32 = 12.0;
/// Soft knee width in dB
const KNEE_DB: f32 = 6.0;
/// Attack time in ms
const ATTACK_MS: f32 = 3.0;
/// Release time in ms
const RELEASE_MS: f32 = 250.0;

/// Feed-forward stereo compressor
pub struct Compressor {
    /// Threshold in dB, clamped to [-100, 0]
    threshold_db: f32,
    attack_coeff: f32,
    release_coeff: f32,
    /// Envelope follower state in dB
    envelope_db: f32,
}

impl Compressor {
    pub fn new(sample_rate: u32) -> Self {
        let sample_rate = sample_rate as f32;
        Self {
            threshold_db: 0.0,
            attack_coeff: Self::time_coeff(sample_rate, ATTACK_MS),
            release_coeff: Self::time_coeff(sample_rate, RELEASE_MS),
            envelope_db: -100.0,
        }
    }

    /// One-pole coefficient for a time constant in ms
    fn time_coeff(sample_rate: f32, ms: f32) -> f32 {
        (-1.0 / (sample_rate * ms * 0.001)).exp()
    }

    /// Set the threshold in dB; values outside [-100, 0] are clamped
    pub fn set_threshold(&mut self, db: f32) {
        self.threshold_db = db.clamp(-100.0, 0.0);
    }

    pub fn threshold(&self) -> f32 {
        self.threshold_db
    }

    /// Gain reduction in dB for a level in dB (soft knee)
    fn gain_reduction_db(&self, level_db: f32) -> f32 {
        let over = level_db - self.threshold_db;
        let half_knee = KNEE_DB * 0.5;

        if over <= -half_knee {
            0.0
        } else if over < half_knee {
            // Quadratic interpolation through the knee region
            let t = over + half_knee;
            (1.0 / RATIO - 1.0) * t * t / (2.0 * KNEE_DB)
        } else {
            (1.0 / RATIO - 1.0) * over
        }
    }
}

impl Stage for Compressor {
    fn process(&mut self, samples: &mut [f32]) {
        // Threshold at 0 dB means no compression: skip envelope work entirely
        if self.threshold_db >= 0.0 {
            return;
        }

        for frame in samples.chunks_mut(2) {
            let peak = frame.iter().fold(0.0f32, |m, s| m.max(s.abs()));
            let level_db = 20.0 * peak.max(1e-5).log10();

            // Attack when the level rises, release when it falls
            let coeff = if level_db > self.envelope_db {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope_db = coeff * self.envelope_db + (1.0 - coeff) * level_db;

            let reduction_db = self.gain_reduction_db(self.envelope_db);
            let gain = 10.0f32.powf(reduction_db / 20.0);

            for sample in frame {
                *sample *= gain;
            }
        }
    }

    fn reset(&mut self) {
        self.envelope_db = -100.0;
    }

    fn name(&self) -> &'static str {
        "Compressor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_clamped() {
        let mut comp = Compressor::new(48000);
        comp.set_threshold(-300.0);
        assert_eq!(comp.threshold(), -100.0);
        comp.set_threshold(10.0);
        assert_eq!(comp.threshold(), 0.0);
    }

    #[test]
    fn test_zero_threshold_is_transparent() {
        let mut comp = Compressor::new(48000);
        comp.set_threshold(0.0);
        let mut samples = vec![0.9, -0.9, 0.5, -0.5];
        comp.process(&mut samples);
        assert_eq!(samples, vec![0.9, -0.9, 0.5, -0.5]);
    }

    #[test]
    fn test_loud_signal_is_attenuated() {
        let mut comp = Compressor::new(48000);
        comp.set_threshold(-30.0);
        // Sustained full-scale input well above threshold
        let mut samples = vec![0.9f32; 9600];
        comp.process(&mut samples);
        let tail = &samples[samples.len() - 100..];
        assert!(tail.iter().all(|&s| s < 0.9));
    }

    #[test]
    fn test_quiet_signal_passes_unchanged() {
        let mut comp = Compressor::new(48000);
        comp.set_threshold(-20.0);
        // -60 dBFS input, far below threshold and knee
        let mut samples = vec![0.001f32; 960];
        comp.process(&mut samples);
        for s in samples {
            assert!((s - 0.001).abs() < 1e-4);
        }
    }
}
