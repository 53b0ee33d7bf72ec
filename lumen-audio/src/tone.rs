//! Three-band tone-shaping stage
//!
//! Low shelf, mid bell, high shelf in series, driven by the preset's
//! bass/mid/treble gains. Coefficients follow the RBJ Audio EQ Cookbook
//! and are recomputed lazily when a gain changes.

use std::f32::consts::PI;

use crate::stage::Stage;

/// Low shelf corner frequency (Hz)
const LOW_FREQ: f32 = 400.0;
/// Mid bell center frequency (Hz)
const MID_FREQ: f32 = 1000.0;
/// Mid bell Q
const MID_Q: f32 = 0.7;
/// High shelf corner frequency (Hz)
const HIGH_FREQ: f32 = 2500.0;
/// Band gain limit in dB
const GAIN_LIMIT_DB: f32 = 12.0;

/// Biquad filter coefficients
#[derive(Clone, Copy, Default)]
struct BiquadCoeffs {
    a0: f32,
    a1: f32,
    a2: f32,
    b1: f32,
    b2: f32,
}

/// Biquad filter state for a single channel
#[derive(Default, Clone)]
struct BiquadState {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl BiquadState {
    #[inline]
    fn process(&mut self, input: f32, coeffs: &BiquadCoeffs) -> f32 {
        let output = coeffs.a0 * input + coeffs.a1 * self.x1 + coeffs.a2 * self.x2
            - coeffs.b1 * self.y1
            - coeffs.b2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Low shelf / mid bell / high shelf tone stage
pub struct ThreeBandTone {
    sample_rate: f32,

    bass_db: f32,
    mid_db: f32,
    treble_db: f32,

    low_coeffs: BiquadCoeffs,
    mid_coeffs: BiquadCoeffs,
    high_coeffs: BiquadCoeffs,

    low_state: [BiquadState; 2],
    mid_state: [BiquadState; 2],
    high_state: [BiquadState; 2],

    needs_update: bool,
}

impl ThreeBandTone {
    pub fn new(sample_rate: u32) -> Self {
        let mut tone = Self {
            sample_rate: sample_rate as f32,
            bass_db: 0.0,
            mid_db: 0.0,
            treble_db: 0.0,
            low_coeffs: BiquadCoeffs::default(),
            mid_coeffs: BiquadCoeffs::default(),
            high_coeffs: BiquadCoeffs::default(),
            low_state: [BiquadState::default(), BiquadState::default()],
            mid_state: [BiquadState::default(), BiquadState::default()],
            high_state: [BiquadState::default(), BiquadState::default()],
            needs_update: true,
        };
        tone.update_coefficients();
        tone
    }

    /// Set all three band gains in dB at once (preset application)
    pub fn set_band_gains(&mut self, bass_db: f32, mid_db: f32, treble_db: f32) {
        self.bass_db = bass_db.clamp(-GAIN_LIMIT_DB, GAIN_LIMIT_DB);
        self.mid_db = mid_db.clamp(-GAIN_LIMIT_DB, GAIN_LIMIT_DB);
        self.treble_db = treble_db.clamp(-GAIN_LIMIT_DB, GAIN_LIMIT_DB);
        self.needs_update = true;
    }

    pub fn band_gains(&self) -> (f32, f32, f32) {
        (self.bass_db, self.mid_db, self.treble_db)
    }

    fn update_coefficients(&mut self) {
        self.low_coeffs = Self::shelf_coeffs(self.sample_rate, LOW_FREQ, self.bass_db, true);
        self.mid_coeffs = Self::bell_coeffs(self.sample_rate, MID_FREQ, self.mid_db, MID_Q);
        self.high_coeffs = Self::shelf_coeffs(self.sample_rate, HIGH_FREQ, self.treble_db, false);
        self.needs_update = false;
    }

    /// RBJ low/high shelf
    fn shelf_coeffs(sample_rate: f32, freq: f32, gain_db: f32, low: bool) -> BiquadCoeffs {
        let a = 10.0f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * freq / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        // Shelf slope S = 1
        let alpha = sin_w0 / 2.0 * (2.0f32).sqrt();
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        let (b0, b1, b2, a0, a1, a2) = if low {
            (
                a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                (a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
            )
        } else {
            (
                a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                (a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
            )
        };

        BiquadCoeffs {
            a0: b0 / a0,
            a1: b1 / a0,
            a2: b2 / a0,
            b1: a1 / a0,
            b2: a2 / a0,
        }
    }

    /// RBJ peaking bell
    fn bell_coeffs(sample_rate: f32, freq: f32, gain_db: f32, q: f32) -> BiquadCoeffs {
        let a = 10.0f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * freq / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);

        let b0 = 1.0 + alpha * a;
        let b1 = -2.0 * cos_w0;
        let b2 = 1.0 - alpha * a;
        let a0 = 1.0 + alpha / a;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha / a;

        BiquadCoeffs {
            a0: b0 / a0,
            a1: b1 / a0,
            a2: b2 / a0,
            b1: a1 / a0,
            b2: a2 / a0,
        }
    }
}

impl Stage for ThreeBandTone {
    fn process(&mut self, samples: &mut [f32]) {
        if self.needs_update {
            self.update_coefficients();
        }

        // Flat response: skip the filter chain
        if self.bass_db == 0.0 && self.mid_db == 0.0 && self.treble_db == 0.0 {
            return;
        }

        for frame in samples.chunks_mut(2) {
            for (ch, sample) in frame.iter_mut().enumerate() {
                let mut s = *sample;
                s = self.low_state[ch].process(s, &self.low_coeffs);
                s = self.mid_state[ch].process(s, &self.mid_coeffs);
                s = self.high_state[ch].process(s, &self.high_coeffs);
                *sample = s;
            }
        }
    }

    fn reset(&mut self) {
        for state in self
            .low_state
            .iter_mut()
            .chain(self.mid_state.iter_mut())
            .chain(self.high_state.iter_mut())
        {
            state.reset();
        }
    }

    fn name(&self) -> &'static str {
        "ThreeBandTone"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    fn stereo_sine(freq: f32, sample_rate: f32, frames: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(frames * 2);
        for i in 0..frames {
            let s = (2.0 * PI * freq * i as f32 / sample_rate).sin() * 0.5;
            out.push(s);
            out.push(s);
        }
        out
    }

    #[test]
    fn test_flat_gains_pass_through() {
        let mut tone = ThreeBandTone::new(48000);
        let mut samples = stereo_sine(440.0, 48000.0, 256);
        let original = samples.clone();
        tone.process(&mut samples);
        assert_eq!(samples, original);
    }

    #[test]
    fn test_bass_boost_raises_low_frequency_level() {
        let mut tone = ThreeBandTone::new(48000);
        tone.set_band_gains(6.0, 0.0, 0.0);

        let mut low = stereo_sine(100.0, 48000.0, 4096);
        let reference = rms(&low);
        tone.process(&mut low);
        // Skip the transient at the head
        assert!(rms(&low[2048..]) > reference);
    }

    #[test]
    fn test_treble_cut_lowers_high_frequency_level() {
        let mut tone = ThreeBandTone::new(48000);
        tone.set_band_gains(0.0, 0.0, -6.0);

        let mut high = stereo_sine(8000.0, 48000.0, 4096);
        let reference = rms(&high);
        tone.process(&mut high);
        assert!(rms(&high[2048..]) < reference);
    }

    #[test]
    fn test_band_gains_clamped() {
        let mut tone = ThreeBandTone::new(48000);
        tone.set_band_gains(40.0, -40.0, 0.0);
        let (bass, mid, _) = tone.band_gains();
        assert_eq!(bass, GAIN_LIMIT_DB);
        assert_eq!(mid, -GAIN_LIMIT_DB);
    }
}
