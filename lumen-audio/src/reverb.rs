//! Spatial reverb stage
//!
//! Freeverb-derived network: parallel lowpass-feedback comb filters into
//! series allpass diffusers, per channel with a stereo spread. The preset
//! drives a single decay time in seconds; comb feedback is derived from it
//! with the RT60 relation so longer decays ring longer.

use crate::stage::Stage;

/// Comb delay times in samples at 44.1kHz (Freeverb tunings)
const COMB_TUNINGS: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];

/// Allpass delay times in samples at 44.1kHz
const ALLPASS_TUNINGS: [usize; 4] = [556, 441, 341, 225];

/// Right-channel delay offset in samples
const STEREO_SPREAD: usize = 23;

/// Decay times at or below this are treated as reverb-off
const MIN_DECAY_SECS: f32 = 0.001;

/// Longest supported decay time in seconds
const MAX_DECAY_SECS: f32 = 3.0;

/// Fixed wet mix
const WET: f32 = 0.25;

/// Fixed feedback-path damping
const DAMPING: f32 = 0.4;

/// Lowpass-feedback comb filter
struct CombFilter {
    buffer: Vec<f32>,
    index: usize,
    filter_store: f32,
}

impl CombFilter {
    fn new(size: usize) -> Self {
        Self {
            buffer: vec![0.0; size],
            index: 0,
            filter_store: 0.0,
        }
    }

    fn process(&mut self, input: f32, feedback: f32) -> f32 {
        let output = self.buffer[self.index];

        // Lowpass in the feedback path
        self.filter_store = output * (1.0 - DAMPING) + self.filter_store * DAMPING;
        self.buffer[self.index] = input + self.filter_store * feedback;

        self.index = (self.index + 1) % self.buffer.len();
        output
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.filter_store = 0.0;
        self.index = 0;
    }
}

/// Schroeder allpass diffuser
struct AllpassFilter {
    buffer: Vec<f32>,
    index: usize,
}

impl AllpassFilter {
    fn new(size: usize) -> Self {
        Self {
            buffer: vec![0.0; size],
            index: 0,
        }
    }

    fn process(&mut self, input: f32) -> f32 {
        let buffered = self.buffer[self.index];
        let output = -input + buffered;

        // 0.5 is the standard diffusion coefficient
        self.buffer[self.index] = input + buffered * 0.5;

        self.index = (self.index + 1) % self.buffer.len();
        output
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.index = 0;
    }
}

/// Stereo reverb with a decay time in seconds
pub struct Reverb {
    comb_l: [CombFilter; 8],
    allpass_l: [AllpassFilter; 4],
    comb_r: [CombFilter; 8],
    allpass_r: [AllpassFilter; 4],

    /// Mean comb delay in seconds, used by the RT60 feedback mapping
    mean_comb_delay: f32,
    decay_secs: f32,
    feedback: f32,
}

impl Reverb {
    pub fn new(sample_rate: u32) -> Self {
        let scale = sample_rate as f32 / 44100.0;
        let spread = (STEREO_SPREAD as f32 * scale) as usize;

        let comb_l =
            std::array::from_fn(|i| CombFilter::new((COMB_TUNINGS[i] as f32 * scale) as usize));
        let comb_r = std::array::from_fn(|i| {
            CombFilter::new((COMB_TUNINGS[i] as f32 * scale) as usize + spread)
        });
        let allpass_l = std::array::from_fn(|i| {
            AllpassFilter::new((ALLPASS_TUNINGS[i] as f32 * scale) as usize)
        });
        let allpass_r = std::array::from_fn(|i| {
            AllpassFilter::new((ALLPASS_TUNINGS[i] as f32 * scale) as usize + spread)
        });

        let mean_comb_delay = COMB_TUNINGS.iter().sum::<usize>() as f32
            / (COMB_TUNINGS.len() as f32 * 44100.0);

        let mut reverb = Self {
            comb_l,
            allpass_l,
            comb_r,
            allpass_r,
            mean_comb_delay,
            decay_secs: MIN_DECAY_SECS,
            feedback: 0.0,
        };
        reverb.update_feedback();
        reverb
    }

    /// Set the decay time in seconds; values below the floor read as off
    pub fn set_decay(&mut self, secs: f32) {
        self.decay_secs = secs.clamp(MIN_DECAY_SECS, MAX_DECAY_SECS);
        self.update_feedback();
    }

    pub fn decay(&self) -> f32 {
        self.decay_secs
    }

    /// Effectively-off: the tail is shorter than a single comb pass
    pub fn is_silent(&self) -> bool {
        self.decay_secs <= MIN_DECAY_SECS
    }

    /// RT60 relation: the tail falls 60dB over decay_secs
    fn update_feedback(&mut self) {
        let feedback = 10.0f32.powf(-3.0 * self.mean_comb_delay / self.decay_secs);
        self.feedback = feedback.min(0.98);
    }

    fn process_sample(&mut self, left: f32, right: f32) -> (f32, f32) {
        // Attenuated mono feed keeps the comb sum from building up
        let input = (left + right) * 0.25;
        let feedback = self.feedback;

        let mut out_l = 0.0;
        let mut out_r = 0.0;
        for comb in &mut self.comb_l {
            out_l += comb.process(input, feedback);
        }
        for comb in &mut self.comb_r {
            out_r += comb.process(input, feedback);
        }
        out_l *= 0.125;
        out_r *= 0.125;

        for allpass in &mut self.allpass_l {
            out_l = allpass.process(out_l);
        }
        for allpass in &mut self.allpass_r {
            out_r = allpass.process(out_r);
        }

        let dry = 1.0 - WET;
        (
            soft_clip(left * dry + out_l * WET),
            soft_clip(right * dry + out_r * WET),
        )
    }
}

fn soft_clip(x: f32) -> f32 {
    if x > 1.0 {
        1.0 - 1.0 / (1.0 + (x - 1.0) * 2.0)
    } else if x < -1.0 {
        -1.0 + 1.0 / (1.0 + (-x - 1.0) * 2.0)
    } else {
        x
    }
}

impl Stage for Reverb {
    fn process(&mut self, samples: &mut [f32]) {
        if self.is_silent() {
            return;
        }

        for chunk in samples.chunks_mut(2) {
            if chunk.len() == 2 {
                let (l, r) = self.process_sample(chunk[0], chunk[1]);
                chunk[0] = l;
                chunk[1] = r;
            }
        }
    }

    fn reset(&mut self) {
        for comb in self.comb_l.iter_mut().chain(self.comb_r.iter_mut()) {
            comb.reset();
        }
        for allpass in self.allpass_l.iter_mut().chain(self.allpass_r.iter_mut()) {
            allpass.reset();
        }
    }

    fn name(&self) -> &'static str {
        "Reverb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decay_floor_reads_as_silent() {
        let mut reverb = Reverb::new(48000);
        reverb.set_decay(0.0);
        assert_eq!(reverb.decay(), MIN_DECAY_SECS);
        assert!(reverb.is_silent());

        reverb.set_decay(1.2);
        assert!(!reverb.is_silent());
    }

    #[test]
    fn test_silent_decay_passes_through() {
        let mut reverb = Reverb::new(48000);
        reverb.set_decay(0.001);
        let mut samples = vec![0.5, -0.5, 0.25, -0.25];
        reverb.process(&mut samples);
        assert_eq!(samples, vec![0.5, -0.5, 0.25, -0.25]);
    }

    #[test]
    fn test_impulse_leaves_a_tail() {
        let mut reverb = Reverb::new(48000);
        reverb.set_decay(2.0);

        // Impulse followed by silence
        let mut samples = vec![0.0f32; 48000];
        samples[0] = 1.0;
        samples[1] = 1.0;
        reverb.process(&mut samples);

        // Energy well after the impulse means the network is ringing
        let tail = &samples[24000..];
        assert!(tail.iter().any(|s| s.abs() > 1e-4));
    }

    #[test]
    fn test_longer_decay_rings_longer() {
        let tail_energy = |decay: f32| {
            let mut reverb = Reverb::new(48000);
            reverb.set_decay(decay);
            let mut samples = vec![0.0f32; 96000];
            samples[0] = 1.0;
            samples[1] = 1.0;
            reverb.process(&mut samples);
            samples[48000..].iter().map(|s| s * s).sum::<f32>()
        };

        assert!(tail_energy(3.0) > tail_energy(0.5));
    }

    #[test]
    fn test_decay_clamped_to_range() {
        let mut reverb = Reverb::new(48000);
        reverb.set_decay(10.0);
        assert_eq!(reverb.decay(), MAX_DECAY_SECS);
    }
}
