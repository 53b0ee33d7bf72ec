//! FFT-based spectrum analysis feeding the visualization
//!
//! Frames are regenerated from the effect graph's analysis tap on every
//! sampling tick and never persisted. Before any audio has flowed through
//! the graph, a static placeholder frame keeps the display from being blank.

use rustfft::{num_complex::Complex, FftPlanner};
use std::f32::consts::PI;
use std::time::{Duration, Instant};

/// Number of frequency bins in a rendered frame
pub const SPECTRUM_BINS: usize = 64;

/// Height of the placeholder bars shown before the first play
const PLACEHOLDER_LEVEL: f32 = 0.12;

/// One renderable snapshot of the signal's frequency content
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpectrumFrame {
    /// Magnitude per bin (0.0 - 1.0)
    pub bins: [f32; SPECTRUM_BINS],
}

impl Default for SpectrumFrame {
    fn default() -> Self {
        Self {
            bins: [0.0; SPECTRUM_BINS],
        }
    }
}

impl SpectrumFrame {
    /// Static pattern rendered while no analysis tap exists yet
    pub fn placeholder() -> Self {
        Self {
            bins: [PLACEHOLDER_LEVEL; SPECTRUM_BINS],
        }
    }
}

/// Real-time FFT spectrum analyzer
pub struct SpectrumAnalyzer {
    sample_rate: u32,
    fft_size: usize,
    fft: std::sync::Arc<dyn rustfft::Fft<f32>>,
    window: Vec<f32>,
    frequency_bands: [(f32, f32); SPECTRUM_BINS],
    smoothing: f32,
    previous_magnitudes: [f32; SPECTRUM_BINS],
    /// Pre-allocated FFT buffer to avoid allocation in analyze()
    fft_buffer: Vec<Complex<f32>>,
}

impl SpectrumAnalyzer {
    /// Create a new spectrum analyzer
    pub fn new(sample_rate: u32) -> Self {
        let fft_size = 1024;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        // Pre-compute Hann window
        let window: Vec<f32> = (0..fft_size)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / fft_size as f32).cos()))
            .collect();

        // Logarithmically spaced frequency bands (20Hz up to Nyquist)
        let mut bands = [(0.0f32, 0.0f32); SPECTRUM_BINS];
        let min_freq = 20.0f32;
        let max_freq = 20000.0f32.min(sample_rate as f32 / 2.0);
        let log_min = min_freq.ln();
        let log_max = max_freq.ln();

        for (i, band) in bands.iter_mut().enumerate() {
            let t0 = i as f32 / SPECTRUM_BINS as f32;
            let t1 = (i + 1) as f32 / SPECTRUM_BINS as f32;
            *band = (
                (log_min + t0 * (log_max - log_min)).exp(),
                (log_min + t1 * (log_max - log_min)).exp(),
            );
        }

        Self {
            sample_rate,
            fft_size,
            fft,
            window,
            frequency_bands: bands,
            smoothing: 0.7,
            previous_magnitudes: [0.0; SPECTRUM_BINS],
            fft_buffer: vec![Complex::new(0.0, 0.0); fft_size],
        }
    }

    /// Analyze a buffer of mono samples into a frame of bin magnitudes
    pub fn analyze(&mut self, samples: &[f32]) -> SpectrumFrame {
        // Windowed copy into the pre-allocated FFT buffer
        let sample_count = samples.len().min(self.fft_size);
        for (i, &sample) in samples.iter().enumerate().take(sample_count) {
            let windowed = sample * self.window.get(i).copied().unwrap_or(0.0);
            self.fft_buffer[i] = Complex::new(windowed, 0.0);
        }
        // Zero pad the rest
        for buf in self.fft_buffer.iter_mut().skip(sample_count) {
            *buf = Complex::new(0.0, 0.0);
        }

        self.fft.process(&mut self.fft_buffer);

        // Average magnitude per logarithmic band
        let mut magnitudes = [0.0f32; SPECTRUM_BINS];
        let bin_width = self.sample_rate as f32 / self.fft_size as f32;

        for (i, &(low, high)) in self.frequency_bands.iter().enumerate() {
            let start_bin = (low / bin_width) as usize;
            let end_bin = ((high / bin_width) as usize).min(self.fft_size / 2);

            if start_bin < end_bin {
                let sum: f32 = self.fft_buffer[start_bin..end_bin]
                    .iter()
                    .map(|c| c.norm())
                    .sum();
                magnitudes[i] = sum / (end_bin - start_bin) as f32;
            }
        }

        // Normalize to 0-1 range (approximate based on typical values)
        let max_magnitude = magnitudes.iter().cloned().fold(0.0f32, f32::max);
        if max_magnitude > 0.0 {
            for mag in &mut magnitudes {
                *mag /= max_magnitude.max(100.0);
                *mag = mag.clamp(0.0, 1.0);
            }
        }

        // Exponential smoothing against the previous frame
        for (mag, prev) in magnitudes
            .iter_mut()
            .zip(self.previous_magnitudes.iter_mut())
        {
            *mag = *prev * self.smoothing + *mag * (1.0 - self.smoothing);
            *prev = *mag;
        }

        SpectrumFrame { bins: magnitudes }
    }
}

/// Rate-limited frame producer sitting between the analysis tap and the UI
///
/// The caller may poll on every animation frame; the sampler only performs
/// an FFT when at least `min_interval` has elapsed since the last frame,
/// bounding CPU cost on high refresh-rate displays.
pub struct SpectrumSampler {
    analyzer: SpectrumAnalyzer,
    min_interval: Duration,
    last_frame: Option<Instant>,
}

impl SpectrumSampler {
    /// Create a sampler with the given minimum inter-frame interval
    pub fn new(sample_rate: u32, min_interval: Duration) -> Self {
        Self {
            analyzer: SpectrumAnalyzer::new(sample_rate),
            min_interval,
            last_frame: None,
        }
    }

    /// Sample the tap, or return None if called again within the throttle window
    pub fn sample(&mut self, tap: &[f32]) -> Option<SpectrumFrame> {
        let now = Instant::now();
        if let Some(last) = self.last_frame {
            if now.duration_since(last) < self.min_interval {
                return None;
            }
        }
        self.last_frame = Some(now);
        Some(self.analyzer.analyze(tap))
    }

    /// Forget the throttle state (track change, engine restart)
    pub fn reset(&mut self) {
        self.last_frame = None;
        self.analyzer.previous_magnitudes = [0.0; SPECTRUM_BINS];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_placeholder_is_not_blank() {
        let frame = SpectrumFrame::placeholder();
        assert!(frame.bins.iter().all(|&b| b > 0.0));
    }

    #[test]
    fn test_frame_bounded_zero_to_one() {
        let mut analyzer = SpectrumAnalyzer::new(44100);
        // Deliberately hot input
        let samples: Vec<f32> = sine(440.0, 44100, 1024).iter().map(|s| s * 10.0).collect();
        let frame = analyzer.analyze(&samples);
        assert!(frame.bins.iter().all(|&b| (0.0..=1.0).contains(&b)));
    }

    #[test]
    fn test_silence_yields_zero_frame() {
        let mut analyzer = SpectrumAnalyzer::new(44100);
        let frame = analyzer.analyze(&vec![0.0; 1024]);
        assert!(frame.bins.iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_low_tone_concentrates_in_low_bins() {
        let mut analyzer = SpectrumAnalyzer::new(44100);
        let samples = sine(60.0, 44100, 1024);
        // Run a few frames so smoothing settles
        let mut frame = analyzer.analyze(&samples);
        for _ in 0..4 {
            frame = analyzer.analyze(&samples);
        }
        let low: f32 = frame.bins[..8].iter().sum();
        let high: f32 = frame.bins[SPECTRUM_BINS - 8..].iter().sum();
        assert!(low > high);
    }

    #[test]
    fn test_sampler_throttles_back_to_back_calls() {
        let mut sampler = SpectrumSampler::new(44100, Duration::from_millis(100));
        let samples = sine(440.0, 44100, 1024);
        assert!(sampler.sample(&samples).is_some());
        // Immediately again: inside the throttle window
        assert!(sampler.sample(&samples).is_none());
    }

    #[test]
    fn test_sampler_reset_allows_immediate_frame() {
        let mut sampler = SpectrumSampler::new(44100, Duration::from_secs(10));
        let samples = sine(440.0, 44100, 1024);
        assert!(sampler.sample(&samples).is_some());
        sampler.reset();
        assert!(sampler.sample(&samples).is_some());
    }
}
