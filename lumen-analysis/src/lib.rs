//! Spectrum analysis for Lumen - frequency-domain frames for the visualizer

mod spectrum;

pub use spectrum::{SpectrumAnalyzer, SpectrumFrame, SpectrumSampler, SPECTRUM_BINS};
