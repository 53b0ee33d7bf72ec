//! Preset-driven effect graph
//!
//! One graph per engine, initialized at most once against a sample rate
//! and torn down by dropping. The active preset decides the topology:
//! Normal routes the gain stage straight to the output, every other
//! preset runs gain into compressor, tone and reverb in that order.
//! The analysis tap is fed post-gain in both topologies so the spectrum
//! never goes dark when the chain is bypassed.

use thiserror::Error;
use tracing::debug;

use crate::dynamics::Compressor;
use crate::gain::GainStage;
use crate::reverb::Reverb;
use crate::stage::Stage;
use crate::tone::ThreeBandTone;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("effect graph already initialized")]
    AlreadyInitialized,
    #[error("unsupported sample rate: {0}")]
    Unsupported(u32),
}

/// Named effect preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EffectPreset {
    #[default]
    Normal,
    Ambient,
    Studio,
    Hall,
}

/// Per-preset parameter set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresetParams {
    /// Reverb decay in seconds
    pub reverb_decay: f32,
    /// Tone band gains in dB
    pub bass_gain: f32,
    pub mid_gain: f32,
    pub treble_gain: f32,
    /// Compressor threshold in dB (0 disables compression)
    pub compression_threshold: f32,
    /// Output gain applied at the graph entry
    pub output_gain: f32,
}

impl EffectPreset {
    /// Parse a preset name; unknown names fall back to Normal
    pub fn from_name(name: &str) -> Self {
        match name {
            "ambient" => Self::Ambient,
            "studio" => Self::Studio,
            "hall" => Self::Hall,
            _ => Self::Normal,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Ambient => "ambient",
            Self::Studio => "studio",
            Self::Hall => "hall",
        }
    }

    pub fn params(&self) -> PresetParams {
        match self {
            Self::Normal => PresetParams {
                reverb_decay: 0.1,
                bass_gain: 0.0,
                mid_gain: 0.0,
                treble_gain: 0.0,
                compression_threshold: 0.0,
                output_gain: 2.0,
            },
            Self::Ambient => PresetParams {
                reverb_decay: 0.8,
                bass_gain: 3.0,
                mid_gain: 0.0,
                treble_gain: 2.0,
                compression_threshold: -30.0,
                output_gain: 1.0,
            },
            Self::Studio => PresetParams {
                reverb_decay: 0.1,
                bass_gain: 2.0,
                mid_gain: 1.0,
                treble_gain: 1.0,
                compression_threshold: -15.0,
                output_gain: 1.0,
            },
            Self::Hall => PresetParams {
                reverb_decay: 0.7,
                bass_gain: 1.0,
                mid_gain: 1.0,
                treble_gain: 0.0,
                compression_threshold: -20.0,
                output_gain: 1.0,
            },
        }
    }
}

/// Active routing of the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Gain straight to output
    Direct,
    /// Gain into the full processing chain
    Effected,
}

/// Initialized processing chain
struct Chain {
    gain: GainStage,
    compressor: Compressor,
    tone: ThreeBandTone,
    reverb: Reverb,
    topology: Topology,
    /// Post-gain copy of the last processed buffer, read by analysis
    tap_buffer: Vec<f32>,
}

/// Preset-driven audio effect graph with a permanent analysis tap
pub struct EffectGraph {
    sample_rate: u32,
    chain: Option<Chain>,
    preset: EffectPreset,
}

impl EffectGraph {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            chain: None,
            preset: EffectPreset::Normal,
        }
    }

    /// Build the stages; at most once per graph
    pub fn initialize(&mut self) -> Result<(), GraphError> {
        if self.chain.is_some() {
            return Err(GraphError::AlreadyInitialized);
        }
        if self.sample_rate == 0 {
            return Err(GraphError::Unsupported(self.sample_rate));
        }

        let params = self.preset.params();
        let mut chain = Chain {
            gain: GainStage::new(params.output_gain),
            compressor: Compressor::new(self.sample_rate),
            tone: ThreeBandTone::new(self.sample_rate),
            reverb: Reverb::new(self.sample_rate),
            topology: topology_for(self.preset),
            tap_buffer: Vec::new(),
        };
        apply_params(&mut chain, &params);

        debug!(sample_rate = self.sample_rate, "effect graph initialized");
        self.chain = Some(chain);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.chain.is_some()
    }

    /// Tear the chain down; subsequent calls are no-ops
    pub fn dispose(&mut self) {
        if self.chain.take().is_some() {
            debug!("effect graph disposed");
        }
    }

    pub fn preset(&self) -> EffectPreset {
        self.preset
    }

    pub fn topology(&self) -> Topology {
        self.chain
            .as_ref()
            .map(|c| c.topology)
            .unwrap_or(Topology::Direct)
    }

    /// Switch preset: topology and all stage parameters change together,
    /// so no buffer ever sees a half-applied preset
    pub fn apply_preset(&mut self, preset: EffectPreset) {
        self.preset = preset;
        let params = preset.params();

        if let Some(chain) = &mut self.chain {
            let new_topology = topology_for(preset);
            if chain.topology == Topology::Effected && new_topology == Topology::Direct {
                // Leaving the chain: clear tails so re-entry starts clean
                chain.compressor.reset();
                chain.tone.reset();
                chain.reverb.reset();
            }
            chain.topology = new_topology;
            apply_params(chain, &params);
            debug!(preset = preset.name(), "preset applied");
        }
    }

    /// Process a stereo interleaved buffer in place
    pub fn process(&mut self, samples: &mut [f32]) {
        let Some(chain) = &mut self.chain else {
            return;
        };

        chain.gain.process(samples);

        // The tap reads post-gain audio in every topology
        chain.tap_buffer.clear();
        chain.tap_buffer.extend_from_slice(samples);

        if chain.topology == Topology::Effected {
            chain.compressor.process(samples);
            chain.tone.process(samples);
            chain.reverb.process(samples);
        }
    }

    /// Post-gain audio from the last processed buffer, for analysis.
    /// None until the graph is initialized.
    pub fn tap(&self) -> Option<&[f32]> {
        self.chain.as_ref().map(|c| c.tap_buffer.as_slice())
    }

    /// Whether analysis is receiving audio
    pub fn analysis_connected(&self) -> bool {
        self.chain.is_some()
    }
}

fn topology_for(preset: EffectPreset) -> Topology {
    match preset {
        EffectPreset::Normal => Topology::Direct,
        _ => Topology::Effected,
    }
}

fn apply_params(chain: &mut Chain, params: &PresetParams) {
    chain.gain.set_gain(params.output_gain);
    chain.compressor.set_threshold(params.compression_threshold);
    chain
        .tone
        .set_band_gains(params.bass_gain, params.mid_gain, params.treble_gain);
    chain.reverb.set_decay(params.reverb_decay);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_at_most_once() {
        let mut graph = EffectGraph::new(48000);
        assert!(graph.initialize().is_ok());
        assert!(matches!(
            graph.initialize(),
            Err(GraphError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_zero_sample_rate_rejected() {
        let mut graph = EffectGraph::new(0);
        assert!(matches!(graph.initialize(), Err(GraphError::Unsupported(0))));
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut graph = EffectGraph::new(48000);
        graph.initialize().ok();
        graph.dispose();
        graph.dispose();
        assert!(!graph.is_initialized());
        // A disposed graph can be rebuilt
        assert!(graph.initialize().is_ok());
    }

    #[test]
    fn test_unknown_preset_name_falls_back_to_normal() {
        assert_eq!(EffectPreset::from_name("x"), EffectPreset::Normal);
        assert_eq!(EffectPreset::from_name("ambient"), EffectPreset::Ambient);
    }

    #[test]
    fn test_normal_routes_direct_others_effected() {
        let mut graph = EffectGraph::new(48000);
        graph.initialize().ok();
        assert_eq!(graph.topology(), Topology::Direct);

        graph.apply_preset(EffectPreset::Hall);
        assert_eq!(graph.topology(), Topology::Effected);

        graph.apply_preset(EffectPreset::Normal);
        assert_eq!(graph.topology(), Topology::Direct);
    }

    #[test]
    fn test_reapplying_same_preset_changes_nothing() {
        let mut once = EffectGraph::new(48000);
        once.initialize().ok();
        once.apply_preset(EffectPreset::Hall);

        let mut twice = EffectGraph::new(48000);
        twice.initialize().ok();
        twice.apply_preset(EffectPreset::Hall);
        twice.apply_preset(EffectPreset::Hall);

        assert_eq!(twice.preset(), EffectPreset::Hall);
        assert_eq!(twice.topology(), Topology::Effected);
        assert!(twice.analysis_connected());

        // Identical parameters produce identical audio and tap content
        let mut a = vec![0.3f32; 256];
        let mut b = a.clone();
        once.process(&mut a);
        twice.process(&mut b);
        assert_eq!(a, b);
        assert_eq!(once.tap(), twice.tap());
    }

    #[test]
    fn test_tap_is_fed_in_direct_topology() {
        let mut graph = EffectGraph::new(48000);
        graph.initialize().ok();

        let mut samples = vec![0.25f32; 128];
        graph.process(&mut samples);

        let tap = graph.tap().unwrap();
        assert_eq!(tap.len(), 128);
        assert!(tap.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn test_tap_absent_before_initialize() {
        let graph = EffectGraph::new(48000);
        assert!(graph.tap().is_none());
        assert!(!graph.analysis_connected());
    }

    #[test]
    fn test_process_before_initialize_is_a_no_op() {
        let mut graph = EffectGraph::new(48000);
        let mut samples = vec![0.5f32; 8];
        graph.process(&mut samples);
        assert_eq!(samples, vec![0.5f32; 8]);
    }

    #[test]
    fn test_preset_params_match_table() {
        let params = EffectPreset::Ambient.params();
        assert_eq!(params.reverb_decay, 0.8);
        assert_eq!(params.bass_gain, 3.0);
        assert_eq!(params.compression_threshold, -30.0);
        assert_eq!(params.output_gain, 1.0);

        let normal = EffectPreset::Normal.params();
        assert_eq!(normal.output_gain, 2.0);
        assert_eq!(normal.compression_threshold, 0.0);
    }
}
