//! Audio engine for Lumen - track source, effect stages, and the preset graph
//!
//! The processing pipeline:
//! - TrackSource: decoded sample playback with seek and volume
//! - Stages: gain, dynamics, tone-shaping, spatial reverb
//! - EffectGraph: preset-driven topology with a permanent analysis tap

mod dynamics;
mod gain;
mod graph;
mod reverb;
mod source;
mod stage;
mod tone;

pub use dynamics::Compressor;
pub use gain::GainStage;
pub use graph::{EffectGraph, EffectPreset, GraphError, PresetParams, Topology};
pub use reverb::Reverb;
pub use source::TrackSource;
pub use stage::Stage;
pub use tone::ThreeBandTone;
