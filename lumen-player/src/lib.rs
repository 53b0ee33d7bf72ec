//! Player core for Lumen - queue, transport, engine orchestration
//!
//! The engine owns one track source, one effect graph, and one queue.
//! Front ends send `PlayerCommand`s and consume `PlayerEvent`s; the audio
//! device callback calls `EngineState::process_audio`.

mod config;
mod engine;
mod loader;
mod queue;
mod track;
mod transport;

pub use config::{EngineConfig, QueueEndPolicy};
pub use engine::{EngineState, LoadRequest, PlayerCommand, PlayerEngine, PlayerEvent};
pub use loader::{DecodedAudio, LoadError, TrackLoader};
pub use queue::{Advance, EnqueuePosition, Queue, RemoveOutcome};
pub use track::{Track, TrackId};
pub use transport::{PlaybackState, RepeatMode, Transport, DEFAULT_VOLUME};
