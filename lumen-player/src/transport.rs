//! Transport state - play/pause, position, volume, repeat

use std::sync::Arc;

use crate::track::Track;

/// Initial output volume
pub const DEFAULT_VOLUME: f32 = 0.2;

/// Repeat behavior at track end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatMode {
    #[default]
    Off,
    Track,
    Playlist,
}

impl RepeatMode {
    /// off -> track -> playlist -> off
    pub fn cycled(self) -> Self {
        match self {
            Self::Off => Self::Track,
            Self::Track => Self::Playlist,
            Self::Playlist => Self::Off,
        }
    }
}

/// Snapshot of the transport published to the UI
#[derive(Debug, Clone, Default)]
pub struct PlaybackState {
    pub current_track: Option<Arc<Track>>,
    pub is_playing: bool,
    /// Position in seconds
    pub position: f64,
    /// Duration in seconds
    pub duration: f64,
    pub volume: f32,
    pub repeat_mode: RepeatMode,
}

/// Transport-level state owned by the engine
///
/// Position and duration live in the track source; this struct carries
/// what the source does not know about: the seek drag, volume target,
/// and repeat mode.
pub struct Transport {
    pub volume: f32,
    pub repeat_mode: RepeatMode,
    /// Position shown while a seek drag is live
    drag_position: Option<f64>,
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            repeat_mode: RepeatMode::Off,
            drag_position: None,
        }
    }
}

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output volume, clamped to [0, 1]
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn cycle_repeat_mode(&mut self) -> RepeatMode {
        self.repeat_mode = self.repeat_mode.cycled();
        self.repeat_mode
    }

    /// Start a seek drag; position ticks are suppressed until commit
    pub fn begin_seek(&mut self, position: f64) {
        self.drag_position = Some(position.max(0.0));
    }

    /// Update the live drag position
    pub fn update_seek(&mut self, position: f64) {
        if self.drag_position.is_some() {
            self.drag_position = Some(position.max(0.0));
        }
    }

    /// End the drag, returning the position to apply
    pub fn commit_seek(&mut self) -> Option<f64> {
        self.drag_position.take()
    }

    pub fn is_seeking(&self) -> bool {
        self.drag_position.is_some()
    }

    /// Position to display: the drag position while seeking, else the
    /// source position
    pub fn display_position(&self, source_position: f64) -> f64 {
        self.drag_position.unwrap_or(source_position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_mode_cycles_through_all_modes() {
        let mut transport = Transport::new();
        assert_eq!(transport.repeat_mode, RepeatMode::Off);
        assert_eq!(transport.cycle_repeat_mode(), RepeatMode::Track);
        assert_eq!(transport.cycle_repeat_mode(), RepeatMode::Playlist);
        assert_eq!(transport.cycle_repeat_mode(), RepeatMode::Off);
    }

    #[test]
    fn test_volume_defaults_and_clamps() {
        let mut transport = Transport::new();
        assert_eq!(transport.volume, DEFAULT_VOLUME);
        transport.set_volume(1.5);
        assert_eq!(transport.volume, 1.0);
        transport.set_volume(-0.1);
        assert_eq!(transport.volume, 0.0);
    }

    #[test]
    fn test_drag_suppresses_source_position() {
        let mut transport = Transport::new();
        assert_eq!(transport.display_position(42.0), 42.0);

        transport.begin_seek(10.0);
        assert!(transport.is_seeking());
        assert_eq!(transport.display_position(42.0), 10.0);

        transport.update_seek(15.0);
        assert_eq!(transport.display_position(42.0), 15.0);

        assert_eq!(transport.commit_seek(), Some(15.0));
        assert!(!transport.is_seeking());
        assert_eq!(transport.display_position(42.0), 42.0);
    }

    #[test]
    fn test_update_without_begin_is_ignored() {
        let mut transport = Transport::new();
        transport.update_seek(5.0);
        assert!(!transport.is_seeking());
        assert_eq!(transport.commit_seek(), None);
    }
}
