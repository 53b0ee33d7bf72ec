//! Playback engine - command handling, transport orchestration, events
//!
//! The engine state lives behind one `parking_lot::Mutex`. The command
//! thread drains `PlayerCommand`s and ticks position; the audio callback
//! locks with `try_lock` and renders silence on contention. Decoding is
//! the one slow operation and runs outside the lock: `handle_command`
//! and `tick` return a `LoadRequest`, the command loop decodes it, then
//! re-locks to finish with `complete_load` or `fail_load`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use lumen_analysis::{SpectrumFrame, SpectrumSampler};
use lumen_audio::{EffectGraph, EffectPreset, TrackSource};
use lumen_lyrics::{LyricCursor, LyricSheet};
use tracing::{info, warn};

use crate::config::{EngineConfig, QueueEndPolicy};
use crate::loader::{DecodedAudio, LoadError};
use crate::queue::{Advance, EnqueuePosition, Queue, RemoveOutcome};
use crate::track::{Track, TrackId};
use crate::transport::{PlaybackState, RepeatMode, Transport};

/// Commands sent to the engine
#[derive(Debug, Clone)]
pub enum PlayerCommand {
    /// Load a track as current without starting playback
    Load(Arc<Track>),
    /// Enqueue at the front and start playing immediately
    PlayNow(Arc<Track>),
    /// Enqueue at the back
    Enqueue(Arc<Track>),
    Remove(TrackId),
    Reorder(usize, usize),
    Play,
    Pause,
    Toggle,
    Next,
    Previous,
    Seek(f64),
    BeginSeek(f64),
    UpdateSeek(f64),
    CommitSeek,
    SetVolume(f32),
    CycleRepeatMode,
    SetPreset(EffectPreset),
    Shutdown,
}

/// Events published by the engine
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    TrackChanged(Option<Arc<Track>>),
    PlayStateChanged(bool),
    PositionChanged { position: f64, duration: f64 },
    RepeatModeChanged(RepeatMode),
    PresetChanged(EffectPreset),
    QueueChanged,
    LyricCursorChanged(Option<LyricCursor>),
    Spectrum(SpectrumFrame),
    Error(String),
}

/// A decode the command loop must perform outside the state lock
#[derive(Debug)]
pub struct LoadRequest {
    pub track: Arc<Track>,
    /// Start playback once the decode lands
    pub play: bool,
}

/// Engine state, shared between the command loop and the audio callback
pub struct EngineState {
    source: TrackSource,
    graph: EffectGraph,
    transport: Transport,
    queue: Queue,
    current: Option<Arc<Track>>,
    lyrics: LyricSheet,
    lyric_cursor: Option<LyricCursor>,
    sampler: SpectrumSampler,
    config: EngineConfig,
    /// Graph construction failure is reported once, then passthrough
    graph_error_reported: bool,
}

impl EngineState {
    pub fn new(sample_rate: u32, config: EngineConfig) -> Self {
        let mut source = TrackSource::new(sample_rate);
        let mut transport = Transport::new();
        transport.set_volume(config.volume);
        source.set_volume(transport.volume);

        Self {
            source,
            graph: EffectGraph::new(sample_rate),
            transport,
            queue: Queue::new(),
            current: None,
            lyrics: LyricSheet::default(),
            lyric_cursor: None,
            sampler: SpectrumSampler::new(
                sample_rate,
                std::time::Duration::from_millis(config.spectrum_min_interval_ms),
            ),
            config,
            graph_error_reported: false,
        }
    }

    pub fn playback_state(&self) -> PlaybackState {
        PlaybackState {
            current_track: self.current.clone(),
            is_playing: self.source.is_playing(),
            position: self.transport.display_position(self.source.position_secs()),
            duration: self.source.duration(),
            volume: self.transport.volume,
            repeat_mode: self.transport.repeat_mode,
        }
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn preset(&self) -> EffectPreset {
        self.graph.preset()
    }

    /// Handle one command. A returned `LoadRequest` must be decoded by
    /// the caller and finished with `complete_load` or `fail_load`.
    pub fn handle_command(
        &mut self,
        cmd: PlayerCommand,
        events: &Sender<PlayerEvent>,
    ) -> Option<LoadRequest> {
        match cmd {
            PlayerCommand::Load(track) => {
                self.queue.enqueue(track.clone(), EnqueuePosition::Back);
                let _ = events.try_send(PlayerEvent::QueueChanged);
                return Some(LoadRequest { track, play: false });
            }
            PlayerCommand::PlayNow(track) => {
                // Duplicate ids keep their queue slot but still load now
                self.queue.enqueue(track.clone(), EnqueuePosition::Front);
                let _ = events.try_send(PlayerEvent::QueueChanged);
                return Some(LoadRequest { track, play: true });
            }
            PlayerCommand::Enqueue(track) => {
                if self.queue.enqueue(track, EnqueuePosition::Back) {
                    let _ = events.try_send(PlayerEvent::QueueChanged);
                }
            }
            PlayerCommand::Remove(id) => return self.handle_remove(id, events),
            PlayerCommand::Reorder(from, to) => {
                self.queue.reorder(from, to);
                let _ = events.try_send(PlayerEvent::QueueChanged);
            }
            PlayerCommand::Play => {
                self.ensure_graph(events);
                self.source.play();
                let _ = events.try_send(PlayerEvent::PlayStateChanged(self.source.is_playing()));
            }
            PlayerCommand::Pause => {
                self.source.pause();
                let _ = events.try_send(PlayerEvent::PlayStateChanged(false));
            }
            PlayerCommand::Toggle => {
                if self.source.is_playing() {
                    self.source.pause();
                } else {
                    self.ensure_graph(events);
                    self.source.play();
                }
                let _ = events.try_send(PlayerEvent::PlayStateChanged(self.source.is_playing()));
            }
            PlayerCommand::Next => return self.handle_step(events, Queue::next),
            PlayerCommand::Previous => return self.handle_step(events, Queue::previous),
            PlayerCommand::Seek(position) => {
                self.source.seek(position);
                self.emit_position(events);
            }
            PlayerCommand::BeginSeek(position) => {
                self.transport.begin_seek(position);
                self.emit_position(events);
            }
            PlayerCommand::UpdateSeek(position) => {
                self.transport.update_seek(position);
                self.emit_position(events);
            }
            PlayerCommand::CommitSeek => {
                if let Some(position) = self.transport.commit_seek() {
                    self.source.seek(position);
                    self.emit_position(events);
                }
            }
            PlayerCommand::SetVolume(volume) => {
                self.transport.set_volume(volume);
                self.source.set_volume(self.transport.volume);
            }
            PlayerCommand::CycleRepeatMode => {
                let mode = self.transport.cycle_repeat_mode();
                let _ = events.try_send(PlayerEvent::RepeatModeChanged(mode));
            }
            PlayerCommand::SetPreset(preset) => {
                self.graph.apply_preset(preset);
                let _ = events.try_send(PlayerEvent::PresetChanged(preset));
            }
            PlayerCommand::Shutdown => {} // Handled by the command loop
        }
        None
    }

    /// Periodic tick from the command loop: position, lyrics, spectrum,
    /// track-end handling
    pub fn tick(&mut self, events: &Sender<PlayerEvent>) -> Option<LoadRequest> {
        // A live seek drag suppresses position ticks
        if !self.transport.is_seeking() {
            self.emit_position(events);
        }

        self.update_lyric_cursor(events);
        self.publish_spectrum(events);

        if self.source.take_ended() {
            return self.handle_track_ended(events);
        }
        None
    }

    /// Render audio for the output buffer; called from the audio callback
    pub fn process_audio(&mut self, output: &mut [f32]) {
        self.source.process(output);
        self.graph.process(output);
    }

    /// Finish a decode: install the samples and wire up lyrics.
    /// The outgoing track's buffer and sheet are dropped here.
    pub fn complete_load(
        &mut self,
        request: LoadRequest,
        decoded: DecodedAudio,
        events: &Sender<PlayerEvent>,
    ) {
        let LoadRequest { track, play } = request;

        self.source
            .install(decoded.samples, decoded.sample_rate);
        self.source.set_volume(self.transport.volume);

        self.lyrics = match &track.lyric_text {
            Some(text) => LyricSheet::parse(text),
            None => LyricSheet::default(),
        };
        self.lyric_cursor = None;

        self.queue.select(track.id);
        self.current = Some(track.clone());

        info!(name = %track.name, duration = decoded.duration_secs, "track loaded");
        let _ = events.try_send(PlayerEvent::TrackChanged(Some(track)));

        if play {
            self.ensure_graph(events);
            self.source.play();
        }
        let _ = events.try_send(PlayerEvent::PlayStateChanged(self.source.is_playing()));
        self.emit_position(events);
    }

    /// A decode failed: report once, leave playback paused and the
    /// previous state intact
    pub fn fail_load(&mut self, request: &LoadRequest, err: &LoadError, events: &Sender<PlayerEvent>) {
        warn!(name = %request.track.name, error = %err, "track load failed");
        let _ = events.try_send(PlayerEvent::Error(format!(
            "failed to load {}: {err}",
            request.track.name
        )));
        let _ = events.try_send(PlayerEvent::PlayStateChanged(self.source.is_playing()));
    }

    fn handle_remove(
        &mut self,
        id: TrackId,
        events: &Sender<PlayerEvent>,
    ) -> Option<LoadRequest> {
        match self.queue.remove(id) {
            RemoveOutcome::NotFound => None,
            RemoveOutcome::Removed => {
                let _ = events.try_send(PlayerEvent::QueueChanged);
                None
            }
            RemoveOutcome::RemovedCurrent(next) => {
                let _ = events.try_send(PlayerEvent::QueueChanged);
                // The playing entry is gone: stop output now, then load
                // the replacement paused
                self.source.clear();
                self.current = None;
                self.lyrics = LyricSheet::default();
                self.lyric_cursor = None;
                let _ = events.try_send(PlayerEvent::PlayStateChanged(false));

                match next {
                    Some(track) => Some(LoadRequest { track, play: false }),
                    None => {
                        let _ = events.try_send(PlayerEvent::TrackChanged(None));
                        None
                    }
                }
            }
        }
    }

    fn handle_step(
        &mut self,
        events: &Sender<PlayerEvent>,
        step: fn(&mut Queue) -> Option<Advance>,
    ) -> Option<LoadRequest> {
        // Track repeat restarts the current track instead of moving
        if self.transport.repeat_mode == RepeatMode::Track && self.source.is_loaded() {
            self.source.rewind();
            self.emit_position(events);
            return None;
        }

        let advance = step(&mut self.queue)?;
        let keep_playing = self.source.is_playing() || !self.source.is_loaded();
        Some(LoadRequest {
            track: advance.track,
            play: keep_playing,
        })
    }

    fn handle_track_ended(&mut self, events: &Sender<PlayerEvent>) -> Option<LoadRequest> {
        match self.transport.repeat_mode {
            RepeatMode::Track => {
                self.source.rewind();
                self.source.play();
                self.emit_position(events);
                None
            }
            RepeatMode::Playlist => {
                let advance = self.queue.next()?;
                Some(LoadRequest {
                    track: advance.track,
                    play: true,
                })
            }
            RepeatMode::Off => {
                let advance = self.queue.next()?;
                let play = match self.config.queue_end_policy {
                    QueueEndPolicy::Wrap => true,
                    // Exhausted the queue: load the head but stay paused
                    QueueEndPolicy::Stop => !advance.wrapped,
                };
                if !play {
                    let _ = events.try_send(PlayerEvent::PlayStateChanged(false));
                }
                Some(LoadRequest {
                    track: advance.track,
                    play,
                })
            }
        }
    }

    /// Lazy one-time graph construction, triggered by the first play
    fn ensure_graph(&mut self, events: &Sender<PlayerEvent>) {
        if self.graph.is_initialized() {
            return;
        }
        if let Err(err) = self.graph.initialize() {
            if !self.graph_error_reported {
                self.graph_error_reported = true;
                warn!(error = %err, "effect graph unavailable, playing unprocessed");
                let _ = events.try_send(PlayerEvent::Error(err.to_string()));
            }
        }
    }

    fn emit_position(&self, events: &Sender<PlayerEvent>) {
        let _ = events.try_send(PlayerEvent::PositionChanged {
            position: self.transport.display_position(self.source.position_secs()),
            duration: self.source.duration(),
        });
    }

    fn update_lyric_cursor(&mut self, events: &Sender<PlayerEvent>) {
        let position = self.source.position_secs();
        let cursor = self.lyrics.cursor_at(position);
        if cursor != self.lyric_cursor {
            self.lyric_cursor = cursor;
            let _ = events.try_send(PlayerEvent::LyricCursorChanged(cursor));
        }
    }

    fn publish_spectrum(&mut self, events: &Sender<PlayerEvent>) {
        // Downmix the stereo tap to mono for the FFT
        let mono: Option<Vec<f32>> = self.graph.tap().map(|tap| {
            tap.chunks(2)
                .map(|f| if f.len() == 2 { (f[0] + f[1]) * 0.5 } else { f[0] })
                .collect()
        });
        let frame = match mono {
            Some(samples) => self.sampler.sample(&samples),
            // Before the graph exists the visualization shows a static
            // placeholder instead of going blank
            None => Some(SpectrumFrame::placeholder()),
        };
        if let Some(frame) = frame {
            let _ = events.try_send(PlayerEvent::Spectrum(frame));
        }
    }
}

/// Handle used by front ends to talk to the engine
pub struct PlayerEngine {
    pub command_tx: Sender<PlayerCommand>,
    pub event_rx: Receiver<PlayerEvent>,
    shutdown: Arc<AtomicBool>,
}

impl PlayerEngine {
    /// Channel pair for the engine loops. 1024 gives headroom for
    /// command bursts without saturation.
    pub fn create_channels() -> (
        Sender<PlayerCommand>,
        Receiver<PlayerCommand>,
        Sender<PlayerEvent>,
        Receiver<PlayerEvent>,
    ) {
        let (cmd_tx, cmd_rx) = bounded(1024);
        let (evt_tx, evt_rx) = bounded(1024);
        (cmd_tx, cmd_rx, evt_tx, evt_rx)
    }

    pub fn new(command_tx: Sender<PlayerCommand>, event_rx: Receiver<PlayerEvent>) -> Self {
        Self {
            command_tx,
            event_rx,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn send(&self, cmd: PlayerCommand) {
        let _ = self.command_tx.try_send(cmd);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        let _ = self.command_tx.try_send(PlayerCommand::Shutdown);
    }
}
