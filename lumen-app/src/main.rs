//! Lumen - media playback with synced lyrics and spectrum analysis
//!
//! Thin command-line front end: tracks come from the argument list (with
//! optional `.lrc` sidecar lyrics), commands from stdin, events to stdout.

use std::io::BufRead;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use lumen_audio::EffectPreset;
use lumen_player::{
    EngineConfig, EngineState, PlayerCommand, PlayerEngine, PlayerEvent, Track, TrackLoader,
};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = EngineConfig::load();

    let (cmd_tx, cmd_rx, evt_tx, evt_rx) = PlayerEngine::create_channels();

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_engine = shutdown.clone();
    let engine_handle = thread::spawn(move || {
        run_engine_thread(cmd_rx, evt_tx, shutdown_engine, config);
    });

    let engine = PlayerEngine::new(cmd_tx, evt_rx);

    // Queue the argument list; the first entry starts playing
    let mut first = true;
    for arg in std::env::args().skip(1) {
        let track = track_from_path(&arg);
        if first {
            engine.send(PlayerCommand::PlayNow(track));
            first = false;
        } else {
            engine.send(PlayerCommand::Enqueue(track));
        }
    }

    // Event printer
    let event_rx = engine.event_rx.clone();
    let shutdown_events = shutdown.clone();
    let event_handle = thread::spawn(move || {
        print_events(event_rx, shutdown_events);
    });

    run_repl(&engine)?;

    shutdown.store(true, Ordering::SeqCst);
    engine.shutdown();
    let _ = engine_handle.join();
    let _ = event_handle.join();
    Ok(())
}

/// Build a track from a path, attaching `.lrc` sidecar lyrics if present
fn track_from_path(path: &str) -> Arc<Track> {
    let track = Track::from_path(path);
    let sidecar = Path::new(path).with_extension("lrc");
    match std::fs::read_to_string(&sidecar) {
        Ok(text) => {
            info!(path = %sidecar.display(), "lyrics sidecar found");
            track.with_lyrics(text)
        }
        Err(_) => track,
    }
}

/// Read commands from stdin until EOF or `quit`
fn run_repl(engine: &PlayerEngine) -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        let Some(word) = parts.next() else { continue };

        match word {
            "play" => engine.send(PlayerCommand::Play),
            "pause" => engine.send(PlayerCommand::Pause),
            "toggle" | "p" => engine.send(PlayerCommand::Toggle),
            "next" | "n" => engine.send(PlayerCommand::Next),
            "prev" => engine.send(PlayerCommand::Previous),
            "seek" => {
                if let Some(secs) = parts.next().and_then(|s| s.parse::<f64>().ok()) {
                    engine.send(PlayerCommand::Seek(secs));
                }
            }
            "vol" => {
                if let Some(vol) = parts.next().and_then(|s| s.parse::<f32>().ok()) {
                    engine.send(PlayerCommand::SetVolume(vol));
                }
            }
            "preset" => {
                let preset = EffectPreset::from_name(parts.next().unwrap_or("normal"));
                engine.send(PlayerCommand::SetPreset(preset));
            }
            "repeat" => engine.send(PlayerCommand::CycleRepeatMode),
            "add" => {
                if let Some(path) = parts.next() {
                    engine.send(PlayerCommand::Enqueue(track_from_path(path)));
                }
            }
            "quit" | "q" => return Ok(()),
            other => eprintln!("unknown command: {other}"),
        }
    }
    Ok(())
}

fn print_events(event_rx: Receiver<PlayerEvent>, shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::Relaxed) {
        let event = match event_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(e) => e,
            Err(_) => continue,
        };
        match event {
            PlayerEvent::TrackChanged(Some(track)) => println!("> now: {}", track.name),
            PlayerEvent::TrackChanged(None) => println!("> queue empty"),
            PlayerEvent::PlayStateChanged(playing) => {
                println!("> {}", if playing { "playing" } else { "paused" })
            }
            PlayerEvent::RepeatModeChanged(mode) => println!("> repeat: {mode:?}"),
            PlayerEvent::PresetChanged(preset) => println!("> preset: {}", preset.name()),
            PlayerEvent::Error(message) => eprintln!("! {message}"),
            // Position, lyric and spectrum updates are for graphical front
            // ends; the CLI stays quiet
            _ => {}
        }
    }
}

/// Engine thread: owns the output device and the state mutex, drains
/// commands, ticks position, and decodes load requests outside the lock
fn run_engine_thread(
    cmd_rx: Receiver<PlayerCommand>,
    evt_tx: Sender<PlayerEvent>,
    shutdown: Arc<AtomicBool>,
    config: EngineConfig,
) {
    let host = cpal::default_host();
    let device = match host.default_output_device() {
        Some(d) => d,
        None => {
            let _ = evt_tx.send(PlayerEvent::Error("no audio output device found".into()));
            return;
        }
    };

    let device_config = match device.default_output_config() {
        Ok(c) => c,
        Err(e) => {
            let _ = evt_tx.send(PlayerEvent::Error(format!("failed to get audio config: {e}")));
            return;
        }
    };

    let sample_rate = device_config.sample_rate().0;
    let channels = device_config.channels() as usize;
    let tick_interval = Duration::from_millis(config.tick_interval_ms);

    let state = Arc::new(Mutex::new(EngineState::new(sample_rate, config)));
    let state_for_callback = state.clone();

    // Pre-allocated stereo buffer for mono device conversion
    let mut stereo_buffer = vec![0.0f32; 16384];

    let stream = device.build_output_stream(
        &device_config.into(),
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            // Never block the real-time thread; silence on contention
            match state_for_callback.try_lock() {
                Some(mut state) => {
                    if channels == 2 {
                        state.process_audio(data);
                    } else {
                        let stereo_len = data.len() * 2;
                        let stereo = &mut stereo_buffer[..stereo_len];
                        state.process_audio(stereo);
                        for (i, sample) in data.iter_mut().enumerate() {
                            *sample = (stereo[i * 2] + stereo[i * 2 + 1]) * 0.5;
                        }
                    }
                }
                None => data.fill(0.0),
            }
        },
        |err| {
            error!("audio stream error: {err}");
        },
        None,
    );

    let stream = match stream {
        Ok(s) => s,
        Err(e) => {
            let _ = evt_tx.send(PlayerEvent::Error(format!("failed to create audio stream: {e}")));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = evt_tx.send(PlayerEvent::Error(format!("failed to start audio: {e}")));
        return;
    }

    info!(sample_rate, channels, "audio stream running");

    let loader = TrackLoader::new();
    let mut last_tick = Instant::now();

    while !shutdown.load(Ordering::Relaxed) {
        let mut pending = None;

        match cmd_rx.recv_timeout(Duration::from_millis(10)) {
            Ok(PlayerCommand::Shutdown) => break,
            Ok(cmd) => {
                pending = state.lock().handle_command(cmd, &evt_tx);
            }
            Err(_) => {}
        }

        if last_tick.elapsed() >= tick_interval {
            last_tick = Instant::now();
            if pending.is_none() {
                pending = state.lock().tick(&evt_tx);
            }
        }

        // Decode outside the lock so the audio callback never waits on IO
        if let Some(request) = pending {
            match loader.load(&request.track.playable_url) {
                Ok(decoded) => state.lock().complete_load(request, decoded, &evt_tx),
                Err(err) => state.lock().fail_load(&request, &err, &evt_tx),
            }
        }
    }
}
