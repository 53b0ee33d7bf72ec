//! Track source - decoded sample playback with seek and volume

use std::sync::Arc;

/// Playback source for one decoded track
///
/// Holds interleaved stereo samples behind an Arc so installing a track
/// never copies sample data through channels. Position is fractional and
/// advances by the decoded-to-device rate ratio, so interpolated reads
/// resample on the fly when the rates differ.
pub struct TrackSource {
    /// Interleaved stereo samples
    samples: Arc<Vec<f32>>,
    /// Output device rate
    device_rate: u32,
    /// Rate the samples were decoded at
    sample_rate: u32,
    /// Playback position in interleaved samples
    position: f64,
    playing: bool,
    volume: f32,
    /// Set when playback runs off the end of the samples; the engine
    /// consumes it to decide repeat or advance
    ended: bool,
}

impl TrackSource {
    pub fn new(device_rate: u32) -> Self {
        Self {
            samples: Arc::new(Vec::new()),
            device_rate,
            sample_rate: device_rate,
            position: 0.0,
            playing: false,
            volume: 1.0,
            ended: false,
        }
    }

    /// Install decoded samples, resetting position and the ended flag.
    /// The previous track's samples are released here.
    pub fn install(&mut self, samples: Arc<Vec<f32>>, sample_rate: u32) {
        self.samples = samples;
        self.sample_rate = sample_rate;
        self.position = 0.0;
        self.ended = false;
    }

    /// Drop the loaded samples and stop
    pub fn clear(&mut self) {
        self.samples = Arc::new(Vec::new());
        self.position = 0.0;
        self.playing = false;
        self.ended = false;
    }

    pub fn is_loaded(&self) -> bool {
        !self.samples.is_empty()
    }

    pub fn play(&mut self) {
        if self.is_loaded() {
            self.playing = true;
        }
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Seek to a position in seconds, clamped to [0, duration]
    pub fn seek(&mut self, position_secs: f64) {
        let max_pos = self.samples.len() as f64;
        self.position = (position_secs.max(0.0) * self.sample_rate as f64 * 2.0).clamp(0.0, max_pos);
        self.ended = false;
    }

    /// Restart from the beginning without touching the playing flag
    pub fn rewind(&mut self) {
        self.position = 0.0;
        self.ended = false;
    }

    pub fn position_secs(&self) -> f64 {
        self.position / (self.sample_rate as f64 * 2.0)
    }

    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / (self.sample_rate as f64 * 2.0)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Set the output volume, clamped to [0, 1]
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// True once after the track ran to its end
    pub fn take_ended(&mut self) -> bool {
        std::mem::replace(&mut self.ended, false)
    }

    /// Fill the output buffer with stereo interleaved samples
    pub fn process(&mut self, output: &mut [f32]) {
        if !self.playing || self.samples.is_empty() {
            output.fill(0.0);
            return;
        }

        let sample_count = self.samples.len();
        // One decoded frame per device frame, scaled by the rate ratio
        let step = 2.0 * self.sample_rate as f64 / self.device_rate as f64;

        for frame in output.chunks_mut(2) {
            let pos = self.position as usize;

            if pos + 1 >= sample_count {
                self.playing = false;
                self.ended = true;
                frame.fill(0.0);
                continue;
            }

            // Linear interpolation for non-integer positions
            let frac = self.position.fract() as f32;
            let pos_even = pos & !1;

            if pos_even + 3 < sample_count {
                let l0 = self.samples[pos_even];
                let r0 = self.samples[pos_even + 1];
                let l1 = self.samples[pos_even + 2];
                let r1 = self.samples[pos_even + 3];

                frame[0] = (l0 + frac * (l1 - l0)) * self.volume;
                frame[1] = (r0 + frac * (r1 - r0)) * self.volume;
            } else {
                frame[0] = self.samples[pos_even] * self.volume;
                frame[1] = self.samples[pos_even + 1] * self.volume;
            }

            self.position += step;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_with_secs(secs: f64) -> TrackSource {
        let mut source = TrackSource::new(48000);
        let frames = (secs * 48000.0) as usize;
        source.install(Arc::new(vec![0.5; frames * 2]), 48000);
        source
    }

    #[test]
    fn test_seek_clamps_negative_to_zero() {
        let mut source = source_with_secs(200.0);
        source.seek(-5.0);
        assert_eq!(source.position_secs(), 0.0);
    }

    #[test]
    fn test_seek_clamps_past_end_to_duration() {
        let mut source = source_with_secs(200.0);
        source.seek(500.0);
        assert!((source.position_secs() - 200.0).abs() < 1e-6);
    }

    #[test]
    fn test_process_sets_ended_at_track_end() {
        let mut source = source_with_secs(0.01);
        source.play();
        let mut out = vec![0.0f32; 48000];
        source.process(&mut out);
        assert!(source.take_ended());
        assert!(!source.is_playing());
        // Flag is consumed
        assert!(!source.take_ended());
    }

    #[test]
    fn test_rate_mismatch_advances_at_wall_clock_speed() {
        // 24kHz track on a 48kHz device: half a decoded frame per device frame
        let mut source = TrackSource::new(48000);
        source.install(Arc::new(vec![0.5; 24000 * 2]), 24000);
        source.play();

        let mut out = vec![0.0f32; 64];
        source.process(&mut out);

        // 32 device frames of output equal 32/48000 seconds of track
        assert!((source.position_secs() - 32.0 / 48000.0).abs() < 1e-9);
    }

    #[test]
    fn test_matched_rates_advance_one_frame_per_frame() {
        let mut source = source_with_secs(1.0);
        source.play();
        let mut out = vec![0.0f32; 64];
        source.process(&mut out);
        assert!((source.position_secs() - 32.0 / 48000.0).abs() < 1e-9);
    }

    #[test]
    fn test_unloaded_source_outputs_silence() {
        let mut source = TrackSource::new(48000);
        source.play();
        assert!(!source.is_playing());
        let mut out = vec![1.0f32; 64];
        source.process(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_volume_scales_output() {
        let mut source = source_with_secs(1.0);
        source.play();
        source.set_volume(0.2);
        let mut out = vec![0.0f32; 64];
        source.process(&mut out);
        for s in &out {
            assert!((s - 0.1).abs() < 1e-6);
        }
    }

    #[test]
    fn test_volume_clamped() {
        let mut source = TrackSource::new(48000);
        source.set_volume(2.5);
        assert_eq!(source.volume(), 1.0);
        source.set_volume(-0.5);
        assert_eq!(source.volume(), 0.0);
    }

    #[test]
    fn test_install_resets_position() {
        let mut source = source_with_secs(10.0);
        source.seek(5.0);
        source.install(Arc::new(vec![0.1; 48000 * 2]), 48000);
        assert_eq!(source.position_secs(), 0.0);
    }
}
