//! Sine wave oscillator

use std::time::Instant;

use super::FinishedFlag;
use crate::source::PcmSource;

/// A sine tone, the same signal on every channel.
pub struct Sine {
    sample_rate: u32,
    channels: usize,
    frequency: f32,
    amplitude: f32,
    phase: f32,
    /// Frames left to play, `None` plays forever
    remaining: Option<u64>,
    start_time: Option<Instant>,
    finished: FinishedFlag,
}

impl Sine {
    /// A stereo tone at `frequency` Hz.
    ///
    /// The channel count must match the mixer's; a mono mix needs
    /// [`with_channels(1)`](Self::with_channels). Otherwise each read comes up
    /// short and the tone ends after its first chunk.
    pub fn new(sample_rate: u32, frequency: f32) -> Self {
        Self {
            sample_rate,
            channels: 2,
            frequency: frequency.max(0.0),
            amplitude: 0.25, // -12dB, safe default
            phase: 0.0,
            remaining: None,
            start_time: None,
            finished: FinishedFlag::new(),
        }
    }

    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude.clamp(0.0, 1.0);
        self
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels.max(1);
        self
    }

    /// Stop after `frames` frames.
    pub fn with_length(mut self, frames: u64) -> Self {
        self.remaining = Some(frames);
        self
    }

    /// Start playing at `at` instead of immediately.
    pub fn starting_at(mut self, at: Instant) -> Self {
        self.start_time = Some(at);
        self
    }

    #[inline]
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    #[inline]
    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    /// Flag set when the tone has finished playing.
    pub fn finished(&self) -> FinishedFlag {
        self.finished.clone()
    }
}

impl PcmSource for Sine {
    fn start_time(&self) -> Option<Instant> {
        self.start_time
    }

    fn read_pcm(&mut self, out: &mut [i16], _start_frame: u64) -> usize {
        let mut frames = out.len() / self.channels;
        if let Some(remaining) = self.remaining {
            frames = frames.min(remaining as usize);
        }

        let phase_inc = self.frequency / self.sample_rate as f32;
        let amplitude = self.amplitude * i16::MAX as f32;

        for frame in out.chunks_exact_mut(self.channels).take(frames) {
            let sample = ((self.phase * core::f32::consts::TAU).sin() * amplitude) as i16;
            frame.iter_mut().for_each(|s| *s = sample);

            self.phase += phase_inc;
            self.phase -= self.phase.floor();
        }

        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= frames as u64;
        }
        frames * self.channels
    }

    fn notify_stopped(&mut self) {
        self.finished.set();
    }
}
