//! Mixer configuration.

use std::time::Duration;

use crate::device::DeviceFormat;
use crate::error::InitError;
use crate::mix::MAX_VOLUME;

/// Static layout of the mixer: output format, chunk size and buffer count.
///
/// Defaults match a classic 16-bit stereo driver: 44.1kHz, 1024-frame chunks,
/// 8 buffers (8192 frames of ring capacity, ~186ms).
///
/// ```
/// # use mixdown::MixerConfig;
/// let config = MixerConfig::default()
///     .with_sample_rate(48000)
///     .with_chunk_frames(512)
///     .with_buffer_count(4);
/// assert_eq!(config.total_frames(), 2048);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct MixerConfig {
    sample_rate: u32,
    channels: u16,
    chunk_frames: usize,
    buffer_count: usize,
    wait_timeout: Duration,
    mix_volume: f32,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            chunk_frames: 1024,
            buffer_count: 8,
            wait_timeout: Duration::from_millis(10),
            mix_volume: 1.0,
        }
    }
}

impl MixerConfig {
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    /// Frames per chunk (one device buffer).
    pub fn with_chunk_frames(mut self, frames: usize) -> Self {
        self.chunk_frames = frames;
        self
    }

    /// Number of device buffers in the pool.
    pub fn with_buffer_count(mut self, count: usize) -> Self {
        self.buffer_count = count;
        self
    }

    /// Upper bound on how long the mixer thread sleeps waiting for a free buffer.
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Initial gain of the whole mix, `0.0..=4.0`.
    pub fn with_mix_volume(mut self, volume: f32) -> Self {
        self.mix_volume = volume;
        self
    }

    /// Check the configuration can be used to build a mixer.
    pub fn validate(&self) -> Result<(), InitError> {
        if self.sample_rate == 0 {
            return Err(InitError::InvalidConfig("sample rate must be non-zero".into()));
        }
        if self.channels == 0 {
            return Err(InitError::InvalidConfig("channel count must be non-zero".into()));
        }
        if self.chunk_frames == 0 {
            return Err(InitError::InvalidConfig("chunk size must be non-zero".into()));
        }
        if self.buffer_count == 0 {
            return Err(InitError::InvalidConfig("buffer count must be non-zero".into()));
        }
        if self.wait_timeout.is_zero() {
            return Err(InitError::InvalidConfig("wait timeout must be non-zero".into()));
        }
        if !(0.0..=MAX_VOLUME).contains(&self.mix_volume) {
            return Err(InitError::InvalidConfig(format!(
                "mix volume {} out of range",
                self.mix_volume
            )));
        }
        self.chunk_frames
            .checked_mul(self.channels as usize)
            .and_then(|samples| samples.checked_mul(self.buffer_count))
            .ok_or_else(|| InitError::InvalidConfig("buffer pool size overflows".into()))?;
        Ok(())
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn channels(&self) -> u16 {
        self.channels
    }

    #[inline]
    pub fn chunk_frames(&self) -> usize {
        self.chunk_frames
    }

    #[inline]
    pub fn buffer_count(&self) -> usize {
        self.buffer_count
    }

    #[inline]
    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    #[inline]
    pub fn mix_volume(&self) -> f32 {
        self.mix_volume
    }

    /// Interleaved samples in one chunk.
    #[inline]
    pub fn chunk_samples(&self) -> usize {
        self.chunk_frames * self.channels as usize
    }

    /// Ring capacity in frames (all buffers).
    #[inline]
    pub fn total_frames(&self) -> usize {
        self.chunk_frames * self.buffer_count
    }

    /// The 16-bit interleaved format the device is opened with.
    pub fn format(&self) -> DeviceFormat {
        DeviceFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bits_per_sample: 16,
        }
    }

    /// Average output delay in seconds.
    ///
    /// With N chunks queued and one chunk refilled at a time, the ring holds
    /// between `total - chunk` and `total` frames; on average `total - chunk/2`.
    pub fn play_latency(&self) -> f64 {
        let frames = self.total_frames() as f64 - self.chunk_frames as f64 / 2.0;
        frames / self.sample_rate as f64
    }
}
