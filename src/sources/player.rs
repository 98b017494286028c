//! Audio sample player.

use std::sync::Arc;
use std::time::Instant;

use super::FinishedFlag;
use crate::source::PcmSource;

/// Plays pre-decoded 16-bit interleaved samples.
///
/// The sample data is shared, so one decoded sound can back many players at
/// once. Source channels are mapped onto the mixer's channels by wrapping
/// (mono plays on both sides of a stereo mix).
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use mixdown::sources::SamplePlayer;
///
/// let clap: Arc<[i16]> = vec![0i16; 2 * 4410].into();
/// let player = SamplePlayer::new(clap.clone(), 2).with_volume(0.8);
/// let echo = SamplePlayer::new(clap, 2).with_volume(0.3);
/// # let _ = (player, echo);
/// ```
pub struct SamplePlayer {
    samples: Arc<[i16]>,
    channels: usize,
    output_channels: usize,
    /// Index of the next source frame
    position: usize,
    volume: f32,
    looping: bool,
    start_time: Option<Instant>,
    finished: FinishedFlag,
}

impl SamplePlayer {
    /// Create a player from interleaved samples with `channels` channels.
    ///
    /// Output defaults to stereo. It must match the mixer's channel count, see
    /// [`with_output_channels`](Self::with_output_channels); a mismatch makes
    /// every read come up short and the player stops after one chunk.
    pub fn new(samples: impl Into<Arc<[i16]>>, channels: usize) -> Self {
        Self {
            samples: samples.into(),
            channels: channels.max(1),
            output_channels: 2,
            position: 0,
            volume: 1.0,
            looping: false,
            start_time: None,
            finished: FinishedFlag::new(),
        }
    }

    /// Channel count of the mix this player feeds.
    pub fn with_output_channels(mut self, channels: usize) -> Self {
        self.output_channels = channels.max(1);
        self
    }

    /// Playback volume (0.0 to 2.0, where 1.0 is unity gain).
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(0.0, 2.0);
        self
    }

    /// When enabled, playback restarts from the beginning when it reaches the end.
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Start playing at `at` instead of immediately.
    pub fn starting_at(mut self, at: Instant) -> Self {
        self.start_time = Some(at);
        self
    }

    /// Length in frames.
    #[inline]
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    /// Flag set when playback has finished.
    pub fn finished(&self) -> FinishedFlag {
        self.finished.clone()
    }
}

impl PcmSource for SamplePlayer {
    fn start_time(&self) -> Option<Instant> {
        self.start_time
    }

    fn read_pcm(&mut self, out: &mut [i16], _start_frame: u64) -> usize {
        let total = self.frames();
        let src_channels = self.channels;
        let volume = self.volume;
        let mut written = 0;

        for frame in out.chunks_exact_mut(self.output_channels) {
            if self.position >= total {
                if self.looping && total > 0 {
                    self.position = 0;
                } else {
                    break;
                }
            }

            let base = self.position * src_channels;
            for (ch, sample) in frame.iter_mut().enumerate() {
                let s = self.samples[base + ch % src_channels];
                *sample = if volume == 1.0 {
                    s
                } else {
                    (s as f32 * volume).clamp(i16::MIN as f32, i16::MAX as f32) as i16
                };
            }

            self.position += 1;
            written += frame.len();
        }

        written
    }

    fn notify_stopped(&mut self) {
        self.finished.set();
    }
}
