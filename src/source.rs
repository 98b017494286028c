//! The PCM source trait.

use std::time::Instant;

/// Something that produces 16-bit interleaved PCM for the mixer.
///
/// Sources are handed to [`MixDriver::start_mixing`](crate::MixDriver::start_mixing)
/// and owned by the mixer until they finish or are stopped. They are only
/// called from the mixing thread (and [`notify_stopped`](Self::notify_stopped)
/// from whichever thread runs completion detection).
///
/// # Example
///
/// ```
/// use mixdown::PcmSource;
///
/// /// A square wave that runs for a fixed number of frames.
/// struct Beep {
///     frames_left: usize,
///     channels: usize,
/// }
///
/// impl PcmSource for Beep {
///     fn read_pcm(&mut self, out: &mut [i16], _start_frame: u64) -> usize {
///         let frames = (out.len() / self.channels).min(self.frames_left);
///         for (i, frame) in out.chunks_exact_mut(self.channels).take(frames).enumerate() {
///             let v = if i % 100 < 50 { 4000 } else { -4000 };
///             frame.iter_mut().for_each(|s| *s = v);
///         }
///         self.frames_left -= frames;
///         frames * self.channels
///     }
/// }
/// ```
pub trait PcmSource: Send + 'static {
    /// When the first audible frame should play. `None` starts immediately.
    fn start_time(&self) -> Option<Instant> {
        None
    }

    /// Fill `out` with interleaved samples and return how many were written.
    ///
    /// `start_frame` is the device frame at which `out[0]` will play. Writing
    /// fewer than `out.len()` samples means the source is exhausted; it won't
    /// be asked again.
    fn read_pcm(&mut self, out: &mut [i16], start_frame: u64) -> usize;

    /// Called once, after the last delivered sample has actually played.
    fn notify_stopped(&mut self) {}
}

impl<S: PcmSource + ?Sized> PcmSource for Box<S> {
    fn start_time(&self) -> Option<Instant> {
        (**self).start_time()
    }

    fn read_pcm(&mut self, out: &mut [i16], start_frame: u64) -> usize {
        (**self).read_pcm(out, start_frame)
    }

    fn notify_stopped(&mut self) {
        (**self).notify_stopped()
    }
}
