//! The mixing thread: fills free device buffers from the active streams.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};

use crate::clock::{frames_until, Clock};
use crate::config::MixerConfig;
use crate::device::{BufferEvent, BufferPool, OutputDevice};
use crate::error::Result;
use crate::mix::SampleMixer;
use crate::registry::StreamRegistry;

/// Everything the single mixer lock guards.
pub(crate) struct MixState<D> {
    pub(crate) registry: StreamRegistry,
    pub(crate) pool: BufferPool,
    pub(crate) device: D,
    /// Frames handed to the device so far
    pub(crate) write_cursor: u64,
    pub(crate) mix_volume: f32,
    /// Set once `OutputDevice::close` has run
    pub(crate) closed: bool,
}

/// Context shared by the driver and the mixing thread.
pub(crate) struct Shared<D> {
    pub(crate) state: Mutex<MixState<D>>,
    pub(crate) event: BufferEvent,
    pub(crate) shutdown: AtomicBool,
    /// Cleared when the scheduler dies on a device error
    pub(crate) running: AtomicBool,
    pub(crate) clock: Box<dyn Clock>,
    pub(crate) config: MixerConfig,
}

impl<D> Shared<D> {
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, MixState<D>>> {
        Ok(self.state.lock()?)
    }

    #[inline]
    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

/// What one call to [`MixingScheduler::fill_cycle`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A buffer was mixed and submitted
    Filled,
    /// Every buffer is still queued to the device
    Starved,
    /// The driver is shutting down
    Stopped,
}

/// Cross-platform priority (0-99) for the mixing thread, above the default.
const MIXER_PRIORITY: u8 = 70;

/// Frames of leading silence a not-yet-started stream needs in this chunk.
///
/// `frames_before_start` is measured from now, `frames_until_buffer` is how far
/// ahead of the play cursor this chunk will play. Silence covers frames strictly
/// before the start; the start frame itself is audible.
pub(crate) fn silent_frames(
    frames_before_start: i64,
    frames_until_buffer: i64,
    chunk_frames: usize,
) -> usize {
    (frames_before_start - frames_until_buffer).clamp(0, chunk_frames as i64) as usize
}

/// Mixes active streams into device buffers.
///
/// Normally owned by the thread [`MixDriver::new`](crate::MixDriver::new)
/// spawns. [`MixDriver::detached`](crate::MixDriver::detached) hands it to the
/// caller instead, to drive [`fill_cycle`](Self::fill_cycle) by hand.
pub struct MixingScheduler<D: OutputDevice> {
    shared: Arc<Shared<D>>,
    mixer: SampleMixer,
    /// One chunk of PCM pulled from a single stream
    scratch: Box<[i16]>,
}

impl<D: OutputDevice> MixingScheduler<D> {
    pub(crate) fn new(shared: Arc<Shared<D>>) -> Self {
        let samples = shared.config.chunk_samples();
        Self {
            mixer: SampleMixer::new(samples),
            scratch: vec![0; samples].into_boxed_slice(),
            shared,
        }
    }

    /// Run fill cycles until shutdown.
    ///
    /// Sleeps on the buffer event whenever no buffer is free. Returns early with
    /// the error if the device fails.
    pub fn run(mut self) -> Result<()> {
        let span = tracing::info_span!("mixer");
        let _enter = span.enter();
        tracing::debug!("mixer thread started");
        raise_priority();

        let timeout = self.shared.config.wait_timeout();
        while !self.shared.is_shutdown() {
            while self.fill_cycle()? == CycleOutcome::Filled {}
            self.shared.event.wait_timeout(timeout);
        }

        tracing::debug!("mixer thread exiting");
        Ok(())
    }

    /// Fill and submit at most one buffer.
    pub fn fill_cycle(&mut self) -> Result<CycleOutcome> {
        let outcome = self.fill_cycle_inner();
        if let Err(e) = &outcome {
            tracing::error!("mixer stopped: {}", e);
            self.shared.running.store(false, Ordering::Release);
        }
        outcome
    }

    fn fill_cycle_inner(&mut self) -> Result<CycleOutcome> {
        if self.shared.is_shutdown() {
            return Ok(CycleOutcome::Stopped);
        }

        let shared = &*self.shared;
        let mut guard = shared.lock()?;
        let state = &mut *guard;
        if state.closed {
            return Ok(CycleOutcome::Stopped);
        }

        let play_cursor = state.device.play_cursor()?;
        let Some(index) = state.pool.find_free(play_cursor) else {
            return Ok(CycleOutcome::Starved);
        };

        let config = &shared.config;
        let channels = config.channels() as usize;
        let chunk_frames = config.chunk_frames();
        let chunk_samples = config.chunk_samples();

        self.scratch.fill(0);
        self.mixer.set_volume(state.mix_volume);

        let play_pos = state.write_cursor;
        debug_assert!(play_pos >= play_cursor, "play cursor ran past the write cursor");
        let frames_until_buffer = play_pos.saturating_sub(play_cursor) as i64;
        let now = shared.clock.now();

        for i in 0..state.registry.len() {
            let id = state.registry.ids()[i];
            let Some(stream) = state.registry.get_mut(id) else {
                continue;
            };
            if stream.stopping {
                continue;
            }

            let mut filled = 0;
            let mut started = false;

            if let Some(start) = stream.start_time {
                let before_start = frames_until(start, now, config.sample_rate());
                let silent =
                    silent_frames(before_start, frames_until_buffer, chunk_frames) * channels;
                self.scratch[..silent].fill(0);
                filled += silent;

                if silent == 0 {
                    started = true;
                }
            }

            if filled < chunk_samples {
                let start_frame = play_pos + (filled / channels) as u64;
                let got = stream.source.read_pcm(&mut self.scratch[filled..], start_frame);
                filled += got.min(chunk_samples - filled);
            }

            self.mixer.write(&self.scratch[..filled]);

            if started {
                state.registry.clear_start_time(id);
            }
            if filled < chunk_samples {
                // Recorded before the buffer is submitted, so completion
                // detection never sees a stale flush frame.
                let flush_frame = play_pos + (filled / channels) as u64;
                state.registry.mark_stopping(id, flush_frame);
                tracing::debug!(?id, flush_frame, "stream exhausted, flushing");
            }
        }

        self.mixer.read(state.pool.buffer_mut(index));
        state.device.submit(state.pool.buffer(index))?;

        state.write_cursor += chunk_frames as u64;
        state.pool.mark_submitted(index, state.write_cursor);

        tracing::trace!(
            buffer = index,
            write_cursor = state.write_cursor,
            play_cursor,
            "submitted chunk"
        );
        Ok(CycleOutcome::Filled)
    }
}

/// Run the calling thread above normal priority. Failure isn't fatal; the
/// mixer just runs at whatever priority it already has.
fn raise_priority() {
    let priority = match ThreadPriorityValue::try_from(MIXER_PRIORITY) {
        Ok(value) => ThreadPriority::Crossplatform(value),
        Err(e) => {
            tracing::warn!("invalid mixer thread priority: {}", e);
            return;
        }
    };

    match set_current_thread_priority(priority) {
        Ok(()) => tracing::debug!(priority = MIXER_PRIORITY, "raised mixer thread priority"),
        Err(e) => tracing::warn!("couldn't raise mixer thread priority: {:?}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_is_clamped_to_the_chunk() {
        assert_eq!(silent_frames(2500, 0, 1024), 1024);
        assert_eq!(silent_frames(2500, 1024, 1024), 1024);
        assert_eq!(silent_frames(2500, 2048, 1024), 452);
        assert_eq!(silent_frames(2500, 3072, 1024), 0);
        assert_eq!(silent_frames(-10, 0, 1024), 0);
    }

    #[test]
    fn raising_priority_never_panics() {
        // Usually refused without privileges; either way the thread carries on
        std::thread::spawn(raise_priority).join().unwrap();
    }

    #[test]
    fn start_frame_is_audible() {
        // Stream starts exactly where this chunk begins
        assert_eq!(silent_frames(2048, 2048, 1024), 0);
        // One frame before the start
        assert_eq!(silent_frames(2049, 2048, 1024), 1);
    }
}
