//! High-level mixer API

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::clock::{Clock, SystemClock};
use crate::config::MixerConfig;
use crate::device::{BufferEvent, BufferPool, DeviceFormat, OutputDevice};
use crate::error::{Error, Result};
use crate::mix::MAX_VOLUME;
use crate::registry::{StreamId, StreamRegistry, StreamSnapshot};
use crate::scheduler::{MixState, MixingScheduler, Shared};
use crate::source::PcmSource;

/// The mixer - owns the output device, the active streams and the mixing thread.
///
/// Sounds are added with [`start_mixing`](Self::start_mixing). A dedicated
/// thread mixes every active sound into fixed-size chunks and queues them to
/// the device whenever a buffer frees up. Call [`update`](Self::update)
/// periodically to retire sounds that have finished playing.
///
/// # Example
///
/// ```
/// use mixdown::{ManualDevice, MixDriver, MixerConfig, sources::Sine};
///
/// let (device, playback) = ManualDevice::new();
/// let driver = MixDriver::new(device, MixerConfig::default())?;
///
/// let tone = driver.start_mixing(Sine::new(44100, 440.0).with_length(4410))?;
///
/// // later, from the game loop
/// playback.play_all();
/// let finished = driver.update(1.0 / 60.0)?;
/// # let _ = (tone, finished);
///
/// driver.shutdown()?;
/// # Ok::<(), mixdown::Error>(())
/// ```
///
/// # Shutdown
///
/// [`shutdown`](Self::shutdown) (or dropping the driver) stops the mixing
/// thread cooperatively, waits for it, and only then closes the device.
pub struct MixDriver<D: OutputDevice> {
    shared: Arc<Shared<D>>,
    thread: Option<JoinHandle<Result<()>>>,
    stopped: bool,
}

impl<D: OutputDevice> MixDriver<D> {
    /// Open `device` and start mixing on a new thread.
    pub fn new(device: D, config: MixerConfig) -> Result<Self> {
        Self::with_clock(device, config, SystemClock)
    }

    /// Like [`new`](Self::new), with a custom time source for start times.
    pub fn with_clock(device: D, config: MixerConfig, clock: impl Clock) -> Result<Self> {
        let (mut driver, scheduler) = Self::detached(device, config, clock)?;

        let thread = std::thread::Builder::new()
            .name("mixer".into())
            .spawn(move || scheduler.run())
            .map_err(|e| Error::Thread(e.to_string()))?;
        driver.thread = Some(thread);

        Ok(driver)
    }

    /// Open `device` without starting a thread.
    ///
    /// The returned [`MixingScheduler`] is the mixing loop; run it wherever you
    /// like, or step it with [`MixingScheduler::fill_cycle`].
    pub fn detached(
        mut device: D,
        config: MixerConfig,
        clock: impl Clock,
    ) -> Result<(Self, MixingScheduler<D>)> {
        config.validate()?;

        let format = config.format();
        let event = BufferEvent::new();
        device.open(&format, config.total_frames(), event.clone())?;

        tracing::info!(
            device = device.name(),
            %format,
            chunk_frames = config.chunk_frames(),
            buffers = config.buffer_count(),
            "opened output device"
        );

        let state = MixState {
            registry: StreamRegistry::new(),
            pool: BufferPool::new(
                config.buffer_count(),
                config.chunk_frames(),
                config.channels() as usize,
            ),
            device,
            write_cursor: 0,
            mix_volume: config.mix_volume(),
            closed: false,
        };

        let shared = Arc::new(Shared {
            state: Mutex::new(state),
            event,
            shutdown: AtomicBool::new(false),
            running: AtomicBool::new(true),
            clock: Box::new(clock),
            config,
        });

        let scheduler = MixingScheduler::new(shared.clone());
        let driver = Self {
            shared,
            thread: None,
            stopped: false,
        };
        Ok((driver, scheduler))
    }

    /// Start mixing `source`. Returns the id used to stop it.
    ///
    /// The stream begins at the source's [`start_time`](PcmSource::start_time),
    /// or with the next mixed chunk if it has none.
    pub fn start_mixing(&self, source: impl PcmSource) -> Result<StreamId> {
        self.start_boxed(Box::new(source))
    }

    /// [`start_mixing`](Self::start_mixing) for an already boxed source.
    pub fn start_boxed(&self, source: Box<dyn PcmSource>) -> Result<StreamId> {
        self.ensure_running()?;

        let start_time = source.start_time();
        let mut state = self.shared.lock()?;
        let id = state.registry.register(source, start_time);
        tracing::debug!(?id, scheduled = start_time.is_some(), "started mixing");
        Ok(id)
    }

    /// Stop mixing a stream right away, discarding anything still queued for it.
    ///
    /// Stopping a stream that already finished is a no-op.
    pub fn stop_mixing(&self, id: StreamId) -> Result<()> {
        let removed = self.shared.lock()?.registry.unregister(id);
        if removed.is_some() {
            tracing::debug!(?id, "stopped mixing");
        }
        Ok(())
    }

    /// Retire streams whose audio has completely played.
    ///
    /// Each finished source gets [`notify_stopped`](PcmSource::notify_stopped)
    /// once, after the mixer lock is released. Returns the finished ids.
    pub fn update(&self, delta_seconds: f32) -> Result<Vec<StreamId>> {
        let mut finished = Vec::new();
        {
            let mut state = self.shared.lock()?;
            if state.closed {
                return Err(Error::NotRunning);
            }
            if state.registry.is_empty() {
                return Ok(Vec::new());
            }

            // Work from a copy; stop_mixing can't interleave while we hold the
            // lock, but removal still re-checks the arena.
            let snapshot = state.registry.snapshot();
            let play_cursor = state.device.play_cursor()?;

            for stream in snapshot.iter().filter(|s| s.stopping) {
                if play_cursor < stream.flush_frame || !state.registry.contains(stream.id) {
                    continue;
                }
                if let Some(done) = state.registry.unregister(stream.id) {
                    finished.push((stream.id, done));
                }
            }
            tracing::trace!(delta_seconds, play_cursor, finished = finished.len(), "update");
        }

        Ok(finished
            .into_iter()
            .map(|(id, mut stream)| {
                tracing::debug!(?id, "stream finished");
                stream.source.notify_stopped();
                id
            })
            .collect())
    }

    /// Frames the device has played.
    ///
    /// Every stream shares this clock (it's the frame domain of
    /// [`PcmSource::read_pcm`]'s `start_frame`), so the stream argument only
    /// exists for symmetry with the other calls.
    pub fn get_position(&self, _stream: Option<StreamId>) -> Result<u64> {
        let state = self.shared.lock()?;
        if state.closed {
            return Err(Error::NotRunning);
        }
        Ok(state.device.play_cursor()?)
    }

    /// Frames handed to the device so far.
    pub fn write_cursor(&self) -> Result<u64> {
        Ok(self.shared.lock()?.write_cursor)
    }

    /// Average delay between mixing a frame and hearing it, in seconds.
    pub fn play_latency(&self) -> f64 {
        self.shared.config.play_latency()
    }

    /// Gain applied to the whole mix from the next chunk on, clamped to
    /// `0.0..=4.0`.
    pub fn set_mix_volume(&self, volume: f32) -> Result<()> {
        let volume = if volume.is_finite() {
            volume.clamp(0.0, MAX_VOLUME)
        } else {
            0.0
        };
        self.shared.lock()?.mix_volume = volume;
        Ok(())
    }

    pub fn mix_volume(&self) -> Result<f32> {
        Ok(self.shared.lock()?.mix_volume)
    }

    /// Bookkeeping for every registered stream, in start order.
    pub fn active_streams(&self) -> Result<Vec<StreamSnapshot>> {
        Ok(self.shared.lock()?.registry.snapshot())
    }

    /// False once shut down or after the mixer hit a device error.
    pub fn is_running(&self) -> bool {
        !self.shared.is_shutdown() && self.shared.running.load(Ordering::Acquire)
    }

    pub fn format(&self) -> DeviceFormat {
        self.shared.config.format()
    }

    pub fn config(&self) -> &MixerConfig {
        &self.shared.config
    }

    /// Stop the mixing thread, wait for it, then close the device.
    ///
    /// Returns the device error that killed the mixing thread, if one did.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(Error::NotRunning)
        }
    }

    fn stop(&mut self) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;

        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.event.signal();

        tracing::trace!("shutting down mixer thread");
        let outcome = match self.thread.take() {
            Some(thread) => thread
                .join()
                .unwrap_or_else(|_| Err(Error::Thread("mixer thread panicked".into()))),
            None => Ok(()),
        };
        tracing::trace!("mixer thread shut down");

        let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.closed {
            state.device.close();
            state.closed = true;
            tracing::info!(device = state.device.name(), "closed output device");
        }

        outcome
    }
}

impl<D: OutputDevice> Drop for MixDriver<D> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!("mixer shut down with error: {}", e);
        }
    }
}
