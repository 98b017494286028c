//! Software output device driven by hand

use std::sync::{Arc, Mutex, MutexGuard};

use super::{BufferEvent, DeviceFormat, OutputDevice};
use crate::error::{DeviceError, InitError};

#[derive(Default)]
struct State {
    format: Option<DeviceFormat>,
    event: Option<BufferEvent>,
    chunks: Vec<Vec<i16>>,
    frames_submitted: u64,
    frames_played: u64,
    cursor_queries: u64,
    fail_open: Option<String>,
    fail_submit: Option<String>,
    fail_cursor: Option<String>,
    close_count: usize,
}

impl State {
    fn channels(&self) -> u64 {
        self.format.map(|f| f.channels as u64).unwrap_or(1).max(1)
    }
}

/// An output device with no hardware behind it.
///
/// Playback only advances through [`ManualDeviceHandle::advance`], which makes
/// the mixer fully deterministic. Every submitted chunk is kept for
/// inspection.
///
/// ```
/// # use mixdown::{ManualDevice, MixDriver, MixerConfig};
/// let (device, handle) = ManualDevice::new();
/// let driver = MixDriver::new(device, MixerConfig::default()).unwrap();
/// // ... start some sounds ...
/// handle.advance(1024);
/// # driver.shutdown().unwrap();
/// ```
pub struct ManualDevice {
    name: String,
    state: Arc<Mutex<State>>,
}

/// Remote control for a [`ManualDevice`], usable from any thread.
#[derive(Clone)]
pub struct ManualDeviceHandle {
    state: Arc<Mutex<State>>,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

impl ManualDevice {
    pub fn new() -> (Self, ManualDeviceHandle) {
        Self::named("manual")
    }

    pub fn named(name: impl Into<String>) -> (Self, ManualDeviceHandle) {
        let state = Arc::new(Mutex::new(State::default()));
        let device = Self {
            name: name.into(),
            state: state.clone(),
        };
        (device, ManualDeviceHandle { state })
    }
}

impl OutputDevice for ManualDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(
        &mut self,
        format: &DeviceFormat,
        _capacity_frames: usize,
        event: BufferEvent,
    ) -> Result<(), InitError> {
        let mut state = lock(&self.state);
        if let Some(reason) = state.fail_open.clone() {
            return Err(InitError::Open {
                device: self.name.clone(),
                reason,
            });
        }
        if format.bits_per_sample != 16 {
            return Err(InitError::UnsupportedFormat {
                device: self.name.clone(),
                format: format.to_string(),
            });
        }
        state.format = Some(*format);
        state.event = Some(event);
        Ok(())
    }

    fn submit(&mut self, samples: &[i16]) -> Result<(), DeviceError> {
        let mut state = lock(&self.state);
        if let Some(reason) = state.fail_submit.clone() {
            return Err(DeviceError::Submit {
                device: self.name.clone(),
                reason,
            });
        }
        let frames = samples.len() as u64 / state.channels();
        state.chunks.push(samples.to_vec());
        state.frames_submitted += frames;
        Ok(())
    }

    fn play_cursor(&self) -> Result<u64, DeviceError> {
        let mut state = lock(&self.state);
        state.cursor_queries += 1;
        if let Some(reason) = state.fail_cursor.clone() {
            return Err(DeviceError::Cursor {
                device: self.name.clone(),
                reason,
            });
        }
        Ok(state.frames_played)
    }

    fn close(&mut self) {
        let mut state = lock(&self.state);
        state.close_count += 1;
        state.event = None;
    }
}

impl ManualDeviceHandle {
    /// Play up to `frames` more frames. The cursor never passes what has been
    /// submitted. Returns the new cursor.
    pub fn advance(&self, frames: u64) -> u64 {
        let mut state = lock(&self.state);
        state.frames_played = (state.frames_played + frames).min(state.frames_submitted);
        if let Some(event) = &state.event {
            event.signal();
        }
        state.frames_played
    }

    /// Play everything submitted so far.
    pub fn play_all(&self) -> u64 {
        self.advance(u64::MAX / 2)
    }

    pub fn play_cursor(&self) -> u64 {
        lock(&self.state).frames_played
    }

    /// How many times the play cursor has been queried. The mixer asks once
    /// per fill cycle.
    pub fn cursor_queries(&self) -> u64 {
        lock(&self.state).cursor_queries
    }

    pub fn frames_submitted(&self) -> u64 {
        lock(&self.state).frames_submitted
    }

    /// Every chunk submitted so far, in order.
    pub fn chunks(&self) -> Vec<Vec<i16>> {
        lock(&self.state).chunks.clone()
    }

    pub fn chunk_count(&self) -> usize {
        lock(&self.state).chunks.len()
    }

    /// All submitted audio as one interleaved buffer.
    pub fn output(&self) -> Vec<i16> {
        lock(&self.state).chunks.concat()
    }

    /// Format the device was opened with, if it was.
    pub fn format(&self) -> Option<DeviceFormat> {
        lock(&self.state).format
    }

    pub fn close_count(&self) -> usize {
        lock(&self.state).close_count
    }

    /// Make the next `open` fail.
    pub fn fail_open(&self, reason: impl Into<String>) {
        lock(&self.state).fail_open = Some(reason.into());
    }

    /// Make every following `submit` fail.
    pub fn fail_submit(&self, reason: impl Into<String>) {
        lock(&self.state).fail_submit = Some(reason.into());
    }

    /// Make every following cursor query fail.
    pub fn fail_cursor(&self, reason: impl Into<String>) {
        lock(&self.state).fail_cursor = Some(reason.into());
    }
}
