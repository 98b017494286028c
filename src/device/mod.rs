//! Output devices and the buffers queued to them.
//!
//! The mixer talks to hardware through [`OutputDevice`]. Two implementations
//! ship with the crate:
//! - [`ManualDevice`] - a software device whose play cursor moves only when
//!   told to; for tests and offline rendering
//! - [`CpalDevice`] - the system audio output (requires the `cpal_sink` feature)

use std::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::error::{DeviceError, InitError};

mod manual;
mod pool;

#[cfg(feature = "cpal_sink")]
mod cpal_output;

pub use manual::{ManualDevice, ManualDeviceHandle};
pub use pool::{BufferPool, BufferState};

#[cfg(feature = "cpal_sink")]
pub use cpal_output::CpalDevice;

/// PCM layout the device is opened with. Samples are always interleaved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl DeviceFormat {
    #[inline]
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * self.bits_per_sample as usize / 8
    }

    #[inline]
    pub fn bytes_per_second(&self) -> usize {
        self.bytes_per_frame() * self.sample_rate as usize
    }
}

impl fmt::Display for DeviceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Hz {}ch {}-bit",
            self.sample_rate, self.channels, self.bits_per_sample
        )
    }
}

/// An audio output the mixer can queue chunks to.
///
/// The driver calls [`open`](Self::open) once before the mixing thread starts
/// and [`close`](Self::close) once after it has exited. In between, every call
/// happens with the mixer lock held.
pub trait OutputDevice: Send + 'static {
    /// Human readable name, used in logs and errors.
    fn name(&self) -> &str;

    /// Prepare the device for `format`.
    ///
    /// At most `capacity_frames` frames will be queued at any time. Signal
    /// `event` whenever playback progresses, so a waiting mixer can refill
    /// freed buffers promptly. Errors here are not fatal; the caller may try a
    /// different device.
    fn open(
        &mut self,
        format: &DeviceFormat,
        capacity_frames: usize,
        event: BufferEvent,
    ) -> Result<(), InitError>;

    /// Queue one chunk of interleaved samples for playback after everything
    /// submitted before it.
    fn submit(&mut self, samples: &[i16]) -> Result<(), DeviceError>;

    /// Frames the device has actually played since it was opened.
    fn play_cursor(&self) -> Result<u64, DeviceError>;

    /// Stop playback and release the device.
    fn close(&mut self);
}

/// Auto-reset event used to wake the mixing thread.
///
/// Signalled by devices when a buffer finishes playing and by the driver on
/// shutdown. A signal with no waiter is remembered until the next wait.
#[derive(Clone, Default)]
pub struct BufferEvent {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl BufferEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake one waiter, or the next one to arrive.
    pub fn signal(&self) {
        let (flag, cvar) = &*self.inner;
        let mut set = flag.lock().unwrap_or_else(|e| e.into_inner());
        *set = true;
        cvar.notify_one();
    }

    /// Wait until signalled or `timeout` passes. Returns whether a signal
    /// was consumed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, cvar) = &*self.inner;
        let set = flag.lock().unwrap_or_else(|e| e.into_inner());
        let (mut set, _) = cvar
            .wait_timeout_while(set, timeout, |set| !*set)
            .unwrap_or_else(|e| e.into_inner());
        let signalled = *set;
        *set = false;
        signalled
    }
}

impl fmt::Debug for BufferEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set = *self.inner.0.lock().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("BufferEvent").field("signalled", &set).finish()
    }
}
