//! Mixdown - chunked software mixer and device-output driver
//!
//! Design:
//! - A fixed pool of fixed-size device buffers, refilled one chunk at a time
//! - One mixing thread; clients start and stop sounds from any thread
//! - A single lock over streams, buffers and cursors
//! - Sounds can be scheduled to start on an exact future frame, measured
//!   against the device's play cursor rather than the time of mixing
//! - Devices are a trait; CPAL output and a hand-driven software device ship
//!   with the crate

mod clock;
mod config;
mod device;
mod driver;
mod error;
mod mix;
mod registry;
mod scheduler;
mod source;
pub mod sources;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::MixerConfig;
pub use device::{
    BufferEvent, BufferPool, BufferState, DeviceFormat, ManualDevice, ManualDeviceHandle,
    OutputDevice,
};
pub use driver::MixDriver;
pub use error::{DeviceError, Error, InitError, Result};
pub use mix::SampleMixer;
pub use registry::{StreamId, StreamSnapshot};
pub use scheduler::{CycleOutcome, MixingScheduler};
pub use source::PcmSource;

#[cfg(feature = "cpal_sink")]
pub use device::CpalDevice;
