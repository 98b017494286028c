//! CPAL device discovery and playback.
//!
//! ```no_run
//! use mixdown::{CpalDevice, MixDriver, MixerConfig, OutputDevice};
//!
//! for device in CpalDevice::list_outputs() {
//!     println!("{} ({} Hz, {} ch)", device.name(), device.sample_rate(), device.channels());
//! }
//!
//! let device = CpalDevice::default_output().expect("no audio device");
//! let config = MixerConfig::default().with_sample_rate(device.sample_rate());
//! let driver = MixDriver::new(device, config)?;
//! # Ok::<(), mixdown::Error>(())
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use rtrb::{Consumer, Producer, RingBuffer};

use super::{BufferEvent, DeviceFormat, OutputDevice};
use crate::error::{DeviceError, InitError};

/// A system audio output device.
///
/// Use [`CpalDevice::default_output`] to get the system default, or
/// [`CpalDevice::list_outputs`] to enumerate all available devices.
///
/// Chunks submitted by the mixer go into a lock-free ring buffer sized to the
/// mixer's buffer pool; the CPAL callback drains it. The play cursor counts
/// frames the callback actually took from the ring, so it stalls on underrun
/// instead of running ahead of the mixer.
pub struct CpalDevice {
    device: cpal::Device,
    sample_format: SampleFormat,

    name: String,
    sample_rate: u32,
    channels: u16,

    stream: Option<StreamThread>,
}

/// Shared between the device and the CPAL callback
struct StreamThread {
    producer: Producer<i16>,
    channels: u64,
    samples_played: Arc<AtomicU64>,
    /// First error reported by CPAL, latched until close
    failure: Arc<Mutex<Option<String>>>,
    stop: mpsc::Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl CpalDevice {
    /// Get the system's default output device.
    ///
    /// Returns `None` if no audio device is available.
    pub fn default_output() -> Option<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device()?;
        Self::from_device(device)
    }

    /// List all available audio output devices.
    ///
    /// Returns an empty list if no devices are found or if enumeration fails.
    pub fn list_outputs() -> Vec<Self> {
        let host = cpal::default_host();
        host.output_devices()
            .map(|devices| devices.filter_map(Self::from_device).collect())
            .unwrap_or_default()
    }

    fn from_device(device: cpal::Device) -> Option<Self> {
        let config = device.default_output_config().ok()?;
        let name = device.name().unwrap_or_else(|_| "Unknown".into());
        Some(Self {
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
            sample_format: config.sample_format(),
            name,
            device,
            stream: None,
        })
    }

    /// The device's preferred sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The device's preferred number of output channels.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    fn stream(&self) -> Option<&StreamThread> {
        self.stream.as_ref()
    }

    fn check_failure(&self) -> Result<(), DeviceError> {
        let Some(stream) = self.stream() else {
            return Ok(());
        };
        let failure = stream.failure.lock().unwrap_or_else(|e| e.into_inner());
        match failure.as_ref() {
            Some(reason) => Err(DeviceError::Stream {
                device: self.name.clone(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl OutputDevice for CpalDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(
        &mut self,
        format: &DeviceFormat,
        capacity_frames: usize,
        event: BufferEvent,
    ) -> Result<(), InitError> {
        if format.bits_per_sample != 16 {
            return Err(InitError::UnsupportedFormat {
                device: self.name.clone(),
                format: format.to_string(),
            });
        }

        let stream_config = cpal::StreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let capacity = capacity_frames * format.channels as usize;
        let (producer, consumer) = RingBuffer::<i16>::new(capacity.max(1));

        let samples_played = Arc::new(AtomicU64::new(0));
        let failure = Arc::new(Mutex::new(None));
        let (stop, stopped) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

        // cpal::Stream isn't Send everywhere, so it lives on its own thread
        // until close.
        let device = self.device.clone();
        let sample_format = self.sample_format;
        let played = samples_played.clone();
        let latched = failure.clone();
        let thread = std::thread::Builder::new()
            .name("cpal output".into())
            .spawn(move || {
                let built = build_stream(
                    &device,
                    sample_format,
                    &stream_config,
                    consumer,
                    played,
                    latched,
                    event,
                )
                .map_err(|e| e.to_string())
                .and_then(|stream| stream.play().map(|_| stream).map_err(|e| e.to_string()));

                match built {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        // Hold the stream until the device is closed
                        let _ = stopped.recv();
                        drop(stream);
                    }
                    Err(reason) => {
                        let _ = ready_tx.send(Err(reason));
                    }
                }
            })
            .map_err(|e| InitError::Open {
                device: self.name.clone(),
                reason: e.to_string(),
            })?;

        let ready = ready_rx.recv().unwrap_or_else(|_| Err("output thread exited".into()));
        if let Err(reason) = ready {
            let _ = thread.join();
            return Err(InitError::Open {
                device: self.name.clone(),
                reason,
            });
        }

        tracing::info!(device = %self.name, %format, "opened cpal output");

        self.stream = Some(StreamThread {
            producer,
            channels: format.channels as u64,
            samples_played,
            failure,
            stop,
            thread: Some(thread),
        });
        Ok(())
    }

    fn submit(&mut self, samples: &[i16]) -> Result<(), DeviceError> {
        self.check_failure()?;

        let name = self.name.clone();
        let stream = self.stream.as_mut().ok_or_else(|| DeviceError::Submit {
            device: name.clone(),
            reason: "device not open".into(),
        })?;

        if stream.producer.slots() < samples.len() {
            return Err(DeviceError::Submit {
                device: name,
                reason: format!(
                    "ring buffer overrun ({} samples free, {} submitted)",
                    stream.producer.slots(),
                    samples.len()
                ),
            });
        }

        for &s in samples {
            // Safety net only: slots were checked above
            let _ = stream.producer.push(s);
        }
        Ok(())
    }

    fn play_cursor(&self) -> Result<u64, DeviceError> {
        self.check_failure()?;

        let stream = self.stream().ok_or_else(|| DeviceError::Cursor {
            device: self.name.clone(),
            reason: "device not open".into(),
        })?;
        Ok(stream.samples_played.load(Ordering::Acquire) / stream.channels)
    }

    fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.stop.send(());
            if let Some(thread) = stream.thread.take() {
                if thread.join().is_err() {
                    tracing::warn!(device = %self.name, "cpal output thread panicked");
                }
            }
            tracing::info!(device = %self.name, "closed cpal output");
        }
    }
}

impl Drop for CpalDevice {
    fn drop(&mut self) {
        self.close();
    }
}

fn build_stream(
    device: &cpal::Device,
    sample_format: SampleFormat,
    stream_config: &cpal::StreamConfig,
    consumer: Consumer<i16>,
    samples_played: Arc<AtomicU64>,
    failure: Arc<Mutex<Option<String>>>,
    event: BufferEvent,
) -> Result<cpal::Stream, cpal::BuildStreamError> {
    let (config, played) = (stream_config, samples_played);
    match sample_format {
        SampleFormat::F32 => build_typed::<f32>(device, config, consumer, played, failure, event),
        SampleFormat::I16 => build_typed::<i16>(device, config, consumer, played, failure, event),
        SampleFormat::U16 => build_typed::<u16>(device, config, consumer, played, failure, event),
        _ => Err(cpal::BuildStreamError::StreamConfigNotSupported),
    }
}

fn build_typed<T>(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    mut consumer: Consumer<i16>,
    samples_played: Arc<AtomicU64>,
    failure: Arc<Mutex<Option<String>>>,
    event: BufferEvent,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<i16>,
{
    device.build_output_stream(
        stream_config,
        move |data: &mut [T], _| {
            let mut popped = 0u64;
            for sample in data.iter_mut() {
                *sample = match consumer.pop() {
                    Ok(s) => {
                        popped += 1;
                        T::from_sample(s)
                    }
                    Err(_) => T::EQUILIBRIUM,
                };
            }
            if popped > 0 {
                samples_played.fetch_add(popped, Ordering::Release);
                event.signal();
            }
        },
        move |err| {
            tracing::error!("cpal stream error: {}", err);
            let mut latched = failure.lock().unwrap_or_else(|e| e.into_inner());
            latched.get_or_insert_with(|| err.to_string());
        },
        None,
    )
}
