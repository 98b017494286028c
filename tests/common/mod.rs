#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::sleep;
use std::time::{Duration, Instant};

use mixdown::PcmSource;

/// Emits one value on every sample, optionally for a limited number of frames.
pub struct Constant {
    value: i16,
    channels: usize,
    frames_left: Option<u64>,
    start_time: Option<Instant>,
    pub calls: Arc<AtomicUsize>,
    pub start_frames: Arc<Mutex<Vec<u64>>>,
    pub stopped: Arc<AtomicUsize>,
}

impl Constant {
    pub fn new(value: i16) -> Self {
        Self {
            value,
            channels: 2,
            frames_left: None,
            start_time: None,
            calls: Arc::new(AtomicUsize::new(0)),
            start_frames: Arc::new(Mutex::new(Vec::new())),
            stopped: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn frames(mut self, frames: u64) -> Self {
        self.frames_left = Some(frames);
        self
    }

    pub fn at(mut self, start: Instant) -> Self {
        self.start_time = Some(start);
        self
    }

    pub fn probe(&self) -> Probe {
        Probe {
            calls: self.calls.clone(),
            start_frames: self.start_frames.clone(),
            stopped: self.stopped.clone(),
        }
    }
}

/// Observes a [`Constant`] after it has been handed to the mixer.
#[derive(Clone)]
pub struct Probe {
    calls: Arc<AtomicUsize>,
    start_frames: Arc<Mutex<Vec<u64>>>,
    stopped: Arc<AtomicUsize>,
}

impl Probe {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn start_frames(&self) -> Vec<u64> {
        self.start_frames.lock().unwrap().clone()
    }

    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl PcmSource for Constant {
    fn start_time(&self) -> Option<Instant> {
        self.start_time
    }

    fn read_pcm(&mut self, out: &mut [i16], start_frame: u64) -> usize {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.start_frames.lock().unwrap().push(start_frame);

        let mut frames = (out.len() / self.channels) as u64;
        if let Some(left) = self.frames_left.as_mut() {
            frames = frames.min(*left);
            *left -= frames;
        }
        let samples = frames as usize * self.channels;
        out[..samples].iter_mut().for_each(|s| *s = self.value);
        samples
    }

    fn notify_stopped(&mut self) {
        self.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

/// Poll `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        sleep(Duration::from_millis(1));
    }
    cond()
}

/// Route the crate's tracing output through the test harness.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}
