mod common;

use std::thread::sleep;
use std::time::Duration;

use common::{init_tracing, wait_until, Constant};
use mixdown::sources::{SamplePlayer, Sine};
use mixdown::{DeviceError, Error, ManualDevice, MixDriver, MixerConfig};

const TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn thread_fills_every_buffer_then_waits() {
    init_tracing();
    let (device, playback) = ManualDevice::new();
    let driver = MixDriver::new(device, MixerConfig::default()).unwrap();
    driver.start_mixing(Constant::new(3)).unwrap();

    assert!(wait_until(TIMEOUT, || playback.chunk_count() == 8));
    // Nothing has played, so nothing more can be queued
    sleep(Duration::from_millis(50));
    assert_eq!(playback.chunk_count(), 8);

    playback.advance(1024);
    assert!(wait_until(TIMEOUT, || playback.chunk_count() == 9));
    assert_eq!(driver.write_cursor().unwrap(), 9 * 1024);

    driver.shutdown().unwrap();
    assert_eq!(playback.close_count(), 1);
}

#[test]
fn starved_thread_sleeps_between_cycles() {
    init_tracing();
    let (device, playback) = ManualDevice::new();
    let config = MixerConfig::default().with_wait_timeout(Duration::from_millis(10));
    let driver = MixDriver::new(device, config).unwrap();
    assert!(wait_until(TIMEOUT, || playback.chunk_count() == 8));

    // One cursor query per fill cycle; about five timeouts fit in 50ms
    let before = playback.cursor_queries();
    sleep(Duration::from_millis(50));
    let cycles = playback.cursor_queries() - before;
    assert!(cycles <= 20, "{cycles} fill cycles while every buffer was queued");

    driver.shutdown().unwrap();
}

#[test]
fn playback_progress_wakes_the_thread_early() {
    init_tracing();
    let (device, playback) = ManualDevice::new();
    let config = MixerConfig::default().with_wait_timeout(Duration::from_secs(2));
    let driver = MixDriver::new(device, config).unwrap();
    assert!(wait_until(TIMEOUT, || playback.chunk_count() == 8));

    let before = playback.cursor_queries();
    sleep(Duration::from_millis(100));
    assert!(playback.cursor_queries() - before <= 1);

    // Far sooner than the two second timeout
    playback.advance(1024);
    assert!(wait_until(Duration::from_millis(500), || playback.chunk_count() == 9));

    driver.shutdown().unwrap();
}

#[test]
fn shutdown_closes_the_device_once() {
    init_tracing();
    let (device, playback) = ManualDevice::new();
    let driver = MixDriver::new(device, MixerConfig::default()).unwrap();
    assert!(driver.is_running());

    driver.shutdown().unwrap();
    assert_eq!(playback.close_count(), 1);

    let (device, playback) = ManualDevice::new();
    drop(MixDriver::new(device, MixerConfig::default()).unwrap());
    assert_eq!(playback.close_count(), 1);
}

#[test]
fn device_error_stops_the_thread_and_surfaces_on_shutdown() {
    init_tracing();
    let (device, playback) = ManualDevice::new();
    let driver = MixDriver::new(device, MixerConfig::default().with_buffer_count(2)).unwrap();
    assert!(wait_until(TIMEOUT, || playback.chunk_count() == 2));

    playback.fail_submit("lost the device");
    playback.advance(1024);

    assert!(wait_until(TIMEOUT, || !driver.is_running()));
    assert!(matches!(driver.start_mixing(Constant::new(1)), Err(Error::NotRunning)));

    let err = driver.shutdown().unwrap_err();
    assert!(matches!(err, Error::Device(DeviceError::Submit { .. })));
    assert_eq!(playback.close_count(), 1);
}

#[test]
fn finished_sources_are_flagged_after_update() {
    init_tracing();
    let (device, playback) = ManualDevice::new();
    let driver = MixDriver::new(device, MixerConfig::default()).unwrap();

    let tone = Sine::new(44100, 440.0).with_length(1500);
    let tone_done = tone.finished();
    let tone_id = driver.start_mixing(tone).unwrap();

    let clip = SamplePlayer::new(vec![1000i16; 600], 1);
    let clip_done = clip.finished();
    let clip_id = driver.start_mixing(clip).unwrap();

    assert!(wait_until(TIMEOUT, || {
        driver.active_streams().unwrap().iter().all(|s| s.stopping)
    }));
    assert!(!tone_done.is_set());
    assert!(!clip_done.is_set());

    let mut finished = Vec::new();
    assert!(wait_until(TIMEOUT, || {
        playback.play_all();
        finished.extend(driver.update(1.0 / 60.0).unwrap());
        finished.len() == 2
    }));

    finished.sort();
    assert_eq!(finished, vec![tone_id, clip_id]);
    assert!(tone_done.is_set());
    assert!(clip_done.is_set());
    assert!(driver.active_streams().unwrap().is_empty());

    driver.shutdown().unwrap();
}

#[test]
fn mono_clip_is_copied_to_both_channels() {
    init_tracing();
    let (device, playback) = ManualDevice::new();
    let driver = MixDriver::new(device, MixerConfig::default()).unwrap();

    let samples: Vec<i16> = (1..=100).map(|i| i * 10).collect();
    driver.start_mixing(SamplePlayer::new(samples, 1)).unwrap();

    assert!(wait_until(TIMEOUT, || {
        driver.active_streams().unwrap().iter().all(|s| s.stopping)
    }));
    driver.shutdown().unwrap();

    // The thread may have queued silence before the clip was registered
    let output = playback.output();
    let first = output.iter().position(|&s| s != 0).unwrap();
    assert_eq!(first % 2048, 0);

    let clip = &output[first..first + 200];
    for (frame, pair) in clip.chunks_exact(2).enumerate() {
        let expected = (frame as i16 + 1) * 10;
        assert_eq!(pair, &[expected, expected]);
    }
    assert!(output[first + 200..].iter().all(|&s| s == 0));
}
