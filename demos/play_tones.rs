//! Plays a short arpeggio through the default output device.
//!
//! Run with: cargo run --example play_tones --features cpal_sink

use std::thread::sleep;
use std::time::{Duration, Instant};

use mixdown::sources::Sine;
use mixdown::{CpalDevice, InitError, MixDriver, MixerConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let device = CpalDevice::default_output().ok_or(InitError::NoDevice)?;
    let config = MixerConfig::default().with_sample_rate(device.sample_rate());
    let rate = config.sample_rate();
    let driver = MixDriver::new(device, config)?;

    println!("latency: {:.1}ms", driver.play_latency() * 1000.0);

    // Schedule every note up front; each lands on its exact frame
    let start = Instant::now() + Duration::from_millis(200);
    let notes = [261.63, 329.63, 392.0, 523.25];
    let mut flags = Vec::new();
    for (i, freq) in notes.into_iter().enumerate() {
        let tone = Sine::new(rate, freq)
            .with_amplitude(0.2)
            .with_length(rate as u64 / 2)
            .starting_at(start + Duration::from_millis(250 * i as u64));
        flags.push(tone.finished());
        driver.start_mixing(tone)?;
    }

    let frame_time = Duration::from_millis(16);
    while !flags.iter().all(|f| f.is_set()) {
        for id in driver.update(frame_time.as_secs_f32())? {
            println!("finished {:?} at frame {}", id, driver.get_position(Some(id))?);
        }
        sleep(frame_time);
    }

    driver.shutdown()?;
    Ok(())
}
