use criterion::{black_box, criterion_group, criterion_main, Criterion};

use mixdown::sources::Sine;
use mixdown::{ManualClock, ManualDevice, MixDriver, MixerConfig, SampleMixer};

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("SampleMixer write x8 + read", |b| {
        let chunk = vec![1200i16; 2048];
        let mut mixer = SampleMixer::new(2048);
        let mut out = vec![0i16; 2048];

        b.iter(|| {
            for _ in 0..8 {
                mixer.write(black_box(&chunk));
            }
            mixer.read(&mut out);
            black_box(&out);
        })
    });

    c.bench_function("MixingScheduler.fill_cycle() 16 sines", |b| {
        let (device, playback) = ManualDevice::new();
        let (driver, mut scheduler) =
            MixDriver::detached(device, MixerConfig::default(), ManualClock::new()).unwrap();
        for i in 0..16 {
            driver.start_mixing(Sine::new(44100, 220.0 + 55.0 * i as f32)).unwrap();
        }

        b.iter(|| {
            playback.play_all();
            black_box(scheduler.fill_cycle().unwrap());
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
