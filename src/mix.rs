//! Sample mixer - sums 16-bit streams into one clipped chunk

/// Fixed-point unity gain (8.8).
const UNITY: i32 = 256;

/// Largest accepted volume.
pub(crate) const MAX_VOLUME: f32 = 4.0;

/// Accumulates several 16-bit interleaved streams into a single chunk.
///
/// Samples are summed into an `i32` accumulator so intermediate sums can't
/// wrap; clipping happens once, in [`read`](Self::read). The accumulator is
/// sized at construction and reused for every chunk.
///
/// ```
/// # use mixdown::SampleMixer;
/// let mut mixer = SampleMixer::new(4);
/// mixer.write(&[30000, -30000, 100, 0]);
/// mixer.write(&[30000, -30000, 100]);
///
/// let mut out = [0i16; 4];
/// mixer.read(&mut out);
/// assert_eq!(out, [i16::MAX, i16::MIN, 200, 0]);
/// ```
pub struct SampleMixer {
    accum: Box<[i32]>,
    /// Gain in 8.8 fixed point
    volume: i32,
    /// Highest sample index written since the last read
    used: usize,
}

impl SampleMixer {
    /// Create a mixer for chunks of `samples` interleaved samples.
    pub fn new(samples: usize) -> Self {
        Self {
            accum: vec![0; samples].into_boxed_slice(),
            volume: UNITY,
            used: 0,
        }
    }

    /// Set the gain for samples written from now on (1.0 = unity).
    pub fn set_volume(&mut self, volume: f32) {
        let volume = if volume.is_finite() {
            volume.clamp(0.0, MAX_VOLUME)
        } else {
            0.0
        };
        self.volume = (volume * UNITY as f32).round() as i32;
    }

    #[inline]
    pub fn volume(&self) -> f32 {
        self.volume as f32 / UNITY as f32
    }

    /// Chunk size in samples.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.accum.len()
    }

    /// Add `samples` into the accumulator, starting at its first sample.
    ///
    /// Anything past the chunk size is ignored.
    pub fn write(&mut self, samples: &[i16]) {
        let volume = self.volume;
        let n = samples.len().min(self.accum.len());

        if volume == UNITY {
            for (acc, &s) in self.accum[..n].iter_mut().zip(samples) {
                *acc += s as i32;
            }
        } else {
            for (acc, &s) in self.accum[..n].iter_mut().zip(samples) {
                *acc += (s as i32 * volume) / UNITY;
            }
        }

        self.used = self.used.max(n);
    }

    /// Write the clipped mix into `out` and reset to silence.
    ///
    /// Samples of `out` beyond the chunk size are zeroed.
    pub fn read(&mut self, out: &mut [i16]) {
        let n = out.len().min(self.accum.len());

        for (o, acc) in out[..n].iter_mut().zip(self.accum.iter()) {
            *o = (*acc).clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        }
        out[n..].iter_mut().for_each(|s| *s = 0);

        self.accum[..self.used].iter_mut().for_each(|a| *a = 0);
        self.used = 0;
    }
}
