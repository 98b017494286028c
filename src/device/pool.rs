//! Fixed pool of device buffers

/// Where a buffer is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferState {
    /// Available to be filled
    Free,
    /// Queued to the device; free once the play cursor reaches `end_frame`
    Submitted { end_frame: u64 },
}

struct DeviceBuffer {
    data: Box<[i16]>,
    state: BufferState,
}

/// `count` pre-allocated buffers of one chunk each.
///
/// Total capacity (`count * chunk`) bounds how far the write cursor can run
/// ahead of the play cursor.
pub struct BufferPool {
    buffers: Box<[DeviceBuffer]>,
    chunk_frames: usize,
}

impl BufferPool {
    /// All buffers start out free.
    pub fn new(count: usize, chunk_frames: usize, channels: usize) -> Self {
        let buffers = (0..count)
            .map(|_| DeviceBuffer {
                data: vec![0; chunk_frames * channels].into_boxed_slice(),
                state: BufferState::Free,
            })
            .collect();
        Self { buffers, chunk_frames }
    }

    /// Reclaim buffers the device has finished with and return the first free one.
    pub fn find_free(&mut self, play_cursor: u64) -> Option<usize> {
        for buffer in self.buffers.iter_mut() {
            if let BufferState::Submitted { end_frame } = buffer.state {
                if play_cursor >= end_frame {
                    buffer.state = BufferState::Free;
                }
            }
        }
        self.buffers.iter().position(|b| b.state == BufferState::Free)
    }

    #[inline]
    pub fn buffer_mut(&mut self, index: usize) -> &mut [i16] {
        &mut self.buffers[index].data
    }

    #[inline]
    pub fn buffer(&self, index: usize) -> &[i16] {
        &self.buffers[index].data
    }

    /// The buffer's audio has been queued and ends at `end_frame`.
    pub fn mark_submitted(&mut self, index: usize, end_frame: u64) {
        self.buffers[index].state = BufferState::Submitted { end_frame };
    }

    #[inline]
    pub fn state(&self, index: usize) -> BufferState {
        self.buffers[index].state
    }

    pub fn free_count(&self) -> usize {
        self.buffers.iter().filter(|b| b.state == BufferState::Free).count()
    }

    pub fn submitted_count(&self) -> usize {
        self.len() - self.free_count()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    #[inline]
    pub fn chunk_frames(&self) -> usize {
        self.chunk_frames
    }

    /// Ring capacity in frames.
    #[inline]
    pub fn capacity_frames(&self) -> usize {
        self.chunk_frames * self.buffers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_pool_waits_for_the_cursor() {
        let mut pool = BufferPool::new(8, 1024, 2);
        for i in 0..8u64 {
            let idx = pool.find_free(0).expect("free buffer");
            pool.mark_submitted(idx, (i + 1) * 1024);
        }
        assert_eq!(pool.find_free(0), None);
        assert_eq!(pool.find_free(1023), None);
        assert_eq!(pool.submitted_count(), 8);

        assert_eq!(pool.find_free(1024), Some(0));
        assert_eq!(pool.free_count(), 1);

        assert_eq!(pool.find_free(3 * 1024), Some(0));
        assert_eq!(pool.free_count(), 3);
    }

    #[test]
    fn buffers_are_one_chunk() {
        let mut pool = BufferPool::new(2, 256, 2);
        assert_eq!(pool.buffer_mut(1).len(), 512);
        assert_eq!(pool.capacity_frames(), 512);
        assert_eq!(pool.state(1), BufferState::Free);
    }
}
