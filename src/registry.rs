//! Stream registry - the set of sounds currently being mixed

use std::time::Instant;

use hashbrown::HashMap;
use itertools::Itertools;

use crate::source::PcmSource;

/// Stable identifier of a registered stream.
///
/// Returned by [`MixDriver::start_mixing`](crate::MixDriver::start_mixing).
/// Ids are never reused, so a stale id simply no longer matches anything.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct StreamId(pub(crate) u64);

impl StreamId {
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// One actively playing sound.
pub(crate) struct Stream {
    pub(crate) source: Box<dyn PcmSource>,
    /// `None` once the stream is audible (or was immediate)
    pub(crate) start_time: Option<Instant>,
    /// Source ran dry; waiting for the device to play out what was submitted
    pub(crate) stopping: bool,
    /// Device frame at which the last submitted audio has played
    pub(crate) flush_frame: u64,
}

/// Copy of a stream's bookkeeping, detached from the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamSnapshot {
    pub id: StreamId,
    pub start_time: Option<Instant>,
    pub stopping: bool,
    pub flush_frame: u64,
}

/// Arena of streams keyed by [`StreamId`], iterated in registration order.
///
/// Not synchronized on its own; the driver keeps it behind the shared mixer lock.
#[derive(Default)]
pub(crate) struct StreamRegistry {
    streams: HashMap<StreamId, Stream>,
    order: Vec<StreamId>,
    next_id: u64,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stream. Registering the same sound twice yields two streams.
    pub fn register(
        &mut self,
        source: Box<dyn PcmSource>,
        start_time: Option<Instant>,
    ) -> StreamId {
        let id = StreamId(self.next_id);
        self.next_id += 1;

        self.streams.insert(
            id,
            Stream {
                source,
                start_time,
                stopping: false,
                flush_frame: 0,
            },
        );
        self.order.push(id);
        id
    }

    /// Remove a stream immediately, even mid-flush.
    ///
    /// Returns `None` if the stream is already gone (e.g. it just finished on
    /// its own); that's expected and not an error.
    pub fn unregister(&mut self, id: StreamId) -> Option<Stream> {
        let Some(stream) = self.streams.remove(&id) else {
            tracing::trace!(?id, "not stopping a stream that isn't playing");
            return None;
        };
        self.order.retain(|&other| other != id);
        Some(stream)
    }

    /// Detached copy of every stream, in registration order.
    pub fn snapshot(&self) -> Vec<StreamSnapshot> {
        self.order
            .iter()
            .filter_map(|id| {
                self.streams.get(id).map(|s| StreamSnapshot {
                    id: *id,
                    start_time: s.start_time,
                    stopping: s.stopping,
                    flush_frame: s.flush_frame,
                })
            })
            .collect_vec()
    }

    /// Source ran dry: stop pulling PCM and wait for `flush_frame` to play.
    pub fn mark_stopping(&mut self, id: StreamId, flush_frame: u64) {
        if let Some(stream) = self.streams.get_mut(&id) {
            stream.stopping = true;
            stream.flush_frame = flush_frame;
        }
    }

    /// Treat the stream as started from now on.
    pub fn clear_start_time(&mut self, id: StreamId) {
        if let Some(stream) = self.streams.get_mut(&id) {
            stream.start_time = None;
        }
    }

    #[inline]
    pub fn contains(&self, id: StreamId) -> bool {
        self.streams.contains_key(&id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: StreamId) -> Option<&mut Stream> {
        self.streams.get_mut(&id)
    }

    /// Ids in registration order.
    #[inline]
    pub fn ids(&self) -> &[StreamId] {
        &self.order
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nothing;

    impl PcmSource for Nothing {
        fn read_pcm(&mut self, _out: &mut [i16], _start_frame: u64) -> usize {
            0
        }
    }

    #[test]
    fn ids_are_distinct_and_ordered() {
        let mut reg = StreamRegistry::new();
        let a = reg.register(Box::new(Nothing), None);
        let b = reg.register(Box::new(Nothing), None);
        let c = reg.register(Box::new(Nothing), None);
        assert_ne!(a, b);
        assert_eq!(reg.ids(), &[a, b, c]);

        reg.unregister(b);
        assert_eq!(reg.ids(), &[a, c]);
        let d = reg.register(Box::new(Nothing), None);
        assert_ne!(d, b);
        assert_eq!(reg.ids(), &[a, c, d]);
    }

    #[test]
    fn unregister_twice_is_noop() {
        let mut reg = StreamRegistry::new();
        let a = reg.register(Box::new(Nothing), None);
        assert!(reg.contains(a));
        assert!(reg.unregister(a).is_some());
        assert!(!reg.contains(a));
        assert!(reg.unregister(a).is_none());
        assert_eq!(reg.len(), 0);
        assert!(reg.is_empty());
    }

    #[test]
    fn snapshot_survives_mutation() {
        let mut reg = StreamRegistry::new();
        let a = reg.register(Box::new(Nothing), None);
        let b = reg.register(Box::new(Nothing), None);
        reg.mark_stopping(b, 4096);

        let snap = reg.snapshot();
        reg.unregister(a);

        assert_eq!(snap.len(), 2);
        assert!(!snap[0].stopping);
        assert!(snap[1].stopping);
        assert_eq!(snap[1].flush_frame, 4096);
        assert_eq!(reg.ids(), &[b]);
    }
}
