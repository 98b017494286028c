//! Built-in PCM sources.
//!
//! - [`Sine`] - tone generator with optional length
//! - [`SamplePlayer`] - plays pre-decoded 16-bit samples
//!
//! Both can be scheduled with a start time and expose a [`FinishedFlag`] that
//! flips once the mixer reports their last sample has played.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

mod player;
mod sine;

pub use player::SamplePlayer;
pub use sine::Sine;

/// Set once a source's audio has completely played.
#[derive(Clone, Debug, Default)]
pub struct FinishedFlag(Arc<AtomicBool>);

impl FinishedFlag {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn set(&self) {
        self.0.store(true, Ordering::Release);
    }
}
