use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic request counter. The token handed out by [`next`] stays current
/// until another execution starts or the controller is reset.
///
/// [`next`]: RequestSequence::next
#[derive(Debug, Default)]
pub(crate) struct RequestSequence(AtomicU64);

impl RequestSequence {
    pub(crate) fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Make every outstanding token stale.
    pub(crate) fn invalidate(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn is_current(&self, token: u64) -> bool {
        self.0.load(Ordering::SeqCst) == token
    }
}
