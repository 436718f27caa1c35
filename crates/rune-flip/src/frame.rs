//! Shared per-frame callback queue.
//!
//! Every running animation queues one entry per frame; the host is asked for
//! a frame only when the queue goes from empty to non-empty, so any number of
//! animations share a single frame request. Entries can be cancelled until
//! the frame runs.

/// Cancellation handle for one queued entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHandle {
    epoch: u64,
    index: usize,
}

#[derive(Debug)]
pub struct FrameQueue<T> {
    entries: Vec<Option<T>>,
    // Bumped on every take so handles from earlier frames go stale.
    epoch: u64,
}

impl<T> Default for FrameQueue<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            epoch: 0,
        }
    }
}

impl<T> FrameQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an entry for the next frame. The flag is true when this is the
    /// first entry since the last frame, i.e. a frame must be requested.
    pub fn queue(&mut self, entry: T) -> (FrameHandle, bool) {
        let first = self.entries.is_empty();
        self.entries.push(Some(entry));
        let handle = FrameHandle {
            epoch: self.epoch,
            index: self.entries.len() - 1,
        };
        (handle, first)
    }

    /// Cancel a queued entry. Stale handles are ignored.
    pub fn cancel(&mut self, handle: FrameHandle) {
        if handle.epoch != self.epoch {
            return;
        }
        if let Some(slot) = self.entries.get_mut(handle.index) {
            *slot = None;
        }
    }

    /// Take every live entry for the frame being run.
    pub fn take(&mut self) -> Vec<T> {
        self.epoch += 1;
        std::mem::take(&mut self.entries)
            .into_iter()
            .flatten()
            .collect()
    }

    /// True when nothing is waiting (cancelled entries still count until the
    /// frame runs, matching the outstanding frame request).
    pub fn is_idle(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_entry_requests_frame() {
        let mut queue = FrameQueue::new();
        let (_, first) = queue.queue(1);
        assert!(first);
        let (_, first) = queue.queue(2);
        assert!(!first);
        assert_eq!(queue.take(), vec![1, 2]);
        assert!(queue.is_idle());

        let (_, first) = queue.queue(3);
        assert!(first);
    }

    #[test]
    fn test_cancel() {
        let mut queue = FrameQueue::new();
        let (a, _) = queue.queue("a");
        queue.queue("b");
        queue.cancel(a);
        assert_eq!(queue.take(), vec!["b"]);
    }

    #[test]
    fn test_stale_handle_ignored() {
        let mut queue = FrameQueue::new();
        let (old, _) = queue.queue("a");
        queue.take();
        queue.queue("b");
        queue.cancel(old);
        assert_eq!(queue.take(), vec!["b"]);
    }
}
