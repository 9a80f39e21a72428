use futures::future::join_all;

use crate::watcher::task::{WatchHandle, WatchOutcome};

/// The watchers owned by one connection.
///
/// Dropping the set cancels every watcher still waiting, so a closed
/// connection never leaves listeners behind in the broker. Watchers whose
/// event was already published still deliver it.
#[derive(Debug, Default)]
pub struct WatchSet {
    handles: Vec<WatchHandle>,
}

impl WatchSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of a running watcher.
    pub fn insert(&mut self, handle: WatchHandle) {
        self.handles.push(handle);
    }

    /// Forgets watchers that already finished. Returns how many were removed.
    pub fn prune(&mut self) -> usize {
        let before = self.handles.len();
        self.handles.retain(|h| !h.is_finished());
        before - self.handles.len()
    }

    /// Number of tracked watchers, finished or not.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no watcher is tracked.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Cancels every pending watcher and waits until all of them have ended.
    ///
    /// A watcher already fulfilled by a publish finishes normally and shows
    /// up as [`WatchOutcome::Notified`].
    pub async fn shutdown(mut self) -> Vec<WatchOutcome> {
        let handles = std::mem::take(&mut self.handles);
        for handle in &handles {
            handle.cancel();
        }
        join_all(handles.into_iter().map(WatchHandle::outcome)).await
    }
}

impl Drop for WatchSet {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.cancel();
        }
    }
}
