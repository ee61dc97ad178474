//! Invalidation notifications for label consumers.

use std::sync::Arc;

use tokio::sync::watch;

/// A monotonic version counter bumped whenever an evaluation settles.
///
/// Consumers either poll [`version`](Self::version) (e.g. once per frame)
/// or [`subscribe`](Self::subscribe) and await `changed()`. Dropping a
/// receiver unsubscribes it.
#[derive(Debug, Clone)]
pub struct InvalidationSignal {
  sender: Arc<watch::Sender<u64>>,
}

impl InvalidationSignal {
  pub fn new() -> Self {
    let (sender, _) = watch::channel(0);
    Self {
      sender: Arc::new(sender),
    }
  }

  /// Current version.
  pub fn version(&self) -> u64 {
    *self.sender.borrow()
  }

  /// Subscribe to version changes.
  pub fn subscribe(&self) -> watch::Receiver<u64> {
    self.sender.subscribe()
  }

  /// Number of live subscribers.
  pub fn subscriber_count(&self) -> usize {
    self.sender.receiver_count()
  }

  pub(crate) fn bump(&self) {
    self.sender.send_modify(|version| *version += 1);
  }
}

impl Default for InvalidationSignal {
  fn default() -> Self {
    Self::new()
  }
}
