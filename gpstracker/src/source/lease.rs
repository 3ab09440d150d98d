//! Scoped ownership of an activated source.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{BoxFuture, FixSource};

/// Guard representing one activation of a [`FixSource`].
///
/// Created just before `activate` is called and consumed by
/// [`release`](Self::release), which runs `deactivate`. If the guard is
/// dropped without being released (tracker torn down mid-operation, actor
/// task aborted) `deactivate` is spawned on the current runtime, so the
/// positioning resource is never leaked while a runtime exists.
pub struct SourceLease {
    source: Arc<dyn FixSource>,
    epoch: u64,
    released: bool,
}

impl SourceLease {
    pub fn acquire(source: Arc<dyn FixSource>, epoch: u64) -> Self {
        debug!(source = source.name(), epoch, "Source lease acquired");
        Self {
            source,
            epoch,
            released: false,
        }
    }

    /// Activation epoch this lease was issued for.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn source(&self) -> &Arc<dyn FixSource> {
        &self.source
    }

    /// Deactivate the source. The returned future owns everything it needs.
    pub fn release(mut self) -> BoxFuture<'static, ()> {
        self.released = true;
        let source = Arc::clone(&self.source);
        let epoch = self.epoch;
        Box::pin(async move {
            source.deactivate().await;
            debug!(source = source.name(), epoch, "Source lease released");
        })
    }
}

impl Drop for SourceLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let source = Arc::clone(&self.source);
        let epoch = self.epoch;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(
                    source = source.name(),
                    epoch, "Source lease dropped without release, deactivating"
                );
                handle.spawn(async move {
                    source.deactivate().await;
                });
            }
            Err(_) => {
                warn!(
                    source = source.name(),
                    epoch, "Source lease dropped outside a runtime, cannot deactivate"
                );
            }
        }
    }
}

impl std::fmt::Debug for SourceLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceLease")
            .field("source", &self.source.name())
            .field("epoch", &self.epoch)
            .field("released", &self.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ScriptedSource;
    use std::time::Duration;

    #[tokio::test]
    async fn test_release_deactivates_once() {
        let (source, handle) = ScriptedSource::new();
        let source: Arc<dyn FixSource> = Arc::new(source);

        let lease = SourceLease::acquire(Arc::clone(&source), 1);
        lease.release().await;

        assert_eq!(handle.deactivate_calls(), 1);
    }

    #[tokio::test]
    async fn test_drop_without_release_deactivates() {
        let (source, handle) = ScriptedSource::new();
        let source: Arc<dyn FixSource> = Arc::new(source);

        let lease = SourceLease::acquire(source, 1);
        drop(lease);

        // Spawned deactivation runs on the next scheduler turn
        for _ in 0..10 {
            if handle.deactivate_calls() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(handle.deactivate_calls(), 1);
    }
}
