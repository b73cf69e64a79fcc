use crate::{
    context::{ContextError, ContextProperty},
    event::{Event, EventSink},
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tracing::{debug, warn};

#[derive(Debug)]
struct Countdown {
    remaining: AtomicUsize,
    sink: EventSink,
    synced: Event,
}

impl Countdown {
    /// Returns true for the call that brought the count to zero.
    fn release(&self) -> bool {
        self.remaining.fetch_sub(1, Ordering::AcqRel) == 1
    }
}

/// Countdown barrier over the property writes of one activation attempt.
///
/// The issuer holds one slot of its own until [`Self::finish_issuing`], so writes
/// completing while others are still being issued can't release the barrier
/// early. Once issuing is done the last completed write posts the `synced` event.
#[derive(Debug)]
pub(crate) struct PendingPropertySync {
    countdown: Arc<Countdown>,
}

impl PendingPropertySync {
    pub fn new(sink: EventSink, synced: Event) -> Self {
        Self {
            countdown: Arc::new(Countdown {
                remaining: AtomicUsize::new(1),
                sink,
                synced,
            }),
        }
    }

    pub fn write(&self, property: ContextProperty) -> PropertyWrite {
        self.countdown.remaining.fetch_add(1, Ordering::AcqRel);

        PropertyWrite {
            property,
            countdown: Some(Arc::clone(&self.countdown)),
        }
    }

    /// Number of writes not completed yet.
    pub fn pending(&self) -> usize {
        self.countdown.remaining.load(Ordering::Acquire) - 1
    }

    /// Gives up the issuer's slot. Returns true when no write is outstanding,
    /// in which case no `synced` event is posted and the caller proceeds itself.
    pub fn finish_issuing(self) -> bool {
        self.countdown.release()
    }
}

/// Completion handle of one async property write.
///
/// Dropping it without calling [`Self::complete`] counts as a failed write.
#[must_use]
#[derive(Debug)]
pub struct PropertyWrite {
    property: ContextProperty,
    countdown: Option<Arc<Countdown>>,
}

impl PropertyWrite {
    pub fn property(&self) -> ContextProperty {
        self.property
    }

    pub fn complete(mut self, result: Result<(), ContextError>) {
        self.finish(result);
    }

    fn finish(&mut self, result: Result<(), ContextError>) {
        let Some(countdown) = self.countdown.take() else {
            return;
        };

        match result {
            Ok(()) => debug!("context property '{}' set", self.property),
            Err(e) => warn!("unable to set context property '{}': {e}", self.property),
        }

        if countdown.release() {
            countdown.sink.post(countdown.synced.clone());
        }
    }
}

impl Drop for PropertyWrite {
    fn drop(&mut self) {
        self.finish(Err(ContextError::new("write abandoned before completion")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{event::ContextKey, link::RequestId};
    use test_log::test;

    fn setup() -> (PendingPropertySync, flume::Receiver<Event>) {
        let (tx, rx) = flume::unbounded();
        let synced = Event::PropertiesSynced {
            key: ContextKey {
                modem: "/ril_0".into(),
                context: "1".into(),
            },
            request: RequestId(7),
            attempt: 3,
        };

        (PendingPropertySync::new(EventSink::new(tx), synced), rx)
    }

    #[test]
    fn it_proceeds_inline_without_writes() {
        // Arrange
        let (sync, rx) = setup();

        // Act
        let proceed = sync.finish_issuing();

        // Assert
        assert!(proceed);
        assert!(rx.is_empty());
    }

    #[test]
    fn it_posts_synced_after_last_completion() {
        // Arrange
        let (sync, rx) = setup();
        let apn = sync.write(ContextProperty::AccessPointName);
        let user = sync.write(ContextProperty::Username);
        assert_eq!(sync.pending(), 2);

        // Act
        assert!(!sync.finish_issuing());
        user.complete(Err(ContextError::unknown()));

        // Assert
        assert!(rx.is_empty());

        // Act
        apn.complete(Ok(()));

        // Assert
        let event = rx.try_recv().unwrap();
        assert!(matches!(
            event,
            Event::PropertiesSynced {
                request: RequestId(7),
                attempt: 3,
                ..
            }
        ));
        assert!(rx.is_empty());
    }

    #[test]
    fn it_does_not_release_while_issuing() {
        // Arrange
        let (sync, rx) = setup();

        // Act
        sync.write(ContextProperty::Password).complete(Ok(()));

        // Assert
        assert!(rx.is_empty());
        assert!(sync.finish_issuing());
        assert!(rx.is_empty());
    }

    #[test]
    fn it_counts_dropped_writes_as_completed() {
        // Arrange
        let (sync, rx) = setup();
        let write = sync.write(ContextProperty::Username);
        assert!(!sync.finish_issuing());

        // Act
        drop(write);

        // Assert
        assert_eq!(rx.len(), 1);
    }
}
