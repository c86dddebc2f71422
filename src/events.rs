use tokio::sync::broadcast;

/// Lifecycle and mutation notifications the repository core raises as it
/// works (§4.F). Delivered best-effort: a lagging subscriber drops the
/// oldest unread events rather than block the repository, mirroring
/// `tokio::sync::broadcast`'s own backpressure model.
#[derive(Debug, Clone)]
pub enum RepoEvent {
    /// Raised once `initialize()` completes and the `$Repository` record
    /// exists, whether it was just created or already present.
    DidInitialize,
    /// Raised once, the first time the `$Repository` record is created.
    DidCreate,
    WillDestroy,
    DidDestroy,
    UpgradeDidStart { from: u32, to: u32 },
    UpgradeDidStop { from: u32, to: u32 },
    /// Forwarded verbatim from a collection's own migration step, if any,
    /// run as part of `upgrade_repository`.
    MigrationDidStart { class_name: &'static str },
    MigrationDidStop { class_name: &'static str },
    DidPutItem { class_name: String, persist_id: String },
    DidDeleteItem { class_name: String, persist_id: String },
}

const CHANNEL_CAPACITY: usize = 256;

/// Thin wrapper around a broadcast channel so `RepositoryHandle` can be
/// cheaply cloned while every clone publishes to, and can subscribe from,
/// the same stream of events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RepoEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RepoEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event. Silently ignored if nobody is listening.
    pub fn publish(&self, event: RepoEvent) {
        let _ = self.sender.send(event);
    }
}
