//! Cross-tab synchronization of preference stores
//!
//! Every local commit is published as a full-state [`SyncMessage`]. Other
//! instances of the same store (other tabs) replace their state wholesale
//! with the payload. Because messages are full snapshots rather than deltas,
//! a tab that missed intermediate messages still converges on the next one
//! it sees.
//!
//! Conflict policy is last-write-wins: each tab ends up with whichever
//! snapshot it observed last. Concurrent writers in two tabs may briefly
//! disagree; there is no merge.

use crate::store::{Commit, CommitHook, DynStore};
use chrono::{DateTime, Utc};
use hyaway_common::config::TomlConfig;
use hyaway_common::{time, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One full-state update for a store, as sent between tabs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMessage {
    /// Target store name (topic)
    pub store: String,
    /// Store instance that made the change
    pub origin: Uuid,
    /// Persisted-shape state of the store after the change
    pub state: Value,
    /// Diagnostics only; never used for ordering
    pub sent_at: DateTime<Utc>,
}

impl SyncMessage {
    pub fn from_commit(commit: &Commit) -> Self {
        Self {
            store: commit.store_name.to_string(),
            origin: commit.instance_id,
            state: commit.state.clone(),
            sent_at: time::now(),
        }
    }
}

/// Publish/subscribe channel shared by all tabs of one profile
///
/// Delivery is at-most-once with no cross-publisher ordering.
pub trait BroadcastTransport: Send + Sync {
    fn publish(&self, message: SyncMessage) -> Result<()>;

    /// Receive every message published after this call
    fn subscribe(&self) -> Result<broadcast::Receiver<SyncMessage>>;
}

/// In-process transport backed by `tokio::sync::broadcast`
///
/// Clones share one channel. Slow receivers lag rather than block
/// publishers; since messages are full snapshots, skipping ahead is safe.
#[derive(Clone)]
pub struct LocalBroadcast {
    tx: broadcast::Sender<SyncMessage>,
    capacity: usize,
}

impl LocalBroadcast {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Channel sized by `broadcast_capacity` in `config.toml`
    pub fn from_config(config: &TomlConfig) -> Self {
        Self::new(config.broadcast_capacity())
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl BroadcastTransport for LocalBroadcast {
    fn publish(&self, message: SyncMessage) -> Result<()> {
        // No receivers just means no other tab is open
        if self.tx.send(message).is_err() {
            debug!("Broadcast published with no subscribers");
        }
        Ok(())
    }

    fn subscribe(&self) -> Result<broadcast::Receiver<SyncMessage>> {
        Ok(self.tx.subscribe())
    }
}

/// Transport for environments where cross-tab messaging is blocked
#[derive(Debug, Clone, Default)]
pub struct UnavailableBroadcast;

impl BroadcastTransport for UnavailableBroadcast {
    fn publish(&self, _message: SyncMessage) -> Result<()> {
        Err(Error::BroadcastUnavailable("transport disabled".to_string()))
    }

    fn subscribe(&self) -> Result<broadcast::Receiver<SyncMessage>> {
        Err(Error::BroadcastUnavailable("transport disabled".to_string()))
    }
}

/// Keeps attached stores in step with their counterparts in other tabs
///
/// Attaching is explicit and separate from opening a store. Inbound messages
/// are delivered either by calling [`Synchronizer::pump`] from the event loop
/// or by spawning [`Synchronizer::run`] on a tokio runtime.
pub struct Synchronizer {
    id: Uuid,
    transport: Arc<dyn BroadcastTransport>,
    receiver: Mutex<Option<broadcast::Receiver<SyncMessage>>>,
    attached: Mutex<Vec<Arc<dyn DynStore>>>,
    degraded: bool,
    shutdown_tx: watch::Sender<bool>,
}

impl Synchronizer {
    /// Subscribe to `transport`
    ///
    /// If the transport refuses the subscription, the synchronizer runs
    /// degraded: stores keep working as single-tab stores and no error is
    /// returned.
    pub fn new(transport: Arc<dyn BroadcastTransport>) -> Arc<Self> {
        let (receiver, degraded) = match transport.subscribe() {
            Ok(rx) => (Some(rx), false),
            Err(e) => {
                warn!("{}; cross-tab sync disabled for this session", e);
                (None, true)
            }
        };

        Arc::new(Self {
            id: Uuid::new_v4(),
            transport,
            receiver: Mutex::new(receiver),
            attached: Mutex::new(Vec::new()),
            degraded,
            shutdown_tx: watch::channel(false).0,
        })
    }

    /// True when the transport was unavailable at construction
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Register a store for propagation
    ///
    /// Idempotent per store instance: attaching twice neither double-publishes
    /// nor double-delivers.
    pub fn attach(&self, store: Arc<dyn DynStore>) {
        {
            let mut attached = lock(&self.attached);
            if attached
                .iter()
                .any(|s| s.instance_id() == store.instance_id())
            {
                debug!("{} already attached", store.name());
                return;
            }
            attached.push(store.clone());
        }

        if self.degraded {
            debug!("{} attached in single-tab mode", store.name());
            return;
        }

        let transport = self.transport.clone();
        let hook: CommitHook = Arc::new(move |commit: &Commit| {
            if let Err(e) = transport.publish(SyncMessage::from_commit(commit)) {
                warn!("{}: broadcast failed: {}", commit.store_name, e);
            }
        });
        store.add_commit_hook(self.id, hook);
        debug!("{} attached for cross-tab sync", store.name());
    }

    /// Number of attached store instances
    pub fn attached_count(&self) -> usize {
        lock(&self.attached).len()
    }

    /// Deliver every message already waiting, without blocking
    ///
    /// Returns the number of messages that changed at least one attached
    /// store. Does nothing once [`Synchronizer::run`] has taken the receiver.
    pub fn pump(&self) -> usize {
        let mut guard = lock(&self.receiver);
        let Some(rx) = guard.as_mut() else {
            return 0;
        };

        let mut applied = 0;
        loop {
            match rx.try_recv() {
                Ok(message) => {
                    if self.deliver(&message) {
                        applied += 1;
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => break,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    debug!("Sync receiver lagged, skipped {} messages", skipped);
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    debug!("Sync transport closed");
                    break;
                }
            }
        }
        applied
    }

    /// Deliver messages as they arrive until [`Synchronizer::shutdown`] is
    /// called or the transport closes
    ///
    /// The synchronizer holds its own transport handle, so with
    /// [`LocalBroadcast`] the channel never closes underneath it; call
    /// `shutdown` to end the loop.
    pub async fn run(self: Arc<Self>) {
        let receiver = lock(&self.receiver).take();
        let Some(mut rx) = receiver else {
            return;
        };
        let mut stop = self.shutdown_tx.subscribe();

        info!("Cross-tab sync loop started");
        while !*stop.borrow_and_update() {
            tokio::select! {
                received = rx.recv() => match received {
                    Ok(message) => {
                        self.deliver(&message);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Sync receiver lagged, skipped {} messages", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = stop.changed() => {}
            }
        }
        info!("Cross-tab sync loop stopped");
    }

    /// Ask a running [`Synchronizer::run`] loop to return
    ///
    /// Also stops a loop that has not started yet. Messages still queued are
    /// left undelivered.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Apply one message to every attached instance of its store, except the
    /// instance that sent it. Returns whether any state changed.
    pub fn deliver(&self, message: &SyncMessage) -> bool {
        let targets: Vec<Arc<dyn DynStore>> = lock(&self.attached)
            .iter()
            .filter(|s| s.name() == message.store && s.instance_id() != message.origin)
            .cloned()
            .collect();

        if targets.is_empty() {
            return false;
        }

        let mut changed_any = false;
        for store in targets {
            let changed = store.apply_remote(&message.state);
            if !changed.is_empty() {
                debug!(
                    "{}: synced {:?} from {} ({} ms in flight)",
                    message.store,
                    changed,
                    message.origin,
                    time::elapsed_ms(message.sent_at)
                );
                changed_any = true;
            }
        }
        changed_any
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
