//! hyaway-prefs - client preference store with cross-tab synchronization
//!
//! - [`store::PreferenceStore`]: typed, persisted settings per domain with
//!   key-level subscriptions
//! - [`sync::Synchronizer`]: propagates full-state snapshots between tabs
//! - [`registry::PreferenceRegistry`]: one store per domain, owned by the host
//! - [`domains`]: the built-in hyAway settings records

pub mod domains;
pub mod metadata;
pub mod registry;
pub mod storage;
pub mod store;
pub mod sync;

pub use metadata::{PrefKind, PrefMetadata, Preferences};
pub use registry::PreferenceRegistry;
pub use storage::{FileStorage, MemoryStorage, StorageBackend};
pub use store::{DynStore, PreferenceStore, Subscription};
pub use sync::{BroadcastTransport, LocalBroadcast, SyncMessage, Synchronizer, UnavailableBroadcast};
