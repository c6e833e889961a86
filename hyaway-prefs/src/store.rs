//! Persisted preference store
//!
//! A `PreferenceStore<P>` holds one settings domain in memory, keeps it
//! durable through a [`StorageBackend`], and notifies key-level listeners.
//!
//! # Commit order
//!
//! A local change (`update`, `set_key`, `reset`) runs, in order:
//! 1. in-memory mutation
//! 2. synchronous notification of listeners whose key changed
//! 3. persistence write (failures logged and counted, never returned)
//! 4. commit hooks, which the synchronizer uses to broadcast
//!
//! All of this happens before the call returns, under a per-store commit
//! lock, so concurrent writers are persisted and broadcast in the same order
//! they were applied in memory. Remote snapshots applied via `apply_remote`
//! take the same lock and run step 1 and 2 only. Listeners and hooks run
//! inside the commit and must not write to the store that invoked them.
//!
//! # Persisted form
//!
//! `{"state": {<key>: <value>, ...}, "version": N}`. On open each persisted
//! key is merged over the defaults independently; a key that fails to decode
//! keeps its default.

use crate::metadata::{PrefMetadata, Preferences};
use crate::storage::StorageBackend;
use hyaway_common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use tracing::{debug, error, warn};
use uuid::Uuid;

type Fields = Map<String, Value>;
type Listener<P> = Arc<dyn Fn(&P) + Send + Sync>;

/// Callback run after a local commit has been persisted
pub type CommitHook = Arc<dyn Fn(&Commit) + Send + Sync>;

/// A committed local change, as handed to commit hooks
#[derive(Debug, Clone)]
pub struct Commit {
    pub store_name: &'static str,
    pub instance_id: Uuid,
    /// Full persisted-shape state after the change
    pub state: Value,
    pub changed: Vec<String>,
}

#[derive(Serialize)]
struct EnvelopeOut<'a> {
    state: &'a Fields,
    version: u32,
}

#[derive(Deserialize)]
struct EnvelopeIn {
    state: Value,
    #[serde(default)]
    version: u32,
}

struct ListenerEntry<P> {
    /// `None` listens to every key
    key: Option<String>,
    callback: Listener<P>,
}

struct ListenerTable<P> {
    next_id: u64,
    entries: HashMap<u64, ListenerEntry<P>>,
}

impl<P> Default for ListenerTable<P> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: HashMap::new(),
        }
    }
}

/// Listener registration handle
///
/// The listener is released when the handle is dropped or `unsubscribe` is
/// called. Keep it alive for as long as the subscriber exists.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// In-memory, persisted settings for one domain
pub struct PreferenceStore<P: Preferences> {
    instance_id: Uuid,
    storage: Arc<dyn StorageBackend>,
    state: RwLock<P>,
    /// Held from mutation through commit hooks so persisted state, listener
    /// order and broadcasts follow memory order across threads
    commit_lock: Mutex<()>,
    listeners: Arc<Mutex<ListenerTable<P>>>,
    hooks: Mutex<Vec<(Uuid, CommitHook)>>,
    write_failures: AtomicU64,
}

impl<P: Preferences> PreferenceStore<P> {
    /// Open the store, rehydrating synchronously from `storage`
    ///
    /// Fails only when `P` does not serialize to a JSON object, which is a
    /// programming error in the record definition. Unreadable or corrupt
    /// persisted state falls back to defaults.
    pub fn open(storage: Arc<dyn StorageBackend>) -> Result<Arc<Self>> {
        let defaults = to_fields(&P::default()).ok_or_else(|| {
            Error::Config(format!(
                "{}: preference record must serialize to a JSON object",
                P::STORE_NAME
            ))
        })?;

        let state = match storage.read(P::STORE_NAME) {
            Ok(Some(raw)) => decode_envelope::<P>(&raw, &defaults),
            Ok(None) => {
                debug!("{}: no persisted state, using defaults", P::STORE_NAME);
                P::default()
            }
            Err(e) => {
                warn!("{}: failed to read persisted state: {}, using defaults", P::STORE_NAME, e);
                P::default()
            }
        };

        Ok(Arc::new(Self {
            instance_id: Uuid::new_v4(),
            storage,
            state: RwLock::new(state),
            commit_lock: Mutex::new(()),
            listeners: Arc::new(Mutex::new(ListenerTable::default())),
            hooks: Mutex::new(Vec::new()),
            write_failures: AtomicU64::new(0),
        }))
    }

    pub fn name(&self) -> &'static str {
        P::STORE_NAME
    }

    /// Identity of this in-memory instance (one per tab)
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Current typed state
    pub fn get(&self) -> P {
        self.state.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Read through a borrow without cloning the record
    pub fn read<R>(&self, f: impl FnOnce(&P) -> R) -> R {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Current value of one key, `None` for unknown keys
    pub fn get_key(&self, key: &str) -> Option<Value> {
        self.read(|p| to_fields(p).and_then(|mut fields| fields.remove(key)))
    }

    /// Persisted-shape state (a JSON object)
    pub fn snapshot(&self) -> Value {
        Value::Object(self.read(|p| to_fields(p).unwrap_or_default()))
    }

    /// Apply a batched typed mutation
    ///
    /// One call is one logical set: a single persistence write and a single
    /// commit hook run. Returns the keys whose value changed.
    pub fn update(&self, f: impl FnOnce(&mut P)) -> Vec<String> {
        self.commit(|p| {
            f(p);
            Ok(())
        })
        .unwrap_or_default()
    }

    /// Set one key from its wire value
    ///
    /// Rejects unknown keys and values of the wrong wire type. Numeric bounds
    /// are not checked here; see [`Self::set_key_checked`].
    pub fn set_key(&self, key: &str, value: Value) -> Result<()> {
        self.commit(|p| {
            let mut fields = to_fields(p).unwrap_or_default();
            if !fields.contains_key(key) {
                return Err(Error::InvalidInput(format!(
                    "{}: unknown key '{}'",
                    P::STORE_NAME,
                    key
                )));
            }
            fields.insert(key.to_string(), value);
            *p = serde_json::from_value(Value::Object(fields))
                .map_err(|e| Error::InvalidInput(format!("{}: {}", key, e)))?;
            Ok(())
        })
        .map(|_| ())
    }

    /// Set one key after validating it against its metadata bounds
    pub fn set_key_checked(&self, key: &str, value: Value) -> Result<()> {
        let meta = P::describe(key).ok_or_else(|| {
            Error::InvalidInput(format!("{}: unknown key '{}'", P::STORE_NAME, key))
        })?;
        meta.validate(&value).map_err(Error::InvalidInput)?;
        self.set_key(key, value)
    }

    /// Restore every key to its compiled-in default
    pub fn reset(&self) -> Vec<String> {
        self.update(|p| *p = P::default())
    }

    /// Replace state wholesale with a snapshot from another instance
    ///
    /// Notifies listeners of changed keys but neither persists nor runs
    /// commit hooks. Replaying the same snapshot is a no-op. A payload that
    /// is not a JSON object is ignored.
    pub fn apply_remote(&self, state: &Value) -> Vec<String> {
        let Some(remote) = state.as_object() else {
            warn!("{}: ignoring non-object remote state", P::STORE_NAME);
            return Vec::new();
        };
        let Some(defaults) = to_fields(&P::default()) else {
            return Vec::new();
        };
        let incoming: P = merge_over_defaults(remote, &defaults);

        let _commit = lock(&self.commit_lock);
        let (changed, after) = {
            let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let before = to_fields(&*guard).unwrap_or_default();
            *guard = incoming;
            let after = to_fields(&*guard).unwrap_or_default();
            (changed_keys(&before, &after), guard.clone())
        };

        if !changed.is_empty() {
            debug!("{}: applied remote state, changed {:?}", P::STORE_NAME, changed);
            self.notify(&changed, &after);
        }
        changed
    }

    /// Listen for changes to one key
    ///
    /// The callback runs inside the commit; writing to this store from it
    /// deadlocks.
    pub fn subscribe(
        &self,
        key: &str,
        callback: impl Fn(&P) + Send + Sync + 'static,
    ) -> Result<Subscription> {
        let known = to_fields(&P::default())
            .map(|fields| fields.contains_key(key))
            .unwrap_or(false);
        if !known {
            return Err(Error::InvalidInput(format!(
                "{}: cannot subscribe to unknown key '{}'",
                P::STORE_NAME,
                key
            )));
        }
        Ok(self.add_listener(Some(key.to_string()), Arc::new(callback)))
    }

    /// Listen for any change to the record
    pub fn subscribe_all(&self, callback: impl Fn(&P) + Send + Sync + 'static) -> Subscription {
        self.add_listener(None, Arc::new(callback))
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).entries.len()
    }

    /// Register a hook run after each local commit
    ///
    /// Returns `false` without registering if `owner` already has a hook.
    pub fn add_commit_hook(&self, owner: Uuid, hook: CommitHook) -> bool {
        let mut hooks = lock(&self.hooks);
        if hooks.iter().any(|(id, _)| *id == owner) {
            return false;
        }
        hooks.push((owner, hook));
        true
    }

    /// Number of persistence writes that failed since open
    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    fn add_listener(&self, key: Option<String>, callback: Listener<P>) -> Subscription {
        let id = {
            let mut table = lock(&self.listeners);
            let id = table.next_id;
            table.next_id += 1;
            table.entries.insert(id, ListenerEntry { key, callback });
            id
        };

        let table: Weak<Mutex<ListenerTable<P>>> = Arc::downgrade(&self.listeners);
        Subscription {
            release: Some(Box::new(move || {
                if let Some(table) = table.upgrade() {
                    lock(&table).entries.remove(&id);
                }
            })),
        }
    }

    fn commit(&self, mutate: impl FnOnce(&mut P) -> Result<()>) -> Result<Vec<String>> {
        let _commit = lock(&self.commit_lock);
        let (changed, after, fields) = {
            let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let before = to_fields(&*guard).unwrap_or_default();
            let mut next = guard.clone();
            mutate(&mut next)?;
            *guard = next;
            let fields = to_fields(&*guard).unwrap_or_default();
            (changed_keys(&before, &fields), guard.clone(), fields)
        };

        if !changed.is_empty() {
            self.notify(&changed, &after);
        }
        self.persist(&fields);

        let commit = Commit {
            store_name: P::STORE_NAME,
            instance_id: self.instance_id,
            state: Value::Object(fields),
            changed: changed.clone(),
        };
        let hooks: Vec<CommitHook> = lock(&self.hooks).iter().map(|(_, h)| h.clone()).collect();
        for hook in hooks {
            hook(&commit);
        }

        Ok(changed)
    }

    fn notify(&self, changed: &[String], state: &P) {
        let callbacks: Vec<Listener<P>> = lock(&self.listeners)
            .entries
            .values()
            .filter(|entry| match &entry.key {
                Some(key) => changed.iter().any(|c| c == key),
                None => true,
            })
            .map(|entry| entry.callback.clone())
            .collect();

        for callback in callbacks {
            callback(state);
        }
    }

    fn persist(&self, fields: &Fields) {
        let envelope = EnvelopeOut {
            state: fields,
            version: P::VERSION,
        };
        let result = serde_json::to_string(&envelope)
            .map_err(Error::from)
            .and_then(|raw| self.storage.write(P::STORE_NAME, &raw));

        if let Err(e) = result {
            self.write_failures.fetch_add(1, Ordering::Relaxed);
            let failure = Error::PersistenceWrite {
                key: P::STORE_NAME.to_string(),
                reason: e.to_string(),
            };
            warn!("{}; keeping in-memory state", failure);
        }
    }
}

impl<P: Preferences> std::fmt::Debug for PreferenceStore<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferenceStore")
            .field("name", &P::STORE_NAME)
            .field("instance_id", &self.instance_id)
            .field("state", &self.get())
            .finish()
    }
}

/// Type-erased store surface used by the synchronizer, registry and CLI
pub trait DynStore: Send + Sync {
    fn name(&self) -> &'static str;
    fn instance_id(&self) -> Uuid;
    fn metadata(&self) -> &'static [PrefMetadata];
    fn snapshot(&self) -> Value;
    fn get_key(&self, key: &str) -> Option<Value>;
    fn set_key(&self, key: &str, value: Value) -> Result<()>;
    fn set_key_checked(&self, key: &str, value: Value) -> Result<()>;
    fn reset(&self) -> Vec<String>;
    fn apply_remote(&self, state: &Value) -> Vec<String>;
    fn add_commit_hook(&self, owner: Uuid, hook: CommitHook) -> bool;
}

impl<P: Preferences> DynStore for PreferenceStore<P> {
    fn name(&self) -> &'static str {
        P::STORE_NAME
    }

    fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    fn metadata(&self) -> &'static [PrefMetadata] {
        P::metadata()
    }

    fn snapshot(&self) -> Value {
        PreferenceStore::snapshot(self)
    }

    fn get_key(&self, key: &str) -> Option<Value> {
        PreferenceStore::get_key(self, key)
    }

    fn set_key(&self, key: &str, value: Value) -> Result<()> {
        PreferenceStore::set_key(self, key, value)
    }

    fn set_key_checked(&self, key: &str, value: Value) -> Result<()> {
        PreferenceStore::set_key_checked(self, key, value)
    }

    fn reset(&self) -> Vec<String> {
        PreferenceStore::reset(self)
    }

    fn apply_remote(&self, state: &Value) -> Vec<String> {
        PreferenceStore::apply_remote(self, state)
    }

    fn add_commit_hook(&self, owner: Uuid, hook: CommitHook) -> bool {
        PreferenceStore::add_commit_hook(self, owner, hook)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn to_fields<P: Serialize>(record: &P) -> Option<Fields> {
    match serde_json::to_value(record) {
        Ok(Value::Object(fields)) => Some(fields),
        Ok(other) => {
            error!("preference record serialized to non-object: {}", other);
            None
        }
        Err(e) => {
            error!("preference record failed to serialize: {}", e);
            None
        }
    }
}

fn changed_keys(before: &Fields, after: &Fields) -> Vec<String> {
    after
        .iter()
        .filter(|(key, value)| before.get(key.as_str()) != Some(value))
        .map(|(key, _)| key.clone())
        .collect()
}

fn decode_envelope<P: Preferences>(raw: &str, defaults: &Fields) -> P {
    let envelope: EnvelopeIn = match serde_json::from_str(raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            let corrupt = Error::PersistenceReadCorrupt {
                key: P::STORE_NAME.to_string(),
                reason: e.to_string(),
            };
            warn!("{}, using defaults", corrupt);
            return P::default();
        }
    };

    if envelope.version != P::VERSION {
        warn!(
            "{}: persisted version {} does not match {}, using defaults",
            P::STORE_NAME,
            envelope.version,
            P::VERSION
        );
        return P::default();
    }

    match envelope.state.as_object() {
        Some(persisted) => merge_over_defaults(persisted, defaults),
        None => {
            warn!("{}: persisted state is not an object, using defaults", P::STORE_NAME);
            P::default()
        }
    }
}

/// Overlay each persisted key on the defaults, keeping the default for any
/// key whose value does not decode
fn merge_over_defaults<P: Preferences>(persisted: &Fields, defaults: &Fields) -> P {
    let mut merged = defaults.clone();

    for (key, value) in persisted {
        if !defaults.contains_key(key) {
            debug!("{}: dropping unknown persisted key '{}'", P::STORE_NAME, key);
            continue;
        }

        let mut candidate = merged.clone();
        candidate.insert(key.clone(), value.clone());
        match serde_json::from_value::<P>(Value::Object(candidate.clone())) {
            Ok(_) => merged = candidate,
            Err(e) => warn!(
                "{}: persisted value for '{}' is invalid ({}), using default",
                P::STORE_NAME,
                key,
                e
            ),
        }
    }

    serde_json::from_value(Value::Object(merged)).unwrap_or_default()
}
