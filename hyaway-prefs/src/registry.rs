//! Application-owned registry of preference stores
//!
//! The host builds one registry at startup and passes it (or the stores it
//! hands out) to whatever needs settings. There is exactly one store per
//! domain per registry, and no global state.

use crate::domains::{
    GallerySettings, RandomInboxSettings, RecentFilesSettings, ReviewSettings, TagsSettings,
    UxSettings,
};
use crate::metadata::Preferences;
use crate::storage::StorageBackend;
use crate::store::{DynStore, PreferenceStore};
use crate::sync::Synchronizer;
use hyaway_common::{Error, Result};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

struct Entry {
    dynamic: Arc<dyn DynStore>,
    typed: Arc<dyn Any + Send + Sync>,
}

pub struct PreferenceRegistry {
    storage: Arc<dyn StorageBackend>,
    stores: BTreeMap<&'static str, Entry>,
}

impl PreferenceRegistry {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            stores: BTreeMap::new(),
        }
    }

    /// Registry with every built-in hyAway settings domain
    pub fn with_defaults(storage: Arc<dyn StorageBackend>) -> Result<Self> {
        let mut registry = Self::new(storage);
        registry.register::<RecentFilesSettings>()?;
        registry.register::<TagsSettings>()?;
        registry.register::<RandomInboxSettings>()?;
        registry.register::<GallerySettings>()?;
        registry.register::<ReviewSettings>()?;
        registry.register::<UxSettings>()?;
        info!("Registered {} preference stores", registry.stores.len());
        Ok(registry)
    }

    /// Open and record the store for `P`
    ///
    /// Store names share one persistence namespace, so a second registration
    /// under an existing name is rejected instead of silently sharing data.
    pub fn register<P: Preferences>(&mut self) -> Result<Arc<PreferenceStore<P>>> {
        if self.stores.contains_key(P::STORE_NAME) {
            return Err(Error::Config(format!(
                "preference store '{}' is already registered",
                P::STORE_NAME
            )));
        }

        let store = PreferenceStore::<P>::open(self.storage.clone())?;
        self.stores.insert(
            P::STORE_NAME,
            Entry {
                dynamic: store.clone(),
                typed: store.clone(),
            },
        );
        Ok(store)
    }

    /// Typed lookup
    pub fn store<P: Preferences>(&self) -> Option<Arc<PreferenceStore<P>>> {
        self.stores
            .get(P::STORE_NAME)
            .and_then(|entry| entry.typed.clone().downcast::<PreferenceStore<P>>().ok())
    }

    /// Type-erased lookup by store name
    pub fn by_name(&self, name: &str) -> Result<Arc<dyn DynStore>> {
        self.stores
            .get(name)
            .map(|entry| entry.dynamic.clone())
            .ok_or_else(|| Error::NotFound(format!("preference store '{}'", name)))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stores.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    pub fn attach_all(&self, sync: &Synchronizer) {
        for entry in self.stores.values() {
            sync.attach(entry.dynamic.clone());
        }
    }

    pub fn reset_all(&self) {
        for entry in self.stores.values() {
            entry.dynamic.reset();
        }
    }
}
