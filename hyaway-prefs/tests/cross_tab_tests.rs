//! Cross-tab convergence tests
//!
//! A "tab" is a `PreferenceRegistry` (or single store) opened on a clone of a
//! shared `MemoryStorage`, with its own `Synchronizer` on a shared
//! `LocalBroadcast`.

use hyaway_prefs::domains::{
    GalleryLayout, GallerySettings, RecentFilesSettings, TagSortMode, TagsSettings,
};
use hyaway_prefs::{
    BroadcastTransport, LocalBroadcast, MemoryStorage, PreferenceRegistry, PreferenceStore,
    Synchronizer, UnavailableBroadcast,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Tab {
    registry: PreferenceRegistry,
    sync: Arc<Synchronizer>,
}

fn open_tab(storage: &MemoryStorage, bus: &LocalBroadcast) -> Tab {
    let registry = PreferenceRegistry::with_defaults(Arc::new(storage.clone())).unwrap();
    let sync = Synchronizer::new(Arc::new(bus.clone()));
    registry.attach_all(&sync);
    Tab { registry, sync }
}

#[test]
fn test_set_in_one_tab_converges_in_other() {
    let storage = MemoryStorage::new();
    let bus = LocalBroadcast::new(16);
    let a = open_tab(&storage, &bus);
    let b = open_tab(&storage, &bus);

    let recent_a = a.registry.store::<RecentFilesSettings>().unwrap();
    let recent_b = b.registry.store::<RecentFilesSettings>().unwrap();

    recent_a.set_key("limit", json!(500)).unwrap();
    let writes_after_set = storage.write_count();
    assert_eq!(recent_b.read(|p| p.limit), 100);

    assert_eq!(b.sync.pump(), 1);
    assert_eq!(recent_b.read(|p| p.limit), 500);

    // Tab A sees only its own message and ignores it
    assert_eq!(a.sync.pump(), 0);

    // B applied the snapshot without writing or re-broadcasting
    assert_eq!(storage.write_count(), writes_after_set);
    assert_eq!(a.sync.pump(), 0);
}

#[test]
fn test_two_instances_on_one_synchronizer() {
    let storage = MemoryStorage::new();
    let bus = LocalBroadcast::new(16);
    let sync = Synchronizer::new(Arc::new(bus));

    let first = PreferenceStore::<TagsSettings>::open(Arc::new(storage.clone())).unwrap();
    let second = PreferenceStore::<TagsSettings>::open(Arc::new(storage.clone())).unwrap();
    sync.attach(first.clone());
    sync.attach(second.clone());

    first.update(|p| p.sort_mode = TagSortMode::Namespace);
    assert_eq!(sync.pump(), 1);

    assert_eq!(second.read(|p| p.sort_mode), TagSortMode::Namespace);
    assert_eq!(storage.write_count(), 1);
}

#[test]
fn test_double_attach_does_not_double_publish() {
    let bus = LocalBroadcast::new(16);
    let mut observer = bus.subscribe().unwrap();
    let sync = Synchronizer::new(Arc::new(bus.clone()));

    let store = PreferenceStore::<TagsSettings>::open(Arc::new(MemoryStorage::new())).unwrap();
    sync.attach(store.clone());
    sync.attach(store.clone());
    assert_eq!(sync.attached_count(), 1);

    store.update(|p| p.show_namespace_separator = false);

    assert!(observer.try_recv().is_ok());
    assert!(observer.try_recv().is_err());
}

#[test]
fn test_replayed_message_is_idempotent() {
    let storage = MemoryStorage::new();
    let bus = LocalBroadcast::new(16);
    let mut observer = bus.subscribe().unwrap();
    let a = open_tab(&storage, &bus);
    let b = open_tab(&storage, &bus);

    let gallery_b = b.registry.store::<GallerySettings>().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = hits.clone();
    let _sub = gallery_b
        .subscribe("layout", move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    a.registry
        .store::<GallerySettings>()
        .unwrap()
        .update(|p| p.layout = GalleryLayout::Grid);
    b.sync.pump();

    let message = observer.try_recv().unwrap();
    assert!(!b.sync.deliver(&message));

    assert_eq!(gallery_b.read(|p| p.layout), GalleryLayout::Grid);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_lagging_tab_converges_to_latest_snapshot() {
    let storage = MemoryStorage::new();
    let bus = LocalBroadcast::new(2);
    let a = open_tab(&storage, &bus);
    let b = open_tab(&storage, &bus);

    let recent_a = a.registry.store::<RecentFilesSettings>().unwrap();
    for limit in 1..=10 {
        recent_a.update(|p| p.limit = limit);
    }

    // B was "asleep"; older messages were overwritten in the channel
    b.sync.pump();
    let recent_b = b.registry.store::<RecentFilesSettings>().unwrap();
    assert_eq!(recent_b.read(|p| p.limit), 10);
}

#[test]
fn test_last_write_wins() {
    let storage = MemoryStorage::new();
    let bus = LocalBroadcast::new(16);
    let a = open_tab(&storage, &bus);
    let b = open_tab(&storage, &bus);

    let recent_a = a.registry.store::<RecentFilesSettings>().unwrap();
    let recent_b = b.registry.store::<RecentFilesSettings>().unwrap();

    // Concurrent writes before either tab pumps
    recent_a.update(|p| p.days = 7);
    recent_b.update(|p| p.days = 14);

    a.sync.pump();
    b.sync.pump();

    // Each tab holds the other's write: the last one it observed
    assert_eq!(recent_a.read(|p| p.days), 14);
    assert_eq!(recent_b.read(|p| p.days), 7);
}

#[test]
fn test_reset_propagates() {
    let storage = MemoryStorage::new();
    let bus = LocalBroadcast::new(16);
    let a = open_tab(&storage, &bus);
    let b = open_tab(&storage, &bus);

    let recent_a = a.registry.store::<RecentFilesSettings>().unwrap();
    recent_a.update(|p| p.limit = 9);
    b.sync.pump();

    recent_a.reset();
    b.sync.pump();

    let recent_b = b.registry.store::<RecentFilesSettings>().unwrap();
    assert_eq!(recent_b.get(), RecentFilesSettings::default());

    // Fresh tab after reset (simulated reload) also sees defaults
    let c = open_tab(&storage, &bus);
    assert_eq!(
        c.registry.store::<RecentFilesSettings>().unwrap().get(),
        RecentFilesSettings::default()
    );
}

#[test]
fn test_unavailable_transport_degrades_to_single_tab() {
    let storage = MemoryStorage::new();
    let registry = PreferenceRegistry::with_defaults(Arc::new(storage.clone())).unwrap();
    let sync = Synchronizer::new(Arc::new(UnavailableBroadcast));
    registry.attach_all(&sync);

    assert!(sync.is_degraded());

    let tags = registry.store::<TagsSettings>().unwrap();
    tags.set_key("sort_mode", json!("namespace")).unwrap();
    assert_eq!(tags.read(|p| p.sort_mode), TagSortMode::Namespace);
    assert_eq!(storage.write_count(), 1);
    assert_eq!(sync.pump(), 0);
}

#[tokio::test]
async fn test_run_loop_delivers_in_background() {
    let storage = MemoryStorage::new();
    let bus = LocalBroadcast::new(16);
    let a = open_tab(&storage, &bus);
    let b = open_tab(&storage, &bus);

    let handle = tokio::spawn(b.sync.clone().run());

    a.registry
        .store::<TagsSettings>()
        .unwrap()
        .update(|p| p.sort_mode = TagSortMode::Namespace);

    let tags_b = b.registry.store::<TagsSettings>().unwrap();
    let mut converged = false;
    for _ in 0..100 {
        if tags_b.read(|p| p.sort_mode) == TagSortMode::Namespace {
            converged = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(converged, "tab B never observed tab A's write");

    // run() owns the receiver now
    assert_eq!(b.sync.pump(), 0);
    b.sync.shutdown();
    handle.await.unwrap();
}
