//! File-backed persistence tests
//!
//! Each `PreferenceRegistry::with_defaults` call simulates a page load.

use hyaway_prefs::domains::{GalleryLayout, GallerySettings, ReviewSettings, Theme, UxSettings};
use hyaway_prefs::{FileStorage, PreferenceRegistry, StorageBackend};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn load(dir: &TempDir) -> PreferenceRegistry {
    PreferenceRegistry::with_defaults(Arc::new(FileStorage::new(dir.path()))).unwrap()
}

#[test]
fn test_values_survive_reload() {
    let dir = TempDir::new().unwrap();

    {
        let registry = load(&dir);
        let gallery = registry.store::<GallerySettings>().unwrap();
        gallery.update(|p| {
            p.layout = GalleryLayout::Justified;
            p.base_width = 320;
        });
        registry
            .by_name("hyaway-ux-settings")
            .unwrap()
            .set_key("theme", json!("dark"))
            .unwrap();
    }

    let registry = load(&dir);
    let gallery = registry.store::<GallerySettings>().unwrap().get();
    assert_eq!(gallery.layout, GalleryLayout::Justified);
    assert_eq!(gallery.base_width, 320);
    assert_eq!(gallery.max_columns, GallerySettings::default().max_columns);
    assert_eq!(registry.store::<UxSettings>().unwrap().read(|p| p.theme), Theme::Dark);
}

#[test]
fn test_only_touched_stores_are_written() {
    let dir = TempDir::new().unwrap();
    let registry = load(&dir);

    registry
        .store::<ReviewSettings>()
        .unwrap()
        .update(|p| p.swipe_threshold = 200);

    assert!(dir.path().join("hyaway-review-settings.json").exists());
    assert!(!dir.path().join("hyaway-gallery-settings.json").exists());
}

#[test]
fn test_corrupt_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("hyaway-ux-settings.json"), "\u{0}garbage").unwrap();

    let registry = load(&dir);
    assert_eq!(registry.store::<UxSettings>().unwrap().get(), UxSettings::default());
}

#[test]
fn test_stale_field_falls_back_per_key() {
    let dir = TempDir::new().unwrap();
    let storage = FileStorage::new(dir.path());
    storage
        .write(
            "hyaway-gallery-settings",
            r#"{"state":{"layout":"carousel","base_width":150,"show_captions":true},"version":0}"#,
        )
        .unwrap();

    let registry = load(&dir);
    let gallery = registry.store::<GallerySettings>().unwrap().get();
    assert_eq!(gallery.layout, GalleryLayout::Masonry);
    assert_eq!(gallery.base_width, 150);
}

#[test]
fn test_reset_all_persists_defaults() {
    let dir = TempDir::new().unwrap();
    {
        let registry = load(&dir);
        registry.store::<UxSettings>().unwrap().update(|p| p.haptics = false);
        registry.reset_all();
    }

    let registry = load(&dir);
    assert_eq!(registry.store::<UxSettings>().unwrap().get(), UxSettings::default());
    for name in registry.names() {
        assert!(dir.path().join(format!("{}.json", name)).exists(), "{} not persisted", name);
    }
}

#[test]
fn test_checked_set_rejects_out_of_range() {
    let dir = TempDir::new().unwrap();
    let registry = load(&dir);
    let review = registry.by_name("hyaway-review-settings").unwrap();

    assert!(review.set_key_checked("swipe_threshold", json!(10)).is_err());
    assert_eq!(review.get_key("swipe_threshold"), Some(json!(120)));

    // Unchecked path keeps the permissive behaviour
    review.set_key("swipe_threshold", json!(10)).unwrap();
    assert_eq!(review.get_key("swipe_threshold"), Some(json!(10)));
}
