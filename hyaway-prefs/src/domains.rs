//! Built-in hyAway settings domains
//!
//! One record per settings screen. Store names are persistence keys shared
//! with every tab, so they must never be reused between records.

use crate::metadata::{
    check_bool, check_choice, check_range, check_text, PrefKind, PrefMetadata, Preferences,
};
use serde::{Deserialize, Serialize};

// ============================================================================
// Recent files
// ============================================================================

/// Recently imported/archived files page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentFilesSettings {
    pub limit: u32,
    pub days: u32,
}

impl Default for RecentFilesSettings {
    fn default() -> Self {
        Self { limit: 100, days: 3 }
    }
}

impl Preferences for RecentFilesSettings {
    const STORE_NAME: &'static str = "hyaway-recent-files-settings";

    fn metadata() -> &'static [PrefMetadata] {
        &[
            PrefMetadata {
                key: "limit",
                kind: PrefKind::Number,
                default_value: "100",
                description: "Maximum number of recent files to show",
                validation_range: "1-10000",
                validator: |v| check_range("limit", v, 1.0, 10000.0),
            },
            PrefMetadata {
                key: "days",
                kind: PrefKind::Number,
                default_value: "3",
                description: "How many days back counts as recent",
                validation_range: "1-30",
                validator: |v| check_range("days", v, 1.0, 30.0),
            },
        ]
    }
}

// ============================================================================
// Tags
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagSortMode {
    /// Most-used tags first
    Count,
    /// Namespace order (see `hyaway_common::tags`)
    Namespace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagsSettings {
    pub sort_mode: TagSortMode,
    pub show_namespace_separator: bool,
}

impl Default for TagsSettings {
    fn default() -> Self {
        Self {
            sort_mode: TagSortMode::Count,
            show_namespace_separator: true,
        }
    }
}

impl Preferences for TagsSettings {
    const STORE_NAME: &'static str = "hyaway-tags-settings";

    fn metadata() -> &'static [PrefMetadata] {
        &[
            PrefMetadata {
                key: "sort_mode",
                kind: PrefKind::Choice(&["count", "namespace"]),
                default_value: "count",
                description: "Ordering of tag lists in the file viewer",
                validation_range: "count|namespace",
                validator: |v| check_choice("sort_mode", v, &["count", "namespace"]),
            },
            PrefMetadata {
                key: "show_namespace_separator",
                kind: PrefKind::Boolean,
                default_value: "true",
                description: "Render namespaced tags as namespace:tag",
                validation_range: "true|false",
                validator: |v| check_bool("show_namespace_separator", v),
            },
        ]
    }
}

// ============================================================================
// Random inbox
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomInboxSettings {
    pub limit: u32,
}

impl Default for RandomInboxSettings {
    fn default() -> Self {
        Self { limit: 100 }
    }
}

impl Preferences for RandomInboxSettings {
    const STORE_NAME: &'static str = "hyaway-random-inbox-settings";

    fn metadata() -> &'static [PrefMetadata] {
        &[PrefMetadata {
            key: "limit",
            kind: PrefKind::Number,
            default_value: "100",
            description: "Number of random inbox files to sample",
            validation_range: "1-10000",
            validator: |v| check_range("limit", v, 1.0, 10000.0),
        }]
    }
}

// ============================================================================
// Gallery display
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GalleryLayout {
    Masonry,
    Grid,
    Justified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GallerySettings {
    pub layout: GalleryLayout,
    /// Thumbnail base width in CSS pixels
    pub base_width: u32,
    pub max_columns: u32,
    pub horizontal_gap: u32,
    pub vertical_gap: u32,
    /// Open images filling the viewport instead of at natural size
    pub expand_images: bool,
    pub reflow_duration_ms: u32,
}

impl Default for GallerySettings {
    fn default() -> Self {
        Self {
            layout: GalleryLayout::Masonry,
            base_width: 200,
            max_columns: 30,
            horizontal_gap: 8,
            vertical_gap: 8,
            expand_images: true,
            reflow_duration_ms: 350,
        }
    }
}

const GALLERY_LAYOUTS: &[&str] = &["masonry", "grid", "justified"];

impl Preferences for GallerySettings {
    const STORE_NAME: &'static str = "hyaway-gallery-settings";

    fn metadata() -> &'static [PrefMetadata] {
        &[
            PrefMetadata {
                key: "layout",
                kind: PrefKind::Choice(GALLERY_LAYOUTS),
                default_value: "masonry",
                description: "Thumbnail arrangement",
                validation_range: "masonry|grid|justified",
                validator: |v| check_choice("layout", v, GALLERY_LAYOUTS),
            },
            PrefMetadata {
                key: "base_width",
                kind: PrefKind::Number,
                default_value: "200",
                description: "Thumbnail base width (px)",
                validation_range: "100-400",
                validator: |v| check_range("base_width", v, 100.0, 400.0),
            },
            PrefMetadata {
                key: "max_columns",
                kind: PrefKind::Number,
                default_value: "30",
                description: "Upper limit on gallery columns",
                validation_range: "1-30",
                validator: |v| check_range("max_columns", v, 1.0, 30.0),
            },
            PrefMetadata {
                key: "horizontal_gap",
                kind: PrefKind::Number,
                default_value: "8",
                description: "Horizontal gap between thumbnails (px)",
                validation_range: "0-32",
                validator: |v| check_range("horizontal_gap", v, 0.0, 32.0),
            },
            PrefMetadata {
                key: "vertical_gap",
                kind: PrefKind::Number,
                default_value: "8",
                description: "Vertical gap between thumbnails (px)",
                validation_range: "0-32",
                validator: |v| check_range("vertical_gap", v, 0.0, 32.0),
            },
            PrefMetadata {
                key: "expand_images",
                kind: PrefKind::Boolean,
                default_value: "true",
                description: "Fit opened images to the viewport",
                validation_range: "true|false",
                validator: |v| check_bool("expand_images", v),
            },
            PrefMetadata {
                key: "reflow_duration_ms",
                kind: PrefKind::Number,
                default_value: "350",
                description: "Layout reflow animation duration (ms), 0 disables",
                validation_range: "0-1000",
                validator: |v| check_range("reflow_duration_ms", v, 0.0, 1000.0),
            },
        ]
    }
}

// ============================================================================
// Review mode
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageLoading {
    Original,
    Optimized,
}

/// Swipe-to-archive review queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSettings {
    pub image_loading: ImageLoading,
    /// Swipe distance (px) that commits an archive/trash decision
    pub swipe_threshold: u32,
    pub show_gesture_hints: bool,
    pub track_watch_history: bool,
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self {
            image_loading: ImageLoading::Optimized,
            swipe_threshold: 120,
            show_gesture_hints: true,
            track_watch_history: false,
        }
    }
}

impl Preferences for ReviewSettings {
    const STORE_NAME: &'static str = "hyaway-review-settings";

    fn metadata() -> &'static [PrefMetadata] {
        &[
            PrefMetadata {
                key: "image_loading",
                kind: PrefKind::Choice(&["original", "optimized"]),
                default_value: "optimized",
                description: "Load originals or server-resized images while reviewing",
                validation_range: "original|optimized",
                validator: |v| check_choice("image_loading", v, &["original", "optimized"]),
            },
            PrefMetadata {
                key: "swipe_threshold",
                kind: PrefKind::Number,
                default_value: "120",
                description: "Swipe distance that commits a decision (px)",
                validation_range: "50-500",
                validator: |v| check_range("swipe_threshold", v, 50.0, 500.0),
            },
            PrefMetadata {
                key: "show_gesture_hints",
                kind: PrefKind::Boolean,
                default_value: "true",
                description: "Overlay swipe direction hints",
                validation_range: "true|false",
                validator: |v| check_bool("show_gesture_hints", v),
            },
            PrefMetadata {
                key: "track_watch_history",
                kind: PrefKind::Boolean,
                default_value: "false",
                description: "Record reviewed files in the history list",
                validation_range: "true|false",
                validator: |v| check_bool("track_watch_history", v),
            },
        ]
    }
}

// ============================================================================
// Per-device UX
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    System,
    Light,
    Dark,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UxSettings {
    pub theme: Theme,
    pub haptics: bool,
    /// Search shown on the landing page; empty for none
    pub pinned_search: String,
}

impl Default for UxSettings {
    fn default() -> Self {
        Self {
            theme: Theme::System,
            haptics: true,
            pinned_search: String::new(),
        }
    }
}

impl Preferences for UxSettings {
    const STORE_NAME: &'static str = "hyaway-ux-settings";

    fn metadata() -> &'static [PrefMetadata] {
        &[
            PrefMetadata {
                key: "theme",
                kind: PrefKind::Choice(&["system", "light", "dark"]),
                default_value: "system",
                description: "Colour scheme",
                validation_range: "system|light|dark",
                validator: |v| check_choice("theme", v, &["system", "light", "dark"]),
            },
            PrefMetadata {
                key: "haptics",
                kind: PrefKind::Boolean,
                default_value: "true",
                description: "Vibrate on gestures where supported",
                validation_range: "true|false",
                validator: |v| check_bool("haptics", v),
            },
            PrefMetadata {
                key: "pinned_search",
                kind: PrefKind::Text,
                default_value: "",
                description: "Search shown on the landing page",
                validation_range: "0-500 chars",
                validator: |v| check_text("pinned_search", v, 500),
            },
        ]
    }
}
