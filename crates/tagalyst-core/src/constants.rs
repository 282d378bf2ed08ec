//! Application-wide constants
//!
//! Centralized location for storage key prefixes, DOM marker attributes and
//! thresholds that are shared across modules.

/// Storage key for the persisted feature-flag overrides
pub const CONFIG_STORAGE_KEY: &str = "__tagalyst_config";

/// Prefix for per-thread metadata records
pub const THREAD_STORAGE_PREFIX: &str = "__tagalyst_thread__";

/// Attribute marking every node injected by the extension.
/// The value names the affordance (toolbar, panel, overview, ...).
pub const EXT_ATTR: &str = "data-tagalyst";

/// Attribute carrying the sub-role of an element inside an injected affordance
pub const EXT_PART_ATTR: &str = "data-tagalyst-part";

/// Message text is capped at this many UTF-16 code units before hashing
pub const KEY_TEXT_LIMIT: usize = 4000;

/// Minimum normalized text length for the heuristic message scan
pub const MIN_HEURISTIC_TEXT: usize = 2;

/// Tags treated as block-level content by the heuristic message scan
pub const BLOCK_TAGS: &[&str] = &[
    "p", "div", "pre", "ul", "ol", "li", "blockquote", "table", "section", "article", "h1",
    "h2", "h3", "h4", "h5", "h6",
];

// Roles assigned when the host gives no role marker
pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";
