//! # Canvas Protocol
//!
//! Data model shared by every layer of the bookmark projection engine.
//!
//! ```text
//! RawNode (store-owned tree)
//!     │
//!     └──> FlatRecord[] (one per bookmark leaf)
//!            │
//!            └──> Group[] (projection for the active Category)
//! ```

mod labels;
mod mode;
mod node;
mod record;
mod settings;

pub use labels::Labels;
pub use mode::{Category, Language, ParseModeError, ProjectionState, Theme, ViewMode};
pub use node::{RawBookmark, RawFolder, RawNode};
pub use record::{FaviconRef, FlatRecord, Group};
pub use settings::Settings;

/// Separator used when joining folder titles into a `folder_path`.
pub const FOLDER_PATH_SEPARATOR: &str = " > ";

/// Domain assigned to records whose url cannot be parsed.
pub const UNKNOWN_DOMAIN: &str = "unknown";

/// Upper bound on the number of records in the "recent" projection.
pub const RECENT_LIMIT: usize = 50;

/// Group key of the folder fallback bucket (records with an empty
/// `folder_path`). Only its title is localized.
pub const OTHER_GROUP_KEY: &str = "";

/// Group key used by the "recent" category.
pub const RECENT_GROUP_KEY: &str = "recent";

/// Group key used by the "all" category.
pub const ALL_GROUP_KEY: &str = "all";
