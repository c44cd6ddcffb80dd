//! # Canvas Tree
//!
//! Turns the store-owned bookmark tree into flat, enriched records.
//!
//! ## Pipeline
//!
//! ```text
//! RawNode (root)
//!     │
//!     ├──> Flattener (pre-order walk)
//!     │      ├─ folder_path / folder_order per distinct path
//!     │      ├─ bookmark_index among siblings
//!     │      └─ domain + favicon from the url
//!     │
//!     └──> FlatRecord[] (document order)
//! ```
//!
//! ## Example
//!
//! ```
//! use canvas_protocol::RawNode;
//! use canvas_tree::flatten;
//!
//! let tree = RawNode::folder("1", "Work", vec![
//!     RawNode::bookmark("2", "A", "https://a.com"),
//!     RawNode::bookmark("3", "B", "https://www.b.com/x"),
//! ]);
//! let records = flatten(&tree);
//! assert_eq!(records[1].domain, "b.com");
//! ```

mod domain;
mod edit;
mod flatten;
mod stats;

pub use domain::{extract_domain, favicon_for};
pub use edit::{find_node_mut, is_protected, next_id, remove_node, search_nodes, RemoveOutcome};
pub use flatten::{flatten, Flattener};
pub use stats::{recent_bookmarks, TreeStats, RECENT_WINDOW_MS};
