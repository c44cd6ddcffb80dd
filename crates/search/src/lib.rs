//! # Canvas Search
//!
//! Filter and group flattened bookmark records into a projection.
//!
//! ```text
//! FlatRecord[] ──> filter(query) ──> group(category) ──> Group[]
//! ```

mod filter;
mod group;
mod project;

pub use filter::{filter, SearchQuery};
pub use group::{group, group_with_labels};
pub use project::project;
