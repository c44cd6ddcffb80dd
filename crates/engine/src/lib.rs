//! # Canvas Engine
//!
//! Keeps a grouped projection of the browser's bookmarks current.
//!
//! ## Flow
//!
//! ```text
//! BookmarkStore ──events──> ChangeCoalescer (300ms trailing window)
//!      ▲                          │
//!      │ get_tree                 └─> ProjectionEngine::refresh_from_source
//!      │                                 │
//!      └─────────────────────────────────┤ flatten + cache records
//!                                        │
//! set_category / set_query ──────────────┴─> project ──> subscribers
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use canvas_engine::{EngineConfig, FileStore, ProjectionEngine};
//! use canvas_protocol::{Category, ProjectionState};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(FileStore::open("bookmarks.json"));
//!     let engine = ProjectionEngine::start(store, EngineConfig::default(), ProjectionState::default());
//!     engine.refresh_from_source().await?;
//!
//!     for group in engine.set_category(Category::Domain).iter() {
//!         println!("{} ({})", group.title, group.len());
//!     }
//!     Ok(())
//! }
//! ```

mod chromium;
mod coalescer;
mod engine;
mod error;
mod file_store;
mod memory_store;
mod store;

pub use coalescer::{ChangeCoalescer, CoalescerConfig, CoalescerHealth, RefreshTarget};
pub use engine::{EngineConfig, LoadStatus, Projection, ProjectionEngine};
pub use error::{EngineError, Result};
pub use file_store::{FileStore, TreeFormat};
pub use memory_store::MemoryStore;
pub use store::{BookmarkChanges, BookmarkEvent, BookmarkStore, ChangeKind, DEFAULT_PARENT_ID};
