use crate::store::{
    apply_create, apply_remove, apply_update, RootLayout, EVENT_CHANNEL_CAPACITY,
};
use crate::{BookmarkChanges, BookmarkEvent, BookmarkStore, ChangeKind, EngineError, Result};
use async_trait::async_trait;
use canvas_protocol::RawNode;
use canvas_tree::search_nodes;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{broadcast, RwLock};

/// In-process bookmark store. Used for tests and for driving the engine
/// from a tree that was loaded elsewhere.
pub struct MemoryStore {
    tree: RwLock<RawNode>,
    events: broadcast::Sender<BookmarkEvent>,
    available: AtomicBool,
    reads: AtomicUsize,
}

impl MemoryStore {
    pub fn new(tree: RawNode) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            tree: RwLock::new(tree),
            events,
            available: AtomicBool::new(true),
            reads: AtomicUsize::new(0),
        }
    }

    /// Empty browser layout: root "0" holding "1" (bar) and "2" (other).
    pub fn with_browser_roots() -> Self {
        Self::new(RawNode::folder(
            "0",
            "",
            vec![
                RawNode::folder("1", "Bookmarks bar", Vec::new()),
                RawNode::folder("2", "Other bookmarks", Vec::new()),
            ],
        ))
    }

    /// Simulate the store going away; `get_tree` fails while unavailable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of `get_tree` calls served so far, failed ones included.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Swap the whole tree, as an import would, and announce it.
    pub async fn replace_tree(&self, tree: RawNode) {
        let root_id = tree.id().to_string();
        *self.tree.write().await = tree;
        self.emit(BookmarkEvent::new(
            ChangeKind::Changed,
            root_id,
            json!({ "import": true }),
        ));
    }

    fn emit(&self, event: BookmarkEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_browser_roots()
    }
}

#[async_trait]
impl BookmarkStore for MemoryStore {
    async fn get_tree(&self) -> Result<RawNode> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if !self.available.load(Ordering::SeqCst) {
            return Err(EngineError::SourceUnavailable(
                "in-memory store is offline".to_string(),
            ));
        }
        Ok(self.tree.read().await.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<BookmarkEvent> {
        self.events.subscribe()
    }

    async fn create(&self, parent_id: Option<&str>, title: &str, url: &str) -> Result<RawNode> {
        let (node, event) = {
            let mut tree = self.tree.write().await;
            apply_create(&mut tree, RootLayout::Browser, parent_id, title, url)?
        };
        self.emit(event);
        Ok(node)
    }

    async fn update(&self, id: &str, changes: BookmarkChanges) -> Result<RawNode> {
        let (node, event) = {
            let mut tree = self.tree.write().await;
            apply_update(&mut tree, RootLayout::Browser, id, &changes)?
        };
        self.emit(event);
        Ok(node)
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let event = {
            let mut tree = self.tree.write().await;
            apply_remove(&mut tree, RootLayout::Browser, id)?
        };
        self.emit(event);
        Ok(())
    }

    async fn search(&self, query: &str) -> Result<Vec<RawNode>> {
        Ok(search_nodes(&*self.tree.read().await, query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn mutations_emit_events() {
        let store = MemoryStore::with_browser_roots();
        let mut rx = store.subscribe();

        let created = store.create(None, "Rust", "https://www.rust-lang.org").await.unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Created);
        assert_eq!(event.id, created.id());

        store
            .update(
                created.id(),
                BookmarkChanges {
                    title: Some("Rust lang".to_string()),
                    url: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::Changed);

        store.remove(created.id()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::Removed);
    }

    #[tokio::test]
    async fn failed_mutation_emits_nothing() {
        let store = MemoryStore::with_browser_roots();
        let mut rx = store.subscribe();
        assert!(store.remove("1").await.is_err());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn offline_store_fails_reads() {
        let store = MemoryStore::default();
        store.set_available(false);
        assert!(matches!(
            store.get_tree().await,
            Err(EngineError::SourceUnavailable(_))
        ));
        store.set_available(true);
        assert!(store.get_tree().await.is_ok());
        assert_eq!(store.read_count(), 2);
    }

    #[tokio::test]
    async fn search_requires_every_term() {
        let store = MemoryStore::default();
        store.create(None, "Rust book", "https://doc.rust-lang.org/book").await.unwrap();
        store.create(None, "Rust blog", "https://blog.rust-lang.org").await.unwrap();
        let hits = store.search("rust BOOK").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title(), "Rust book");
    }
}
