use crate::{EngineError, Result};
use async_trait::async_trait;
use canvas_protocol::{RawBookmark, RawNode};
use canvas_tree::{find_node_mut, is_protected, next_id, remove_node, RemoveOutcome};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::SystemTime;
use tokio::sync::broadcast;

/// Parent used by `create` when the caller does not name one (the bookmarks bar).
pub const DEFAULT_PARENT_ID: &str = "1";

pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Removed,
    Changed,
    Moved,
}

/// Mutation notification fired by a store. The payload is opaque to the
/// engine; every event has the same effect (schedule a refresh).
#[derive(Debug, Clone, PartialEq)]
pub struct BookmarkEvent {
    pub kind: ChangeKind,
    pub id: String,
    pub payload: serde_json::Value,
}

impl BookmarkEvent {
    pub fn new(kind: ChangeKind, id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind,
            id: id.into(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl BookmarkChanges {
    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.url.is_none()
    }
}

/// Which nodes of a tree belong to the browser rather than the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RootLayout {
    /// Browser tree: the root and its top-level folders are fixed, new
    /// bookmarks land in the bookmarks bar.
    Browser,
    /// Untitled root wrapped around a list of user nodes. Only the root is
    /// fixed and it is also the default parent.
    Synthetic,
}

impl RootLayout {
    fn protects(self, tree: &RawNode, id: &str) -> bool {
        match self {
            Self::Browser => is_protected(tree, id),
            Self::Synthetic => tree.id() == id,
        }
    }

    fn default_parent(self, tree: &RawNode) -> String {
        match self {
            Self::Browser => DEFAULT_PARENT_ID.to_string(),
            Self::Synthetic => tree.id().to_string(),
        }
    }
}

/// The browser's bookmark store, seen from the engine.
#[async_trait]
pub trait BookmarkStore: Send + Sync {
    /// Full snapshot of the current tree.
    async fn get_tree(&self) -> Result<RawNode>;

    /// Stream of mutation notifications.
    fn subscribe(&self) -> broadcast::Receiver<BookmarkEvent>;

    async fn create(&self, parent_id: Option<&str>, title: &str, url: &str) -> Result<RawNode>;

    async fn update(&self, id: &str, changes: BookmarkChanges) -> Result<RawNode>;

    async fn remove(&self, id: &str) -> Result<()>;

    /// Bookmark leaves whose title or url contain every term of `query`.
    async fn search(&self, query: &str) -> Result<Vec<RawNode>>;
}

pub(crate) fn validate_url(url: &str) -> Result<()> {
    url::Url::parse(url)
        .map(|_| ())
        .map_err(|err| EngineError::InvalidUrl(format!("{url}: {err}")))
}

pub(crate) fn current_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .ok()
        .and_then(|dur| u64::try_from(dur.as_millis()).ok())
        .unwrap_or(0)
}

pub(crate) fn apply_create(
    tree: &mut RawNode,
    layout: RootLayout,
    parent_id: Option<&str>,
    title: &str,
    url: &str,
) -> Result<(RawNode, BookmarkEvent)> {
    validate_url(url)?;
    let parent_id = parent_id.map_or_else(|| layout.default_parent(tree), str::to_string);
    let id = next_id(tree);

    let parent = find_node_mut(tree, &parent_id)
        .ok_or_else(|| EngineError::NotFound(parent_id.clone()))?;
    let RawNode::Folder(folder) = parent else {
        return Err(EngineError::NotAFolder(parent_id));
    };

    let node = RawNode::Bookmark(RawBookmark {
        id: id.clone(),
        title: Some(title.to_string()),
        url: url.to_string(),
        date_added: Some(current_unix_ms()),
        parent_id: Some(parent_id.clone()),
    });
    folder.children.push(node.clone());

    let event = BookmarkEvent::new(
        ChangeKind::Created,
        &id,
        json!({
            "parentId": parent_id,
            "index": folder.children.len() - 1,
            "title": title,
            "url": url,
        }),
    );
    Ok((node, event))
}

pub(crate) fn apply_update(
    tree: &mut RawNode,
    layout: RootLayout,
    id: &str,
    changes: &BookmarkChanges,
) -> Result<(RawNode, BookmarkEvent)> {
    if layout.protects(tree, id) {
        return Err(EngineError::Immutable(id.to_string()));
    }
    if let Some(url) = changes.url.as_deref() {
        validate_url(url)?;
    }

    let node = find_node_mut(tree, id).ok_or_else(|| EngineError::NotFound(id.to_string()))?;
    match node {
        RawNode::Bookmark(bookmark) => {
            if let Some(title) = &changes.title {
                bookmark.title = Some(title.clone());
            }
            if let Some(url) = &changes.url {
                bookmark.url = url.clone();
            }
        }
        RawNode::Folder(folder) => {
            if changes.url.is_some() {
                return Err(EngineError::InvalidUrl(format!(
                    "folder {id} cannot carry a url"
                )));
            }
            if let Some(title) = &changes.title {
                folder.title = title.clone();
            }
        }
    }

    let event = BookmarkEvent::new(ChangeKind::Changed, id, serde_json::to_value(changes)?);
    Ok((node.clone(), event))
}

pub(crate) fn apply_remove(
    tree: &mut RawNode,
    layout: RootLayout,
    id: &str,
) -> Result<BookmarkEvent> {
    if layout.protects(tree, id) {
        return Err(EngineError::Immutable(id.to_string()));
    }
    match remove_node(tree, id) {
        RemoveOutcome::Removed(node) => Ok(BookmarkEvent::new(
            ChangeKind::Removed,
            id,
            json!({ "parentId": node.parent_id(), "node": node }),
        )),
        RemoveOutcome::NotFound => Err(EngineError::NotFound(id.to_string())),
        RemoveOutcome::NotEmpty => Err(EngineError::FolderNotEmpty(id.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> RawNode {
        RawNode::folder(
            "0",
            "",
            vec![
                RawNode::folder(
                    "1",
                    "Bookmarks bar",
                    vec![RawNode::bookmark("3", "A", "https://a.com")],
                ),
                RawNode::folder("2", "Other bookmarks", vec![]),
            ],
        )
    }

    #[test]
    fn create_defaults_to_bookmarks_bar() {
        let mut tree = tree();
        let (node, event) =
            apply_create(&mut tree, RootLayout::Browser, None, "B", "https://b.com").unwrap();
        assert_eq!(node.id(), "4");
        assert_eq!(node.parent_id(), Some(DEFAULT_PARENT_ID));
        assert_eq!(event.kind, ChangeKind::Created);
        assert_eq!(event.payload["index"], 1);
    }

    #[test]
    fn create_rejects_bad_url_and_leaf_parent() {
        let mut tree = tree();
        assert!(matches!(
            apply_create(&mut tree, RootLayout::Browser, None, "x", "not a url"),
            Err(EngineError::InvalidUrl(_))
        ));
        assert!(matches!(
            apply_create(&mut tree, RootLayout::Browser, Some("3"), "x", "https://x.com"),
            Err(EngineError::NotAFolder(_))
        ));
        assert!(matches!(
            apply_create(&mut tree, RootLayout::Browser, Some("42"), "x", "https://x.com"),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn update_changes_title_and_url() {
        let mut tree = tree();
        let changes = BookmarkChanges {
            title: Some("Renamed".to_string()),
            url: Some("https://renamed.org".to_string()),
        };
        let (node, event) = apply_update(&mut tree, RootLayout::Browser, "3", &changes).unwrap();
        assert_eq!(node.title(), "Renamed");
        assert_eq!(node.url(), Some("https://renamed.org"));
        assert_eq!(event.payload["title"], "Renamed");
    }

    #[test]
    fn top_level_folders_are_immutable() {
        let mut tree = tree();
        let rename = BookmarkChanges {
            title: Some("x".to_string()),
            url: None,
        };
        assert!(matches!(
            apply_update(&mut tree, RootLayout::Browser, "1", &rename),
            Err(EngineError::Immutable(_))
        ));
        assert!(matches!(
            apply_remove(&mut tree, RootLayout::Browser, "2"),
            Err(EngineError::Immutable(_))
        ));
        assert!(matches!(
            apply_remove(&mut tree, RootLayout::Browser, "0"),
            Err(EngineError::Immutable(_))
        ));
    }

    #[test]
    fn remove_reports_parent() {
        let mut tree = tree();
        let event = apply_remove(&mut tree, RootLayout::Browser, "3").unwrap();
        assert_eq!(event.kind, ChangeKind::Removed);
        assert_eq!(event.payload["parentId"], "1");
        assert!(matches!(
            apply_remove(&mut tree, RootLayout::Browser, "3"),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn synthetic_root_only_protects_itself() {
        let mut tree = RawNode::folder(
            "0",
            "",
            vec![
                RawNode::bookmark("5", "Loose", "https://loose.dev"),
                RawNode::folder("6", "Mine", vec![]),
            ],
        );
        let (node, _) =
            apply_create(&mut tree, RootLayout::Synthetic, None, "New", "https://new.dev").unwrap();
        assert_eq!(node.parent_id(), Some("0"));
        assert!(apply_remove(&mut tree, RootLayout::Synthetic, "5").is_ok());
        assert!(apply_remove(&mut tree, RootLayout::Synthetic, "6").is_ok());
        assert!(matches!(
            apply_remove(&mut tree, RootLayout::Synthetic, "0"),
            Err(EngineError::Immutable(_))
        ));
    }
}
