use crate::chromium::ChromiumFile;
use crate::store::{
    apply_create, apply_remove, apply_update, RootLayout, EVENT_CHANNEL_CAPACITY,
};
use crate::{BookmarkChanges, BookmarkEvent, BookmarkStore, ChangeKind, EngineError, Result};
use async_trait::async_trait;
use canvas_protocol::RawNode;
use canvas_tree::search_nodes;
use log::{debug, info, warn};
use notify::event::{EventKind, ModifyKind};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio::sync::{broadcast, Mutex as TokioMutex};

/// On-disk layouts the store understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeFormat {
    /// `getTree` output: `[root]` or a bare root object.
    Native,
    /// A list of top-level user nodes. Loaded under an untitled root `"0"`
    /// and written back as a list.
    NativeList,
    /// Chromium profile `Bookmarks` file. Read-only.
    Chromium,
}

/// Bookmark store backed by a JSON file.
///
/// Mutations rewrite the whole file atomically (temp file, then rename) and
/// announce themselves on the event stream. [`FileStore::watch`] adds
/// notifications for edits made by other processes.
pub struct FileStore {
    path: PathBuf,
    events: broadcast::Sender<BookmarkEvent>,
    write_lock: TokioMutex<()>,
    watcher: std::sync::Mutex<Option<RecommendedWatcher>>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            path: path.into(),
            events,
            write_lock: TokioMutex::new(()),
            watcher: std::sync::Mutex::new(None),
        }
    }

    /// Open `path`, seeding it with an empty browser layout when missing.
    pub async fn open_or_init(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::open(path);
        if !store.path.exists() {
            info!("Creating bookmark file {}", store.path.display());
            let tree = RawNode::folder(
                "0",
                "",
                vec![
                    RawNode::folder("1", "Bookmarks bar", Vec::new()),
                    RawNode::folder("2", "Other bookmarks", Vec::new()),
                ],
            );
            store.persist(&tree, TreeFormat::Native).await?;
        }
        Ok(store)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn format(&self) -> Result<TreeFormat> {
        Ok(self.load().await?.0)
    }

    /// Start emitting events for changes made to the file by anyone.
    ///
    /// The parent directory is watched rather than the file so that atomic
    /// replacements (rename over the original) are still observed.
    pub fn watch(&self) -> Result<()> {
        let mut guard = self
            .watcher
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if guard.is_some() {
            return Ok(());
        }

        let target = std::fs::canonicalize(&self.path)?;
        let dir = target
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| EngineError::Watch(format!("{} has no parent", target.display())))?;
        let file_name = target.file_name().map(std::ffi::OsStr::to_os_string);
        let sender = self.events.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let touches_file = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(std::ffi::OsStr::to_os_string) == file_name);
                    if !touches_file {
                        return;
                    }
                    if let Some(kind) = classify(&event.kind) {
                        debug!("Bookmark file event {:?}", event.kind);
                        let _ = sender.send(BookmarkEvent::new(
                            kind,
                            target.display().to_string(),
                            json!({ "source": "watcher" }),
                        ));
                    }
                }
                Err(err) => warn!("Watcher error: {err}"),
            },
            NotifyConfig::default(),
        )
        .map_err(|e| EngineError::Watch(format!("watcher init failed: {e}")))?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| EngineError::Watch(format!("failed to watch {}: {e}", dir.display())))?;

        info!("Watching {} for bookmark changes", dir.display());
        *guard = Some(watcher);
        Ok(())
    }

    pub fn unwatch(&self) {
        let mut guard = self
            .watcher
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.take();
    }

    async fn load(&self) -> Result<(TreeFormat, RawNode)> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|err| {
            EngineError::SourceUnavailable(format!("{}: {err}", self.path.display()))
        })?;
        parse_document(&bytes)
    }

    async fn load_writable(&self) -> Result<(TreeFormat, RawNode)> {
        match self.load().await? {
            (TreeFormat::Chromium, _) => Err(EngineError::ReadOnly(self.path.clone())),
            loaded => Ok(loaded),
        }
    }

    async fn persist(&self, tree: &RawNode, format: TreeFormat) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let nodes = match format {
            TreeFormat::NativeList => tree.children().unwrap_or_default(),
            TreeFormat::Native | TreeFormat::Chromium => std::slice::from_ref(tree),
        };
        let bytes = serde_json::to_vec_pretty(nodes)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    fn emit(&self, event: BookmarkEvent) {
        let _ = self.events.send(event);
    }
}

fn classify(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Remove(_) => Some(ChangeKind::Removed),
        EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Moved),
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => Some(ChangeKind::Changed),
        EventKind::Access(_) => None,
    }
}

const fn layout_of(format: TreeFormat) -> RootLayout {
    match format {
        TreeFormat::NativeList => RootLayout::Synthetic,
        TreeFormat::Native | TreeFormat::Chromium => RootLayout::Browser,
    }
}

pub(crate) fn parse_document(bytes: &[u8]) -> Result<(TreeFormat, RawNode)> {
    let value: Value = serde_json::from_slice(bytes)?;
    if value.get("roots").is_some() {
        let file: ChromiumFile = serde_json::from_value(value)?;
        return Ok((TreeFormat::Chromium, file.into_tree()));
    }

    let parsed = match value {
        Value::Array(items) => {
            let mut nodes = items
                .into_iter()
                .map(serde_json::from_value)
                .collect::<std::result::Result<Vec<RawNode>, _>>()?;
            if nodes.len() == 1 && nodes[0].is_folder() {
                (TreeFormat::Native, nodes.remove(0))
            } else {
                (TreeFormat::NativeList, RawNode::folder("0", "", nodes))
            }
        }
        other => (TreeFormat::Native, serde_json::from_value(other)?),
    };
    Ok(parsed)
}

#[async_trait]
impl BookmarkStore for FileStore {
    async fn get_tree(&self) -> Result<RawNode> {
        Ok(self.load().await?.1)
    }

    fn subscribe(&self) -> broadcast::Receiver<BookmarkEvent> {
        self.events.subscribe()
    }

    async fn create(&self, parent_id: Option<&str>, title: &str, url: &str) -> Result<RawNode> {
        let _guard = self.write_lock.lock().await;
        let (format, mut tree) = self.load_writable().await?;
        let (node, event) = apply_create(&mut tree, layout_of(format), parent_id, title, url)?;
        self.persist(&tree, format).await?;
        self.emit(event);
        Ok(node)
    }

    async fn update(&self, id: &str, changes: BookmarkChanges) -> Result<RawNode> {
        let _guard = self.write_lock.lock().await;
        let (format, mut tree) = self.load_writable().await?;
        let (node, event) = apply_update(&mut tree, layout_of(format), id, &changes)?;
        self.persist(&tree, format).await?;
        self.emit(event);
        Ok(node)
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let (format, mut tree) = self.load_writable().await?;
        let event = apply_remove(&mut tree, layout_of(format), id)?;
        self.persist(&tree, format).await?;
        self.emit(event);
        Ok(())
    }

    async fn search(&self, query: &str) -> Result<Vec<RawNode>> {
        Ok(search_nodes(&self.get_tree().await?, query))
    }
}
