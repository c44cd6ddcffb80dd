use crate::domain::{extract_domain, favicon_for};
use canvas_protocol::{FlatRecord, Labels, RawBookmark, RawNode, FOLDER_PATH_SEPARATOR};
use log::debug;
use std::collections::HashMap;

/// Flatten `root` with the default separator and placeholder title.
pub fn flatten(root: &RawNode) -> Vec<FlatRecord> {
    Flattener::default().flatten(root)
}

/// Pre-order walker producing one [`FlatRecord`] per bookmark leaf.
///
/// Stateless between calls: folder order numbering restarts at zero on every
/// [`Flattener::flatten`].
#[derive(Debug, Clone)]
pub struct Flattener {
    separator: String,
    untitled_title: String,
}

impl Default for Flattener {
    fn default() -> Self {
        Self {
            separator: FOLDER_PATH_SEPARATOR.to_string(),
            untitled_title: Labels::default().untitled_bookmark.to_string(),
        }
    }
}

impl Flattener {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    #[must_use]
    pub fn with_untitled_title(mut self, title: impl Into<String>) -> Self {
        self.untitled_title = title.into();
        self
    }

    #[must_use]
    pub fn with_labels(self, labels: &Labels) -> Self {
        self.with_untitled_title(labels.untitled_bookmark)
    }

    pub fn flatten(&self, root: &RawNode) -> Vec<FlatRecord> {
        let mut folder_order: HashMap<String, usize> = HashMap::new();
        let mut records = Vec::new();

        // Explicit stack: nesting depth is unbounded.
        let mut stack: Vec<(&RawNode, String, usize)> = vec![(root, String::new(), 0)];
        while let Some((node, path, index)) = stack.pop() {
            match node {
                RawNode::Bookmark(bookmark) => {
                    let order = folder_order.get(&path).copied().unwrap_or(0);
                    records.push(self.record(bookmark, path, order, index));
                }
                RawNode::Folder(folder) => {
                    let folder_path = self.join(&path, &folder.title);
                    let next = folder_order.len();
                    folder_order.entry(folder_path.clone()).or_insert(next);
                    for (child_index, child) in folder.children.iter().enumerate().rev() {
                        stack.push((child, folder_path.clone(), child_index));
                    }
                }
            }
        }

        debug!(
            "flattened {} bookmarks across {} folder paths",
            records.len(),
            folder_order.len()
        );
        records
    }

    fn join(&self, path: &str, title: &str) -> String {
        if path.is_empty() {
            title.to_string()
        } else {
            format!("{path}{}{title}", self.separator)
        }
    }

    fn record(
        &self,
        bookmark: &RawBookmark,
        folder_path: String,
        folder_order: usize,
        bookmark_index: usize,
    ) -> FlatRecord {
        let title = match bookmark.title.as_deref() {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => self.untitled_title.clone(),
        };
        FlatRecord {
            id: bookmark.id.clone(),
            title,
            url: bookmark.url.clone(),
            date_added: bookmark.date_added.unwrap_or(0),
            parent_id: bookmark.parent_id.clone(),
            folder_path,
            folder_order,
            bookmark_index,
            domain: extract_domain(&bookmark.url),
            favicon: favicon_for(&bookmark.url),
        }
    }
}
