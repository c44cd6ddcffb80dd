use canvas_protocol::{FlatRecord, RawNode};
use serde::{Deserialize, Serialize};

/// Bookmarks added within this window count as recent (one week).
pub const RECENT_WINDOW_MS: u64 = 7 * 24 * 60 * 60 * 1000;

/// Summary counts for a tree snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeStats {
    pub total_bookmarks: usize,
    /// Every interior node, the root included.
    pub total_folders: usize,
    /// Bookmarks added strictly after `now - RECENT_WINDOW_MS`.
    pub recent_count: usize,
}

impl TreeStats {
    pub fn collect(root: &RawNode, now_unix_ms: u64) -> Self {
        let cutoff = now_unix_ms.saturating_sub(RECENT_WINDOW_MS);
        let mut stats = Self::default();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            match node {
                RawNode::Bookmark(bookmark) => {
                    stats.total_bookmarks += 1;
                    if bookmark.date_added.is_some_and(|added| added > cutoff) {
                        stats.recent_count += 1;
                    }
                }
                RawNode::Folder(folder) => {
                    stats.total_folders += 1;
                    stack.extend(folder.children.iter());
                }
            }
        }
        stats
    }
}

/// The `limit` most recently added records, newest first.
pub fn recent_bookmarks(records: &[FlatRecord], limit: usize) -> Vec<FlatRecord> {
    let mut sorted: Vec<&FlatRecord> = records.iter().collect();
    sorted.sort_by(|a, b| b.date_added.cmp(&a.date_added));
    sorted.into_iter().take(limit).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten;

    const NOW: u64 = 1_700_000_000_000;
    const DAY: u64 = 24 * 60 * 60 * 1000;

    fn tree() -> RawNode {
        RawNode::folder(
            "0",
            "",
            vec![
                RawNode::folder(
                    "1",
                    "Bar",
                    vec![
                        RawNode::bookmark("3", "fresh", "https://a.com").added_at(NOW - DAY),
                        RawNode::bookmark("4", "old", "https://b.com").added_at(NOW - 30 * DAY),
                    ],
                ),
                RawNode::folder("2", "Empty", vec![]),
                RawNode::bookmark("5", "undated", "https://c.com"),
            ],
        )
    }

    #[test]
    fn counts_bookmarks_folders_and_recent() {
        let stats = TreeStats::collect(&tree(), NOW);
        assert_eq!(
            stats,
            TreeStats {
                total_bookmarks: 3,
                total_folders: 3,
                recent_count: 1,
            }
        );
    }

    #[test]
    fn recent_bookmarks_sorts_newest_first_and_truncates() {
        let records = flatten(&tree());
        let recent = recent_bookmarks(&records, 2);
        let ids: Vec<&str> = recent.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "4"]);
    }
}
