//! Read-only import of a Chromium profile `Bookmarks` file.

use canvas_protocol::{RawBookmark, RawNode};
use serde::Deserialize;

/// Milliseconds between 1601-01-01 (the WebKit epoch) and 1970-01-01.
const WEBKIT_EPOCH_OFFSET_MS: u64 = 11_644_473_600_000;

#[derive(Debug, Deserialize)]
pub(crate) struct ChromiumFile {
    roots: ChromiumRoots,
}

#[derive(Debug, Deserialize)]
struct ChromiumRoots {
    bookmark_bar: Option<ChromiumNode>,
    other: Option<ChromiumNode>,
    synced: Option<ChromiumNode>,
}

#[derive(Debug, Deserialize)]
struct ChromiumNode {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    kind: String,
    url: Option<String>,
    date_added: Option<String>,
    #[serde(default)]
    children: Vec<ChromiumNode>,
}

impl ChromiumFile {
    /// Rebuild the getTree shape: an untitled root "0" over the profile roots.
    pub(crate) fn into_tree(self) -> RawNode {
        let ChromiumRoots {
            bookmark_bar,
            other,
            synced,
        } = self.roots;
        let children = [bookmark_bar, other, synced]
            .into_iter()
            .flatten()
            .map(convert)
            .collect();
        RawNode::folder("0", "", children)
    }
}

fn convert(node: ChromiumNode) -> RawNode {
    let date_added = node.date_added.as_deref().and_then(webkit_to_unix_ms);
    match node.url {
        Some(url) if node.kind != "folder" => RawNode::Bookmark(RawBookmark {
            id: node.id,
            title: Some(node.name),
            url,
            date_added,
            parent_id: None,
        }),
        _ => {
            let mut folder = RawNode::folder(
                node.id,
                node.name,
                node.children.into_iter().map(convert).collect(),
            );
            if let RawNode::Folder(inner) = &mut folder {
                inner.date_added = date_added;
            }
            folder
        }
    }
}

/// Chromium stores microseconds since 1601 as a decimal string.
pub(crate) fn webkit_to_unix_ms(raw: &str) -> Option<u64> {
    let micros: u64 = raw.trim().parse().ok()?;
    if micros == 0 {
        return None;
    }
    Some((micros / 1_000).saturating_sub(WEBKIT_EPOCH_OFFSET_MS))
}
