//! Tree lookups and edits shared by bookmark store implementations.

use canvas_protocol::RawNode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed(RawNode),
    NotFound,
    /// The target is a folder that still has children.
    NotEmpty,
}

pub fn find_node_mut<'a>(root: &'a mut RawNode, id: &str) -> Option<&'a mut RawNode> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.id() == id {
            return Some(node);
        }
        if let RawNode::Folder(folder) = node {
            stack.extend(folder.children.iter_mut());
        }
    }
    None
}

/// The root and its direct children are fixed by the browser.
pub fn is_protected(root: &RawNode, id: &str) -> bool {
    root.id() == id
        || root
            .children()
            .is_some_and(|children| children.iter().any(|child| child.id() == id))
}

/// Detach the node `id` from its parent folder.
pub fn remove_node(root: &mut RawNode, id: &str) -> RemoveOutcome {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let RawNode::Folder(folder) = node else {
            continue;
        };
        if let Some(pos) = folder.children.iter().position(|child| child.id() == id) {
            let occupied = folder.children[pos]
                .children()
                .is_some_and(|children| !children.is_empty());
            if occupied {
                return RemoveOutcome::NotEmpty;
            }
            return RemoveOutcome::Removed(folder.children.remove(pos));
        }
        stack.extend(folder.children.iter_mut());
    }
    RemoveOutcome::NotFound
}

/// One past the largest numeric id in the tree.
pub fn next_id(root: &RawNode) -> String {
    let mut max = 0u64;
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if let Ok(value) = node.id().parse::<u64>() {
            max = max.max(value);
        }
        if let Some(children) = node.children() {
            stack.extend(children.iter());
        }
    }
    max.saturating_add(1).to_string()
}

/// Bookmark leaves whose title or url contains every whitespace-separated
/// term of `query`, case-insensitively, in document order.
pub fn search_nodes(root: &RawNode, query: &str) -> Vec<RawNode> {
    let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
    if terms.is_empty() {
        return Vec::new();
    }

    let mut hits = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        match node {
            RawNode::Bookmark(bookmark) => {
                let title = bookmark.title.as_deref().unwrap_or("").to_lowercase();
                let url = bookmark.url.to_lowercase();
                if terms
                    .iter()
                    .all(|term| title.contains(term.as_str()) || url.contains(term.as_str()))
                {
                    hits.push(node.clone());
                }
            }
            RawNode::Folder(folder) => stack.extend(folder.children.iter().rev()),
        }
    }
    hits
}
