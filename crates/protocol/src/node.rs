use serde::{Deserialize, Serialize};

/// Node of the externally-owned bookmark tree, as returned by a store's
/// `getTree`. Exactly one of `url` (leaf) or `children` (folder) is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawNode {
    Bookmark(RawBookmark),
    Folder(RawFolder),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBookmark {
    pub id: String,

    /// Missing or empty titles are replaced by a placeholder when flattened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    pub url: String,

    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFolder {
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    pub children: Vec<RawNode>,
}

impl RawNode {
    pub fn bookmark(id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self::Bookmark(RawBookmark {
            id: id.into(),
            title: Some(title.into()),
            url: url.into(),
            date_added: None,
            parent_id: None,
        })
    }

    pub fn folder(id: impl Into<String>, title: impl Into<String>, children: Vec<RawNode>) -> Self {
        let id = id.into();
        let children = children
            .into_iter()
            .map(|mut child| {
                child.set_parent_id(id.clone());
                child
            })
            .collect();
        Self::Folder(RawFolder {
            id,
            title: title.into(),
            date_added: None,
            parent_id: None,
            children,
        })
    }

    /// Builder helper for fixtures: sets `date_added` on either variant.
    #[must_use]
    pub fn added_at(mut self, unix_ms: u64) -> Self {
        match &mut self {
            Self::Bookmark(b) => b.date_added = Some(unix_ms),
            Self::Folder(f) => f.date_added = Some(unix_ms),
        }
        self
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Bookmark(b) => &b.id,
            Self::Folder(f) => &f.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Bookmark(b) => b.title.as_deref().unwrap_or(""),
            Self::Folder(f) => &f.title,
        }
    }

    pub fn parent_id(&self) -> Option<&str> {
        match self {
            Self::Bookmark(b) => b.parent_id.as_deref(),
            Self::Folder(f) => f.parent_id.as_deref(),
        }
    }

    pub fn set_parent_id(&mut self, parent_id: String) {
        match self {
            Self::Bookmark(b) => b.parent_id = Some(parent_id),
            Self::Folder(f) => f.parent_id = Some(parent_id),
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Bookmark(b) => Some(&b.url),
            Self::Folder(_) => None,
        }
    }

    pub fn children(&self) -> Option<&[RawNode]> {
        match self {
            Self::Bookmark(_) => None,
            Self::Folder(f) => Some(&f.children),
        }
    }

    pub const fn is_folder(&self) -> bool {
        matches!(self, Self::Folder(_))
    }
}
