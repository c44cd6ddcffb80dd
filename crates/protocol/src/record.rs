use serde::{Deserialize, Serialize};

const FAVICON_SERVICE: &str = "https://www.google.com/s2/favicons";

/// Flattened, enriched view of one bookmark leaf.
///
/// Rebuilt wholesale on every flatten; never patched in place and never
/// pointing back into the raw tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatRecord {
    pub id: String,
    pub title: String,
    pub url: String,

    /// Milliseconds since the Unix epoch, `0` when the store did not report one.
    pub date_added: u64,

    pub parent_id: Option<String>,

    /// Ancestor folder titles joined by [`crate::FOLDER_PATH_SEPARATOR`].
    pub folder_path: String,

    /// Discovery rank of `folder_path` within the traversal that produced this record.
    pub folder_order: usize,

    /// Position among the immediate siblings (folders included).
    pub bookmark_index: usize,

    /// Lowercase host without a leading `www.`, or [`crate::UNKNOWN_DOMAIN`].
    pub domain: String,

    pub favicon: Option<FaviconRef>,
}

/// Opaque favicon handle; the render layer resolves it when it needs pixels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaviconRef(String);

impl FaviconRef {
    pub fn new(host: impl Into<String>) -> Self {
        Self(host.into())
    }

    pub fn host(&self) -> &str {
        &self.0
    }

    /// Icon url served by the public favicon service, `size` in pixels.
    pub fn service_url(&self, size: u32) -> String {
        format!("{FAVICON_SERVICE}?domain={}&sz={size}", self.0)
    }
}

/// Named, ordered bucket of records produced for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Stable identity the renderer can use to collapse/expand the group.
    pub key: String,
    pub title: String,
    pub order: usize,
    pub records: Vec<FlatRecord>,
}

impl Group {
    pub fn new(key: impl Into<String>, title: impl Into<String>, order: usize) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            order,
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
