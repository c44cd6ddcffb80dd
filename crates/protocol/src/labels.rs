use crate::Language;

/// Localized strings the engine bakes into its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Labels {
    /// Folder-category bucket for records with an empty folder path.
    pub other_bookmarks: &'static str,
    pub recently_added: &'static str,
    pub all_bookmarks: &'static str,
    /// Placeholder title for untitled leaves.
    pub untitled_bookmark: &'static str,
}

impl Labels {
    pub const ZH: Self = Self {
        other_bookmarks: "其他书签",
        recently_added: "最近添加",
        all_bookmarks: "所有书签",
        untitled_bookmark: "未命名书签",
    };

    pub const EN: Self = Self {
        other_bookmarks: "Other Bookmarks",
        recently_added: "Recently Added",
        all_bookmarks: "All Bookmarks",
        untitled_bookmark: "Untitled bookmark",
    };

    pub const fn for_language(language: Language) -> Self {
        match language {
            Language::Zh => Self::ZH,
            Language::En => Self::EN,
        }
    }
}

impl Default for Labels {
    fn default() -> Self {
        Self::for_language(Language::default())
    }
}
