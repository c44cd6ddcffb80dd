use crate::{Language, Theme, ViewMode};
use serde::{Deserialize, Serialize};

/// User preferences persisted by the caller.
///
/// The engine only consumes `view_mode`, `language` and `auto_refresh`; storage
/// of this struct belongs to whoever drives the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub theme: Theme,
    pub view_mode: ViewMode,
    pub language: Language,
    pub auto_refresh: bool,
    pub show_favicons: bool,
    /// Follow the desktop's light/dark preference instead of `theme`.
    pub auto_system_theme: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            view_mode: ViewMode::Grid,
            language: Language::Zh,
            auto_refresh: true,
            show_favicons: true,
            auto_system_theme: true,
        }
    }
}
