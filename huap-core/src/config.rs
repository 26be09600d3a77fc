use serde::{Deserialize, Serialize};

use crate::arena::DEFAULT_CAPACITY;

/// Rendering settings shared by the build and serve modes.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SiteConfig {
    /// Layout file name, relative to the site root
    pub layout: String,
    /// Document served for `/` and for paths ending in `/`
    pub index: String,
    /// Per-document arena size in bytes
    pub arena_capacity: usize,
    /// syntect theme used to highlight fenced code blocks; off when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight_theme: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            layout: "layout.html".to_string(),
            index: "index".to_string(),
            arena_capacity: DEFAULT_CAPACITY,
            highlight_theme: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_table_keeps_defaults() {
        let config: SiteConfig =
            toml::from_str("layout = \"base.html\"\nhighlight_theme = \"InspiredGitHub\"\n").unwrap();
        assert_eq!(config.layout, "base.html");
        assert_eq!(config.highlight_theme.as_deref(), Some("InspiredGitHub"));
        assert_eq!(config.index, "index");
        assert_eq!(config.arena_capacity, DEFAULT_CAPACITY);
    }

    #[test]
    fn test_unset_theme_is_not_serialized() {
        let text = toml::to_string(&SiteConfig::default()).unwrap();
        assert!(text.contains("layout = \"layout.html\""));
        assert!(!text.contains("highlight_theme"));
        assert_eq!(toml::from_str::<SiteConfig>(&text).unwrap(), SiteConfig::default());
    }
}
