//! Playroom configuration
//!
//! Loaded once from `playroom.toml` (or built in code), validated, then shared
//! behind an `Arc` for the lifetime of the session. Nothing re-reads it.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::error::{PlayroomError, Result};
use crate::frame::{default_frame_src, FrameSrcParams};
use crate::frame_set::Width;
use crate::store::EditorPosition;

lazy_static! {
    pub(crate) static ref IDENTIFIER_RE: Regex =
        Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap();
}

pub const DEFAULT_ELEMENT_PRAGMA: &str = "__playroomCreateElement";
pub const DEFAULT_FRAGMENT_PRAGMA: &str = "__playroomFragment";

/// Where share-link parameters live in a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    Hash,
    Search,
}

/// Replaces the default frame document URL builder
#[derive(Clone)]
pub struct FrameSrcFn(pub Arc<dyn Fn(&FrameSrcParams<'_>) -> String + Send + Sync>);

impl fmt::Debug for FrameSrcFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FrameSrcFn(..)")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayroomConfig {
    #[serde(default)]
    pub title: Option<String>,

    /// Namespaces the persisted store so several playrooms can share an origin
    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    #[serde(default = "default_widths")]
    pub widths: Vec<u32>,

    /// Theme names; empty means a single unthemed frame per width
    #[serde(default)]
    pub themes: Vec<String>,

    #[serde(default)]
    pub default_visible_themes: Vec<String>,

    #[serde(default)]
    pub default_visible_widths: Vec<u32>,

    #[serde(default)]
    pub base_url: String,

    #[serde(default)]
    pub params_type: ParamType,

    /// Read initial state from the share URL when one is supplied
    #[serde(default = "default_true")]
    pub decode_url_state: bool,

    #[serde(default)]
    pub example_code: String,

    #[serde(default)]
    pub editor: EditorSettings,

    #[serde(default)]
    pub timing: TimingSettings,

    #[serde(default)]
    pub pragma: PragmaSettings,

    #[serde(skip)]
    pub frame_src: Option<FrameSrcFn>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EditorSettings {
    #[serde(default = "default_position")]
    pub default_position: EditorPosition,

    #[serde(default = "default_editor_width")]
    pub default_width: u32,

    #[serde(default = "default_editor_height")]
    pub default_height: u32,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            default_position: default_position(),
            default_width: default_editor_width(),
            default_height: default_editor_height(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimingSettings {
    /// Quiet period before a code change fans out to the frames
    #[serde(default = "default_render_debounce_ms")]
    pub render_debounce_ms: u64,

    /// Quiet period before the session snapshot is written
    #[serde(default = "default_persist_debounce_ms")]
    pub persist_debounce_ms: u64,

    /// How long a soft frame error waits before it becomes visible
    #[serde(default = "default_error_grace_ms")]
    pub error_grace_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            render_debounce_ms: default_render_debounce_ms(),
            persist_debounce_ms: default_persist_debounce_ms(),
            error_grace_ms: default_error_grace_ms(),
        }
    }
}

/// Identifiers substituted for JSX syntax during compilation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PragmaSettings {
    #[serde(default = "default_element_pragma")]
    pub element: String,

    #[serde(default = "default_fragment_pragma")]
    pub fragment: String,
}

impl Default for PragmaSettings {
    fn default() -> Self {
        Self {
            element: default_element_pragma(),
            fragment: default_fragment_pragma(),
        }
    }
}

impl PragmaSettings {
    pub fn reserved_names(&self) -> [&str; 2] {
        [&self.element, &self.fragment]
    }
}

fn default_storage_key() -> String {
    "playroom".to_string()
}

fn default_widths() -> Vec<u32> {
    vec![320, 768, 1024, 1440]
}

fn default_true() -> bool {
    true
}

fn default_position() -> EditorPosition {
    EditorPosition::Bottom
}

fn default_editor_width() -> u32 {
    600
}

fn default_editor_height() -> u32 {
    300
}

fn default_render_debounce_ms() -> u64 {
    100
}

fn default_persist_debounce_ms() -> u64 {
    500
}

fn default_error_grace_ms() -> u64 {
    500
}

fn default_element_pragma() -> String {
    DEFAULT_ELEMENT_PRAGMA.to_string()
}

fn default_fragment_pragma() -> String {
    DEFAULT_FRAGMENT_PRAGMA.to_string()
}

impl Default for PlayroomConfig {
    fn default() -> Self {
        Self {
            title: None,
            storage_key: default_storage_key(),
            widths: default_widths(),
            themes: Vec::new(),
            default_visible_themes: Vec::new(),
            default_visible_widths: Vec::new(),
            base_url: String::new(),
            params_type: ParamType::default(),
            decode_url_state: true,
            example_code: String::new(),
            editor: EditorSettings::default(),
            timing: TimingSettings::default(),
            pragma: PragmaSettings::default(),
            frame_src: None,
        }
    }
}

impl PlayroomConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants every other component relies on
    pub fn validate(&self) -> Result<()> {
        if self.storage_key.trim().is_empty() {
            return Err(PlayroomError::config("storage_key must not be empty"));
        }
        if self.widths.is_empty() {
            return Err(PlayroomError::config("at least one width is required"));
        }
        let mut seen = HashSet::new();
        for width in &self.widths {
            if *width == 0 {
                return Err(PlayroomError::config("widths must be greater than zero"));
            }
            if !seen.insert(*width) {
                return Err(PlayroomError::config(format!("duplicate width {}", width)));
            }
        }
        let mut seen = HashSet::new();
        for theme in &self.themes {
            if !seen.insert(theme.as_str()) {
                return Err(PlayroomError::config(format!("duplicate theme '{}'", theme)));
            }
        }
        for name in self.pragma.reserved_names() {
            if !IDENTIFIER_RE.is_match(name) {
                return Err(PlayroomError::config(format!(
                    "pragma '{}' is not a valid identifier",
                    name
                )));
            }
        }
        if self.pragma.element == self.pragma.fragment {
            return Err(PlayroomError::config(
                "element and fragment pragmas must differ",
            ));
        }
        Ok(())
    }

    pub fn with_frame_src<F>(mut self, f: F) -> Self
    where
        F: Fn(&FrameSrcParams<'_>) -> String + Send + Sync + 'static,
    {
        self.frame_src = Some(FrameSrcFn(Arc::new(f)));
        self
    }

    /// Builds the URL a frame loads for `theme` and compiled `code`
    pub fn frame_src_for(&self, theme_name: Option<&str>, code: &str) -> String {
        let params = FrameSrcParams { theme_name, code };
        match &self.frame_src {
            Some(custom) => (custom.0)(&params),
            None => default_frame_src(&self.base_url, self.params_type, &params),
        }
    }

    /// Configured pixel widths followed by the synthetic "Fit to window"
    pub fn available_widths(&self) -> Vec<Width> {
        let mut widths: Vec<Width> = self.widths.iter().copied().map(Width::Px).collect();
        widths.push(Width::Fit);
        widths
    }

    pub fn storage_namespace(&self) -> String {
        format!("playroom-{}", self.storage_key)
    }
}

/// Load and validate `path`
pub fn load_config(path: &Path) -> Result<PlayroomConfig> {
    if !path.exists() {
        return Err(PlayroomError::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    let config = PlayroomConfig::from_toml_str(&content)?;
    debug!(
        "Loaded playroom config from {} ({} widths, {} themes)",
        path.display(),
        config.widths.len(),
        config.themes.len()
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = PlayroomConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timing.render_debounce_ms, 100);
        assert_eq!(config.timing.persist_debounce_ms, 500);
        assert_eq!(config.storage_namespace(), "playroom-playroom");
    }

    #[test]
    fn test_from_toml_custom() {
        let content = r#"
storage_key = "docs"
widths = [375, 1200]
themes = ["light", "dark"]
params_type = "search"

[editor]
default_position = "right"

[timing]
render_debounce_ms = 50
"#;
        let config = PlayroomConfig::from_toml_str(content).unwrap();
        assert_eq!(config.widths, vec![375, 1200]);
        assert_eq!(config.themes, vec!["light", "dark"]);
        assert_eq!(config.params_type, ParamType::Search);
        assert_eq!(config.editor.default_position, EditorPosition::Right);
        assert_eq!(config.timing.render_debounce_ms, 50);
        assert_eq!(config.timing.persist_debounce_ms, 500);
    }

    #[test]
    fn test_validate_rejects_empty_widths() {
        let result = PlayroomConfig::from_toml_str("widths = []");
        assert!(matches!(result, Err(PlayroomError::Config { .. })));
    }

    #[test]
    fn test_validate_rejects_duplicate_theme() {
        let config = PlayroomConfig {
            themes: vec!["dark".into(), "dark".into()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_pragma() {
        let mut config = PlayroomConfig::default();
        config.pragma.element = "React.createElement".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_available_widths_end_with_fit() {
        let config = PlayroomConfig {
            widths: vec![320, 768],
            ..Default::default()
        };
        assert_eq!(
            config.available_widths(),
            vec![Width::Px(320), Width::Px(768), Width::Fit]
        );
    }

    #[test]
    fn test_frame_src_override() {
        let config = PlayroomConfig::default()
            .with_frame_src(|p| format!("custom://{}", p.theme_name.unwrap_or("none")));
        assert_eq!(config.frame_src_for(Some("dark"), "x"), "custom://dark");
    }

    #[test]
    fn test_load_config_missing_file() {
        let temp = TempDir::new().unwrap();
        let result = load_config(&temp.path().join("playroom.toml"));
        assert!(matches!(result, Err(PlayroomError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_load_config_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("playroom.toml");
        std::fs::write(&path, "title = \"Docs\"\nexample_code = \"<Button />\"\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.title.as_deref(), Some("Docs"));
        assert_eq!(config.example_code, "<Button />");
    }
}
