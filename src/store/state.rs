//! Editor state types

use serde::{Deserialize, Serialize};

use crate::config::PlayroomConfig;
use crate::error::CompileError;
use crate::frame_set::{derive_frames, RenderTarget, Width};

/// Where the editor is docked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorPosition {
    Left,
    Right,
    Bottom,
    Undocked,
}

impl EditorPosition {
    pub fn orientation(&self) -> EditorOrientation {
        match self {
            EditorPosition::Left | EditorPosition::Right => EditorOrientation::Vertical,
            EditorPosition::Bottom | EditorPosition::Undocked => EditorOrientation::Horizontal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorOrientation {
    /// Side-docked; sized by width
    Vertical,
    /// Bottom-docked or undocked; sized by height
    Horizontal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub line: u32,
    pub ch: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolbarPanel {
    Frames,
    Snippets,
    Preview,
    Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusTone {
    Positive,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub message: String,
    pub tone: StatusTone,
}

/// Frame error as shown in the banner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameErrorReport {
    pub message: String,
    pub delay_visibility: bool,
}

/// What gets written to the persisted store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistSnapshot {
    pub code: String,
    pub editor_position: EditorPosition,
    pub editor_width: u32,
    pub editor_height: u32,
    pub editor_orientation: EditorOrientation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditorState {
    pub code: String,
    pub cursor_position: CursorPosition,
    pub editor_position: EditorPosition,
    pub editor_width: u32,
    pub editor_height: u32,
    pub editor_hidden: bool,
    pub active_toolbar_panel: Option<ToolbarPanel>,
    pub title: Option<String>,
    /// Empty means every configured theme
    pub selected_themes: Vec<String>,
    /// Empty means every available width
    pub selected_widths: Vec<Width>,
    pub compile_error: Option<CompileError>,
    pub error_message: Option<FrameErrorReport>,
    pub status_message: Option<StatusMessage>,
    /// Set once the initial load has finished
    pub ready: bool,

    available_themes: Vec<String>,
    available_widths: Vec<Width>,
}

impl EditorState {
    pub fn from_config(config: &PlayroomConfig) -> Self {
        Self {
            code: config.example_code.clone(),
            cursor_position: CursorPosition::default(),
            editor_position: config.editor.default_position,
            editor_width: config.editor.default_width,
            editor_height: config.editor.default_height,
            editor_hidden: false,
            active_toolbar_panel: None,
            title: config.title.clone(),
            selected_themes: config.default_visible_themes.clone(),
            selected_widths: config
                .default_visible_widths
                .iter()
                .copied()
                .map(Width::Px)
                .collect(),
            compile_error: None,
            error_message: None,
            status_message: None,
            ready: false,
            available_themes: config.themes.clone(),
            available_widths: config.available_widths(),
        }
    }

    pub fn orientation(&self) -> EditorOrientation {
        self.editor_position.orientation()
    }

    /// Width when side-docked, height otherwise
    pub fn active_size(&self) -> u32 {
        match self.orientation() {
            EditorOrientation::Vertical => self.editor_width,
            EditorOrientation::Horizontal => self.editor_height,
        }
    }

    pub fn render_targets(&self) -> Vec<RenderTarget> {
        derive_frames(
            &self.selected_themes,
            &self.selected_widths,
            &self.available_themes,
            &self.available_widths,
        )
    }

    pub fn snapshot(&self) -> PersistSnapshot {
        PersistSnapshot {
            code: self.code.clone(),
            editor_position: self.editor_position,
            editor_width: self.editor_width,
            editor_height: self.editor_height,
            editor_orientation: self.orientation(),
        }
    }
}
