//! Actions dispatched to the store and the effects they produce

use crate::error::CompileError;
use crate::frame_set::Width;
use crate::url_state::SharedState;

use super::state::{CursorPosition, EditorPosition, PersistSnapshot, StatusMessage, ToolbarPanel};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // ─────────────────────────────────────────────────────────────
    // Editor
    // ─────────────────────────────────────────────────────────────
    /// Keystroke-level code change
    UpdateCode(String),
    UpdateCursorPosition(CursorPosition),
    UpdateEditorPosition(EditorPosition),
    UpdateEditorWidth(u32),
    UpdateEditorHeight(u32),
    ShowEditor,
    HideEditor,

    // ─────────────────────────────────────────────────────────────
    // Chrome
    // ─────────────────────────────────────────────────────────────
    ToggleToolbar(ToolbarPanel),
    CloseToolbar,
    UpdateTitle(String),
    /// Load a shared playroom, replacing the current code
    OpenPlayroom(SharedState),

    // ─────────────────────────────────────────────────────────────
    // Frame filters
    // ─────────────────────────────────────────────────────────────
    UpdateVisibleThemes(Vec<String>),
    ResetVisibleThemes,
    UpdateVisibleWidths(Vec<Width>),
    ResetVisibleWidths,

    // ─────────────────────────────────────────────────────────────
    // Errors & status
    // ─────────────────────────────────────────────────────────────
    SetCompileError(Option<CompileError>),
    ReportFrameError {
        message: String,
        delay_visibility: bool,
    },
    ResetErrorMessage,
    DisplayStatusMessage(StatusMessage),
    DismissStatusMessage,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Re-render the frames after the render debounce
    ScheduleRender(String),
    /// Re-render the frames immediately, dropping any pending render
    RenderNow(String),
    /// Write the snapshot after the persist debounce
    SchedulePersist(PersistSnapshot),
    /// Reconcile frames with the current visibility filters
    SyncFrames,
}
