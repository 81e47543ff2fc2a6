//! The reducer

use tracing::trace;

use super::action::{Action, Effect};
use super::state::{EditorState, FrameErrorReport};

/// Apply `action` to `state`. Editor text changes take effect immediately;
/// everything expensive is returned as an [`Effect`].
pub fn update(state: &mut EditorState, action: Action) -> Vec<Effect> {
    trace!("update: {:?}", action);
    match action {
        Action::UpdateCode(code) => {
            if state.code == code {
                return Vec::new();
            }
            state.code = code.clone();
            vec![
                Effect::ScheduleRender(code),
                Effect::SchedulePersist(state.snapshot()),
            ]
        }

        Action::UpdateCursorPosition(position) => {
            state.cursor_position = position;
            Vec::new()
        }

        Action::UpdateEditorPosition(position) => {
            state.editor_position = position;
            vec![Effect::SchedulePersist(state.snapshot())]
        }

        Action::UpdateEditorWidth(width) => {
            state.editor_width = width;
            vec![Effect::SchedulePersist(state.snapshot())]
        }

        Action::UpdateEditorHeight(height) => {
            state.editor_height = height;
            vec![Effect::SchedulePersist(state.snapshot())]
        }

        Action::ShowEditor => {
            state.editor_hidden = false;
            Vec::new()
        }

        Action::HideEditor => {
            state.editor_hidden = true;
            state.active_toolbar_panel = None;
            Vec::new()
        }

        Action::ToggleToolbar(panel) => {
            state.active_toolbar_panel = if state.active_toolbar_panel == Some(panel) {
                None
            } else {
                Some(panel)
            };
            Vec::new()
        }

        Action::CloseToolbar => {
            state.active_toolbar_panel = None;
            Vec::new()
        }

        Action::UpdateTitle(title) => {
            let title = title.trim();
            state.title = if title.is_empty() {
                None
            } else {
                Some(title.to_string())
            };
            Vec::new()
        }

        Action::OpenPlayroom(shared) => {
            state.code = shared.code.clone();
            if let Some(themes) = shared.themes {
                state.selected_themes = themes;
            } else if let Some(theme) = shared.theme {
                state.selected_themes = vec![theme];
            }
            if let Some(widths) = shared.widths {
                state.selected_widths = widths;
            }
            if shared.title.is_some() {
                state.title = shared.title;
            }
            state.compile_error = None;
            state.error_message = None;
            vec![
                Effect::SyncFrames,
                Effect::RenderNow(shared.code),
                Effect::SchedulePersist(state.snapshot()),
            ]
        }

        Action::UpdateVisibleThemes(themes) => {
            state.selected_themes = themes;
            vec![Effect::SyncFrames]
        }

        Action::ResetVisibleThemes => {
            state.selected_themes.clear();
            vec![Effect::SyncFrames]
        }

        Action::UpdateVisibleWidths(widths) => {
            state.selected_widths = widths;
            vec![Effect::SyncFrames]
        }

        Action::ResetVisibleWidths => {
            state.selected_widths.clear();
            vec![Effect::SyncFrames]
        }

        Action::SetCompileError(error) => {
            state.compile_error = error;
            Vec::new()
        }

        Action::ReportFrameError {
            message,
            delay_visibility,
        } => {
            state.error_message = if message.is_empty() {
                None
            } else {
                Some(FrameErrorReport {
                    message,
                    delay_visibility,
                })
            };
            Vec::new()
        }

        Action::ResetErrorMessage => {
            state.error_message = None;
            Vec::new()
        }

        Action::DisplayStatusMessage(status) => {
            state.status_message = Some(status);
            Vec::new()
        }

        Action::DismissStatusMessage => {
            state.status_message = None;
            Vec::new()
        }
    }
}
