//! Editor state store
//!
//! A reducer-style state machine: [`update`] applies an [`Action`] to the
//! [`EditorState`] synchronously and returns the [`Effect`]s the session
//! must carry out (debounced renders, persistence, frame reconciliation).

mod action;
mod state;
mod update;

pub use action::{Action, Effect};
pub use state::{
    CursorPosition, EditorOrientation, EditorPosition, EditorState, FrameErrorReport,
    PersistSnapshot, StatusMessage, StatusTone, ToolbarPanel,
};
pub use update::update;
