//! # Playroom Native
//!
//! Live JSX playground engine: compiles snippet code, evaluates it against a
//! component scope and renders it into a set of isolated frames, one per
//! visible (theme, width) pair.
//!
//! ## Pipeline
//!
//! 1. **Compile**: `compile_jsx` wraps the snippet in a fragment and lowers
//!    JSX into pragma calls. Compilation never evaluates.
//! 2. **Fan out**: `FrameSet` compiles once per code change and navigates
//!    every frame to a location carrying the theme and compiled code.
//! 3. **Render**: each frame task evaluates the code against its scope
//!    behind a `CodeRenderer`, which freezes on the last good output while
//!    code fails and reports errors to the parent as posted messages.
//! 4. **Session**: `PlayroomSession` drives the editor store, debounces
//!    renders and persistence, and restores state from share links or the
//!    persisted store.

#[cfg(feature = "napi")]
use napi_derive::napi;

mod boundary;
mod builtins;
mod cache;
mod compiler;
mod config;
mod debounce;
mod error;
mod frame;
mod frame_set;
mod interpreter;
mod jsx_lowerer;
pub mod logging;
mod message;
mod render;
mod scope;
mod session;
mod storage;
pub mod store;
mod url_state;
mod value;

#[cfg(test)]
mod boundary_tests;
#[cfg(test)]
mod compiler_tests;
#[cfg(test)]
mod interpreter_tests;
#[cfg(test)]
mod session_tests;

pub use boundary::{render_code, BoundaryState, CodeRenderer};
pub use cache::CompileCache;
pub use compiler::{compile_jsx, validate_code, CompileOptions};
pub use config::{
    load_config, EditorSettings, FrameSrcFn, ParamType, PlayroomConfig, PragmaSettings, TimingSettings,
};
pub use debounce::Debouncer;
pub use error::{CompileError, EvalError, PlayroomError, Result, SourceLocation};
pub use frame::{
    default_frame_src, parse_frame_src, FrameController, FrameDocument, FrameOutput,
    FrameRuntime, FrameSrcParams, HtmlSnapshotSink, LazyLoad, ScreenshotSink,
    UnsupportedScreenshots,
};
pub use frame_set::{derive_frames, FrameErrorState, FrameKey, FrameSet, RenderTarget, Width};
pub use interpreter::evaluate;
pub use message::{FrameMessage, ScreenshotAction};
pub use render::{render_value, RenderNode, RenderTree};
pub use scope::{ComponentRegistry, EvalScope, Export, ScopeBuilder, ScopeFactory};
pub use session::{PlayroomSession, SessionEvent};
pub use storage::{FileStore, KeyValueStore, MemoryStore, SessionStore, StoredSession};
pub use url_state::{create_preview_url, create_url, decode_state, decode_url, encode_state, SharedState};
pub use value::{Component, ComponentRef, Element, ElementKind, Function, NativeFunction, Props, Value};

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI BINDINGS
// ═══════════════════════════════════════════════════════════════════════════════

/// Editor annotation for invalid code
#[derive(Debug, Clone)]
#[cfg_attr(feature = "napi", napi(object))]
pub struct CodeDiagnostic {
    pub message: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl From<CompileError> for CodeDiagnostic {
    fn from(error: CompileError) -> Self {
        Self {
            message: error.message,
            line: error.location.map(|l| l.line),
            column: error.location.map(|l| l.column),
        }
    }
}

#[cfg(feature = "napi")]
#[napi]
pub fn compile_jsx_native(source: String) -> napi::Result<String> {
    compile_jsx(&source, &CompileOptions::default()).map_err(|e| napi::Error::from_reason(e.message))
}

#[cfg(feature = "napi")]
#[napi]
pub fn validate_code_native(source: String) -> Option<CodeDiagnostic> {
    validate_code(&source).err().map(CodeDiagnostic::from)
}

#[cfg(feature = "napi")]
#[napi]
pub fn create_share_url_native(base_url: String, use_hash: bool, state_json: String) -> napi::Result<String> {
    let state: SharedState =
        serde_json::from_str(&state_json).map_err(|e| napi::Error::from_reason(e.to_string()))?;
    let params_type = if use_hash { ParamType::Hash } else { ParamType::Search };
    Ok(create_url(&base_url, params_type, &state))
}
