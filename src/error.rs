//! Error types for the playroom engine
//!
//! Three families, matching where a failure is recovered:
//! - [`PlayroomError`]: configuration, storage and IO. Fatal at startup or
//!   logged by the session, never shown inside a frame.
//! - [`CompileError`]: JSX syntax problems, surfaced next to the editor.
//! - [`EvalError`]: failures while evaluating compiled code or rendering
//!   components, caught per frame.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`PlayroomError`]
pub type Result<T> = std::result::Result<T, PlayroomError>;

#[derive(Debug, Error)]
pub enum PlayroomError {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("'{name}' is reserved by the JSX pragma and cannot be provided in scope")]
    ReservedIdentifier { name: String },

    // ─────────────────────────────────────────────────────────────
    // Storage Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Unsupported in this environment: {0}")]
    Unsupported(String),
}

impl PlayroomError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

/// 1-based position inside the user's source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct CompileError {
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    pub fn with_location(message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            message: message.into(),
            location: Some(location),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("SyntaxError: {0}")]
    Syntax(String),

    #[error("ReferenceError: {0} is not defined")]
    Reference(String),

    #[error("TypeError: {0}")]
    Type(String),

    #[error("RangeError: {0}")]
    Range(String),

    #[error("Unsupported syntax: {0}")]
    Unsupported(String),

    #[error("{component}: {message}")]
    Component { component: String, message: String },

    #[error("RangeError: Maximum render depth of {0} exceeded")]
    DepthExceeded(usize),

    /// Raised by `?.` on a nullish base and caught at the enclosing chain
    #[error("optional chain short-circuit")]
    ShortCircuit,
}

impl EvalError {
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Type(message.into())
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        Self::Range(message.into())
    }

    pub fn component(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}
