//! Render failure boundary
//!
//! [`CodeRenderer`] evaluates one code string per call. When evaluation
//! fails it reports the message once and keeps showing the output of the
//! last code that succeeded. Any change of code resets the boundary before
//! the new code is attempted.

use tracing::debug;

use crate::error::EvalError;
use crate::interpreter::evaluate;
use crate::render::{render_value, RenderTree};
use crate::scope::EvalScope;

/// Evaluate and materialize `code` with no boundary
pub fn render_code(code: &str, scope: &EvalScope) -> Result<RenderTree, EvalError> {
    let value = evaluate(code, scope)?;
    render_value(&value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryState {
    Clean,
    /// Showing the last good output in place of the failing code
    Erroring,
}

#[derive(Debug)]
pub struct CodeRenderer {
    last_good: Option<String>,
    reset_key: Option<String>,
    state: BoundaryState,
}

impl Default for CodeRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeRenderer {
    pub fn new() -> Self {
        Self {
            last_good: None,
            reset_key: None,
            state: BoundaryState::Clean,
        }
    }

    pub fn state(&self) -> BoundaryState {
        self.state
    }

    pub fn last_good(&self) -> Option<&str> {
        self.last_good.as_deref()
    }

    pub fn render(
        &mut self,
        code: &str,
        scope: &EvalScope,
        on_error: &mut dyn FnMut(&str),
    ) -> RenderTree {
        if self.reset_key.as_deref() != Some(code) {
            if self.state == BoundaryState::Erroring {
                self.state = BoundaryState::Clean;
                on_error("");
            }
            self.reset_key = Some(code.to_string());
        } else if self.state == BoundaryState::Erroring {
            return self.fallback(scope);
        }

        match render_code(code, scope) {
            Ok(tree) => {
                self.last_good = Some(code.to_string());
                tree
            }
            Err(e) => {
                debug!("Render failed, freezing on last good output: {}", e);
                self.state = BoundaryState::Erroring;
                on_error(&e.to_string());
                self.fallback(scope)
            }
        }
    }

    fn fallback(&self, scope: &EvalScope) -> RenderTree {
        self.last_good
            .as_deref()
            .and_then(|code| render_code(code, scope).ok())
            .unwrap_or_default()
    }
}
