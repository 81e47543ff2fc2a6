//! JSX compilation
//!
//! Two entry points share one parser:
//! - [`compile_jsx`] is the hot path run on every debounced edit. It only
//!   reports a message on failure.
//! - [`validate_code`] is the diagnostics path. It maps the parser's error
//!   span back into the user's source so the editor can annotate a line.
//!
//! Both wrap the trimmed source in a synthetic fragment, so any number of
//! top-level elements is legal.

use oxc_allocator::Allocator;
use oxc_ast_visit::VisitMut;
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use oxc_span::SourceType;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::{PragmaSettings, DEFAULT_ELEMENT_PRAGMA, DEFAULT_FRAGMENT_PRAGMA};
use crate::error::{CompileError, SourceLocation};
use crate::jsx_lowerer::JsxLowerer;

const WRAP_OPEN: &str = "<>";
const WRAP_CLOSE: &str = "</>";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOptions {
    pub element_pragma: String,
    pub fragment_pragma: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            element_pragma: DEFAULT_ELEMENT_PRAGMA.to_string(),
            fragment_pragma: DEFAULT_FRAGMENT_PRAGMA.to_string(),
        }
    }
}

impl From<&PragmaSettings> for CompileOptions {
    fn from(pragma: &PragmaSettings) -> Self {
        Self {
            element_pragma: pragma.element.clone(),
            fragment_pragma: pragma.fragment.clone(),
        }
    }
}

fn wrap(source: &str) -> String {
    format!("{}{}{}", WRAP_OPEN, source.trim(), WRAP_CLOSE)
}

fn jsx_source_type() -> SourceType {
    SourceType::default().with_module(true).with_jsx(true)
}

/// Transform JSX source into a single call expression. Never evaluates.
pub fn compile_jsx(source: &str, options: &CompileOptions) -> Result<String, CompileError> {
    let wrapped = wrap(source);
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, &wrapped, jsx_source_type()).parse();

    if let Some(error) = ret.errors.first() {
        trace!("compile failed: {}", error.message);
        return Err(CompileError::new(error.message.to_string()));
    }

    let mut program = ret.program;
    let mut lowerer = JsxLowerer::new(
        &allocator,
        &options.element_pragma,
        &options.fragment_pragma,
    );
    lowerer.visit_program(&mut program);

    let code = Codegen::new().build(&program).code;
    Ok(code.trim().trim_end_matches(';').to_string())
}

/// Strict check used for editor annotations. Agrees with [`compile_jsx`] on
/// which inputs are invalid and adds a 1-based location when the parser
/// labels one.
pub fn validate_code(source: &str) -> Result<(), CompileError> {
    let wrapped = wrap(source);
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, &wrapped, jsx_source_type()).parse();

    let Some(error) = ret.errors.first() else {
        return Ok(());
    };

    let message = error.message.to_string();
    let offset = error
        .labels
        .as_ref()
        .and_then(|labels| labels.first())
        .map(|label| label.offset());

    Err(match offset {
        Some(offset) => CompileError::with_location(message, location_in_source(source, offset)),
        None => CompileError::new(message),
    })
}

/// Map a byte offset in the wrapped document back onto `source`
fn location_in_source(source: &str, wrapped_offset: usize) -> SourceLocation {
    let leading = source.len() - source.trim_start().len();
    let trimmed_len = source.trim().len();
    let inner = wrapped_offset
        .saturating_sub(WRAP_OPEN.len())
        .min(trimmed_len);
    let mut offset = leading + inner;
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }

    let before = &source[..offset];
    let line = before.matches('\n').count() as u32 + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = before[line_start..].chars().count() as u32 + 1;
    SourceLocation { line, column }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_first_line() {
        assert_eq!(
            location_in_source("<div>", 2 + 3),
            SourceLocation { line: 1, column: 4 }
        );
    }

    #[test]
    fn test_location_skips_leading_whitespace() {
        // wrapped: "<>" + "<a>\n<b" + "</>"
        let source = "\n\n  <a>\n<b";
        assert_eq!(
            location_in_source(source, 2 + 4),
            SourceLocation { line: 4, column: 1 }
        );
    }

    #[test]
    fn test_location_clamped_to_end() {
        let loc = location_in_source("<a>", 100);
        assert_eq!(loc, SourceLocation { line: 1, column: 4 });
    }
}
