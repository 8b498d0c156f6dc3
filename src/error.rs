//! Rich error types with intent for IDE-grade diagnostics
//!
//! Error types carry structured information, not just text. Expression
//! nodes arrive here as opaque generated code, so unlike parser errors
//! these carry no source spans; they identify the plugin and argument
//! instead.

use miette::Diagnostic;
use thiserror::Error;

/// A modifier compiler rejected an argument shape it cannot generate
/// code for. Fatal for the enclosing expression.
#[derive(Error, Debug, Diagnostic)]
#[error("Modifier `{modifier}` cannot compile argument {position}")]
#[diagnostic(code(malin::compile::bad_argument), help("{reason}"))]
pub struct CompileError {
    /// The modifier that rejected its arguments
    pub modifier: String,
    /// 1-based position of the offending argument
    pub position: usize,
    /// What the modifier would have accepted
    pub reason: String,
}

impl CompileError {
    pub fn new(modifier: impl Into<String>, position: usize, reason: impl Into<String>) -> Self {
        Self {
            modifier: modifier.into(),
            position,
            reason: reason.into(),
        }
    }
}

/// A render-time handler signalled failure. Surfaced through the render
/// context's caller, aborting that render.
#[derive(Error, Debug, Diagnostic)]
#[error("Handler `{handler}` failed: {message}")]
#[diagnostic(code(malin::render::handler))]
pub struct RenderError {
    /// Name the handler was registered under
    pub handler: String,
    /// Handler-provided failure description
    pub message: String,
}

impl RenderError {
    pub fn new(handler: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            message: message.into(),
        }
    }
}
