//! Compile-time input structures
//!
//! The external parser hands the compiler opaque generated-code strings
//! plus structured metadata: a modifier chain and an attribute map. The
//! attribute map is consumed read-only; recognized keys are split out
//! once instead of being deleted as they are read.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// An opaque generated-code representation of a value-producing
/// expression. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprNode(String);

impl ExprNode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_code(self) -> String {
        self.0
    }
}

impl fmt::Display for ExprNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExprNode {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

impl From<String> for ExprNode {
    fn from(code: String) -> Self {
        Self(code)
    }
}

/// One modifier invocation in a chain: `name:arg1:arg2`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifierCall {
    pub name: String,
    pub args: Vec<ExprNode>,
}

impl ModifierCall {
    pub fn new(name: impl Into<String>, args: impl IntoIterator<Item = ExprNode>) -> Self {
        Self {
            name: name.into(),
            args: args.into_iter().collect(),
        }
    }

    /// A bare invocation with no arguments
    pub fn bare(name: impl Into<String>) -> Self {
        Self::new(name, [])
    }
}

/// An attribute value: either an expression node or a bare flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Expr(ExprNode),
    Flag(bool),
}

/// The recognized/remaining split of an output tag's attribute map,
/// computed once from the immutable input.
#[derive(Debug, Clone, Default)]
pub struct OutputAttrs {
    /// Target variable expression; when present the compiler assigns
    /// instead of emitting
    pub assign: Option<ExprNode>,
    /// Exclude this expression from compiled-output caching (consumed
    /// by the external cache collaborator, not by code generation)
    pub nocache: bool,
    /// Skip every pipeline stage except the explicit modifier chain
    pub nofilter: bool,
    /// Everything the compiler does not recognize, in stable order
    pub rest: BTreeMap<String, AttrValue>,
}

impl OutputAttrs {
    /// Split a validated attribute map without mutating it.
    pub fn from_map(attrs: &HashMap<String, AttrValue>) -> Self {
        let mut out = Self::default();
        for (name, value) in attrs {
            match (name.as_str(), value) {
                ("assign", AttrValue::Expr(expr)) => out.assign = Some(expr.clone()),
                ("nocache", AttrValue::Flag(flag)) => out.nocache = *flag,
                ("nofilter", AttrValue::Flag(flag)) => out.nofilter = *flag,
                _ => {
                    out.rest.insert(name.clone(), value.clone());
                }
            }
        }
        out
    }
}
