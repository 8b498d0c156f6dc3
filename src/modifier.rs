//! Compile-time modifier plugins
//!
//! A modifier compiler rewrites one invocation of a named modifier into
//! inline generated code. It receives the raw argument expression list
//! — `args[0]` is the value being modified — and decides arity and
//! types itself. It never executes anything: a modifier that needs a
//! runtime decision must generate code containing a runtime
//! conditional, branching here only on *literal* argument text.

use crate::error::CompileError;
use crate::node::ExprNode;

/// A compile-time plugin for one modifier name
pub trait ModifierCompiler {
    /// Generate a single expression from the argument list.
    /// `args[0]` is the receiver value.
    fn compile(&self, args: &[ExprNode]) -> Result<String, CompileError>;
}

/// Fallback code generation for modifier names with no registered
/// compiler: a direct call with the receiver first and the invocation's
/// own arguments appended. This is the extensibility escape hatch.
pub fn direct_call(name: &str, args: &[ExprNode]) -> String {
    let args: Vec<_> = args.iter().map(|a| a.as_str()).collect();
    format!("{}({})", name, args.join(", "))
}

/// `count_characters` — counts characters in a text.
///
/// With a literal `true` second argument every character counts, which
/// needs a charset-aware length; otherwise whitespace is excluded.
/// The branch happens at compile time on the literal argument text.
pub struct CountChars {
    charset: String,
}

impl CountChars {
    pub fn new(charset: impl Into<String>) -> Self {
        Self {
            charset: charset.into(),
        }
    }
}

impl ModifierCompiler for CountChars {
    fn compile(&self, args: &[ExprNode]) -> Result<String, CompileError> {
        if args.len() > 2 {
            return Err(CompileError::new(
                "count_characters",
                3,
                "takes at most one argument (include_whitespace)",
            ));
        }
        match args.get(1).map(|a| a.as_str()) {
            Some("true") => Ok(format!("len_chars({}, {:?})", args[0], self.charset)),
            _ => Ok(format!("count_non_whitespace({})", args[0])),
        }
    }
}
