//! Output expression compiler
//!
//! Turns a parsed expression plus its modifier chain and attributes
//! into generated code: an assignment when `assign` is present, an emit
//! statement otherwise. Emission runs the full filter pipeline in a
//! fixed stage order:
//!
//! 1. explicit per-expression modifier chain
//! 2. engine-wide default-modifier chain (tokenized once, memoized)
//! 3. autoescape transform
//! 4. engine-wide registered render-time filters, in registration order
//! 5. compiler-instance-local filters, in registration order
//!
//! `nofilter` skips stages 2-5, never stage 1. The stage order is never
//! reordered; reordering silently breaks autoescaping.

use crate::modifier::{direct_call, ModifierCompiler};
use crate::node::{ExprNode, ModifierCall, OutputAttrs};
use crate::registry::Registry;
use miette::Result;

/// How a registered render-time filter is invoked by generated code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterRef {
    /// Free function: `name(value, ctx)`
    Free(String),
    /// Method on a filter object held in the registry:
    /// `filters["key"].method(value, ctx)`
    Bound { key: String, method: String },
    /// Associated function: `path::method(value, ctx)`
    Static { path: String, method: String },
}

impl FilterRef {
    /// Wrap `value` in the generated call for this filter shape. The
    /// filter itself runs at render time; only the call is emitted here.
    fn wrap(&self, value: String) -> String {
        match self {
            FilterRef::Free(name) => format!("{name}({value}, ctx)"),
            FilterRef::Bound { key, method } => {
                format!("filters[{key:?}].{method}({value}, ctx)")
            }
            FilterRef::Static { path, method } => format!("{path}::{method}({value}, ctx)"),
        }
    }
}

/// Engine-wide compilation settings
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Default-modifier specs, each `name:arg:arg` with quoted
    /// segments preserved verbatim
    pub default_modifiers: Vec<String>,
    /// Autoescape every emitted expression as HTML
    pub escape_html: bool,
    /// Active character set for escaping and length computations
    pub charset: String,
    /// Engine-wide render-time filters, in registration order
    pub filters: Vec<FilterRef>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_modifiers: Vec::new(),
            escape_html: false,
            charset: "UTF-8".to_string(),
            filters: Vec::new(),
        }
    }
}

/// Per-compilation state: the memoized default-modifier chain and
/// instance-local filters. One context per template compilation, so
/// concurrent compilations never share mutable state.
pub struct CompilerCtx<'a> {
    config: &'a EngineConfig,
    modifiers: &'a Registry<dyn ModifierCompiler>,
    default_chain: Option<Vec<ModifierCall>>,
    local_filters: Vec<ModifierCall>,
}

impl<'a> CompilerCtx<'a> {
    pub fn new(config: &'a EngineConfig, modifiers: &'a Registry<dyn ModifierCompiler>) -> Self {
        Self {
            config,
            modifiers,
            default_chain: None,
            local_filters: Vec::new(),
        }
    }

    /// Add a compiler-instance-local filter (pipeline stage 5)
    pub fn add_local_filter(&mut self, filter: ModifierCall) {
        self.local_filters.push(filter);
    }

    /// Compile one output expression into generated code.
    pub fn compile_output(
        &mut self,
        expr: ExprNode,
        chain: &[ModifierCall],
        attrs: &OutputAttrs,
    ) -> Result<String> {
        // stage 1: the explicit chain always runs
        let mut output = self.apply_chain(expr.into_code(), chain)?;

        if let Some(assign) = &attrs.assign {
            return Ok(format!("ctx.assign({assign}, {output});"));
        }

        if !attrs.nofilter {
            // stage 2
            let defaults = self.default_chain();
            output = self.apply_chain(output, &defaults)?;

            // stage 3
            if self.config.escape_html {
                output = format!("escape_html(({output}), {:?})", self.config.charset);
            }

            // stage 4
            for filter in &self.config.filters {
                output = filter.wrap(output);
            }

            // stage 5
            let locals = self.local_filters.clone();
            output = self.apply_chain(output, &locals)?;
        }

        Ok(format!("emit {output};"))
    }

    /// Apply a modifier chain in order: registered compilers rewrite
    /// inline, unregistered names become direct calls.
    fn apply_chain(&self, value: String, chain: &[ModifierCall]) -> Result<String> {
        let mut output = value;
        for call in chain {
            let mut args = Vec::with_capacity(call.args.len() + 1);
            args.push(ExprNode::new(output));
            args.extend(call.args.iter().cloned());
            output = match self.modifiers.resolve(&call.name) {
                Some(plugin) => plugin.compile(&args)?,
                None => direct_call(&call.name, &args),
            };
        }
        Ok(output)
    }

    /// The default-modifier chain, tokenized on first use and reused
    /// for every later compilation within this context.
    fn default_chain(&mut self) -> Vec<ModifierCall> {
        if self.default_chain.is_none() {
            let chain = self
                .config
                .default_modifiers
                .iter()
                .map(|spec| tokenize_modifier_spec(spec))
                .collect();
            self.default_chain = Some(chain);
        }
        self.default_chain.clone().unwrap_or_default()
    }
}

/// Split a `name:arg:arg` modifier spec on `:`, preserving quoted
/// substrings verbatim (including their quotes and escapes).
fn tokenize_modifier_spec(spec: &str) -> ModifierCall {
    let mut segments: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut chars = spec.chars();
    while let Some(c) = chars.next() {
        match c {
            ':' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            '\'' | '"' => {
                current.push(c);
                while let Some(inner) = chars.next() {
                    current.push(inner);
                    if inner == '\\' {
                        if let Some(escaped) = chars.next() {
                            current.push(escaped);
                        }
                    } else if inner == c {
                        break;
                    }
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }

    let mut segments = segments.into_iter();
    let name = segments.next().unwrap_or_default();
    ModifierCall::new(name, segments.map(ExprNode::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ExprNode;

    fn empty_registry() -> Registry<dyn ModifierCompiler> {
        Registry::new("modifier")
    }

    #[test]
    fn unregistered_modifier_falls_back_to_direct_call() {
        let config = EngineConfig::default();
        let registry = empty_registry();
        let mut ctx = CompilerCtx::new(&config, &registry);

        let chain = [ModifierCall::new("truncate", [ExprNode::new("30")])];
        let code = ctx
            .compile_output(ExprNode::new("$title"), &chain, &OutputAttrs::default())
            .unwrap();
        assert_eq!(code, "emit truncate($title, 30);");
    }

    #[test]
    fn assign_produces_assignment_never_emission() {
        let config = EngineConfig {
            escape_html: true,
            filters: vec![FilterRef::Free("f".into())],
            ..Default::default()
        };
        let registry = empty_registry();
        let mut ctx = CompilerCtx::new(&config, &registry);

        let attrs = OutputAttrs {
            assign: Some(ExprNode::new("'total'")),
            ..Default::default()
        };
        let chain = [ModifierCall::bare("m1")];
        let code = ctx
            .compile_output(ExprNode::new("$x"), &chain, &attrs)
            .unwrap();
        assert_eq!(code, "ctx.assign('total', m1($x));");
        assert!(!code.contains("emit"));
    }

    #[test]
    fn pipeline_stage_order_is_fixed() {
        let config = EngineConfig {
            default_modifiers: vec!["lower".to_string()],
            escape_html: true,
            filters: vec![FilterRef::Free("f4".into())],
            ..Default::default()
        };
        let registry = empty_registry();
        let mut ctx = CompilerCtx::new(&config, &registry);
        ctx.add_local_filter(ModifierCall::bare("f5"));

        let chain = [ModifierCall::bare("m1")];
        let code = ctx
            .compile_output(ExprNode::new("$x"), &chain, &OutputAttrs::default())
            .unwrap();
        // explicit chain innermost, then defaults, escape, registered,
        // local filters outermost
        assert_eq!(
            code,
            "emit f5(f4(escape_html((lower(m1($x))), \"UTF-8\"), ctx));"
        );
    }

    #[test]
    fn nofilter_keeps_only_the_explicit_chain() {
        let config = EngineConfig {
            default_modifiers: vec!["lower".to_string()],
            escape_html: true,
            filters: vec![FilterRef::Free("f4".into())],
            ..Default::default()
        };
        let registry = empty_registry();
        let mut ctx = CompilerCtx::new(&config, &registry);
        ctx.add_local_filter(ModifierCall::bare("f5"));

        let attrs = OutputAttrs {
            nofilter: true,
            ..Default::default()
        };
        let chain = [ModifierCall::bare("m1")];
        let code = ctx
            .compile_output(ExprNode::new("$x"), &chain, &attrs)
            .unwrap();
        assert_eq!(code, "emit m1($x);");
    }

    #[test]
    fn filter_call_shapes() {
        assert_eq!(FilterRef::Free("f".into()).wrap("$v".into()), "f($v, ctx)");
        assert_eq!(
            FilterRef::Bound {
                key: "k".into(),
                method: "apply".into()
            }
            .wrap("$v".into()),
            "filters[\"k\"].apply($v, ctx)"
        );
        assert_eq!(
            FilterRef::Static {
                path: "Filters".into(),
                method: "trim".into()
            }
            .wrap("$v".into()),
            "Filters::trim($v, ctx)"
        );
    }

    #[test]
    fn tokenize_preserves_quoted_segments() {
        let call = tokenize_modifier_spec(r#"replace:":":"-""#);
        assert_eq!(call.name, "replace");
        let args: Vec<_> = call.args.iter().map(|a| a.as_str()).collect();
        assert_eq!(args, vec![r#"":""#, r#""-""#]);
    }

    #[test]
    fn tokenize_handles_escaped_quotes() {
        let call = tokenize_modifier_spec(r#"default:'n\'a'"#);
        assert_eq!(call.name, "default");
        assert_eq!(call.args[0].as_str(), r#"'n\'a'"#);
    }

    #[test]
    fn default_chain_is_memoized_per_context() {
        let config = EngineConfig {
            default_modifiers: vec!["lower".to_string()],
            ..Default::default()
        };
        let registry = empty_registry();
        let mut ctx = CompilerCtx::new(&config, &registry);

        assert!(ctx.default_chain.is_none());
        let code = ctx
            .compile_output(ExprNode::new("$a"), &[], &OutputAttrs::default())
            .unwrap();
        assert_eq!(code, "emit lower($a);");
        assert!(ctx.default_chain.is_some());

        // second compilation reuses the cached chain
        let code = ctx
            .compile_output(ExprNode::new("$b"), &[], &OutputAttrs::default())
            .unwrap();
        assert_eq!(code, "emit lower($b);");
    }

    #[test]
    fn registered_modifier_rewrites_inline() {
        use crate::modifier::CountChars;

        let config = EngineConfig::default();
        let mut registry = empty_registry();
        registry.register("count_characters", Box::new(CountChars::new("UTF-8")));
        let mut ctx = CompilerCtx::new(&config, &registry);

        let chain = [ModifierCall::new(
            "count_characters",
            [ExprNode::new("true")],
        )];
        let code = ctx
            .compile_output(ExprNode::new("$text"), &chain, &OutputAttrs::default())
            .unwrap();
        assert_eq!(code, "emit len_chars($text, \"UTF-8\");");
    }

    #[test]
    fn modifier_compile_error_aborts_expression() {
        use crate::modifier::CountChars;

        let config = EngineConfig::default();
        let mut registry = empty_registry();
        registry.register("count_characters", Box::new(CountChars::new("UTF-8")));
        let mut ctx = CompilerCtx::new(&config, &registry);

        let chain = [ModifierCall::new(
            "count_characters",
            [ExprNode::new("true"), ExprNode::new("'x'")],
        )];
        let err = ctx
            .compile_output(ExprNode::new("$text"), &chain, &OutputAttrs::default())
            .unwrap_err();
        assert!(err.to_string().contains("count_characters"));
    }
}
