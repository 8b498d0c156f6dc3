//! Render-time block handlers
//!
//! A block handler receives the already-rendered body text of its block
//! on each pass. Setting `repeat` requests another render pass over the
//! body; left untouched, the block renders once.
//!
//! The canonical handler here is [`Translate`]: it selects a
//! translation lookup variant from the presence of `domain`, `context`,
//! and `plural`+`count`, substitutes positional `%N` arguments, and
//! applies exactly one escape mode.

use crate::context::{Params, RenderContext, Value};
use miette::Result;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::debug;

/// A render-time plugin that processes the rendered text of an
/// enclosed template region.
pub trait BlockHandler {
    /// `body` is `None` on the opening pass, before the block content
    /// has rendered. Returning `Ok(None)` emits nothing.
    fn handle(
        &self,
        params: &Params,
        body: Option<&str>,
        ctx: &mut RenderContext,
        repeat: &mut bool,
    ) -> Result<Option<String>>;
}

/// Which translation lookup a parameter combination selects.
///
/// Three binary axes — domain present, context present, plural+count
/// present — give eight variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Singular,
    Plural,
    DomainSingular,
    DomainPlural,
    ContextSingular,
    ContextPlural,
    DomainContextSingular,
    DomainContextPlural,
}

/// Pure dispatch over parameter presence. Plural lookups require both
/// `plural` and `count`.
pub fn select_lookup(domain: bool, context: bool, plural: bool) -> Lookup {
    match (domain, context, plural) {
        (false, false, false) => Lookup::Singular,
        (false, false, true) => Lookup::Plural,
        (true, false, false) => Lookup::DomainSingular,
        (true, false, true) => Lookup::DomainPlural,
        (false, true, false) => Lookup::ContextSingular,
        (false, true, true) => Lookup::ContextPlural,
        (true, true, false) => Lookup::DomainContextSingular,
        (true, true, true) => Lookup::DomainContextPlural,
    }
}

/// An injected translation capability. A backend reports which lookup
/// variants it implements; unsupported variants pass text through
/// unchanged — never an error.
pub trait TranslationBackend {
    fn supports(&self, lookup: Lookup) -> bool;

    fn singular(&self, text: &str) -> String {
        text.to_string()
    }
    fn plural(&self, singular: &str, _plural: &str, _count: i64) -> String {
        singular.to_string()
    }
    fn domain_singular(&self, _domain: &str, text: &str) -> String {
        text.to_string()
    }
    fn domain_plural(&self, _domain: &str, singular: &str, _plural: &str, _count: i64) -> String {
        singular.to_string()
    }
    fn context_singular(&self, _context: &str, text: &str) -> String {
        text.to_string()
    }
    fn context_plural(&self, _context: &str, singular: &str, _plural: &str, _count: i64) -> String {
        singular.to_string()
    }
    fn domain_context_singular(&self, _domain: &str, _context: &str, text: &str) -> String {
        text.to_string()
    }
    fn domain_context_plural(
        &self,
        _domain: &str,
        _context: &str,
        singular: &str,
        _plural: &str,
        _count: i64,
    ) -> String {
        singular.to_string()
    }
}

/// A backend with no translation capability at all; every lookup
/// passes through.
pub struct NoTranslation;

impl TranslationBackend for NoTranslation {
    fn supports(&self, _lookup: Lookup) -> bool {
        false
    }
}

/// Parameters the translation handler claims for itself; everything
/// else is a positional substitution argument.
const RESERVED: &[&str] = &["escape", "plural", "count", "domain", "context"];

/// Translation block handler. The block body is the text to translate.
pub struct Translate {
    backend: Box<dyn TranslationBackend>,
}

impl Translate {
    pub fn new(backend: impl TranslationBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }
}

impl BlockHandler for Translate {
    fn handle(
        &self,
        params: &Params,
        body: Option<&str>,
        ctx: &mut RenderContext,
        _repeat: &mut bool,
    ) -> Result<Option<String>> {
        let Some(body) = body else {
            return Ok(None);
        };

        let escape = params
            .get("escape")
            .map(Value::render_to_string)
            .unwrap_or_else(|| "html".to_string());
        let plural = params.get("plural").map(Value::render_to_string);
        let count = params.get("count").map(Value::as_int);
        let domain = params.get("domain").map(Value::render_to_string);
        let context = params.get("context").map(Value::render_to_string);

        let plural_mode = plural.is_some() && count.is_some();
        let lookup = select_lookup(domain.is_some(), context.is_some(), plural_mode);

        let mut text = if self.backend.supports(lookup) {
            dispatch(
                &*self.backend,
                lookup,
                body,
                domain.as_deref().unwrap_or(""),
                context.as_deref().unwrap_or(""),
                plural.as_deref().unwrap_or(body),
                count.unwrap_or(0),
            )
        } else {
            debug!(?lookup, "translation backend lacks capability, passing through");
            body.to_string()
        };

        let positional = params.remaining(RESERVED);
        if !positional.is_empty() {
            text = substitute(&text, &positional);
        }

        text = match escape.as_str() {
            "html" => nl2br(&html_escape(&text)),
            "js" | "javascript" => js_escape(&text),
            "url" => url_escape(&text),
            // any off-spelling (no/off/false/0) or unrecognized value
            _ => text,
        };

        // Reserved assignment path: no parameter populates this today.
        let assign: Option<String> = None;
        if let Some(target) = assign {
            ctx.assign(target, text);
            Ok(None)
        } else {
            Ok(Some(text))
        }
    }
}

fn dispatch(
    backend: &dyn TranslationBackend,
    lookup: Lookup,
    text: &str,
    domain: &str,
    context: &str,
    plural: &str,
    count: i64,
) -> String {
    match lookup {
        Lookup::Singular => backend.singular(text),
        Lookup::Plural => backend.plural(text, plural, count),
        Lookup::DomainSingular => backend.domain_singular(domain, text),
        Lookup::DomainPlural => backend.domain_plural(domain, text, plural, count),
        Lookup::ContextSingular => backend.context_singular(context, text),
        Lookup::ContextPlural => backend.context_plural(context, text, plural, count),
        Lookup::DomainContextSingular => backend.domain_context_singular(domain, context, text),
        Lookup::DomainContextPlural => {
            backend.domain_context_plural(domain, context, text, plural, count)
        }
    }
}

/// Replace `%1`, `%2`, ... with the positional arguments in order,
/// flattening list-valued arguments element-wise.
fn substitute(text: &str, args: &[&Value]) -> String {
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut position = 0;
    for arg in args {
        match arg {
            Value::List(items) => {
                for item in items {
                    position += 1;
                    pairs.push((format!("%{position}"), item.render_to_string()));
                }
            }
            other => {
                position += 1;
                pairs.push((format!("%{position}"), other.render_to_string()));
            }
        }
    }
    strtr(text, &pairs)
}

/// Single-pass, longest-key-first replacement. Replacement values are
/// never re-scanned, so substitution cannot recurse.
fn strtr(text: &str, pairs: &[(String, String)]) -> String {
    let mut keys: Vec<&(String, String)> = pairs.iter().filter(|(k, _)| !k.is_empty()).collect();
    keys.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    'scan: while !rest.is_empty() {
        for (key, replacement) in &keys {
            if rest.starts_with(key.as_str()) {
                out.push_str(replacement);
                rest = &rest[key.len()..];
                continue 'scan;
            }
        }
        if let Some(c) = rest.chars().next() {
            out.push(c);
            rest = &rest[c.len_utf8()..];
        } else {
            break;
        }
    }
    out
}

/// HTML-entity escape
pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Insert `<br />` before every newline, keeping the newline itself
fn nl2br(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                out.push_str("<br />\r");
                if chars.peek() == Some(&'\n') {
                    chars.next();
                    out.push('\n');
                }
            }
            '\n' => out.push_str("<br />\n"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape for embedding in a JavaScript string literal
fn js_escape(s: &str) -> String {
    let pairs = [
        ("\\".to_string(), "\\\\".to_string()),
        ("'".to_string(), "\\'".to_string()),
        ("\"".to_string(), "\\\"".to_string()),
        ("\r".to_string(), "\\r".to_string()),
        ("\n".to_string(), "\\n".to_string()),
        ("</".to_string(), "<\\/".to_string()),
    ];
    strtr(s, &pairs)
}

/// Everything but ASCII alphanumerics and `-_.` is percent-encoded;
/// spaces become `+`
const URL_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

fn url_escape(s: &str) -> String {
    utf8_percent_encode(s, URL_ESCAPE)
        .to_string()
        .replace("%20", "+")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Records every lookup it receives; supports everything
    #[derive(Default)]
    struct Recording {
        calls: RefCell<Vec<String>>,
    }

    impl TranslationBackend for Recording {
        fn supports(&self, _lookup: Lookup) -> bool {
            true
        }
        fn singular(&self, text: &str) -> String {
            self.calls.borrow_mut().push(format!("singular({text})"));
            format!("[{text}]")
        }
        fn plural(&self, singular: &str, plural: &str, count: i64) -> String {
            self.calls
                .borrow_mut()
                .push(format!("plural({singular}, {plural}, {count})"));
            if count == 1 { singular } else { plural }.to_string()
        }
        fn domain_plural(&self, domain: &str, singular: &str, plural: &str, count: i64) -> String {
            self.calls
                .borrow_mut()
                .push(format!("domain_plural({domain}, {singular}, {plural}, {count})"));
            plural.to_string()
        }
    }

    fn run(backend: impl TranslationBackend + 'static, params: Params, body: &str) -> String {
        let handler = Translate::new(backend);
        let mut ctx = RenderContext::new();
        let mut repeat = false;
        handler
            .handle(&params, Some(body), &mut ctx, &mut repeat)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn opening_pass_returns_nothing() {
        let handler = Translate::new(NoTranslation);
        let mut ctx = RenderContext::new();
        let mut repeat = false;
        let out = handler
            .handle(&Params::new(), None, &mut ctx, &mut repeat)
            .unwrap();
        assert!(out.is_none());
        // translation runs once per block; the handler never re-arms it
        assert!(!repeat);
    }

    #[test]
    fn bare_parameters_select_plain_singular() {
        let params = Params::new().with("escape", "no");
        let out = run(Recording::default(), params, "hello");
        assert_eq!(out, "[hello]");
    }

    #[test]
    fn domain_plural_lookup_gets_text_plural_count() {
        let backend = Recording::default();
        let handler = Translate::new(backend);
        let mut ctx = RenderContext::new();
        let mut repeat = false;
        let params = Params::new()
            .with("domain", "d")
            .with("plural", "p")
            .with("count", 3)
            .with("escape", "no");
        let out = handler
            .handle(&params, Some("text"), &mut ctx, &mut repeat)
            .unwrap()
            .unwrap();
        assert_eq!(out, "p");
    }

    #[test]
    fn plural_without_count_stays_singular() {
        let backend = Recording::default();
        let handler = Translate::new(backend);
        let mut ctx = RenderContext::new();
        let mut repeat = false;
        let params = Params::new().with("plural", "p").with("escape", "no");
        let out = handler
            .handle(&params, Some("one"), &mut ctx, &mut repeat)
            .unwrap()
            .unwrap();
        assert_eq!(out, "[one]");
    }

    #[test]
    fn unsupported_lookup_passes_text_through() {
        let params = Params::new()
            .with("domain", "d")
            .with("context", "c")
            .with("escape", "no");
        let out = run(NoTranslation, params, "untranslated");
        assert_eq!(out, "untranslated");
    }

    #[test]
    fn select_lookup_covers_all_cells() {
        assert_eq!(select_lookup(false, false, false), Lookup::Singular);
        assert_eq!(select_lookup(false, false, true), Lookup::Plural);
        assert_eq!(select_lookup(true, false, false), Lookup::DomainSingular);
        assert_eq!(select_lookup(true, false, true), Lookup::DomainPlural);
        assert_eq!(select_lookup(false, true, false), Lookup::ContextSingular);
        assert_eq!(select_lookup(false, true, true), Lookup::ContextPlural);
        assert_eq!(
            select_lookup(true, true, false),
            Lookup::DomainContextSingular
        );
        assert_eq!(select_lookup(true, true, true), Lookup::DomainContextPlural);
    }

    #[test]
    fn positional_substitution() {
        let params = Params::new()
            .with("escape", "no")
            .with("a", "cat")
            .with("b", "dog");
        let out = run(NoTranslation, params, "%1 and %2");
        assert_eq!(out, "cat and dog");
    }

    #[test]
    fn list_arguments_flatten_element_wise() {
        let pair: Value = vec!["cat", "dog"].into();
        let params = Params::new().with("escape", "no").with("animals", pair);
        let out = run(NoTranslation, params, "%1 and %2");
        assert_eq!(out, "cat and dog");
    }

    #[test]
    fn substitution_is_not_recursive() {
        let params = Params::new()
            .with("escape", "no")
            .with("a", "%2")
            .with("b", "x");
        let out = run(NoTranslation, params, "%1");
        assert_eq!(out, "%2");
    }

    #[test]
    fn html_escape_is_the_default_and_converts_newlines() {
        let out = run(NoTranslation, Params::new(), "a<b\nc");
        assert_eq!(out, "a&lt;b<br />\nc");
    }

    #[test]
    fn js_escape_mode() {
        let params = Params::new().with("escape", "js");
        let out = run(NoTranslation, params, "say \"hi\"\n</script>");
        assert_eq!(out, "say \\\"hi\\\"\\n<\\/script>");
    }

    #[test]
    fn url_escape_mode() {
        let params = Params::new().with("escape", "url");
        let out = run(NoTranslation, params, "a b&c");
        assert_eq!(out, "a+b%26c");
    }

    #[test]
    fn escape_off_spellings() {
        for off in ["no", "off", "false", "0"] {
            let params = Params::new().with("escape", off);
            assert_eq!(run(NoTranslation, params, "<raw>"), "<raw>");
        }
        // literal number zero also switches escaping off
        let params = Params::new().with("escape", 0);
        assert_eq!(run(NoTranslation, params, "<raw>"), "<raw>");
    }
}
