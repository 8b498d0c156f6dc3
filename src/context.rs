//! Render-time values and the per-render context
//!
//! Handlers are invoked by the generated program with a parameter map
//! and a render context: variable scope, output sink, and the state
//! that plugins keep per render (counters). Nothing in here is shared
//! across renders, so concurrent renders stay independent.

use std::collections::HashMap;

/// A runtime value in the template
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Dict(HashMap<String, Value>),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty() && s != "0",
            Value::List(l) => !l.is_empty(),
            Value::Dict(d) => !d.is_empty(),
        }
    }

    pub fn render_to_string(&self) -> String {
        match self {
            Value::None => "".to_string(),
            Value::Bool(b) => if *b { "true" } else { "false" }.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::List(l) => {
                let items: Vec<_> = l.iter().map(|v| v.render_to_string()).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Dict(_) => "[object]".to_string(),
        }
    }

    /// Lossy integer coercion for numeric parameters
    pub fn as_int(&self) -> i64 {
        match self {
            Value::Int(i) => *i,
            Value::Float(f) => *f as i64,
            Value::Bool(b) => *b as i64,
            Value::String(s) => s.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

/// Keyword parameters passed to a handler, in source order.
///
/// Order matters: parameters the handler does not reserve become
/// positional substitution arguments. The map is never mutated;
/// [`Params::remaining`] derives the positional tail instead.
#[derive(Debug, Clone, Default)]
pub struct Params {
    entries: Vec<(String, Value)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any earlier value under the same name
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == name) {
            entry.1 = value.into();
        } else {
            self.entries.push((name, value.into()));
        }
    }

    /// Builder-style [`Params::set`]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Parameters not claimed by a reserved name, in order
    pub fn remaining<'a>(&'a self, reserved: &[&str]) -> Vec<&'a Value> {
        self.entries
            .iter()
            .filter(|(k, _)| !reserved.contains(&k.as_str()))
            .map(|(_, v)| v)
            .collect()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.set(k, v);
        }
        params
    }
}

/// Counting direction for [`CounterState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Up,
    Down,
}

impl Direction {
    /// `"down"` subtracts; anything else counts up
    pub fn parse(s: &str) -> Self {
        if s == "down" {
            Direction::Down
        } else {
            Direction::Up
        }
    }
}

/// Per-name counter state, owned by the render context. Created on
/// first reference, discarded with the context.
#[derive(Debug, Clone)]
pub struct CounterState {
    pub start: i64,
    pub skip: i64,
    pub direction: Direction,
    pub count: i64,
    /// Sticky assignment target; once set it applies to every later
    /// call under the same counter name
    pub assign: Option<String>,
}

impl Default for CounterState {
    fn default() -> Self {
        Self {
            start: 1,
            skip: 1,
            direction: Direction::Up,
            count: 1,
            assign: None,
        }
    }
}

/// The per-render mutable scope threaded through handler calls
#[derive(Debug, Default)]
pub struct RenderContext {
    vars: HashMap<String, Value>,
    output: String,
    counters: HashMap<String, CounterState>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a template variable
    pub fn assign(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Look up a template variable
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Append text to the output sink
    pub fn emit(&mut self, text: &str) {
        self.output.push_str(text);
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn into_output(self) -> String {
        self.output
    }

    /// Counter state for `name`, created with defaults on first use
    pub fn counter_mut(&mut self, name: &str) -> &mut CounterState {
        self.counters.entry(name.to_string()).or_default()
    }

    /// Inspect a counter without creating it
    pub fn counter(&self, name: &str) -> Option<&CounterState> {
        self.counters.get(name)
    }
}
