//! Capability registries
//!
//! Four independent, typed registries — one per plugin kind — instead
//! of a single string-keyed map with runtime shape inspection. Each is
//! name-keyed; registering a duplicate name overwrites the previous
//! entry silently (last registration wins). Registration is expected
//! during engine setup, lookups during compilation and rendering.

use crate::block::BlockHandler;
use crate::function::FunctionHandler;
use crate::modifier::ModifierCompiler;
use crate::resource::ResourceLoader;
use std::collections::HashMap;
use tracing::debug;

/// A name-keyed registry of one plugin kind
pub struct Registry<T: ?Sized> {
    kind: &'static str,
    entries: HashMap<String, Box<T>>,
}

impl<T: ?Sized> Registry<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
        }
    }

    /// Register under `name`. Last registration wins.
    pub fn register(&mut self, name: impl Into<String>, implementation: Box<T>) {
        let name = name.into();
        if self.entries.insert(name.clone(), implementation).is_some() {
            debug!(kind = self.kind, name = %name, "replaced existing registration");
        }
    }

    /// Remove a registration. Returns whether anything was removed.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    pub fn resolve(&self, name: &str) -> Option<&T> {
        self.entries.get(name).map(|b| &**b)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: ?Sized> std::fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.entries.keys().collect();
        names.sort();
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("names", &names)
            .finish()
    }
}

/// The full plugin surface of an engine instance
pub struct Plugins {
    /// Compile-time modifier rewriters
    pub modifiers: Registry<dyn ModifierCompiler>,
    /// Render-time block handlers (process an enclosed body)
    pub blocks: Registry<dyn BlockHandler>,
    /// Render-time function handlers (produce a value from parameters)
    pub functions: Registry<dyn FunctionHandler>,
    /// Template-source resolvers
    pub loaders: Registry<dyn ResourceLoader>,
}

impl Plugins {
    pub fn new() -> Self {
        Self {
            modifiers: Registry::new("modifier"),
            blocks: Registry::new("block"),
            functions: Registry::new("function"),
            loaders: Registry::new("resource"),
        }
    }
}

impl Default for Plugins {
    fn default() -> Self {
        Self::new()
    }
}
