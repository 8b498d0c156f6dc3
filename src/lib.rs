//! malin - template-expression compilation pipeline and capability
//! registries
//!
//! The two-phase core of a template engine:
//!
//! - **Compile time**: [`compile::CompilerCtx`] turns a parsed
//!   expression plus its modifier chain into generated code — an
//!   assignment or an emit statement — running a fixed five-stage
//!   filter pipeline. Registered [`modifier::ModifierCompiler`] plugins
//!   rewrite modifier calls inline; unregistered names become direct
//!   calls.
//! - **Render time**: the generated program dispatches by name into
//!   [`block::BlockHandler`] and [`function::FunctionHandler`] plugins,
//!   threading a [`context::RenderContext`] through every call.
//!
//! [`resource::ResourceLoader`] plugins resolve named template sources
//! into raw text and a stable identity key, feeding the external
//! parser. All four plugin kinds live in their own typed registry on
//! [`registry::Plugins`].
//!
//! # Example
//!
//! ```
//! use malin::{CompilerCtx, EngineConfig, ExprNode, ModifierCall, OutputAttrs, Plugins};
//!
//! let config = EngineConfig::default();
//! let plugins = Plugins::new();
//! let mut ctx = CompilerCtx::new(&config, &plugins.modifiers);
//!
//! let chain = [ModifierCall::bare("upper")];
//! let code = ctx
//!     .compile_output(ExprNode::new("$name"), &chain, &OutputAttrs::default())
//!     .unwrap();
//! assert_eq!(code, "emit upper($name);");
//! ```

pub mod block;
pub mod compile;
pub mod context;
pub mod error;
pub mod function;
pub mod modifier;
pub mod node;
pub mod registry;
pub mod resource;

pub use block::{BlockHandler, Lookup, NoTranslation, Translate, TranslationBackend};
pub use compile::{CompilerCtx, EngineConfig, FilterRef};
pub use context::{CounterState, Direction, Params, RenderContext, Value};
pub use error::{CompileError, RenderError};
pub use function::{Counter, FunctionHandler};
pub use modifier::{CountChars, ModifierCompiler};
pub use node::{AttrValue, ExprNode, ModifierCall, OutputAttrs};
pub use registry::{Plugins, Registry};
pub use resource::{FileLoader, ResourceLoader, Source, StringLoader};
