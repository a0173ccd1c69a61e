//! Core preprocessor, conditional evaluator, and build-graph constructor for an NMAKE-compatible
//! makefile dialect.
//!
//! Recipe execution, the variable substitution engine's literal-text logic beyond what the
//! preprocessor itself needs, and process-spawning for recipe commands are out of scope here; see
//! `DESIGN.md`.

mod cache;
mod classify;
mod conditional;
mod context;
mod directive;
mod error;
mod expand;
mod expr;
mod hashing;
mod inline;
mod lexer;
mod logger;
mod makefile;
mod opts;
mod process;
mod rule_map;
mod scope;
mod slab;
mod target;
mod vars;

pub use context::Context;
pub use error::MakeError;
pub use expand::instantiate_inference_recipe;
pub use inline::Keep;
pub use logger::{DefaultLogger, Logger};
pub use makefile::MakeContext;
pub use opts::Opts;
pub use rule_map::InferenceRule;
pub use scope::ScopeContext;
pub use slab::Handle;
pub use target::Target;
pub use vars::{Env, Precedence, Var, Vars};
