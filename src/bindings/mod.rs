//! # Data Bindings
//!
//! Deterministic, per-cycle data generation. A binding recipe such as
//! `HashRange(0, 999).ToString().Prefix('user-')` is compiled once into a
//! typed chain of mapper functions; evaluating it for cycle `n` always yields
//! the same value.
//!
//! ## Pipeline
//!
//! 1. [`lexer`] and [`recipe`] parse the recipe text.
//! 2. [`compiler`] resolves calls against a [`registry::MapperRegistry`],
//!    selects overloads, and inserts widening conversions.
//! 3. [`template`] groups compiled bindings by name and fills string
//!    templates with their values.
//!
//! ```rust
//! use loadgen_core::bindings::{BindingFunctionCompiler, WorkerContext, Value};
//!
//! let compiler = BindingFunctionCompiler::default();
//! let binding = compiler.compile("Mod(10).ToString().Prefix('bucket-')").unwrap();
//! let function = binding.instantiate().unwrap();
//!
//! let mut ctx = WorkerContext::new(0);
//! assert_eq!(function.apply(42, &mut ctx), Value::from("bucket-2"));
//! ```

pub mod compiler;
pub mod context;
pub mod lexer;
pub mod library;
pub mod mapper;
pub mod recipe;
pub mod registry;
pub mod template;
pub mod types;

pub use compiler::{BindingFunctionCompiler, CompiledBinding};
pub use context::WorkerContext;
pub use mapper::{BindingFunction, MapperArg, MapperDescriptor, MapperFn};
pub use recipe::BindingRecipe;
pub use registry::MapperRegistry;
pub use template::{
    Bindings, BindingsTemplate, ParsedTemplate, StringBindings, StringBindingsTemplate,
    TemplateKind,
};
pub use types::{Conversion, Value, ValueType};
