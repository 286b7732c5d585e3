#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Loadgen Core
//!
//! Cycle-driven operation scheduling, op lifecycle tracking, and
//! deterministic data bindings for load generation.
//!
//! ## Overview
//!
//! An activity executes a numbered range of cycles against a pluggable
//! adapter. Every cycle is dispatched exactly once, its op parameters are
//! generated from the cycle number by compiled binding recipes, and every
//! attempt is tracked from admission to a classified terminal outcome.
//!
//! ## Data Flow
//!
//! ```text
//! CycleAllocator ──▶ CycleAction ──▶ OpBinder (bindings + templates)
//!                        │
//!                        ├──▶ OpTracker::admit (backpressure)
//!                        ├──▶ OpAdapter::execute
//!                        ├──▶ ErrorClassifier (retry / fail / halt)
//!                        └──▶ OpTracker::complete (metrics, slot release)
//! ```
//!
//! ## Module Organization
//!
//! - [`cycles`] - Cycle ranges and the concurrent cycle allocator
//! - [`bindings`] - Recipe parsing, mapper registry, binding compiler, templates
//! - [`ops`] - Op lifecycle facets, admission control, metrics
//! - [`activity`] - Adapter seam, error classification, cycle action, executor
//! - [`config`] - Layered activity configuration
//! - [`error`] - Flat error taxonomy
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust
//! use loadgen_core::bindings::{BindingFunctionCompiler, BindingsTemplate, StringBindingsTemplate, WorkerContext};
//! use std::sync::Arc;
//!
//! let compiler = BindingFunctionCompiler::default();
//! let bindings = BindingsTemplate::compile(
//!     &compiler,
//!     [("user", "Mod(1000).ToString().Prefix('user-')"), ("score", "HashRange(1, 100)")],
//! )
//! .unwrap();
//!
//! let template = StringBindingsTemplate::new("{user} scored {score}", Arc::new(bindings)).unwrap();
//! let binder = template.resolve_bindings().unwrap();
//! let mut ctx = WorkerContext::default();
//!
//! let first = binder.bind(1_042, &mut ctx);
//! assert!(first.starts_with("user-42 scored "));
//! assert_eq!(first, binder.bind(1_042, &mut ctx));
//! ```

pub mod activity;
pub mod bindings;
pub mod config;
pub mod cycles;
pub mod error;
pub mod logging;
pub mod ops;

pub use activity::{
    ActivityExecutor, ActivityHandle, ActivityState, ActivitySummary, AdapterError, OpAdapter,
    ResolvedOp,
};
pub use bindings::{BindingFunctionCompiler, BindingsTemplate, MapperRegistry, WorkerContext};
pub use config::{ActivityConfig, ConfigManager, ConfigurationError};
pub use cycles::{CycleAllocator, CycleRange};
pub use error::{ActivityError, ActivityResult, BindingError, BindingResult, CycleError, ErrorKind};
pub use ops::{OpMetrics, OpTracker};
