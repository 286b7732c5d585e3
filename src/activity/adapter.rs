//! Driver adapter seam.
//!
//! An adapter executes one resolved op against a target system. The core
//! never inspects what an op means; it only sees the [`AdapterError`] kind
//! when something goes wrong.

use super::sequence::{OpSequence, SequencerType};
use crate::bindings::compiler::BindingFunctionCompiler;
use crate::bindings::context::WorkerContext;
use crate::bindings::template::{Bindings, BindingsTemplate, ParsedTemplate};
use crate::bindings::types::Value;
use crate::error::{ActivityResult, BindingError, BindingResult};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

/// Error reported by an adapter for one op attempt.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdapterError {
    /// Transient; the same op may succeed if tried again
    #[error("{name}: {message}")]
    Retryable { name: String, message: String },

    /// The op ran but its result failed a correctness check
    #[error("VerificationError: expected {expected}, actual {actual} ({detail})")]
    Verification {
        expected: serde_json::Value,
        actual: serde_json::Value,
        detail: String,
    },

    /// The target or the workload is broken; continuing is pointless
    #[error("{name}: {message}")]
    Fatal { name: String, message: String },
}

impl AdapterError {
    pub fn retryable(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Retryable {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn fatal(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fatal {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn verification(
        expected: serde_json::Value,
        actual: serde_json::Value,
        detail: impl Into<String>,
    ) -> Self {
        Self::Verification {
            expected,
            actual,
            detail: detail.into(),
        }
    }

    /// Name matched against error handler patterns.
    pub fn name(&self) -> &str {
        match self {
            Self::Retryable { name, .. } | Self::Fatal { name, .. } => name,
            Self::Verification { .. } => "VerificationError",
        }
    }
}

pub type AdapterResult = Result<serde_json::Value, AdapterError>;

/// Executes resolved ops against a target system.
#[async_trait]
pub trait OpAdapter: Send + Sync {
    /// Adapter name for logs.
    fn name(&self) -> &str;

    async fn execute(&self, cycle: u64, op: &ResolvedOp) -> AdapterResult;
}

/// An op with all bindings resolved for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedOp {
    pub name: String,
    pub cycle: u64,
    pub values: IndexMap<String, Value>,
    pub fields: IndexMap<String, String>,
}

impl ResolvedOp {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
}

/// Op definition: named bindings plus the string fields rendered from them.
#[derive(Debug, Clone)]
pub struct OpTemplate {
    name: String,
    bindings: Arc<BindingsTemplate>,
    fields: Vec<(String, Arc<ParsedTemplate>)>,
}

impl OpTemplate {
    /// Validate that every field placeholder has a binding. All missing
    /// names across all fields are reported together.
    pub fn new<I, K, V>(name: impl Into<String>, bindings: BindingsTemplate, fields: I) -> BindingResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        Self::with_bindings(name, Arc::new(bindings), fields)
    }

    /// Like [`new`](Self::new), over bindings shared with other ops.
    pub fn with_bindings<I, K, V>(
        name: impl Into<String>,
        bindings: Arc<BindingsTemplate>,
        fields: I,
    ) -> BindingResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let name = name.into();
        let fields: Vec<(String, Arc<ParsedTemplate>)> = fields
            .into_iter()
            .map(|(field, raw)| (field.into(), Arc::new(ParsedTemplate::parse(raw.as_ref()))))
            .collect();

        let missing: BTreeSet<String> = fields
            .iter()
            .flat_map(|(_, template)| template.missing(&bindings))
            .collect();
        if !missing.is_empty() {
            return Err(BindingError::MissingBinding {
                template: format!("op '{name}'"),
                missing: missing.into_iter().collect(),
            });
        }

        Ok(Self {
            name,
            bindings,
            fields,
        })
    }

    /// Compile `bindings` recipes and validate `fields` in one step.
    pub fn compile<B, F, BK, BV, FK, FV>(
        name: impl Into<String>,
        compiler: &BindingFunctionCompiler,
        bindings: B,
        fields: F,
    ) -> BindingResult<Self>
    where
        B: IntoIterator<Item = (BK, BV)>,
        BK: Into<String>,
        BV: AsRef<str>,
        F: IntoIterator<Item = (FK, FV)>,
        FK: Into<String>,
        FV: AsRef<str>,
    {
        let bindings = BindingsTemplate::compile(compiler, bindings)?;
        Self::new(name, bindings, fields)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bindings(&self) -> &BindingsTemplate {
        &self.bindings
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// Per-worker binder running this op on every cycle.
    pub fn binder(&self) -> BindingResult<OpBinder> {
        Ok(OpBinder {
            bindings: self.bindings.resolve_bindings()?,
            sequence: OpSequence::single(Arc::new(self.clone())),
        })
    }

    fn render(&self, cycle: u64, values: IndexMap<String, Value>) -> ResolvedOp {
        let fields = self
            .fields
            .iter()
            .map(|(name, template)| (name.clone(), template.render(|key| values.get(key))))
            .collect();
        ResolvedOp {
            name: self.name.clone(),
            cycle,
            values,
            fields,
        }
    }
}

/// All ops of an activity: one binding set and the ratio-weighted sequence
/// choosing which op each cycle runs.
#[derive(Debug, Clone)]
pub struct ActivityOps {
    bindings: Arc<BindingsTemplate>,
    sequence: OpSequence<Arc<OpTemplate>>,
}

impl ActivityOps {
    /// Compile the shared bindings once, then validate and sequence each
    /// `(name, ratio, fields)` op against them.
    pub fn compile<B, BK, BV, O, N, F, FK, FV>(
        compiler: &BindingFunctionCompiler,
        bindings: B,
        ops: O,
        sequencer: SequencerType,
    ) -> ActivityResult<Self>
    where
        B: IntoIterator<Item = (BK, BV)>,
        BK: Into<String>,
        BV: AsRef<str>,
        O: IntoIterator<Item = (N, u64, F)>,
        N: Into<String>,
        F: IntoIterator<Item = (FK, FV)>,
        FK: Into<String>,
        FV: AsRef<str>,
    {
        let bindings = Arc::new(BindingsTemplate::compile(compiler, bindings)?);
        let templates = ops
            .into_iter()
            .map(|(name, ratio, fields)| {
                OpTemplate::with_bindings(name, Arc::clone(&bindings), fields)
                    .map(|template| (Arc::new(template), ratio))
            })
            .collect::<BindingResult<Vec<_>>>()?;
        let sequence = OpSequence::plan(templates, sequencer)?;
        Ok(Self { bindings, sequence })
    }

    pub fn single(template: OpTemplate) -> Self {
        Self {
            bindings: Arc::clone(&template.bindings),
            sequence: OpSequence::single(Arc::new(template)),
        }
    }

    pub fn bindings(&self) -> &BindingsTemplate {
        &self.bindings
    }

    pub fn sequence(&self) -> &OpSequence<Arc<OpTemplate>> {
        &self.sequence
    }

    /// The op cycle `cycle` runs.
    pub fn op_for(&self, cycle: u64) -> &OpTemplate {
        self.sequence.get(cycle)
    }

    /// Per-worker binder.
    pub fn binder(&self) -> BindingResult<OpBinder> {
        Ok(OpBinder {
            bindings: self.bindings.resolve_bindings()?,
            sequence: self.sequence.clone(),
        })
    }
}

/// One worker's op binder. Resolves each binding once per call and renders
/// the op the sequence assigns to the cycle.
#[derive(Debug, Clone)]
pub struct OpBinder {
    bindings: Bindings,
    sequence: OpSequence<Arc<OpTemplate>>,
}

impl OpBinder {
    pub fn bind(&self, cycle: u64, ctx: &mut WorkerContext) -> ResolvedOp {
        let values = self.bindings.resolve(cycle, ctx);
        self.sequence.get(cycle).render(cycle, values)
    }
}
