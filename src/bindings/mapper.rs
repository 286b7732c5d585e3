//! Mapper functions and their descriptors.
//!
//! A mapper is a typed single-argument function. [`MapperFn`] keeps the
//! primitive `long -> long` and `long -> double` shapes distinct from the
//! generic `Value -> Value` shape so the hot paths avoid boxing decisions at
//! every call.

use super::context::WorkerContext;
use super::types::{Conversion, Value, ValueType};
use crate::error::BindingResult;
use std::fmt;
use std::sync::Arc;

/// Instantiated mapper function.
#[derive(Clone)]
pub enum MapperFn {
    /// long -> long
    LongUnary(Arc<dyn Fn(i64) -> i64 + Send + Sync>),
    /// long -> double
    LongToDouble(Arc<dyn Fn(i64) -> f64 + Send + Sync>),
    /// double -> double
    DoubleUnary(Arc<dyn Fn(f64) -> f64 + Send + Sync>),
    /// long -> any
    LongFunction(Arc<dyn Fn(i64) -> Value + Send + Sync>),
    /// any -> any
    Function(Arc<dyn Fn(Value) -> Value + Send + Sync>),
    /// any -> any, reading or writing the worker's variables
    Contextual(Arc<dyn Fn(Value, &mut WorkerContext) -> Value + Send + Sync>),
}

impl MapperFn {
    pub fn long_unary(f: impl Fn(i64) -> i64 + Send + Sync + 'static) -> Self {
        Self::LongUnary(Arc::new(f))
    }

    pub fn long_to_double(f: impl Fn(i64) -> f64 + Send + Sync + 'static) -> Self {
        Self::LongToDouble(Arc::new(f))
    }

    pub fn double_unary(f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        Self::DoubleUnary(Arc::new(f))
    }

    pub fn long_function(f: impl Fn(i64) -> Value + Send + Sync + 'static) -> Self {
        Self::LongFunction(Arc::new(f))
    }

    pub fn function(f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        Self::Function(Arc::new(f))
    }

    pub fn contextual(f: impl Fn(Value, &mut WorkerContext) -> Value + Send + Sync + 'static) -> Self {
        Self::Contextual(Arc::new(f))
    }

    pub fn uses_context(&self) -> bool {
        matches!(self, Self::Contextual(_))
    }

    pub(crate) fn call(&self, input: Value, ctx: &mut WorkerContext) -> Value {
        match (self, input) {
            (Self::LongUnary(f), Value::Long(v)) => Value::Long(f(v)),
            (Self::LongToDouble(f), Value::Long(v)) => Value::Double(f(v)),
            (Self::DoubleUnary(f), Value::Double(v)) => Value::Double(f(v)),
            (Self::LongFunction(f), Value::Long(v)) => f(v),
            (Self::Function(f), v) => f(v),
            (Self::Contextual(f), v) => f(v, ctx),
            (_, other) => {
                // The compiler only links stages whose declared types agree.
                debug_assert!(false, "mapper received mismatched input {other:?}");
                other
            }
        }
    }
}

impl fmt::Debug for MapperFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match self {
            Self::LongUnary(_) => "LongUnary",
            Self::LongToDouble(_) => "LongToDouble",
            Self::DoubleUnary(_) => "DoubleUnary",
            Self::LongFunction(_) => "LongFunction",
            Self::Function(_) => "Function",
            Self::Contextual(_) => "Contextual",
        };
        f.write_str(shape)
    }
}

/// Constructor argument handed to a mapper factory.
#[derive(Debug, Clone)]
pub enum MapperArg {
    Long(i64),
    Double(f64),
    Text(String),
    Bool(bool),
    /// Nested function argument, already instantiated.
    Function(BindingFunction),
}

impl MapperArg {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Long(_) => "integer",
            Self::Double(_) => "float",
            Self::Text(_) => "string",
            Self::Bool(_) => "boolean",
            Self::Function(_) => "function",
        }
    }
}

/// Builds a mapper instance from constructor arguments.
pub type MapperFactory = fn(&[MapperArg]) -> BindingResult<MapperFn>;

/// Registry entry describing one overload of a named mapper.
#[derive(Debug, Clone)]
pub struct MapperDescriptor {
    pub name: &'static str,
    pub input: ValueType,
    pub output: ValueType,
    pub thread_safe: bool,
    pub stateful: bool,
    pub summary: &'static str,
    pub factory: MapperFactory,
}

impl MapperDescriptor {
    pub fn new(
        name: &'static str,
        input: ValueType,
        output: ValueType,
        factory: MapperFactory,
    ) -> Self {
        Self {
            name,
            input,
            output,
            thread_safe: true,
            stateful: false,
            summary: "",
            factory,
        }
    }

    pub fn with_summary(mut self, summary: &'static str) -> Self {
        self.summary = summary;
        self
    }

    /// Each worker gets its own instance.
    pub fn per_worker(mut self) -> Self {
        self.thread_safe = false;
        self
    }

    pub fn stateful(mut self) -> Self {
        self.stateful = true;
        self
    }

    pub fn instantiate(&self, args: &[MapperArg]) -> BindingResult<MapperFn> {
        (self.factory)(args)
    }

    pub fn signature(&self) -> String {
        format!("{} -> {}({}) -> {}", self.input, self.name, "..", self.output)
    }
}

/// One linked step of an instantiated chain.
#[derive(Debug, Clone)]
pub(crate) struct Stage {
    pub(crate) adapter: Conversion,
    pub(crate) func: MapperFn,
}

/// Instantiated `long -> T` chain ready to evaluate.
#[derive(Debug, Clone)]
pub struct BindingFunction {
    stages: Arc<[Stage]>,
    tail: Conversion,
    output: ValueType,
}

impl BindingFunction {
    pub(crate) fn new(stages: Vec<Stage>, tail: Conversion, output: ValueType) -> Self {
        Self {
            stages: stages.into(),
            tail,
            output,
        }
    }

    pub fn output_type(&self) -> ValueType {
        self.output
    }

    pub fn uses_context(&self) -> bool {
        self.stages.iter().any(|stage| stage.func.uses_context())
    }

    pub fn apply(&self, input: i64, ctx: &mut WorkerContext) -> Value {
        let mut value = Value::Long(input);
        for stage in self.stages.iter() {
            value = stage.func.call(stage.adapter.apply(value), ctx);
        }
        self.tail.apply(value)
    }

    /// Evaluate without a worker context. Only valid for chains that never
    /// touch worker variables, which the compiler enforces for nested arguments.
    pub fn apply_detached(&self, input: i64) -> Value {
        let mut scratch = WorkerContext::default();
        self.apply(input, &mut scratch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_applies_adapters_between_stages() {
        let function = BindingFunction::new(
            vec![
                Stage {
                    adapter: Conversion::Identity,
                    func: MapperFn::long_unary(|v| v * 2),
                },
                Stage {
                    adapter: Conversion::LongToDouble,
                    func: MapperFn::double_unary(|v| v / 4.0),
                },
            ],
            Conversion::Identity,
            ValueType::Double,
        );
        assert_eq!(function.apply_detached(5), Value::Double(2.5));
    }

    #[test]
    fn test_contextual_stage_sees_worker_vars() {
        let function = BindingFunction::new(
            vec![Stage {
                adapter: Conversion::Identity,
                func: MapperFn::contextual(|v, ctx| {
                    ctx.set("last", v.clone());
                    v
                }),
            }],
            Conversion::Identity,
            ValueType::Long,
        );
        let mut ctx = WorkerContext::new(3);
        function.apply(11, &mut ctx);
        assert_eq!(ctx.get("last"), Some(&Value::Long(11)));
        assert!(function.uses_context());
    }
}
