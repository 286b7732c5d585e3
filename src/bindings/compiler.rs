//! Recipe compiler.
//!
//! Turns a recipe string into a [`CompiledBinding`]: resolve every call
//! against the registry, pick one overload per call so that adjacent output
//! and input types connect (directly or through an implicit widening), and
//! record the result as a plan that can be instantiated once per worker.

use super::mapper::{BindingFunction, MapperArg, MapperDescriptor, Stage};
use super::recipe::{BindingRecipe, FunctionCall, RecipeArg};
use super::registry::MapperRegistry;
use super::types::{Conversion, ValueType};
use crate::error::{BindingError, BindingResult};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
enum ArgPlan {
    Literal(MapperArg),
    Nested(Arc<ChainPlan>),
}

#[derive(Debug, Clone)]
struct StagePlan {
    descriptor: Arc<MapperDescriptor>,
    args: Vec<ArgPlan>,
    adapter: Conversion,
}

#[derive(Debug)]
struct ChainPlan {
    stages: Vec<StagePlan>,
    tail: Conversion,
    output: ValueType,
    thread_safe: bool,
    stateful: bool,
}

impl ChainPlan {
    fn instantiate(&self) -> BindingResult<BindingFunction> {
        let stages = self
            .stages
            .iter()
            .map(|stage| {
                let args = instantiate_args(&stage.args)?;
                Ok(Stage {
                    adapter: stage.adapter,
                    func: stage.descriptor.instantiate(&args)?,
                })
            })
            .collect::<BindingResult<Vec<_>>>()?;
        Ok(BindingFunction::new(stages, self.tail, self.output))
    }
}

fn instantiate_args(args: &[ArgPlan]) -> BindingResult<Vec<MapperArg>> {
    args.iter()
        .map(|arg| match arg {
            ArgPlan::Literal(value) => Ok(value.clone()),
            ArgPlan::Nested(plan) => Ok(MapperArg::Function(plan.instantiate()?)),
        })
        .collect()
}

/// A compiled `long -> T` binding.
///
/// Thread-safe bindings carry one shared instance; the rest are
/// re-instantiated for every worker through [`CompiledBinding::instantiate`].
#[derive(Debug, Clone)]
pub struct CompiledBinding {
    recipe: String,
    plan: Arc<ChainPlan>,
    shared: Option<BindingFunction>,
}

impl CompiledBinding {
    pub fn recipe(&self) -> &str {
        &self.recipe
    }

    pub fn output_type(&self) -> ValueType {
        self.plan.output
    }

    /// True when every stage, nested arguments included, is thread-safe.
    pub fn is_thread_safe(&self) -> bool {
        self.plan.thread_safe
    }

    pub fn is_stateful(&self) -> bool {
        self.plan.stateful
    }

    /// Mapper names of the selected overloads, in chain order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.plan.stages.iter().map(|s| s.descriptor.name).collect()
    }

    /// Signatures of the selected overloads, in chain order.
    pub fn stage_signatures(&self) -> Vec<(ValueType, ValueType)> {
        self.plan
            .stages
            .iter()
            .map(|s| (s.descriptor.input, s.descriptor.output))
            .collect()
    }

    /// The instance a worker should use.
    pub fn instantiate(&self) -> BindingResult<BindingFunction> {
        match &self.shared {
            Some(function) => Ok(function.clone()),
            None => self.plan.instantiate(),
        }
    }
}

struct Candidate {
    descriptor: Arc<MapperDescriptor>,
    args: Vec<ArgPlan>,
    label: String,
}

/// Compiles recipes against a [`MapperRegistry`].
#[derive(Debug, Clone)]
pub struct BindingFunctionCompiler {
    registry: Arc<MapperRegistry>,
}

impl Default for BindingFunctionCompiler {
    fn default() -> Self {
        Self::new(Arc::new(MapperRegistry::standard()))
    }
}

impl BindingFunctionCompiler {
    pub fn new(registry: Arc<MapperRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &MapperRegistry {
        &self.registry
    }

    pub fn compile(&self, recipe: &str) -> BindingResult<CompiledBinding> {
        let parsed = BindingRecipe::parse(recipe)?;

        if let Some(input) = parsed.input_type {
            if input != ValueType::Long {
                return Err(BindingError::type_mismatch(
                    ValueType::Long,
                    input,
                    "recipe input (bindings always consume the cycle as long)",
                ));
            }
        }

        let plan = Arc::new(self.plan_chain(&parsed.calls, parsed.output_type)?);
        let shared = if plan.thread_safe {
            Some(plan.instantiate()?)
        } else {
            None
        };

        debug!(
            recipe = %recipe,
            output = %plan.output,
            stages = plan.stages.len(),
            thread_safe = plan.thread_safe,
            "Compiled binding recipe"
        );

        Ok(CompiledBinding {
            recipe: recipe.to_string(),
            plan,
            shared,
        })
    }

    fn plan_chain(
        &self,
        calls: &[FunctionCall],
        required_output: Option<ValueType>,
    ) -> BindingResult<ChainPlan> {
        let candidates = calls
            .iter()
            .map(|call| self.candidates(call))
            .collect::<BindingResult<Vec<_>>>()?;

        let mut path = Vec::with_capacity(candidates.len());
        let mut failure = None;
        let Some(tail) = search(
            &candidates,
            0,
            ValueType::Long,
            required_output,
            &mut path,
            &mut failure,
        ) else {
            return Err(failure.map(|(_, err)| err).unwrap_or_else(|| {
                BindingError::type_mismatch(ValueType::Long, ValueType::Object, "recipe chain")
            }));
        };

        let mut stages = Vec::with_capacity(path.len());
        let mut thread_safe = true;
        let mut stateful = false;
        for (index, (choice, adapter)) in path.into_iter().enumerate() {
            let candidate = &candidates[index][choice];
            thread_safe &= candidate.descriptor.thread_safe;
            stateful |= candidate.descriptor.stateful;
            for arg in &candidate.args {
                if let ArgPlan::Nested(nested) = arg {
                    thread_safe &= nested.thread_safe;
                    stateful |= nested.stateful;
                }
            }
            stages.push(StagePlan {
                descriptor: Arc::clone(&candidate.descriptor),
                args: candidate.args.clone(),
                adapter,
            });
        }

        let output = match (required_output, stages.last()) {
            (Some(required), _) => required,
            (None, Some(last)) => last.descriptor.output,
            (None, None) => ValueType::Long,
        };

        Ok(ChainPlan {
            stages,
            tail,
            output,
            thread_safe,
            stateful,
        })
    }

    /// Overloads of `call` whose constructors accept its arguments.
    fn candidates(&self, call: &FunctionCall) -> BindingResult<Vec<Candidate>> {
        let overloads = self.registry.lookup(&call.name);
        if overloads.is_empty() {
            return Err(BindingError::UnknownMapper {
                name: call.name.clone(),
                known: self.registry.names(),
            });
        }

        let args = call
            .args
            .iter()
            .map(|arg| self.plan_arg(call, arg))
            .collect::<BindingResult<Vec<_>>>()?;
        let trial_args = instantiate_args(&args)?;

        let mut accepted = Vec::new();
        let mut rejections = Vec::new();
        for descriptor in overloads {
            match descriptor.instantiate(&trial_args) {
                Ok(_) => accepted.push(Candidate {
                    descriptor: Arc::clone(descriptor),
                    args: args.clone(),
                    label: call.to_string(),
                }),
                Err(err) => rejections.push(err),
            }
        }

        if accepted.is_empty() {
            if rejections.len() == 1 {
                if let Some(only) = rejections.pop() {
                    return Err(only);
                }
            }
            let reasons = rejections
                .iter()
                .map(|err| match err {
                    BindingError::InvalidArguments { reason, .. } => reason.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join("; ");
            return Err(BindingError::invalid_arguments(
                call.name.as_str(),
                format!("no overload accepts {call}: {reasons}"),
            ));
        }
        Ok(accepted)
    }

    fn plan_arg(&self, owner: &FunctionCall, arg: &RecipeArg) -> BindingResult<ArgPlan> {
        Ok(match arg {
            RecipeArg::Long(v) => ArgPlan::Literal(MapperArg::Long(*v)),
            RecipeArg::Double(v) => ArgPlan::Literal(MapperArg::Double(*v)),
            RecipeArg::Text(v) => ArgPlan::Literal(MapperArg::Text(v.clone())),
            RecipeArg::Bool(v) => ArgPlan::Literal(MapperArg::Bool(*v)),
            RecipeArg::Call(nested) => {
                let plan = self.plan_chain(std::slice::from_ref(nested), None)?;
                if plan.instantiate()?.uses_context() {
                    return Err(BindingError::invalid_arguments(
                        owner.name.as_str(),
                        format!("nested function {nested} reads worker variables"),
                    ));
                }
                ArgPlan::Nested(Arc::new(plan))
            }
        })
    }
}

/// Depth-first overload selection. Exact input matches are tried before
/// widened ones. On failure `failure` holds the mismatch found deepest in
/// the chain, which is the most useful one to report.
fn search(
    candidates: &[Vec<Candidate>],
    index: usize,
    input: ValueType,
    required_output: Option<ValueType>,
    path: &mut Vec<(usize, Conversion)>,
    failure: &mut Option<(usize, BindingError)>,
) -> Option<Conversion> {
    let options = &candidates[index];
    let mut order: Vec<usize> = (0..options.len()).collect();
    order.sort_by_key(|&i| options[i].descriptor.input != input);

    for choice in order {
        let candidate = &options[choice];
        let Some(adapter) = input.conversion_to(candidate.descriptor.input) else {
            record_failure(
                failure,
                index,
                BindingError::type_mismatch(
                    input,
                    candidate.descriptor.input,
                    format!("stage {} '{}'", index + 1, candidate.label),
                ),
            );
            continue;
        };

        path.push((choice, adapter));
        let output = candidate.descriptor.output;
        if index + 1 == candidates.len() {
            match required_output {
                None => return Some(Conversion::Identity),
                Some(target) => match output.conversion_to(target) {
                    Some(tail) => return Some(tail),
                    None => record_failure(
                        failure,
                        index + 1,
                        BindingError::type_mismatch(output, target, "recipe output"),
                    ),
                },
            }
        } else if let Some(tail) = search(
            candidates,
            index + 1,
            output,
            required_output,
            path,
            failure,
        ) {
            return Some(tail);
        }
        path.pop();
    }
    None
}

fn record_failure(failure: &mut Option<(usize, BindingError)>, depth: usize, err: BindingError) {
    let deeper = failure.as_ref().map_or(true, |(seen, _)| depth > *seen);
    if deeper {
        *failure = Some((depth, err));
    }
}
