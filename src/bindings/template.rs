//! Binding sets and string templates.
//!
//! [`BindingsTemplate`] is the compiled, shareable form of a set of named
//! recipes. Each worker turns it into its own [`Bindings`] with
//! [`BindingsTemplate::resolve_bindings`], which is the only place
//! non-thread-safe mappers get instantiated.
//!
//! [`ParsedTemplate`] splits a string like `"select {cols} from {table}"` into
//! alternating literal and placeholder spans. `\{` never opens a placeholder
//! and is kept verbatim in the literal span.

use super::compiler::{BindingFunctionCompiler, CompiledBinding};
use super::context::WorkerContext;
use super::mapper::BindingFunction;
use super::types::Value;
use crate::error::{BindingError, BindingResult};
use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Compiled, named binding recipes, shared by all workers.
#[derive(Debug, Clone, Default)]
pub struct BindingsTemplate {
    bindings: IndexMap<String, CompiledBinding>,
}

impl BindingsTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile every `(name, recipe)` pair, failing on the first bad recipe.
    pub fn compile<I, K, V>(compiler: &BindingFunctionCompiler, recipes: I) -> BindingResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut template = Self::new();
        for (name, recipe) in recipes {
            template.add(name, compiler.compile(recipe.as_ref())?);
        }
        Ok(template)
    }

    /// Add or replace a binding.
    pub fn add(&mut self, name: impl Into<String>, binding: CompiledBinding) -> &mut Self {
        self.bindings.insert(name.into(), binding);
        self
    }

    pub fn get(&self, name: &str) -> Option<&CompiledBinding> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Per-worker bindings. Call once per worker, never per cycle.
    pub fn resolve_bindings(&self) -> BindingResult<Bindings> {
        let functions = self
            .bindings
            .iter()
            .map(|(name, binding)| Ok((name.clone(), binding.instantiate()?)))
            .collect::<BindingResult<Vec<_>>>()?;
        Ok(Bindings { functions })
    }
}

/// One worker's instantiated bindings.
#[derive(Debug, Clone)]
pub struct Bindings {
    functions: Vec<(String, BindingFunction)>,
}

impl Bindings {
    /// Evaluate every binding exactly once for `cycle`, in declaration order.
    pub fn resolve(&self, cycle: u64, ctx: &mut WorkerContext) -> IndexMap<String, Value> {
        let mut values = IndexMap::with_capacity(self.functions.len());
        self.resolve_into(cycle, ctx, &mut values);
        values
    }

    /// Like [`Bindings::resolve`], reusing `values` to avoid reallocating.
    pub fn resolve_into(
        &self,
        cycle: u64,
        ctx: &mut WorkerContext,
        values: &mut IndexMap<String, Value>,
    ) {
        values.clear();
        let input = cycle as i64;
        for (name, function) in &self.functions {
            values.insert(name.clone(), function.apply(input, ctx));
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// What a parsed template consists of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// No placeholders.
    Literal,
    /// Exactly one placeholder and nothing else.
    BindRef,
    /// Literals and placeholders mixed.
    Concat,
}

/// A string template split into spans.
///
/// `spans` always has odd length: literal, name, literal, ..., literal.
/// Even indices are literals (possibly empty), odd indices are names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTemplate {
    raw: String,
    spans: Vec<String>,
}

impl ParsedTemplate {
    pub fn parse(raw: &str) -> Self {
        let mut spans = Vec::new();
        let mut literal = String::new();
        let mut rest = raw;

        while let Some(c) = rest.chars().next() {
            if c == '\\' && rest[1..].starts_with('{') {
                literal.push_str("\\{");
                rest = &rest[2..];
                continue;
            }
            if c == '{' {
                if let Some(close) = rest.find('}') {
                    let name = &rest[1..close];
                    if is_placeholder_name(name) {
                        spans.push(std::mem::take(&mut literal));
                        spans.push(name.to_string());
                        rest = &rest[close + 1..];
                        continue;
                    }
                }
            }
            literal.push(c);
            rest = &rest[c.len_utf8()..];
        }
        spans.push(literal);

        Self {
            raw: raw.to_string(),
            spans,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn spans(&self) -> &[String] {
        &self.spans
    }

    /// Placeholder names in order of appearance, duplicates included.
    pub fn anchors(&self) -> impl Iterator<Item = &str> {
        self.spans.iter().skip(1).step_by(2).map(String::as_str)
    }

    pub fn literals(&self) -> impl Iterator<Item = &str> {
        self.spans.iter().step_by(2).map(String::as_str)
    }

    pub fn kind(&self) -> TemplateKind {
        match self.spans.len() {
            1 => TemplateKind::Literal,
            3 if self.spans[0].is_empty() && self.spans[2].is_empty() => TemplateKind::BindRef,
            _ => TemplateKind::Concat,
        }
    }

    /// Placeholder names with no binding in `bindings`, sorted and deduplicated.
    pub fn missing(&self, bindings: &BindingsTemplate) -> Vec<String> {
        self.anchors()
            .filter(|name| !bindings.contains(name))
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Concatenate spans, substituting each placeholder through `lookup`.
    /// Placeholders `lookup` cannot resolve render as empty.
    pub fn render<'a, F>(&self, mut lookup: F) -> String
    where
        F: FnMut(&str) -> Option<&'a Value>,
    {
        let mut out = String::with_capacity(self.raw.len() + 16);
        for (index, span) in self.spans.iter().enumerate() {
            if index % 2 == 0 {
                out.push_str(span);
            } else if let Some(value) = lookup(span) {
                match value {
                    Value::Text(text) => out.push_str(text),
                    other => out.push_str(&other.to_string()),
                }
            }
        }
        out
    }
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// A string template paired with the bindings that fill it.
///
/// Construction fails with [`BindingError::MissingBinding`] naming every
/// placeholder that has no binding.
#[derive(Debug, Clone)]
pub struct StringBindingsTemplate {
    template: Arc<ParsedTemplate>,
    bindings: Arc<BindingsTemplate>,
}

impl StringBindingsTemplate {
    pub fn new(raw: &str, bindings: Arc<BindingsTemplate>) -> BindingResult<Self> {
        let template = ParsedTemplate::parse(raw);
        let missing = template.missing(&bindings);
        if !missing.is_empty() {
            return Err(BindingError::MissingBinding {
                template: raw.to_string(),
                missing,
            });
        }
        Ok(Self {
            template: Arc::new(template),
            bindings,
        })
    }

    pub fn template(&self) -> &ParsedTemplate {
        &self.template
    }

    pub fn bindings(&self) -> &BindingsTemplate {
        &self.bindings
    }

    /// Per-worker binder.
    pub fn resolve_bindings(&self) -> BindingResult<StringBindings> {
        Ok(StringBindings {
            template: Arc::clone(&self.template),
            bindings: self.bindings.resolve_bindings()?,
        })
    }
}

/// One worker's string binder.
#[derive(Debug, Clone)]
pub struct StringBindings {
    template: Arc<ParsedTemplate>,
    bindings: Bindings,
}

impl StringBindings {
    /// Resolve every binding once for `cycle` and render the template.
    pub fn bind(&self, cycle: u64, ctx: &mut WorkerContext) -> String {
        let values = self.bindings.resolve(cycle, ctx);
        self.template.render(|name| values.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn spans(raw: &str) -> Vec<String> {
        ParsedTemplate::parse(raw).spans().to_vec()
    }

    #[test]
    fn test_escaped_brace_stays_in_literal() {
        assert_eq!(spans("A\\{ {one}two"), vec!["A\\{ ", "one", "two"]);
        assert_eq!(spans("A\\{{B}C"), vec!["A\\{", "B", "C"]);
    }

    #[test]
    fn test_spans_alternate_and_have_odd_length() {
        assert_eq!(spans("plain"), vec!["plain"]);
        assert_eq!(spans("{a}"), vec!["", "a", ""]);
        assert_eq!(spans("{a}{b}"), vec!["", "a", "", "b", ""]);
        for raw in ["", "x", "{a} and {b}", "{ not a name }", "{unclosed"] {
            assert_eq!(spans(raw).len() % 2, 1, "template {raw:?}");
        }
    }

    #[test]
    fn test_invalid_placeholders_are_literal() {
        assert_eq!(spans("{ }"), vec!["{ }"]);
        assert_eq!(spans("{}"), vec!["{}"]);
        assert_eq!(spans("{open"), vec!["{open"]);
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(ParsedTemplate::parse("x").kind(), TemplateKind::Literal);
        assert_eq!(ParsedTemplate::parse("{x}").kind(), TemplateKind::BindRef);
        assert_eq!(ParsedTemplate::parse("a {x}").kind(), TemplateKind::Concat);
    }

    #[test]
    fn test_missing_bindings_sorted_and_complete() {
        let compiler = BindingFunctionCompiler::default();
        let bindings = BindingsTemplate::compile(&compiler, [("one", "Identity()")]).unwrap();

        let err = StringBindingsTemplate::new("{zeta} {one} {two} {two}", Arc::new(bindings))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingBinding);
        match err {
            BindingError::MissingBinding { missing, .. } => {
                assert_eq!(missing, vec!["two".to_string(), "zeta".to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_bind_renders_values() {
        let compiler = BindingFunctionCompiler::default();
        let bindings = BindingsTemplate::compile(
            &compiler,
            [("id", "Identity()"), ("bucket", "Mod(3)"), ("half", "ToDouble().Div(2.0)")],
        )
        .unwrap();
        let template =
            StringBindingsTemplate::new("id={id} bucket={bucket} half={half}", Arc::new(bindings))
                .unwrap();
        let binder = template.resolve_bindings().unwrap();

        let mut ctx = WorkerContext::new(0);
        assert_eq!(binder.bind(7, &mut ctx), "id=7 bucket=1 half=3.5");
    }

    #[test]
    fn test_each_binding_invoked_once_per_resolution() {
        let compiler = BindingFunctionCompiler::default();
        let bindings = BindingsTemplate::compile(&compiler, [("n", "Counter()")]).unwrap();
        let template = StringBindingsTemplate::new("{n}-{n}", Arc::new(bindings)).unwrap();
        let binder = template.resolve_bindings().unwrap();

        let mut ctx = WorkerContext::new(0);
        assert_eq!(binder.bind(0, &mut ctx), "0-0");
        assert_eq!(binder.bind(1, &mut ctx), "1-1");
    }
}
