//! Binding compilation, template construction, and per-worker resolution
//! through the public API.

use loadgen_core::bindings::{
    BindingFunctionCompiler, BindingsTemplate, ParsedTemplate, StringBindingsTemplate, Value,
    WorkerContext,
};
use loadgen_core::error::{BindingError, ErrorKind};
use std::sync::Arc;

fn compile(recipes: &[(&str, &str)]) -> Arc<BindingsTemplate> {
    let compiler = BindingFunctionCompiler::default();
    Arc::new(BindingsTemplate::compile(&compiler, recipes.iter().copied()).unwrap())
}

#[test]
fn test_template_with_unbound_placeholder_fails_construction() {
    let bindings = compile(&[("one", "Identity()")]);

    let err = StringBindingsTemplate::new("{one} {two}", bindings).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingBinding);
    assert!(err.kind().is_construction_time());
    match err {
        BindingError::MissingBinding { template, missing } => {
            assert_eq!(template, "{one} {two}");
            assert_eq!(missing, vec!["two".to_string()]);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_escaped_brace_spans() {
    let parsed = ParsedTemplate::parse("A\\{ {one}two");
    assert_eq!(parsed.spans(), ["A\\{ ", "one", "two"]);
    assert_eq!(parsed.anchors().collect::<Vec<_>>(), vec!["one"]);

    let parsed = ParsedTemplate::parse("A\\{{B}C");
    assert_eq!(parsed.spans(), ["A\\{", "B", "C"]);
}

#[test]
fn test_compile_error_kinds() {
    let compiler = BindingFunctionCompiler::default();

    let err = compiler.compile("Mod(3").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BindingSyntax);

    let err = compiler.compile("NoSuchMapper()").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownMapper);

    let err = compiler.compile("HashRange(0,9).Prefix('id-')").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);

    for err in [
        compiler.compile("Mod(3").unwrap_err(),
        compiler.compile("NoSuchMapper()").unwrap_err(),
    ] {
        assert!(err.kind().is_construction_time(), "{err}");
    }
}

#[test]
fn test_bindings_template_reports_first_failing_recipe() {
    let compiler = BindingFunctionCompiler::default();
    let err = BindingsTemplate::compile(&compiler, [("ok", "Identity()"), ("bad", "Nope()")])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownMapper);
}

#[test]
fn test_pure_bindings_are_identical_across_workers() {
    let bindings = compile(&[
        ("hash", "Hash()"),
        ("range", "HashRange(1, 1000)"),
        ("name", "NumberNameToString()"),
        ("user", "Mod(1000).ToString().Prefix('user-')"),
        ("color", "Select('[red,green,blue]')"),
    ]);

    let per_worker: Vec<Vec<_>> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..4usize)
            .map(|worker| {
                let bindings = Arc::clone(&bindings);
                scope.spawn(move || {
                    let resolver = bindings.resolve_bindings().unwrap();
                    let mut ctx = WorkerContext::new(worker);
                    (0..200u64)
                        .map(|cycle| resolver.resolve(cycle, &mut ctx))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    for other in &per_worker[1..] {
        assert_eq!(&per_worker[0], other);
    }
    assert_eq!(
        per_worker[0][42].get("user"),
        Some(&Value::Text("user-42".to_string()))
    );
}

#[test]
fn test_one_compilation_resolves_consistently_on_many_threads() {
    let bindings = compile(&[
        ("key", "Mod(100)"),
        ("amount", "HashRange(1, 1000)"),
        ("n", "Counter()"),
    ]);
    const THREADS: usize = 6;
    let barrier = std::sync::Barrier::new(THREADS);

    let per_thread: Vec<Vec<_>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|worker| {
                let bindings = Arc::clone(&bindings);
                let barrier = &barrier;
                scope.spawn(move || {
                    let resolver = bindings.resolve_bindings().unwrap();
                    let mut ctx = WorkerContext::new(worker);
                    barrier.wait();
                    (500..600u64)
                        .map(|cycle| resolver.resolve(cycle, &mut ctx))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for values in &per_thread {
        for (offset, resolved) in values.iter().enumerate() {
            let cycle = 500 + offset as u64;
            assert_eq!(resolved.get("key"), Some(&Value::Long((cycle % 100) as i64)));
            assert_eq!(resolved.get("amount"), per_thread[0][offset].get("amount"));
            assert_eq!(resolved.get("n"), Some(&Value::Long(offset as i64)));
        }
    }
}

#[test]
fn test_trailing_dot_is_a_syntax_error() {
    let compiler = BindingFunctionCompiler::default();
    let err = compiler.compile("Add(1).").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BindingSyntax);
    assert!(compiler.compile("compose Add(1); Mod(3);").is_ok());
}

#[test]
fn test_stateful_binding_is_isolated_per_worker() {
    let bindings = compile(&[("n", "Counter()")]);
    let template = StringBindingsTemplate::new("n={n}", bindings).unwrap();

    let first = template.resolve_bindings().unwrap();
    let second = template.resolve_bindings().unwrap();
    let mut first_ctx = WorkerContext::new(0);
    let mut second_ctx = WorkerContext::new(1);

    assert_eq!(first.bind(10, &mut first_ctx), "n=0");
    assert_eq!(first.bind(11, &mut first_ctx), "n=1");
    assert_eq!(second.bind(10, &mut second_ctx), "n=0");
    assert_eq!(first.bind(12, &mut first_ctx), "n=2");
}

#[test]
fn test_saved_value_visible_to_later_binding_in_same_cycle() {
    let bindings = compile(&[
        ("saved", "HashRange(0, 999).Save('last')"),
        ("echo", "Load('last', 0)"),
    ]);
    let template = StringBindingsTemplate::new("{saved}={echo}", bindings).unwrap();
    let binder = template.resolve_bindings().unwrap();
    let mut ctx = WorkerContext::new(0);

    for cycle in 0..20 {
        let rendered = binder.bind(cycle, &mut ctx);
        let (saved, echo) = rendered.split_once('=').unwrap();
        assert_eq!(saved, echo, "cycle {cycle}");
    }
    assert!(ctx.get("last").is_some());
}

#[test]
fn test_literal_template_needs_no_bindings() {
    let template = StringBindingsTemplate::new("select 1", compile(&[])).unwrap();
    let binder = template.resolve_bindings().unwrap();
    assert_eq!(binder.bind(99, &mut WorkerContext::new(0)), "select 1");
}
