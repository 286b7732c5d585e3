//! Layered activity configuration loading.

use loadgen_core::activity::SequencerType;
use loadgen_core::bindings::BindingFunctionCompiler;
use loadgen_core::config::{ConfigManager, ConfigurationError};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

const BASE: &str = r#"
alias: orders
cycles: "1K..2K"
threads: 4
stride: 10
max_tries: 5
retry_delay_ms: 20
max_retry_delay_ms: 200
errors: "Timeout:retry,warn;Duplicate:ignore"
bindings:
  user: "Mod(1000).ToString().Prefix('user-')"
  amount: "HashRange(1, 500)"
  region: "Select('[eu,us,ap]')"
templates:
  stmt: "insert into orders values ('{user}', {amount}, '{region}')"
"#;

fn config_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, body) in files {
        fs::write(dir.path().join(name), body).unwrap();
    }
    dir
}

#[test]
fn test_full_activity_document_loads() {
    let dir = config_dir(&[("activity.yaml", BASE)]);
    let manager = ConfigManager::load_with_env_prefix(
        Some(dir.path().to_path_buf()),
        "development",
        "LOADGEN_IT_FULL",
    )
    .unwrap();
    let config = manager.config();

    assert_eq!(manager.config_directory(), Some(dir.path()));
    assert_eq!(config.alias, "orders");
    let range = config.cycle_range().unwrap();
    assert_eq!((range.start(), range.end()), (1_000, Some(2_000)));
    assert_eq!(config.effective_max_in_flight(), 4);
    assert_eq!(
        config.bindings.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["user", "amount", "region"]
    );

    let policy = config.retry_policy();
    assert_eq!(policy.max_tries, 5);
    assert_eq!(policy.retry_delay, Duration::from_millis(20));
    assert_eq!(policy.max_retry_delay, Duration::from_millis(200));

    let mapping = config.error_mapping().unwrap();
    assert_eq!(mapping.len(), 2);
    assert!(mapping.resolve("Duplicate").is_some());
    assert!(mapping.resolve("Unknown").is_none());
}

#[test]
fn test_overlay_and_environment_variables_layer_in_order() {
    let dir = config_dir(&[
        ("activity.yaml", BASE),
        ("activity.perf.yaml", "threads: 16\nmax_in_flight: 32\n"),
    ]);
    std::env::set_var("LOADGEN_IT_LAYERS__STRIDE", "50");

    let manager = ConfigManager::load_with_env_prefix(
        Some(dir.path().to_path_buf()),
        "perf",
        "LOADGEN_IT_LAYERS",
    )
    .unwrap();
    let config = manager.config();

    assert_eq!(manager.environment(), "perf");
    assert_eq!(config.threads, 16);
    assert_eq!(config.effective_max_in_flight(), 32);
    assert_eq!(config.stride, 50);
    assert_eq!(config.alias, "orders");
}

#[test]
fn test_missing_overlay_is_not_an_error() {
    let dir = config_dir(&[("activity.toml", "alias = \"tomlish\"\ncycles = \"10\"\n")]);
    let manager = ConfigManager::load_with_env_prefix(
        Some(dir.path().to_path_buf()),
        "production",
        "LOADGEN_IT_TOML",
    )
    .unwrap();
    assert_eq!(manager.config().alias, "tomlish");
    assert_eq!(manager.config().threads, 1);
}

#[test]
fn test_invalid_cycles_spec_rejected() {
    let dir = config_dir(&[("activity.yaml", "alias: bad\ncycles: \"9..3\"\n")]);
    let err = ConfigManager::load_with_env_prefix(
        Some(dir.path().to_path_buf()),
        "test",
        "LOADGEN_IT_CYCLES",
    )
    .unwrap_err();
    assert!(
        matches!(err, ConfigurationError::InvalidCyclesSpec { ref spec, .. } if spec == "9..3"),
        "{err:?}"
    );
}

#[test]
fn test_invalid_error_spec_rejected() {
    let dir = config_dir(&[("activity.yaml", "alias: bad\nerrors: \"Timeout:explode\"\n")]);
    let err = ConfigManager::load_with_env_prefix(
        Some(dir.path().to_path_buf()),
        "test",
        "LOADGEN_IT_ERRORS",
    )
    .unwrap_err();
    assert!(matches!(err, ConfigurationError::InvalidErrorSpec { .. }), "{err:?}");
}

#[test]
fn test_retry_delay_ordering_enforced() {
    let dir = config_dir(&[(
        "activity.json",
        r#"{"alias": "delays", "retry_delay_ms": 900, "max_retry_delay_ms": 100}"#,
    )]);
    let err = ConfigManager::load_with_env_prefix(
        Some(dir.path().to_path_buf()),
        "test",
        "LOADGEN_IT_DELAYS",
    )
    .unwrap_err();
    assert!(matches!(err, ConfigurationError::InvalidValue { .. }), "{err:?}");
}

#[test]
fn test_named_ops_with_ratios_load() {
    let dir = config_dir(&[(
        "activity.yaml",
        r#"
alias: mixed
cycles: "100"
seq: interval
bindings:
  id: "Mod(50)"
ops:
  read:
    ratio: 4
    fields:
      stmt: "select {id}"
  write:
    ratio: 2
    fields:
      stmt: "insert {id}"
  audit:
    fields:
      stmt: "log {id}"
"#,
    )]);
    let manager = ConfigManager::load_with_env_prefix(
        Some(dir.path().to_path_buf()),
        "test",
        "LOADGEN_IT_OPS",
    )
    .unwrap();
    let config = manager.config();

    assert_eq!(config.seq, SequencerType::Interval);
    assert_eq!(config.ops["audit"].ratio, 1);
    let ops = config
        .compile_ops(&BindingFunctionCompiler::default())
        .unwrap();
    assert_eq!(ops.sequence().len(), 7);
    assert_eq!(
        (0..7u64).map(|cycle| ops.op_for(cycle).name()).collect::<Vec<_>>(),
        vec!["read", "write", "audit", "read", "read", "write", "read"]
    );
}

#[test]
fn test_unknown_sequencer_rejected() {
    let dir = config_dir(&[("activity.yaml", "alias: bad\nseq: shuffle\n")]);
    let err = ConfigManager::load_with_env_prefix(
        Some(dir.path().to_path_buf()),
        "test",
        "LOADGEN_IT_SEQ",
    )
    .unwrap_err();
    assert!(matches!(err, ConfigurationError::LoadFailed { .. }), "{err:?}");
}
