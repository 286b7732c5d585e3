use proptest::prelude::*;
use proptest::strategy::Just;

/// Strategy for bounded `(start, end)` cycle intervals, including empty ones
pub fn cycle_interval_strategy() -> impl Strategy<Value = (u64, u64)> {
    (0u64..10_000, 0u64..2_000).prop_map(|(start, len)| (start, start + len))
}

/// Strategy for worker counts
pub fn worker_count_strategy() -> impl Strategy<Value = usize> {
    1usize..=8
}

/// Strategy for segment strides
pub fn stride_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![Just(1u64), 2u64..=16, Just(100u64)]
}

/// Strategy for cycle numbers used as binding inputs
pub fn cycle_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![0u64..1_000, any::<u64>().prop_map(|c| c % (i64::MAX as u64))]
}

/// Strategy for pure (stateless) binding recipes
pub fn pure_recipe_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("Identity()"),
        Just("Hash()"),
        Just("HashRange(1, 1000)"),
        Just("Mod(97).Add(3)"),
        Just("HashedDoubleRange(0.0, 1.0)"),
        Just("Mod(1000).ToString().Prefix('user-')"),
        Just("NumberNameToString()"),
        Just("Template('{}-{}', Mod(10), Hash())"),
        Just("Select('[red,green,blue]')"),
        Just("Sequence('[1..9 2]')"),
    ]
}

/// Strategy for template literal text without braces or backslashes
pub fn literal_text_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ,.:;=-]{0,16}"
}

/// Strategy for placeholder names
pub fn placeholder_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,11}"
}
