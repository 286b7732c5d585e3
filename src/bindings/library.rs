//! Standard mapper library.
//!
//! Every mapper here is a pure function of its input except `Counter`,
//! `Save` and `Load`. Pure mappers are deterministic: the same input always
//! yields the same output on every worker and every run.

use super::mapper::{BindingFunction, MapperArg, MapperDescriptor, MapperFn};
use super::registry::MapperRegistry;
use super::types::{Value, ValueType};
use crate::error::{BindingError, BindingResult};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Upper bound on values produced by a `[a..b step]` list literal.
const MAX_LIST_VALUES: usize = 1_000_000;

pub fn register_standard(registry: &mut MapperRegistry) {
    use ValueType::{Bool, Double, Int, Long, Object, Text};

    registry
        .register(
            MapperDescriptor::new("Identity", Long, Long, identity)
                .with_summary("Pass the cycle through unchanged"),
        )
        .register(MapperDescriptor::new("Add", Long, Long, add_long).with_summary("Add a constant"))
        .register(MapperDescriptor::new("Add", Double, Double, add_double))
        .register(
            MapperDescriptor::new("Mul", Long, Long, mul_long).with_summary("Multiply by a constant"),
        )
        .register(MapperDescriptor::new("Mul", Double, Double, mul_double))
        .register(
            MapperDescriptor::new("Div", Long, Long, div_long)
                .with_summary("Divide by a non-zero constant"),
        )
        .register(MapperDescriptor::new("Div", Double, Double, div_double))
        .register(
            MapperDescriptor::new("Mod", Long, Long, mod_long)
                .with_summary("Euclidean remainder by a non-zero constant"),
        )
        .register(MapperDescriptor::new("Mod", Double, Double, mod_double))
        .register(
            MapperDescriptor::new("Clamp", Long, Long, clamp).with_summary("Clamp into [min, max]"),
        )
        .register(
            MapperDescriptor::new("Hash", Long, Long, hash)
                .with_summary("Non-negative 64-bit mixing hash"),
        )
        .register(
            MapperDescriptor::new("HashRange", Long, Long, hash_range)
                .with_summary("Hash into [min, max] inclusive"),
        )
        .register(
            MapperDescriptor::new("HashedDoubleRange", Long, Double, hashed_double_range)
                .with_summary("Hash into a double in [min, max]"),
        )
        .register(
            MapperDescriptor::new("FixedValue", Long, Long, fixed_value)
                .with_summary("Ignore the input and return a constant"),
        )
        .register(MapperDescriptor::new("ToDouble", Long, Double, to_double))
        .register(MapperDescriptor::new("ToLong", Double, Long, to_long))
        .register(MapperDescriptor::new("ToInt", Long, Int, to_int))
        .register(
            MapperDescriptor::new("ToString", Object, Text, to_string)
                .with_summary("Render any value as text"),
        )
        .register(
            MapperDescriptor::new("NumberNameToString", Long, Text, number_name_to_string)
                .with_summary("Spell the number out in English words"),
        )
        .register(MapperDescriptor::new("Prefix", Text, Text, prefix))
        .register(MapperDescriptor::new("Suffix", Text, Text, suffix))
        .register(MapperDescriptor::new("StaticString", Long, Text, static_string))
        .register(
            MapperDescriptor::new("Template", Long, Text, template)
                .with_summary("Fill '{}' slots with nested functions; slot i sees input + i"),
        )
        .register(
            MapperDescriptor::new("Select", Long, Text, select)
                .with_summary("Pick from a '[a,b,c]' list by input modulo length"),
        )
        .register(
            MapperDescriptor::new("Sequence", Long, Long, sequence)
                .with_summary("Pick from a '[a..b step]' numeric list by input modulo length"),
        )
        .register(
            MapperDescriptor::new("Counter", Long, Long, counter)
                .with_summary("Count invocations on this worker")
                .per_worker()
                .stateful(),
        );

    for ty in [Long, Int, Double, Bool, Text] {
        registry.register(
            MapperDescriptor::new("Save", ty, ty, save)
                .with_summary("Store the value in a worker variable and pass it on")
                .stateful(),
        );
    }

    registry
        .register(
            MapperDescriptor::new("Load", Long, Long, load_long)
                .with_summary("Read a worker variable, falling back to the default")
                .stateful(),
        )
        .register(MapperDescriptor::new("Load", Long, Double, load_double).stateful())
        .register(MapperDescriptor::new("Load", Long, Text, load_text).stateful())
        .register(MapperDescriptor::new("Load", Long, Bool, load_bool).stateful());
}

/// Non-negative 64-bit mix of `value` (murmur3 finalizer over a seeded input).
pub fn mix64(value: i64) -> i64 {
    let mut z = (value as u64) ^ 0x9E37_79B9_7F4A_7C15;
    z = (z ^ (z >> 33)).wrapping_mul(0xff51_afd7_ed55_8ccd);
    z = (z ^ (z >> 33)).wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    z ^= z >> 33;
    (z & i64::MAX as u64) as i64
}

fn expect_arity(mapper: &str, args: &[MapperArg], min: usize, max: usize) -> BindingResult<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("{min}")
        } else {
            format!("{min} to {max}")
        };
        return Err(BindingError::invalid_arguments(
            mapper,
            format!("expected {expected} arguments, got {}", args.len()),
        ));
    }
    Ok(())
}

fn wrong_type(mapper: &str, index: usize, wanted: &str, got: &MapperArg) -> BindingError {
    BindingError::invalid_arguments(
        mapper,
        format!("argument {index} must be {wanted}, got {}", got.describe()),
    )
}

fn long_arg(mapper: &str, args: &[MapperArg], index: usize) -> BindingResult<i64> {
    match &args[index] {
        MapperArg::Long(v) => Ok(*v),
        other => Err(wrong_type(mapper, index, "an integer", other)),
    }
}

fn double_arg(mapper: &str, args: &[MapperArg], index: usize) -> BindingResult<f64> {
    match &args[index] {
        MapperArg::Double(v) => Ok(*v),
        other => Err(wrong_type(mapper, index, "a float", other)),
    }
}

fn number_arg(mapper: &str, args: &[MapperArg], index: usize) -> BindingResult<f64> {
    match &args[index] {
        MapperArg::Double(v) => Ok(*v),
        MapperArg::Long(v) => Ok(*v as f64),
        other => Err(wrong_type(mapper, index, "a number", other)),
    }
}

fn text_arg(mapper: &str, args: &[MapperArg], index: usize) -> BindingResult<String> {
    match &args[index] {
        MapperArg::Text(v) => Ok(v.clone()),
        other => Err(wrong_type(mapper, index, "a string", other)),
    }
}

fn function_arg(mapper: &str, args: &[MapperArg], index: usize) -> BindingResult<BindingFunction> {
    match &args[index] {
        MapperArg::Function(f) => Ok(f.clone()),
        other => Err(wrong_type(mapper, index, "a function", other)),
    }
}

fn identity(args: &[MapperArg]) -> BindingResult<MapperFn> {
    expect_arity("Identity", args, 0, 0)?;
    Ok(MapperFn::long_unary(|v| v))
}

fn add_long(args: &[MapperArg]) -> BindingResult<MapperFn> {
    expect_arity("Add", args, 1, 1)?;
    let addend = long_arg("Add", args, 0)?;
    Ok(MapperFn::long_unary(move |v| v.wrapping_add(addend)))
}

fn add_double(args: &[MapperArg]) -> BindingResult<MapperFn> {
    expect_arity("Add", args, 1, 1)?;
    let addend = double_arg("Add", args, 0)?;
    Ok(MapperFn::double_unary(move |v| v + addend))
}

fn mul_long(args: &[MapperArg]) -> BindingResult<MapperFn> {
    expect_arity("Mul", args, 1, 1)?;
    let factor = long_arg("Mul", args, 0)?;
    Ok(MapperFn::long_unary(move |v| v.wrapping_mul(factor)))
}

fn mul_double(args: &[MapperArg]) -> BindingResult<MapperFn> {
    expect_arity("Mul", args, 1, 1)?;
    let factor = double_arg("Mul", args, 0)?;
    Ok(MapperFn::double_unary(move |v| v * factor))
}

fn div_long(args: &[MapperArg]) -> BindingResult<MapperFn> {
    expect_arity("Div", args, 1, 1)?;
    let divisor = long_arg("Div", args, 0)?;
    if divisor == 0 {
        return Err(BindingError::invalid_arguments("Div", "divisor must not be zero"));
    }
    Ok(MapperFn::long_unary(move |v| v.wrapping_div(divisor)))
}

fn div_double(args: &[MapperArg]) -> BindingResult<MapperFn> {
    expect_arity("Div", args, 1, 1)?;
    let divisor = double_arg("Div", args, 0)?;
    if divisor == 0.0 {
        return Err(BindingError::invalid_arguments("Div", "divisor must not be zero"));
    }
    Ok(MapperFn::double_unary(move |v| v / divisor))
}

fn mod_long(args: &[MapperArg]) -> BindingResult<MapperFn> {
    expect_arity("Mod", args, 1, 1)?;
    let modulus = long_arg("Mod", args, 0)?;
    if modulus == 0 {
        return Err(BindingError::invalid_arguments("Mod", "modulus must not be zero"));
    }
    Ok(MapperFn::long_unary(move |v| v.wrapping_rem_euclid(modulus)))
}

fn mod_double(args: &[MapperArg]) -> BindingResult<MapperFn> {
    expect_arity("Mod", args, 1, 1)?;
    let modulus = double_arg("Mod", args, 0)?;
    if modulus == 0.0 {
        return Err(BindingError::invalid_arguments("Mod", "modulus must not be zero"));
    }
    Ok(MapperFn::double_unary(move |v| v.rem_euclid(modulus)))
}

fn clamp(args: &[MapperArg]) -> BindingResult<MapperFn> {
    expect_arity("Clamp", args, 2, 2)?;
    let min = long_arg("Clamp", args, 0)?;
    let max = long_arg("Clamp", args, 1)?;
    if min > max {
        return Err(BindingError::invalid_arguments(
            "Clamp",
            format!("min {min} exceeds max {max}"),
        ));
    }
    Ok(MapperFn::long_unary(move |v| v.clamp(min, max)))
}

fn hash(args: &[MapperArg]) -> BindingResult<MapperFn> {
    expect_arity("Hash", args, 0, 0)?;
    Ok(MapperFn::long_unary(mix64))
}

fn hash_range(args: &[MapperArg]) -> BindingResult<MapperFn> {
    expect_arity("HashRange", args, 1, 2)?;
    let (min, max) = if args.len() == 1 {
        (0, long_arg("HashRange", args, 0)?)
    } else {
        (long_arg("HashRange", args, 0)?, long_arg("HashRange", args, 1)?)
    };
    if min > max {
        return Err(BindingError::invalid_arguments(
            "HashRange",
            format!("min {min} exceeds max {max}"),
        ));
    }
    let width = (i128::from(max) - i128::from(min) + 1) as u128;
    Ok(MapperFn::long_unary(move |v| {
        let offset = (mix64(v) as u128) % width;
        (i128::from(min) + offset as i128) as i64
    }))
}

fn hashed_double_range(args: &[MapperArg]) -> BindingResult<MapperFn> {
    expect_arity("HashedDoubleRange", args, 2, 2)?;
    let min = number_arg("HashedDoubleRange", args, 0)?;
    let max = number_arg("HashedDoubleRange", args, 1)?;
    if min > max {
        return Err(BindingError::invalid_arguments(
            "HashedDoubleRange",
            format!("min {min} exceeds max {max}"),
        ));
    }
    let span = max - min;
    Ok(MapperFn::long_to_double(move |v| {
        let unit = mix64(v) as f64 / i64::MAX as f64;
        min + unit * span
    }))
}

fn fixed_value(args: &[MapperArg]) -> BindingResult<MapperFn> {
    expect_arity("FixedValue", args, 1, 1)?;
    let value = long_arg("FixedValue", args, 0)?;
    Ok(MapperFn::long_unary(move |_| value))
}

fn to_double(args: &[MapperArg]) -> BindingResult<MapperFn> {
    expect_arity("ToDouble", args, 0, 0)?;
    Ok(MapperFn::long_to_double(|v| v as f64))
}

fn to_long(args: &[MapperArg]) -> BindingResult<MapperFn> {
    expect_arity("ToLong", args, 0, 0)?;
    Ok(MapperFn::function(|value| match value {
        Value::Double(d) => Value::Long(d as i64),
        other => other,
    }))
}

fn to_int(args: &[MapperArg]) -> BindingResult<MapperFn> {
    expect_arity("ToInt", args, 0, 0)?;
    Ok(MapperFn::long_function(|v| Value::Int(v as i32)))
}

fn to_string(args: &[MapperArg]) -> BindingResult<MapperFn> {
    expect_arity("ToString", args, 0, 0)?;
    Ok(MapperFn::function(|value| match value {
        Value::Text(s) => Value::Text(s),
        other => Value::Text(other.to_string()),
    }))
}

fn number_name_to_string(args: &[MapperArg]) -> BindingResult<MapperFn> {
    expect_arity("NumberNameToString", args, 0, 0)?;
    Ok(MapperFn::long_function(|v| Value::Text(number_name(v))))
}

fn prefix(args: &[MapperArg]) -> BindingResult<MapperFn> {
    expect_arity("Prefix", args, 1, 1)?;
    let prefix = text_arg("Prefix", args, 0)?;
    Ok(MapperFn::function(move |value| {
        Value::Text(format!("{prefix}{value}"))
    }))
}

fn suffix(args: &[MapperArg]) -> BindingResult<MapperFn> {
    expect_arity("Suffix", args, 1, 1)?;
    let suffix = text_arg("Suffix", args, 0)?;
    Ok(MapperFn::function(move |value| {
        Value::Text(format!("{value}{suffix}"))
    }))
}

fn static_string(args: &[MapperArg]) -> BindingResult<MapperFn> {
    expect_arity("StaticString", args, 1, 1)?;
    let text = text_arg("StaticString", args, 0)?;
    Ok(MapperFn::long_function(move |_| Value::Text(text.clone())))
}

fn template(args: &[MapperArg]) -> BindingResult<MapperFn> {
    expect_arity("Template", args, 1, usize::MAX)?;
    let format = text_arg("Template", args, 0)?;
    let pieces: Vec<String> = format.split("{}").map(str::to_string).collect();
    let functions = (1..args.len())
        .map(|i| function_arg("Template", args, i))
        .collect::<BindingResult<Vec<_>>>()?;

    if pieces.len() - 1 != functions.len() {
        return Err(BindingError::invalid_arguments(
            "Template",
            format!(
                "format has {} '{{}}' slots but {} functions were given",
                pieces.len() - 1,
                functions.len()
            ),
        ));
    }

    Ok(MapperFn::long_function(move |v| {
        let mut out = String::with_capacity(format.len() + functions.len() * 8);
        out.push_str(&pieces[0]);
        for (i, function) in functions.iter().enumerate() {
            out.push_str(&function.apply_detached(v.wrapping_add(i as i64)).to_string());
            out.push_str(&pieces[i + 1]);
        }
        Value::Text(out)
    }))
}

fn select(args: &[MapperArg]) -> BindingResult<MapperFn> {
    expect_arity("Select", args, 1, 1)?;
    let values: Arc<[String]> = parse_list("Select", &text_arg("Select", args, 0)?)?.into();
    let len = values.len() as i64;
    Ok(MapperFn::long_function(move |v| {
        Value::Text(values[v.rem_euclid(len) as usize].clone())
    }))
}

fn sequence(args: &[MapperArg]) -> BindingResult<MapperFn> {
    expect_arity("Sequence", args, 1, 1)?;
    let values: Arc<[i64]> = parse_list("Sequence", &text_arg("Sequence", args, 0)?)?
        .iter()
        .map(|item| {
            item.parse::<i64>().map_err(|_| {
                BindingError::invalid_arguments("Sequence", format!("'{item}' is not an integer"))
            })
        })
        .collect::<BindingResult<Vec<_>>>()?
        .into();
    let len = values.len() as i64;
    Ok(MapperFn::long_unary(move |v| values[v.rem_euclid(len) as usize]))
}

fn counter(args: &[MapperArg]) -> BindingResult<MapperFn> {
    expect_arity("Counter", args, 0, 0)?;
    let count = AtomicI64::new(0);
    Ok(MapperFn::long_unary(move |_| {
        count.fetch_add(1, Ordering::Relaxed)
    }))
}

fn save(args: &[MapperArg]) -> BindingResult<MapperFn> {
    expect_arity("Save", args, 1, 1)?;
    let name = text_arg("Save", args, 0)?;
    Ok(MapperFn::contextual(move |value, ctx| {
        ctx.set(name.as_str(), value.clone());
        value
    }))
}

fn load_typed(args: &[MapperArg], expected: ValueType) -> BindingResult<MapperFn> {
    expect_arity("Load", args, 2, 2)?;
    let name = text_arg("Load", args, 0)?;
    let default = match (&args[1], expected) {
        (MapperArg::Long(v), ValueType::Long) => Value::Long(*v),
        (MapperArg::Double(v), ValueType::Double) => Value::Double(*v),
        (MapperArg::Text(v), ValueType::Text) => Value::Text(v.clone()),
        (MapperArg::Bool(v), ValueType::Bool) => Value::Bool(*v),
        (other, _) => {
            return Err(wrong_type(
                "Load",
                1,
                &format!("a {expected} default"),
                other,
            ))
        }
    };
    Ok(MapperFn::contextual(move |_, ctx| {
        match ctx.get(&name) {
            Some(value) if value.value_type() == expected => value.clone(),
            _ => default.clone(),
        }
    }))
}

fn load_long(args: &[MapperArg]) -> BindingResult<MapperFn> {
    load_typed(args, ValueType::Long)
}

fn load_double(args: &[MapperArg]) -> BindingResult<MapperFn> {
    load_typed(args, ValueType::Double)
}

fn load_text(args: &[MapperArg]) -> BindingResult<MapperFn> {
    load_typed(args, ValueType::Text)
}

fn load_bool(args: &[MapperArg]) -> BindingResult<MapperFn> {
    load_typed(args, ValueType::Bool)
}

/// Parse `[a,b,c]` or `[lo..hi step]` (inclusive, step defaults to 1).
fn parse_list(mapper: &str, spec: &str) -> BindingResult<Vec<String>> {
    let inner = spec
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| {
            BindingError::invalid_arguments(mapper, format!("'{spec}' is not a bracketed list"))
        })?;

    if let Some((lo, rest)) = inner.split_once("..") {
        let mut parts = rest.split_whitespace();
        let parse = |raw: &str| {
            raw.trim().parse::<i64>().map_err(|_| {
                BindingError::invalid_arguments(mapper, format!("'{raw}' is not an integer"))
            })
        };
        let lo = parse(lo)?;
        let hi = parse(parts.next().unwrap_or(""))?;
        let step = parts.next().map(parse).transpose()?.unwrap_or(1);
        if step <= 0 || lo > hi {
            return Err(BindingError::invalid_arguments(
                mapper,
                format!("range '{inner}' needs lo <= hi and a positive step"),
            ));
        }
        let count = ((i128::from(hi) - i128::from(lo)) / i128::from(step) + 1) as u128;
        if count > MAX_LIST_VALUES as u128 {
            return Err(BindingError::invalid_arguments(
                mapper,
                format!("range '{inner}' produces more than {MAX_LIST_VALUES} values"),
            ));
        }
        return Ok((0..count as i64)
            .map(|i| (lo + i * step).to_string())
            .collect());
    }

    let values: Vec<String> = inner
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();
    if values.is_empty() {
        return Err(BindingError::invalid_arguments(mapper, "list is empty"));
    }
    Ok(values)
}

const ONES: [&str; 20] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen",
    "nineteen",
];

const TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

const SCALES: [(u64, &str); 6] = [
    (1_000_000_000_000_000_000, "quintillion"),
    (1_000_000_000_000_000, "quadrillion"),
    (1_000_000_000_000, "trillion"),
    (1_000_000_000, "billion"),
    (1_000_000, "million"),
    (1_000, "thousand"),
];

fn number_name(value: i64) -> String {
    if value == 0 {
        return ONES[0].to_string();
    }
    let mut words = Vec::new();
    if value < 0 {
        words.push("negative".to_string());
    }
    let mut n = value.unsigned_abs();
    for (scale, label) in SCALES {
        if n >= scale {
            words.push(format!("{} {label}", below_thousand(n / scale)));
            n %= scale;
        }
    }
    if n > 0 {
        words.push(below_thousand(n));
    }
    words.join(" ")
}

fn below_thousand(mut n: u64) -> String {
    let mut parts = Vec::new();
    if n >= 100 {
        parts.push(format!("{} hundred", ONES[(n / 100) as usize]));
        n %= 100;
    }
    if n >= 20 {
        let tens = TENS[(n / 10) as usize];
        if n % 10 == 0 {
            parts.push(tens.to_string());
        } else {
            parts.push(format!("{tens}-{}", ONES[(n % 10) as usize]));
        }
    } else if n > 0 {
        parts.push(ONES[n as usize].to_string());
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::context::WorkerContext;
    use crate::bindings::mapper::Stage;
    use crate::bindings::types::Conversion;
    use crate::error::ErrorKind;

    fn call(f: &MapperFn, input: Value) -> Value {
        f.call(input, &mut WorkerContext::default())
    }

    #[test]
    fn test_mix64_is_deterministic_and_non_negative() {
        for v in [-5, 0, 1, 42, i64::MAX, i64::MIN] {
            assert_eq!(mix64(v), mix64(v));
            assert!(mix64(v) >= 0);
        }
        assert_ne!(mix64(1), mix64(2));
    }

    #[test]
    fn test_arithmetic_overloads() {
        let add = add_long(&[MapperArg::Long(5)]).unwrap();
        assert_eq!(call(&add, Value::Long(10)), Value::Long(15));

        let modulo = mod_long(&[MapperArg::Long(3)]).unwrap();
        assert_eq!(call(&modulo, Value::Long(-1)), Value::Long(2));

        let half = mul_double(&[MapperArg::Double(0.5)]).unwrap();
        assert_eq!(call(&half, Value::Double(3.0)), Value::Double(1.5));

        assert!(add_long(&[MapperArg::Double(1.5)]).is_err());
        assert!(add_double(&[MapperArg::Long(1)]).is_err());
    }

    #[test]
    fn test_zero_divisor_rejected() {
        let err = div_long(&[MapperArg::Long(0)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArguments);
        assert!(mod_long(&[MapperArg::Long(0)]).is_err());
        assert!(mod_double(&[MapperArg::Double(0.0)]).is_err());
    }

    #[test]
    fn test_hash_range_stays_in_bounds() {
        let f = hash_range(&[MapperArg::Long(10), MapperArg::Long(20)]).unwrap();
        for v in 0..1_000 {
            let Value::Long(out) = call(&f, Value::Long(v)) else {
                panic!("expected long");
            };
            assert!((10..=20).contains(&out));
        }
        assert!(hash_range(&[MapperArg::Long(5), MapperArg::Long(1)]).is_err());
    }

    #[test]
    fn test_hashed_double_range_bounds() {
        let f = hashed_double_range(&[MapperArg::Long(0), MapperArg::Double(1.0)]).unwrap();
        for v in 0..1_000 {
            let out = call(&f, Value::Long(v)).as_double().unwrap();
            assert!((0.0..=1.0).contains(&out));
        }
    }

    #[test]
    fn test_number_names() {
        assert_eq!(number_name(0), "zero");
        assert_eq!(number_name(7), "seven");
        assert_eq!(number_name(42), "forty-two");
        assert_eq!(number_name(115), "one hundred fifteen");
        assert_eq!(number_name(2_000_003), "two million three");
        assert_eq!(number_name(-30), "negative thirty");
    }

    #[test]
    fn test_select_and_sequence_lists() {
        let pick = select(&[MapperArg::Text("[a, b, c]".into())]).unwrap();
        assert_eq!(call(&pick, Value::Long(4)), Value::from("b"));

        let seq = sequence(&[MapperArg::Text("[10..20 5]".into())]).unwrap();
        assert_eq!(call(&seq, Value::Long(0)), Value::Long(10));
        assert_eq!(call(&seq, Value::Long(2)), Value::Long(20));
        assert_eq!(call(&seq, Value::Long(3)), Value::Long(10));

        assert!(select(&[MapperArg::Text("a,b".into())]).is_err());
        assert!(sequence(&[MapperArg::Text("[1..5 0]".into())]).is_err());
    }

    #[test]
    fn test_template_slot_count_must_match() {
        let ident = BindingFunction::new(
            vec![Stage {
                adapter: Conversion::Identity,
                func: MapperFn::long_unary(|v| v),
            }],
            Conversion::Identity,
            ValueType::Long,
        );
        let f = template(&[
            MapperArg::Text("{}-{}".into()),
            MapperArg::Function(ident.clone()),
            MapperArg::Function(ident.clone()),
        ])
        .unwrap();
        assert_eq!(call(&f, Value::Long(5)), Value::from("5-6"));

        let err = template(&[MapperArg::Text("{}-{}".into()), MapperArg::Function(ident)])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArguments);
    }

    #[test]
    fn test_save_then_load_through_context() {
        let save = save(&[MapperArg::Text("user".into())]).unwrap();
        let load = load_long(&[MapperArg::Text("user".into()), MapperArg::Long(-1)]).unwrap();
        let (MapperFn::Contextual(save), MapperFn::Contextual(load)) = (save, load) else {
            panic!("expected contextual mappers");
        };

        let mut ctx = WorkerContext::new(0);
        assert_eq!(load(Value::Long(0), &mut ctx), Value::Long(-1));
        save(Value::Long(77), &mut ctx);
        assert_eq!(load(Value::Long(0), &mut ctx), Value::Long(77));
    }

    #[test]
    fn test_load_default_must_match_overload() {
        assert!(load_long(&[MapperArg::Text("x".into()), MapperArg::Text("y".into())]).is_err());
        assert!(load_text(&[MapperArg::Text("x".into()), MapperArg::Text("y".into())]).is_ok());
    }

    #[test]
    fn test_counter_counts_per_instance() {
        let first = counter(&[]).unwrap();
        let second = counter(&[]).unwrap();
        assert_eq!(call(&first, Value::Long(100)), Value::Long(0));
        assert_eq!(call(&first, Value::Long(100)), Value::Long(1));
        assert_eq!(call(&second, Value::Long(100)), Value::Long(0));
    }
}
