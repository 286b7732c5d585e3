//! Value types flowing through binding chains.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declared type of a mapper input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Long,
    Int,
    Double,
    Bool,
    Text,
    /// Any value; accepts every other type.
    Object,
}

/// Adapter inserted between two stages whose declared types differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    Identity,
    IntToLong,
    IntToDouble,
    LongToDouble,
    ToObject,
}

impl ValueType {
    /// The conversion that lets a value of `self` flow into a slot declared
    /// as `target`, if one exists. Only widening conversions are implicit.
    pub fn conversion_to(self, target: ValueType) -> Option<Conversion> {
        use ValueType::*;
        match (self, target) {
            (from, to) if from == to => Some(Conversion::Identity),
            (_, Object) => Some(Conversion::ToObject),
            (Int, Long) => Some(Conversion::IntToLong),
            (Int, Double) => Some(Conversion::IntToDouble),
            (Long, Double) => Some(Conversion::LongToDouble),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Long => "long",
            Self::Int => "int",
            Self::Double => "double",
            Self::Bool => "boolean",
            Self::Text => "String",
            Self::Object => "Object",
        };
        write!(f, "{name}")
    }
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "long" | "Long" => Ok(Self::Long),
            "int" | "Integer" => Ok(Self::Int),
            "double" | "Double" => Ok(Self::Double),
            "boolean" | "Boolean" | "bool" => Ok(Self::Bool),
            "String" | "string" => Ok(Self::Text),
            "Object" | "object" => Ok(Self::Object),
            _ => Err(format!("unknown type '{s}'")),
        }
    }
}

impl Conversion {
    pub fn apply(self, value: Value) -> Value {
        match (self, value) {
            (Self::IntToLong, Value::Int(v)) => Value::Long(i64::from(v)),
            (Self::IntToDouble, Value::Int(v)) => Value::Double(f64::from(v)),
            // i64 -> f64 is lossy above 2^53, same as any widening to double.
            (Self::LongToDouble, Value::Long(v)) => Value::Double(v as f64),
            (_, value) => value,
        }
    }
}

/// A value produced by a binding.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Long(i64),
    Int(i32),
    Double(f64),
    Bool(bool),
    Text(String),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Long(_) => ValueType::Long,
            Self::Int(_) => ValueType::Int,
            Self::Double(_) => ValueType::Double,
            Self::Bool(_) => ValueType::Bool,
            Self::Text(_) => ValueType::Text,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Self::Long(v) => Some(*v),
            Self::Int(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Long(v) => serde_json::Value::from(*v),
            Self::Int(v) => serde_json::Value::from(*v),
            Self::Double(v) => serde_json::Value::from(*v),
            Self::Bool(v) => serde_json::Value::from(*v),
            Self::Text(v) => serde_json::Value::from(v.as_str()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Double(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{v:.1}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_widening_conversions_exist() {
        assert_eq!(
            ValueType::Int.conversion_to(ValueType::Long),
            Some(Conversion::IntToLong)
        );
        assert_eq!(
            ValueType::Long.conversion_to(ValueType::Double),
            Some(Conversion::LongToDouble)
        );
        assert_eq!(
            ValueType::Double.conversion_to(ValueType::Object),
            Some(Conversion::ToObject)
        );
        assert_eq!(ValueType::Double.conversion_to(ValueType::Long), None);
        assert_eq!(ValueType::Text.conversion_to(ValueType::Long), None);
        assert_eq!(ValueType::Object.conversion_to(ValueType::Long), None);
    }

    #[test]
    fn test_conversion_apply() {
        assert_eq!(Conversion::IntToLong.apply(Value::Int(7)), Value::Long(7));
        assert_eq!(
            Conversion::LongToDouble.apply(Value::Long(3)),
            Value::Double(3.0)
        );
        assert_eq!(
            Conversion::ToObject.apply(Value::from("x")),
            Value::from("x")
        );
    }

    #[test]
    fn test_display_keeps_double_marker() {
        assert_eq!(Value::Double(3.0).to_string(), "3.0");
        assert_eq!(Value::Double(2.5).to_string(), "2.5");
        assert_eq!(Value::Long(3).to_string(), "3");
    }

    #[test]
    fn test_type_names_round_trip() {
        for ty in [
            ValueType::Long,
            ValueType::Int,
            ValueType::Double,
            ValueType::Bool,
            ValueType::Text,
            ValueType::Object,
        ] {
            assert_eq!(ty.to_string().parse::<ValueType>().unwrap(), ty);
        }
    }
}
