//! Cycle range parsing.
//!
//! Accepted forms: `N` (zero through N), `A..B` (half-open), and `A..`
//! (unbounded). Counts may carry a `K`, `M`, or `B` multiplier and `_` digit
//! separators, so `1_000`, `10K` and `0..2M` all parse.

use crate::config::error::{ConfigResult, ConfigurationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest cycle number handed out. Cycles must stay representable as `i64`
/// because they seed the binding functions.
pub const MAX_CYCLE: u64 = i64::MAX as u64;

/// Half-open range of cycles `[start, end)`; `end == None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleRange {
    start: u64,
    end: Option<u64>,
}

impl CycleRange {
    pub fn new(start: u64, end: u64) -> ConfigResult<Self> {
        if start > end {
            return Err(ConfigurationError::invalid_cycles_spec(
                format!("{start}..{end}"),
                "start must not exceed end",
            ));
        }
        if end > MAX_CYCLE + 1 {
            return Err(ConfigurationError::invalid_cycles_spec(
                format!("{start}..{end}"),
                format!("end must not exceed {}", MAX_CYCLE + 1),
            ));
        }
        Ok(Self {
            start,
            end: Some(end),
        })
    }

    pub fn unbounded(start: u64) -> ConfigResult<Self> {
        if start > MAX_CYCLE {
            return Err(ConfigurationError::invalid_cycles_spec(
                format!("{start}.."),
                format!("start must not exceed {MAX_CYCLE}"),
            ));
        }
        Ok(Self { start, end: None })
    }

    pub fn parse(spec: &str) -> ConfigResult<Self> {
        let trimmed = spec.trim();
        if trimmed.is_empty() {
            return Err(ConfigurationError::invalid_cycles_spec(
                spec,
                "cycles spec is empty",
            ));
        }

        match trimmed.split_once("..") {
            None => Self::new(0, parse_count(spec, trimmed)?),
            Some((start, end)) => {
                let start = if start.trim().is_empty() {
                    0
                } else {
                    parse_count(spec, start)?
                };
                if end.trim().is_empty() {
                    Self::unbounded(start)
                } else {
                    Self::new(start, parse_count(spec, end)?)
                }
            }
        }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    /// Exclusive end, `None` when unbounded.
    pub fn end(&self) -> Option<u64> {
        self.end
    }

    pub fn is_unbounded(&self) -> bool {
        self.end.is_none()
    }

    /// Number of cycles in the range, `None` when unbounded.
    pub fn len(&self) -> Option<u64> {
        self.end.map(|end| end - self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    pub fn contains(&self, cycle: u64) -> bool {
        cycle >= self.start && self.end.map_or(cycle <= MAX_CYCLE, |end| cycle < end)
    }

    /// Exclusive upper limit used by the allocator.
    pub(crate) fn limit(&self) -> u64 {
        self.end.unwrap_or(MAX_CYCLE + 1)
    }
}

impl FromStr for CycleRange {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CycleRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}..{}", self.start, end),
            None => write!(f, "{}..", self.start),
        }
    }
}

fn parse_count(spec: &str, raw: &str) -> ConfigResult<u64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != '_').collect();
    let (digits, multiplier) = match cleaned.chars().last() {
        Some('k' | 'K') => (&cleaned[..cleaned.len() - 1], 1_000u64),
        Some('m' | 'M') => (&cleaned[..cleaned.len() - 1], 1_000_000),
        Some('b' | 'B') => (&cleaned[..cleaned.len() - 1], 1_000_000_000),
        _ => (cleaned.as_str(), 1),
    };

    let value: u64 = digits.parse().map_err(|_| {
        ConfigurationError::invalid_cycles_spec(spec, format!("'{}' is not a cycle count", raw.trim()))
    })?;

    value.checked_mul(multiplier).ok_or_else(|| {
        ConfigurationError::invalid_cycles_spec(spec, format!("'{}' overflows", raw.trim()))
    })
}
