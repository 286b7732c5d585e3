//! # Op Sequencing
//!
//! An activity with several ops picks one per cycle from a fixed lookup
//! table. Each op appears in the table as many times as its ratio, and the
//! sequencer type decides the order:
//!
//! | `seq`      | `read:3, write:1` | `read:2, write:4`  |
//! |------------|-------------------|--------------------|
//! | `bucket`   | `R W R R`         | `R W R W W W`      |
//! | `concat`   | `R R R W`         | `R R W W W W`      |
//! | `interval` | `R W R R`         | `R W W R W W`      |
//!
//! `bucket` deals one op at a time round-robin until every ratio is spent.
//! `interval` spreads each op evenly across the table: the `j`-th use of an
//! op with ratio `r` sits at `j / r`, ties going to the op declared first.
//!
//! Cycle `c` runs `table[c % len]`, so the same cycle always maps to the
//! same op regardless of which worker claims it.
//!
//! ```rust
//! use loadgen_core::activity::{OpSequence, SequencerType};
//!
//! let sequence = OpSequence::plan([("read", 3), ("write", 1)], SequencerType::Concat).unwrap();
//! let names: Vec<_> = (0..5).map(|cycle| *sequence.get(cycle)).collect();
//! assert_eq!(names, vec!["read", "read", "read", "write", "read"]);
//! ```

use crate::config::error::{ConfigResult, ConfigurationError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Longest lookup table a ratio set may produce.
pub const MAX_SEQUENCE_LENGTH: u64 = 1_000_000;

/// Ordering strategy for ratio-weighted ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequencerType {
    #[default]
    Bucket,
    Concat,
    Interval,
}

impl SequencerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bucket => "bucket",
            Self::Concat => "concat",
            Self::Interval => "interval",
        }
    }
}

impl fmt::Display for SequencerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SequencerType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bucket" => Ok(Self::Bucket),
            "concat" => Ok(Self::Concat),
            "interval" => Ok(Self::Interval),
            other => Err(ConfigurationError::invalid_value(
                "seq",
                other,
                "expected one of bucket, concat, interval",
            )),
        }
    }
}

/// Cycle to op lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct OpSequence<T> {
    ops: Vec<T>,
    ratios: Vec<u64>,
    lut: Vec<usize>,
    sequencer: SequencerType,
}

impl<T> OpSequence<T> {
    /// Every cycle runs `op`.
    pub fn single(op: T) -> Self {
        Self {
            ops: vec![op],
            ratios: vec![1],
            lut: vec![0],
            sequencer: SequencerType::default(),
        }
    }

    /// Build the table from `(op, ratio)` pairs. Ops with ratio 0 are
    /// dropped; at least one op must remain.
    pub fn plan<I>(ops: I, sequencer: SequencerType) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = (T, u64)>,
    {
        let (ops, ratios): (Vec<T>, Vec<u64>) =
            ops.into_iter().filter(|(_, ratio)| *ratio > 0).unzip();
        if ops.is_empty() {
            return Err(ConfigurationError::invalid_value(
                "ops",
                "[]",
                "at least one op needs a positive ratio",
            ));
        }

        let total = ratios
            .iter()
            .try_fold(0u64, |sum, ratio| sum.checked_add(*ratio))
            .filter(|total| *total <= MAX_SEQUENCE_LENGTH)
            .ok_or_else(|| {
                ConfigurationError::invalid_value(
                    "ops",
                    format!("{ratios:?}"),
                    format!("ratios must sum to at most {MAX_SEQUENCE_LENGTH}"),
                )
            })?;

        let lut = match sequencer {
            SequencerType::Bucket => bucket(&ratios, total),
            SequencerType::Concat => concat(&ratios, total),
            SequencerType::Interval => interval(&ratios, total),
        };

        Ok(Self {
            ops,
            ratios,
            lut,
            sequencer,
        })
    }

    pub fn index_for(&self, cycle: u64) -> usize {
        self.lut[(cycle % self.lut.len() as u64) as usize]
    }

    pub fn get(&self, cycle: u64) -> &T {
        &self.ops[self.index_for(cycle)]
    }

    /// Table length: the sum of ratios.
    pub fn len(&self) -> usize {
        self.lut.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lut.is_empty()
    }

    pub fn ops(&self) -> &[T] {
        &self.ops
    }

    pub fn ratios(&self) -> &[u64] {
        &self.ratios
    }

    pub fn sequencer(&self) -> SequencerType {
        self.sequencer
    }

    /// Same table over transformed ops.
    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> OpSequence<U> {
        OpSequence {
            ops: self.ops.iter().map(f).collect(),
            ratios: self.ratios.clone(),
            lut: self.lut.clone(),
            sequencer: self.sequencer,
        }
    }
}

fn bucket(ratios: &[u64], total: u64) -> Vec<usize> {
    let mut remaining = ratios.to_vec();
    let mut lut = Vec::with_capacity(total as usize);
    while lut.len() < total as usize {
        for (index, left) in remaining.iter_mut().enumerate() {
            if *left > 0 {
                *left -= 1;
                lut.push(index);
            }
        }
    }
    lut
}

fn concat(ratios: &[u64], total: u64) -> Vec<usize> {
    let mut lut = Vec::with_capacity(total as usize);
    for (index, ratio) in ratios.iter().enumerate() {
        lut.extend(std::iter::repeat(index).take(*ratio as usize));
    }
    lut
}

fn interval(ratios: &[u64], total: u64) -> Vec<usize> {
    // (slot j, ratio r, op index); position is j / r
    let mut slots: Vec<(u64, u64, usize)> = Vec::with_capacity(total as usize);
    for (index, ratio) in ratios.iter().enumerate() {
        slots.extend((0..*ratio).map(|j| (j, *ratio, index)));
    }
    slots.sort_by(|a, b| {
        let left = u128::from(a.0) * u128::from(b.1);
        let right = u128::from(b.0) * u128::from(a.1);
        match left.cmp(&right) {
            Ordering::Equal => a.2.cmp(&b.2),
            other => other,
        }
    });
    slots.into_iter().map(|(_, _, index)| index).collect()
}
