//! Quantity grammar for the kinematic/selection extractor.
//!
//! A quantity is either a field name (`raw_energy`), optionally wrapped in
//! `abs(...)`, or a threshold comparison `"<operand> >= <threshold>"` /
//! `"<operand> < <threshold>"`. Strings are parsed once when configuration
//! is loaded.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tv_core::{Error, Result};

/// A field reference, possibly taken in absolute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Operand {
    /// Field name within the collection.
    pub field: String,
    /// Apply `abs` before use.
    pub absolute: bool,
}

impl Operand {
    /// Plain field reference.
    pub fn field(field: impl Into<String>) -> Self {
        Self { field: field.into(), absolute: false }
    }

    /// `abs(field)`.
    pub fn abs(field: impl Into<String>) -> Self {
        Self { field: field.into(), absolute: true }
    }

    /// Apply the operand transform to one value.
    #[inline]
    pub fn apply(&self, v: f64) -> f64 {
        if self.absolute { v.abs() } else { v }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute { write!(f, "abs({})", self.field) } else { f.write_str(&self.field) }
    }
}

impl FromStr for Operand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (field, absolute) = match s.strip_prefix("abs(").and_then(|r| r.strip_suffix(')')) {
            Some(inner) => (inner.trim(), true),
            None => (s, false),
        };
        let valid = !field.is_empty()
            && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        if !valid {
            return Err(Error::Config(format!("'{s}' is not a field name or abs(<field>)")));
        }
        Ok(Self { field: field.to_string(), absolute })
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CmpOp {
    /// `>=`
    Ge,
    /// `<`
    Lt,
}

impl CmpOp {
    /// Evaluate `lhs <op> rhs`. NaN compares false under both operators.
    #[inline]
    pub fn eval(self, lhs: f64, rhs: f64) -> bool {
        match self {
            CmpOp::Ge => lhs >= rhs,
            CmpOp::Lt => lhs < rhs,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            CmpOp::Ge => ">=",
            CmpOp::Lt => "<",
        }
    }
}

/// A threshold comparison producing a boolean mask.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// Left-hand side.
    pub operand: Operand,
    /// Operator.
    pub op: CmpOp,
    /// Right-hand side.
    pub threshold: f64,
}

impl Comparison {
    /// Evaluate on raw field values.
    pub fn mask(&self, values: &[f64]) -> Vec<bool> {
        values.iter().map(|&v| self.op.eval(self.operand.apply(v), self.threshold)).collect()
    }

    /// Whether `self` and `other` split the same operand at the same cut.
    pub fn same_cut(&self, other: &Comparison) -> bool {
        self.operand == other.operand && self.threshold.to_bits() == other.threshold.to_bits()
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.operand, self.op.symbol(), self.threshold)
    }
}

impl FromStr for Comparison {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let Some(pos) = s.find(['<', '>', '=', '!']) else {
            return Err(Error::Config(format!("'{s}' contains no comparison operator")));
        };
        let (lhs, rest) = s.split_at(pos);
        let (op, rhs) = if let Some(rhs) = rest.strip_prefix(">=") {
            (CmpOp::Ge, rhs)
        } else if let Some(rhs) = rest.strip_prefix('<')
            && !rhs.starts_with('=')
        {
            (CmpOp::Lt, rhs)
        } else {
            return Err(Error::Config(format!(
                "unsupported operator in '{s}' (only '>=' and '<' are allowed)"
            )));
        };
        let threshold: f64 = rhs.trim().parse().map_err(|_| {
            Error::Config(format!("threshold '{}' in '{s}' is not a number", rhs.trim()))
        })?;
        if !threshold.is_finite() {
            return Err(Error::Config(format!("threshold in '{s}' must be finite")));
        }
        Ok(Self { operand: lhs.parse()?, op, threshold })
    }
}

/// One configured quantity: a value table or a selection mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Quantity {
    /// The flattened (optionally absolute) field.
    Field(Operand),
    /// A boolean mask from a threshold comparison.
    Compare(Comparison),
}

impl Quantity {
    /// The operand read from the source.
    pub fn operand(&self) -> &Operand {
        match self {
            Quantity::Field(o) => o,
            Quantity::Compare(c) => &c.operand,
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::Field(o) => o.fmt(f),
            Quantity::Compare(c) => c.fmt(f),
        }
    }
}

impl FromStr for Quantity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.contains(['<', '>', '=', '!']) {
            Ok(Quantity::Compare(s.parse()?))
        } else {
            Ok(Quantity::Field(s.parse()?))
        }
    }
}

impl TryFrom<String> for Quantity {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Quantity> for String {
    fn from(q: Quantity) -> Self {
        q.to_string()
    }
}
