//! Axis definitions.
//!
//! A histogram has categorical (sparse) axes, whose identifiers are strings collected while
//! filling, and numeric (dense) axes with fixed bin edges. Every numeric axis with `n` bins is
//! stored with `n + 3` slots: underflow, the `n` regular bins, overflow and a slot for NaN.
use crate::error::{Error, Result};
use num_traits::Float;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Which flow slots of a numeric axis take part in a summation.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Overflow {
    /// Only the regular bins.
    None,
    /// Regular bins and underflow.
    Under,
    /// Regular bins and overflow.
    Over,
    /// Regular bins, underflow and overflow.
    All,
    /// Everything, including the NaN slot.
    AllNan,
    /// Only the underflow.
    JustUnder,
    /// Only the overflow.
    JustOver,
    /// Only the NaN slot.
    JustNan,
}

impl Default for Overflow {
    fn default() -> Self {
        Self::None
    }
}

impl Overflow {
    /// The slots of an axis with `nbins` regular bins selected by this policy.
    pub fn slots(self, nbins: usize) -> Range<usize> {
        match self {
            Self::None => 1..nbins + 1,
            Self::Under => 0..nbins + 1,
            Self::Over => 1..nbins + 2,
            Self::All => 0..nbins + 2,
            Self::AllNan => 0..nbins + 3,
            Self::JustUnder => 0..1,
            Self::JustOver => nbins + 1..nbins + 2,
            Self::JustNan => nbins + 2..nbins + 3,
        }
    }
}

/// A categorical axis. Identifiers are appended in the order they are first filled.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct CategoricalAxis {
    name: String,
    label: String,
    identifiers: Vec<String>,
}

impl CategoricalAxis {
    /// Creates an axis without identifiers.
    pub fn new(name: &str, label: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            identifiers: Vec::new(),
        }
    }

    /// Returns the name of the axis.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the label of the axis.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the identifiers seen so far.
    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    /// Returns `true` if `identifier` is known to this axis.
    pub fn contains(&self, identifier: &str) -> bool {
        self.identifiers.iter().any(|i| i == identifier)
    }

    /// Registers `identifier` unless it is known already.
    pub fn insert(&mut self, identifier: &str) {
        if !self.contains(identifier) {
            self.identifiers.push(identifier.to_string());
        }
    }

    pub(crate) fn with_identifiers(&self, identifiers: Vec<String>) -> Self {
        Self {
            name: self.name.clone(),
            label: self.label.clone(),
            identifiers,
        }
    }

    pub(crate) fn renamed(&self, name: &str, label: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            identifiers: Vec::new(),
        }
    }
}

/// A numeric axis given by its bin edges.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct NumericAxis<T> {
    name: String,
    label: String,
    edges: Vec<T>,
}

impl<T: Float> NumericAxis<T> {
    /// Creates an axis with `bins` equally wide bins from `low` (inclusive) to `high` (exclusive).
    pub fn regular(name: &str, label: &str, bins: usize, low: T, high: T) -> Result<Self> {
        if bins == 0 {
            return Err(Error::Configuration(format!(
                "axis '{}' needs at least one bin",
                name
            )));
        }
        let n = T::from(bins).ok_or_else(|| {
            Error::Configuration(format!("cannot represent {} bins of axis '{}'", bins, name))
        })?;
        let width = (high - low) / n;
        let mut edges = Vec::with_capacity(bins + 1);
        for b in 0..bins {
            // `from` never fails for an index below a representable bin count
            let b = T::from(b).unwrap_or_else(T::zero);
            edges.push(low + width * b);
        }
        edges.push(high);

        Self::variable(name, label, edges)
    }

    /// Creates an axis from strictly increasing, finite bin edges.
    pub fn variable(name: &str, label: &str, edges: Vec<T>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(Error::Configuration(format!(
                "axis '{}' needs at least two edges, got {}",
                name,
                edges.len()
            )));
        }
        if edges.iter().any(|e| !e.is_finite()) || edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::Configuration(format!(
                "edges of axis '{}' must be finite and strictly increasing",
                name
            )));
        }

        Ok(Self {
            name: name.to_string(),
            label: label.to_string(),
            edges,
        })
    }

    /// Returns the name of the axis.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the label of the axis.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the bin edges.
    pub fn edges(&self) -> &[T] {
        &self.edges
    }

    /// Returns the number of regular bins.
    pub fn nbins(&self) -> usize {
        self.edges.len() - 1
    }

    /// Returns the number of stored slots, including the three flow slots.
    pub fn slots(&self) -> usize {
        self.nbins() + 3
    }

    /// Returns the slot `x` falls into.
    pub fn slot(&self, x: T) -> usize {
        let n = self.nbins();
        if x.is_nan() {
            n + 2
        } else if x < self.edges[0] {
            0
        } else if x >= self.edges[n] {
            n + 1
        } else {
            self.edges.partition_point(|&e| e <= x)
        }
    }

    /// Range of regular bins lying completely inside `[low, high]`.
    pub fn bin_range(&self, low: T, high: T) -> Range<usize> {
        let start = self.edges.partition_point(|&e| e < low).min(self.nbins());
        let end = self
            .edges
            .partition_point(|&e| e <= high)
            .saturating_sub(1)
            .max(start);

        start..end
    }

    /// The axis restricted to the regular bins in `bins`.
    pub(crate) fn reduced(&self, bins: Range<usize>) -> Self {
        Self {
            name: self.name.clone(),
            label: self.label.clone(),
            edges: self.edges[bins.start..=bins.end].to_vec(),
        }
    }
}

/// Either kind of axis.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Axis<T> {
    /// An axis of string identifiers.
    Categorical(CategoricalAxis),
    /// An axis of bin edges.
    Numeric(NumericAxis<T>),
}

impl<T: Float> Axis<T> {
    /// Shorthand for an empty categorical axis.
    pub fn categorical(name: &str, label: &str) -> Self {
        Self::Categorical(CategoricalAxis::new(name, label))
    }

    /// Shorthand for a regularly binned numeric axis.
    pub fn regular(name: &str, label: &str, bins: usize, low: T, high: T) -> Result<Self> {
        NumericAxis::regular(name, label, bins, low, high).map(Self::Numeric)
    }

    /// Shorthand for a numeric axis with variable bin widths.
    pub fn variable(name: &str, label: &str, edges: Vec<T>) -> Result<Self> {
        NumericAxis::variable(name, label, edges).map(Self::Numeric)
    }

    /// Returns the name of the axis.
    pub fn name(&self) -> &str {
        match self {
            Self::Categorical(a) => a.name(),
            Self::Numeric(a) => a.name(),
        }
    }

    /// Returns `true` for categorical axes.
    pub fn is_categorical(&self) -> bool {
        matches!(self, Self::Categorical(_))
    }

    /// Two axes are compatible if they have the same name and kind and, for numeric axes, the same
    /// edges. Identifiers of categorical axes may differ.
    pub fn compatible(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Categorical(a), Self::Categorical(b)) => a.name() == b.name(),
            (Self::Numeric(a), Self::Numeric(b)) => a.name() == b.name() && a.edges() == b.edges(),
            _ => false,
        }
    }
}

/// Row-major flat index of `indices` in an array of the given `shape`.
pub(crate) fn ravel(indices: &[usize], shape: &[usize]) -> usize {
    indices
        .iter()
        .zip(shape)
        .fold(0, |acc, (&i, &len)| acc * len + i)
}

/// Sums the slots of axis `axis` of the row-major array `data` into `groups`, returning an array
/// whose `axis` has one slot per group.
pub(crate) fn regroup<T: Float>(
    data: &[T],
    shape: &[usize],
    axis: usize,
    groups: &[Range<usize>],
) -> Vec<T> {
    let outer: usize = shape[..axis].iter().product();
    let len = shape[axis];
    let inner: usize = shape[axis + 1..].iter().product();
    let mut out = vec![T::zero(); outer * groups.len() * inner];

    for o in 0..outer {
        for (g, group) in groups.iter().enumerate() {
            let target = &mut out[(o * groups.len() + g) * inner..][..inner];
            for j in group.clone() {
                let source = &data[(o * len + j) * inner..][..inner];
                for (t, &s) in target.iter_mut().zip(source) {
                    *t = *t + s;
                }
            }
        }
    }

    out
}

/// Keeps only the slots of every numeric axis that `overflow` selects.
pub(crate) fn select_slots<T: Float>(
    data: &[T],
    axes: &[&NumericAxis<T>],
    overflow: Overflow,
) -> Vec<T> {
    let mut shape: Vec<usize> = axes.iter().map(|a| a.slots()).collect();
    let mut out = data.to_vec();

    for (d, axis) in axes.iter().enumerate() {
        let groups: Vec<_> = overflow.slots(axis.nbins()).map(|s| s..s + 1).collect();
        out = regroup(&out, &shape, d, &groups);
        shape[d] = groups.len();
    }

    out
}
