//! Slicing and summing histograms. Every operation returns a new histogram and leaves the
//! source untouched.
use super::{BinContents, BinKey, EftHistogram};
use crate::axis::{regroup, Axis, Overflow};
use crate::error::{Error, Result};
use num_traits::Float;
use std::collections::btree_map::Entry;
use std::ops::Range;

/// What to keep of one axis.
#[derive(Clone, Debug, PartialEq)]
pub enum Select {
    /// Identifiers of a categorical axis.
    Identifiers(Vec<String>),
    /// A non-empty range of regular bins of a numeric axis. The content of the bins outside the
    /// range moves into the flow slots.
    Bins(Range<usize>),
}

/// A restriction of several axes at once.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    entries: Vec<(String, Select)>,
}

impl Selection {
    /// Selects everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps `identifiers` of the categorical axis `axis`.
    pub fn identifiers(mut self, axis: &str, identifiers: &[&str]) -> Self {
        let identifiers = identifiers.iter().map(|i| i.to_string()).collect();
        self.entries
            .push((axis.to_string(), Select::Identifiers(identifiers)));
        self
    }

    /// Keeps the regular `bins` of the numeric axis `axis`.
    pub fn bins(mut self, axis: &str, bins: Range<usize>) -> Self {
        self.entries.push((axis.to_string(), Select::Bins(bins)));
        self
    }

    /// Adds an arbitrary restriction of `axis`.
    pub fn with(mut self, axis: &str, select: Select) -> Self {
        self.entries.push((axis.to_string(), select));
        self
    }
}

/// A sequence of regroupings of the numeric axes of a flattened array.
struct DenseOp {
    shape: Vec<usize>,
    steps: Vec<(usize, Vec<Range<usize>>)>,
}

impl DenseOp {
    fn apply<T: Float>(&self, data: &[T]) -> Vec<T> {
        let mut shape = self.shape.clone();
        let mut out = data.to_vec();

        for (axis, groups) in &self.steps {
            out = regroup(&out, &shape, *axis, groups);
            shape[*axis] = groups.len();
        }

        out
    }
}

fn merge_into<T: Float>(
    bins: &mut std::collections::BTreeMap<BinKey, BinContents<T>>,
    key: BinKey,
    contents: BinContents<T>,
) {
    match bins.entry(key) {
        Entry::Vacant(entry) => {
            entry.insert(contents);
        }
        Entry::Occupied(mut entry) => entry.get_mut().merge(&contents),
    }
}

impl<T: Float> EftHistogram<T> {
    /// Restricts the histogram to the identifiers and bin ranges given in `selection`.
    ///
    /// Coefficient arrays are sliced along with the sums of weights, so no fit has to be rebuilt
    /// to select a part of the histogram.
    pub fn select(&self, selection: &Selection) -> Result<Self> {
        let mut allowed: Vec<Option<&[String]>> = vec![None; self.categorical_axes().len()];
        let mut axes = self.axes.clone();
        let mut steps = Vec::new();

        for (position, (name, select)) in selection.entries.iter().enumerate() {
            if selection.entries[..position].iter().any(|(n, _)| n == name) {
                return Err(Error::Configuration(format!(
                    "axis '{}' is selected more than once",
                    name
                )));
            }

            let index = self.axis_index(name)?;
            match (&self.axes[index], select) {
                (Axis::Categorical(axis), Select::Identifiers(identifiers)) => {
                    if let Some(missing) = identifiers.iter().find(|i| !axis.contains(i)) {
                        return Err(Error::UnknownIdentifier {
                            axis: name.clone(),
                            identifier: missing.clone(),
                        });
                    }
                    allowed[self.categorical_index(name)?] = Some(identifiers.as_slice());
                    let kept = axis
                        .identifiers()
                        .iter()
                        .filter(|i| identifiers.contains(i))
                        .cloned()
                        .collect();
                    axes[index] = Axis::Categorical(axis.with_identifiers(kept));
                }
                (Axis::Numeric(axis), Select::Bins(bins)) => {
                    let n = axis.nbins();
                    if bins.start >= bins.end || bins.end > n {
                        return Err(Error::Configuration(format!(
                            "bins {:?} are not a non-empty range within the {} bins of axis '{}'",
                            bins, n, name
                        )));
                    }

                    let mut groups = vec![0..bins.start + 1];
                    groups.extend(bins.clone().map(|b| b + 1..b + 2));
                    groups.push(bins.end + 1..n + 2);
                    groups.push(n + 2..n + 3);

                    steps.push((self.numeric_index(name)?, groups));
                    axes[index] = Axis::Numeric(axis.reduced(bins.clone()));
                }
                _ => {
                    return Err(Error::Configuration(format!(
                        "axis '{}' cannot be selected this way",
                        name
                    )))
                }
            }
        }

        let op = DenseOp {
            shape: self.dense_shape(),
            steps,
        };
        let mut out = self.with_axes(axes);

        for (key, contents) in &self.bins {
            let keep = key
                .iter()
                .zip(&allowed)
                .all(|(k, a)| a.map_or(true, |ids| ids.contains(k)));
            if keep {
                out.bins.insert(key.clone(), contents.map(|a| op.apply(a)));
            }
        }

        Ok(out)
    }

    /// Sums over the axes called `axes`. For numeric axes only the slots chosen by `overflow` are
    /// included; for categorical axes all identifiers are.
    pub fn sum(&self, axes: &[&str], overflow: Overflow) -> Result<Self> {
        let mut summed = Vec::with_capacity(axes.len());
        for name in axes {
            let index = self.axis_index(name)?;
            if !summed.contains(&index) {
                summed.push(index);
            }
        }

        let mut drop_categorical = Vec::new();
        let mut steps = Vec::new();
        let (mut categorical, mut numeric) = (0, 0);

        for (index, axis) in self.axes.iter().enumerate() {
            match axis {
                Axis::Categorical(_) => {
                    if summed.contains(&index) {
                        drop_categorical.push(categorical);
                    }
                    categorical += 1;
                }
                Axis::Numeric(a) => {
                    if summed.contains(&index) {
                        steps.push((numeric, vec![overflow.slots(a.nbins())]));
                    }
                    numeric += 1;
                }
            }
        }

        let op = DenseOp {
            shape: self.dense_shape(),
            steps,
        };
        let remaining = self
            .axes
            .iter()
            .enumerate()
            .filter(|(index, _)| !summed.contains(index))
            .map(|(_, axis)| axis.clone())
            .collect();
        let mut out = self.with_axes(remaining);

        for (key, contents) in &self.bins {
            let new_key = key
                .iter()
                .enumerate()
                .filter(|(i, _)| !drop_categorical.contains(i))
                .map(|(_, k)| k.clone())
                .collect();
            merge_into(&mut out.bins, new_key, contents.map(|a| op.apply(a)));
        }

        log::debug!(
            "summed '{}' over {:?}: {} bin keys left",
            self.label,
            axes,
            out.bins.len()
        );

        Ok(out)
    }

    /// Keeps only the axes called `axes`, summing over all others.
    pub fn project(&self, axes: &[&str], overflow: Overflow) -> Result<Self> {
        for name in axes {
            self.axis_index(name)?;
        }

        let others: Vec<&str> = self
            .axes
            .iter()
            .map(Axis::name)
            .filter(|name| !axes.contains(name))
            .collect();

        self.sum(&others, overflow)
    }

    /// Sums over the axis `axis`, optionally restricting it first. Numeric flow slots are not
    /// included.
    pub fn integrate(&self, axis: &str, select: Option<Select>) -> Result<Self> {
        match select {
            Some(select) => self
                .select(&Selection::new().with(axis, select))?
                .sum(&[axis], Overflow::None),
            None => self.sum(&[axis], Overflow::None),
        }
    }

    /// Removes the given identifiers from the categorical axis `axis`.
    pub fn remove(&self, identifiers: &[&str], axis: &str) -> Result<Self> {
        let categorical = match self.axis(axis)? {
            Axis::Categorical(c) => c,
            Axis::Numeric(_) => {
                return Err(Error::Configuration(format!(
                    "can only remove identifiers from a categorical axis, '{}' is numeric",
                    axis
                )))
            }
        };

        if let Some(missing) = identifiers.iter().find(|i| !categorical.contains(i)) {
            return Err(Error::UnknownIdentifier {
                axis: axis.to_string(),
                identifier: missing.to_string(),
            });
        }

        let keep: Vec<&str> = categorical
            .identifiers()
            .iter()
            .map(String::as_str)
            .filter(|i| !identifiers.contains(i))
            .collect();

        self.select(&Selection::new().identifiers(axis, &keep))
    }

    /// Regroups the identifiers of the categorical axis `axis` into a new axis `new_axis`: every
    /// new identifier is the sum of its members. Identifiers that are no member of any group are
    /// dropped.
    pub fn group(
        &self,
        axis: &str,
        new_axis: (&str, &str),
        mapping: &[(&str, &[&str])],
    ) -> Result<Self> {
        let index = self.axis_index(axis)?;
        let old = match &self.axes[index] {
            Axis::Categorical(c) => c,
            Axis::Numeric(_) => {
                return Err(Error::Configuration(format!(
                    "can only group a categorical axis, '{}' is numeric",
                    axis
                )))
            }
        };
        let position = self.categorical_index(axis)?;
        let (name, label) = new_axis;

        if name != axis && self.axis_index(name).is_ok() {
            return Err(Error::Configuration(format!(
                "cannot group into '{}' which already exists",
                name
            )));
        }

        for (_, members) in mapping {
            if let Some(missing) = members.iter().find(|m| !old.contains(m)) {
                return Err(Error::UnknownIdentifier {
                    axis: axis.to_string(),
                    identifier: missing.to_string(),
                });
            }
        }

        let mut regrouped = old.renamed(name, label);
        for (identifier, _) in mapping {
            regrouped.insert(identifier);
        }
        let mut axes = self.axes.clone();
        axes[index] = Axis::Categorical(regrouped);
        let mut out = self.with_axes(axes);

        for (key, contents) in &self.bins {
            for (identifier, members) in mapping {
                if members.contains(&key[position].as_str()) {
                    let mut new_key = key.clone();
                    new_key[position] = identifier.to_string();
                    merge_into(&mut out.bins, new_key, contents.clone());
                }
            }
        }

        Ok(out)
    }
}
