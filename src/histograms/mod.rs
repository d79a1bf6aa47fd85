//! This module contains everything related to histograms.
//!
//! An [`EftHistogram`] is keyed by one identifier per categorical axis. For every such bin key it
//! stores one [`BinContents`] record: the sum of weights and of squared weights over the numeric
//! axes, and, for samples carrying EFT information, the summed polynomial coefficients and the
//! summed coefficients of the squared polynomials.
//!
//! Histograms are filled independently on many workers and combined with
//! [`EftHistogram::add`]. After all contributions are in, [`EftHistogram::eval`] replaces the
//! displayed sums by the polynomial evaluated at an EFT point. The accumulated sums are kept, so
//! evaluating at another point or calling [`EftHistogram::restore`] always starts from them.
mod fill;
mod reduce;

pub use fill::FillRequest;
pub use reduce::{Select, Selection};

use crate::axis::{select_slots, Axis, CategoricalAxis, NumericAxis, Overflow};
use crate::coefficients::WcBasis;
use crate::error::{Error, Result};
use crate::fit::{PolynomialFit, WcPoint};
use num_traits::Float;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

/// One identifier per categorical axis, in axis order.
pub type BinKey = Vec<String>;

fn add_into<T: Float>(target: &mut [T], source: &[T]) {
    for (t, &s) in target.iter_mut().zip(source) {
        *t = *t + s;
    }
}

/// The contents of one bin key. All arrays are flattened row-major over the slots of the numeric
/// axes.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct BinContents<T> {
    sumw: Vec<T>,
    sumw2: Vec<T>,
    /// Empty for samples without EFT information.
    coeffs: Vec<Vec<T>>,
    errcoeffs: Vec<Vec<T>>,
    /// The accumulated `sumw` and `sumw2` while the displayed ones hold an evaluation.
    accumulated: Option<(Vec<T>, Vec<T>)>,
}

impl<T: Float> BinContents<T> {
    fn zeros(len: usize) -> Self {
        Self {
            sumw: vec![T::zero(); len],
            sumw2: vec![T::zero(); len],
            coeffs: Vec::new(),
            errcoeffs: Vec::new(),
            accumulated: None,
        }
    }

    /// Allocates the coefficient arrays. Weights filled so far do not depend on the Wilson
    /// coefficients and become the constant terms.
    fn init_eft(&mut self, ncoeff: usize, nerr: usize) {
        if self.coeffs.is_empty() {
            let len = self.sumw.len();
            self.coeffs = vec![vec![T::zero(); len]; ncoeff];
            self.errcoeffs = vec![vec![T::zero(); len]; nerr];

            let (sumw, sumw2) = match &self.accumulated {
                Some((w, w2)) => (w.clone(), w2.clone()),
                None => (self.sumw.clone(), self.sumw2.clone()),
            };
            self.add_constant(&sumw, &sumw2);
        }
    }

    /// Adds weights without EFT information to the constant terms of the polynomials.
    fn add_constant(&mut self, sumw: &[T], sumw2: &[T]) {
        if let Some(c) = self.coeffs.first_mut() {
            add_into(c, sumw);
        }
        if let Some(e) = self.errcoeffs.first_mut() {
            add_into(e, sumw2);
        }
    }

    /// The displayed sum of weights.
    pub fn sumw(&self) -> &[T] {
        &self.sumw
    }

    /// The displayed sum of squared weights.
    pub fn sumw2(&self) -> &[T] {
        &self.sumw2
    }

    /// The accumulated sum of weights, regardless of any evaluation.
    pub fn accumulated_sumw(&self) -> &[T] {
        self.accumulated.as_ref().map_or(&self.sumw, |(w, _)| w)
    }

    /// The accumulated sum of squared weights, regardless of any evaluation.
    pub fn accumulated_sumw2(&self) -> &[T] {
        self.accumulated.as_ref().map_or(&self.sumw2, |(_, w2)| w2)
    }

    /// One array per polynomial coefficient.
    pub fn coeffs(&self) -> &[Vec<T>] {
        &self.coeffs
    }

    /// One array per variance coefficient.
    pub fn errcoeffs(&self) -> &[Vec<T>] {
        &self.errcoeffs
    }

    /// Returns `true` if any EFT coefficients were filled into this record.
    pub fn is_eft(&self) -> bool {
        !self.coeffs.is_empty()
    }

    /// Returns `true` if the displayed sums hold an evaluation.
    pub fn is_evaluated(&self) -> bool {
        self.accumulated.is_some()
    }

    fn restore(&mut self) {
        if let Some((sumw, sumw2)) = self.accumulated.take() {
            self.sumw = sumw;
            self.sumw2 = sumw2;
        }
    }

    fn restored(&self) -> Self {
        let mut out = self.clone();
        out.restore();
        out
    }

    /// Adds `other` element-wise. If only one side carries coefficients, the sums of the other
    /// side enter as constant terms.
    fn merge(&mut self, other: &Self) {
        if other.is_eft() {
            self.init_eft(other.coeffs.len(), other.errcoeffs.len());
        }

        match &other.accumulated {
            Some((ow, ow2)) => {
                let (sumw, sumw2) = (&self.sumw, &self.sumw2);
                let (w, w2) = self
                    .accumulated
                    .get_or_insert_with(|| (sumw.clone(), sumw2.clone()));
                add_into(w, ow);
                add_into(w2, ow2);
            }
            None => {
                if let Some((w, w2)) = &mut self.accumulated {
                    add_into(w, &other.sumw);
                    add_into(w2, &other.sumw2);
                }
            }
        }

        add_into(&mut self.sumw, &other.sumw);
        add_into(&mut self.sumw2, &other.sumw2);

        if other.is_eft() {
            for (a, b) in self.coeffs.iter_mut().zip(&other.coeffs) {
                add_into(a, b);
            }
            for (a, b) in self.errcoeffs.iter_mut().zip(&other.errcoeffs) {
                add_into(a, b);
            }
        } else if self.is_eft() {
            self.add_constant(other.accumulated_sumw(), other.accumulated_sumw2());
        }
    }

    /// Applies the same dense transformation to every array.
    fn map<F>(&self, f: F) -> Self
    where
        F: Fn(&[T]) -> Vec<T>,
    {
        Self {
            sumw: f(&self.sumw),
            sumw2: f(&self.sumw2),
            coeffs: self.coeffs.iter().map(|c| f(c)).collect(),
            errcoeffs: self.errcoeffs.iter().map(|e| f(e)).collect(),
            accumulated: self.accumulated.as_ref().map(|(w, w2)| (f(w), f(w2))),
        }
    }

    fn scale(&mut self, factor: T) {
        let factor2 = factor * factor;
        let linear = std::iter::once(&mut self.sumw).chain(self.coeffs.iter_mut());
        let quadratic = std::iter::once(&mut self.sumw2).chain(self.errcoeffs.iter_mut());

        for array in linear {
            array.iter_mut().for_each(|x| *x = *x * factor);
        }
        for array in quadratic {
            array.iter_mut().for_each(|x| *x = *x * factor2);
        }
    }

    fn fits(&self, basis: &WcBasis) -> Result<Vec<PolynomialFit<T>>> {
        (0..self.sumw.len())
            .map(|b| {
                PolynomialFit::new(
                    &b.to_string(),
                    basis.clone(),
                    self.coeffs.iter().map(|c| c[b]).collect(),
                    self.errcoeffs.iter().map(|e| e[b]).collect(),
                )
            })
            .collect()
    }
}

/// Histogram over categorical and numeric axes whose bins carry quadratic polynomials in a set of
/// Wilson coefficients.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct EftHistogram<T> {
    label: String,
    basis: WcBasis,
    axes: Vec<Axis<T>>,
    #[serde(with = "entries")]
    bins: BTreeMap<BinKey, BinContents<T>>,
    /// Materialised on request; dropped for every key a fill, addition or scaling touches.
    #[serde(skip)]
    fits: BTreeMap<BinKey, Vec<PolynomialFit<T>>>,
    #[serde(skip)]
    last_key: Option<BinKey>,
}

/// JSON maps need string keys, so bin keys are written as a list of entries.
mod entries {
    use super::BinKey;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S, V>(map: &BTreeMap<BinKey, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        V: Serialize,
    {
        serializer.collect_seq(map)
    }

    pub fn deserialize<'de, D, V>(deserializer: D) -> Result<BTreeMap<BinKey, V>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        Vec::<(BinKey, V)>::deserialize(deserializer).map(|e| e.into_iter().collect())
    }
}

impl<T: Float> EftHistogram<T> {
    /// Creates an empty histogram. Axis names must be unique.
    ///
    /// ```
    /// use histeft::{Axis, EftHistogram, WcBasis};
    ///
    /// let h = EftHistogram::<f64>::new(
    ///     "Events",
    ///     WcBasis::parse("c1, c2, c3").unwrap(),
    ///     vec![
    ///         Axis::categorical("sample", "sample"),
    ///         Axis::categorical("cut", "cut"),
    ///         Axis::regular("met", "MET (GeV)", 40, 0.0, 400.0).unwrap(),
    ///     ],
    /// )
    /// .unwrap();
    /// assert_eq!(h.num_coefficients(), 10);
    /// ```
    pub fn new(label: &str, basis: WcBasis, axes: Vec<Axis<T>>) -> Result<Self> {
        for (index, axis) in axes.iter().enumerate() {
            if axes[..index].iter().any(|a| a.name() == axis.name()) {
                return Err(Error::Configuration(format!(
                    "axis '{}' is defined twice",
                    axis.name()
                )));
            }
        }

        Ok(Self {
            label: label.to_string(),
            basis,
            axes,
            bins: BTreeMap::new(),
            fits: BTreeMap::new(),
            last_key: None,
        })
    }

    /// An empty histogram with the same label and basis but different axes.
    fn with_axes(&self, axes: Vec<Axis<T>>) -> Self {
        Self {
            label: self.label.clone(),
            basis: self.basis.clone(),
            axes,
            bins: BTreeMap::new(),
            fits: BTreeMap::new(),
            last_key: None,
        }
    }

    /// Returns the label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the Wilson-coefficient basis.
    pub fn basis(&self) -> &WcBasis {
        &self.basis
    }

    /// Number of polynomial coefficients per bin.
    pub fn num_coefficients(&self) -> usize {
        self.basis.num_coefficients()
    }

    /// Number of variance coefficients per bin.
    pub fn num_error_coefficients(&self) -> usize {
        self.basis.num_error_coefficients()
    }

    /// Returns all axes in declaration order.
    pub fn axes(&self) -> &[Axis<T>] {
        &self.axes
    }

    fn axis_index(&self, name: &str) -> Result<usize> {
        self.axes
            .iter()
            .position(|a| a.name() == name)
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "histogram '{}' has no axis '{}'",
                    self.label, name
                ))
            })
    }

    /// Returns the axis called `name`.
    pub fn axis(&self, name: &str) -> Result<&Axis<T>> {
        self.axis_index(name).map(|index| &self.axes[index])
    }

    /// Returns the categorical axes in declaration order.
    pub fn categorical_axes(&self) -> Vec<&CategoricalAxis> {
        self.axes
            .iter()
            .filter_map(|a| match a {
                Axis::Categorical(c) => Some(c),
                Axis::Numeric(_) => None,
            })
            .collect()
    }

    /// Returns the numeric axes in declaration order.
    pub fn numeric_axes(&self) -> Vec<&NumericAxis<T>> {
        self.axes
            .iter()
            .filter_map(|a| match a {
                Axis::Numeric(n) => Some(n),
                Axis::Categorical(_) => None,
            })
            .collect()
    }

    /// Position of `name` among the categorical axes, i.e. within a [`BinKey`].
    fn categorical_index(&self, name: &str) -> Result<usize> {
        self.categorical_axes()
            .iter()
            .position(|a| a.name() == name)
            .ok_or_else(|| match self.axis(name) {
                Ok(_) => Error::Configuration(format!("axis '{}' is not categorical", name)),
                Err(e) => e,
            })
    }

    /// Position of `name` among the numeric axes.
    fn numeric_index(&self, name: &str) -> Result<usize> {
        self.numeric_axes()
            .iter()
            .position(|a| a.name() == name)
            .ok_or_else(|| match self.axis(name) {
                Ok(_) => Error::Configuration(format!("axis '{}' is not numeric", name)),
                Err(e) => e,
            })
    }

    /// Number of slots of each numeric axis, including flow slots.
    pub fn dense_shape(&self) -> Vec<usize> {
        self.numeric_axes().iter().map(|a| a.slots()).collect()
    }

    fn dense_len(&self) -> usize {
        self.dense_shape().iter().product()
    }

    /// The identifiers filled so far into the categorical axis `axis`.
    pub fn identifiers(&self, axis: &str) -> Result<&[String]> {
        match self.axis(axis)? {
            Axis::Categorical(c) => Ok(c.identifiers()),
            Axis::Numeric(_) => Err(Error::Configuration(format!(
                "axis '{}' is not categorical",
                axis
            ))),
        }
    }

    /// All bin keys with contents.
    pub fn keys(&self) -> impl Iterator<Item = &BinKey> + '_ {
        self.bins.keys()
    }

    /// The record stored for `key`.
    pub fn contents(&self, key: &[String]) -> Option<&BinContents<T>> {
        self.bins.get(key)
    }

    /// Returns `true` if nothing has been filled.
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Returns `true` while the displayed sums hold an evaluation at some EFT point.
    pub fn is_evaluated(&self) -> bool {
        self.bins.values().any(BinContents::is_evaluated)
    }

    /// The displayed sums of weights per bin key, restricted to the slots `overflow` selects.
    pub fn values(&self, overflow: Overflow) -> BTreeMap<BinKey, Vec<T>> {
        let axes = self.numeric_axes();
        self.bins
            .iter()
            .map(|(k, c)| (k.clone(), select_slots(&c.sumw, &axes, overflow)))
            .collect()
    }

    /// The displayed sums of squared weights per bin key, restricted to the slots `overflow`
    /// selects.
    pub fn variances(&self, overflow: Overflow) -> BTreeMap<BinKey, Vec<T>> {
        let axes = self.numeric_axes();
        self.bins
            .iter()
            .map(|(k, c)| (k.clone(), select_slots(&c.sumw2, &axes, overflow)))
            .collect()
    }

    /// Sum of all displayed weights, flow slots included.
    pub fn integral(&self) -> T {
        self.bins
            .values()
            .flat_map(|c| c.sumw.iter())
            .fold(T::zero(), |acc, &w| acc + w)
    }

    /// Two histograms can be added if they share the basis and their axes agree in name, kind and
    /// binning.
    pub fn compatible(&self, other: &Self) -> bool {
        self.basis == other.basis
            && self.axes.len() == other.axes.len()
            && self
                .axes
                .iter()
                .zip(&other.axes)
                .all(|(a, b)| a.compatible(b))
    }

    /// A copy of this histogram; without `content` only the schema is kept.
    pub fn copy(&self, content: bool) -> Self {
        if content {
            let mut out = self.clone();
            out.fits.clear();
            out
        } else {
            let axes = self
                .axes
                .iter()
                .map(|a| match a {
                    Axis::Categorical(c) => Axis::Categorical(c.with_identifiers(Vec::new())),
                    Axis::Numeric(n) => Axis::Numeric(n.clone()),
                })
                .collect();
            self.with_axes(axes)
        }
    }

    /// An empty histogram with the same schema, the neutral element of [`EftHistogram::add`].
    pub fn identity(&self) -> Self {
        self.copy(false)
    }

    /// Removes all contents and fits, keeping the schema.
    pub fn clear(&mut self) {
        *self = self.identity();
    }

    /// Adds the contents of `other` into this histogram, bin key by bin key.
    ///
    /// Bin keys are matched by their identifiers, so the two histograms may have seen their
    /// identifiers in a different order. If either histogram is evaluated, its accumulated sums
    /// are used and the result is not evaluated.
    pub fn add(&mut self, other: &Self) -> Result<()> {
        if !self.compatible(other) {
            return Err(Error::Configuration(format!(
                "cannot add histogram '{}' with basis {:?} to '{}' with basis {:?}: dissimilar axes \
                 or Wilson coefficients",
                other.label,
                other.basis.names(),
                self.label,
                self.basis.names()
            )));
        }

        self.restore();

        for (mine, theirs) in self.axes.iter_mut().zip(&other.axes) {
            if let (Axis::Categorical(mine), Axis::Categorical(theirs)) = (mine, theirs) {
                for identifier in theirs.identifiers() {
                    mine.insert(identifier);
                }
            }
        }

        for (key, contents) in &other.bins {
            self.fits.remove(key);
            let contents = contents.restored();
            match self.bins.get_mut(key) {
                Some(mine) => mine.merge(&contents),
                None => {
                    self.bins.insert(key.clone(), contents);
                }
            }
        }

        log::debug!(
            "added {} bin keys of '{}' into '{}'",
            other.bins.len(),
            other.label,
            self.label
        );

        Ok(())
    }

    /// Consuming version of [`EftHistogram::add`], convenient for folds.
    pub fn merged(mut self, other: &Self) -> Result<Self> {
        self.add(other)?;
        Ok(self)
    }

    /// Multiplies every weight by `factor`.
    pub fn scale(&mut self, factor: T) {
        self.restore();
        self.fits.clear();
        self.bins.values_mut().for_each(|c| c.scale(factor));
    }

    /// Multiplies the weights of every identifier of the categorical axis `axis` that appears in
    /// `factors` by its factor. Other identifiers are left alone.
    pub fn scale_by(&mut self, axis: &str, factors: &BTreeMap<String, T>) -> Result<()> {
        let index = self.categorical_index(axis)?;
        self.restore();

        for (key, contents) in self.bins.iter_mut() {
            if let Some(&factor) = factors.get(&key[index]) {
                self.fits.remove(key);
                contents.scale(factor);
            }
        }

        Ok(())
    }

    fn resolve_key(&self, key: Option<&[String]>) -> Option<BinKey> {
        match key {
            Some(key) => Some(key.to_vec()),
            None => self
                .last_key
                .clone()
                .or_else(|| self.bins.keys().next_back().cloned()),
        }
    }

    /// (Re)builds the fits of every dense bin for `key`, or for the most recently filled key.
    ///
    /// Fits are a snapshot of the coefficients. Filling, adding or scaling drops the fits of the
    /// affected keys and [`EftHistogram::eval`] rebuilds them, so scaling applied with
    /// [`EftHistogram::scale_fits`] lasts only until then.
    pub fn set_wc_fit(&mut self, key: Option<&[String]>) -> Result<()> {
        let key = match self.resolve_key(key) {
            Some(key) => key,
            None => return Ok(()),
        };
        let contents = self
            .bins
            .get(&key)
            .ok_or_else(|| Error::UnknownIdentifier {
                axis: "bin key".to_string(),
                identifier: key.join("/"),
            })?;

        if contents.is_eft() {
            let fits = contents.fits(&self.basis)?;
            log::debug!("built {} fits for {:?} of '{}'", fits.len(), key, self.label);
            self.fits.insert(key, fits);
        } else {
            self.fits.remove(&key);
        }

        Ok(())
    }

    /// The fits materialised for `key`.
    pub fn fits(&self, key: &[String]) -> Option<&[PolynomialFit<T>]> {
        self.fits.get(key).map(Vec::as_slice)
    }

    /// Drops all materialised fits.
    pub fn invalidate_fits(&mut self) {
        self.fits.clear();
    }

    /// Scales the materialised fits of `key`, or of all keys, by `factor`.
    pub fn scale_fits(&mut self, factor: T, key: Option<&[String]>) {
        match key {
            Some(key) => {
                if let Some(fits) = self.fits.get_mut(key) {
                    fits.iter_mut().for_each(|f| f.scale(factor));
                }
            }
            None => self
                .fits
                .values_mut()
                .flatten()
                .for_each(|f| f.scale(factor)),
        }
    }

    /// Evaluates every EFT bin key at `point`, building missing fits first.
    ///
    /// The displayed sums of weights and squared weights become the polynomial and the variance
    /// polynomial at `point`. Bin keys without EFT information keep their accumulated sums.
    pub fn eval(&mut self, point: &WcPoint<T>) -> Result<()> {
        let values = point.values_for(&self.basis)?;

        let missing: Vec<BinKey> = self
            .bins
            .iter()
            .filter(|(k, c)| c.is_eft() && !self.fits.contains_key(*k))
            .map(|(k, _)| k.clone())
            .collect();
        for key in missing {
            self.set_wc_fit(Some(&key))?;
        }

        let mut negative = 0;
        for (key, contents) in self.bins.iter_mut() {
            let fits = match self.fits.get(key) {
                Some(fits) if contents.is_eft() => fits,
                _ => continue,
            };

            if contents.accumulated.is_none() {
                contents.accumulated = Some((contents.sumw.clone(), contents.sumw2.clone()));
            }

            for (b, fit) in fits.iter().enumerate() {
                let variance = fit.eval_point_error(&values)?;
                if variance < T::zero() {
                    negative += 1;
                }
                contents.sumw[b] = fit.eval_point(&values)?;
                contents.sumw2[b] = variance;
            }
        }

        if negative > 0 {
            log::warn!(
                "{} bins of '{}' have a negative variance at {:?}",
                negative,
                self.label,
                self.basis.names()
            );
        }

        Ok(())
    }

    /// Evaluates at the Standard-Model point.
    pub fn set_sm(&mut self) -> Result<()> {
        self.eval(&WcPoint::sm())
    }

    /// Puts the accumulated sums back on display.
    pub fn restore(&mut self) {
        self.bins.values_mut().for_each(BinContents::restore);
    }

    /// Serializes the histogram, including its evaluation state but not its fits.
    pub fn to_json(&self) -> Result<String>
    where
        T: Serialize,
    {
        Ok(serde_json::to_string(self)?)
    }

    /// Reads a histogram written by [`EftHistogram::to_json`].
    pub fn from_json(json: &str) -> Result<Self>
    where
        T: serde::de::DeserializeOwned,
    {
        Ok(serde_json::from_str(json)?)
    }
}

impl<T: Float + Display> EftHistogram<T> {
    /// Logs every materialised fit of `key`, or of all keys.
    pub fn dump_fits(&self, key: Option<&[String]>) {
        for (k, fits) in &self.fits {
            if key.map_or(true, |key| key == k.as_slice()) {
                for fit in fits {
                    log::info!("{:?} {}", k, fit);
                }
            }
        }
    }
}
