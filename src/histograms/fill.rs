//! Filling event batches.
use super::{BinContents, BinKey, EftHistogram};
use crate::axis::{ravel, Axis};
use crate::coefficients::{error_terms, CoefficientMatrix};
use crate::error::{Error, Result};
use num_traits::Float;

#[derive(Clone, Debug)]
enum NumericValues<T> {
    Scalar(T),
    Array(Vec<T>),
}

impl<T: Copy> NumericValues<T> {
    fn get(&self, event: usize) -> T {
        match self {
            Self::Scalar(x) => *x,
            Self::Array(v) => v[event],
        }
    }
}

/// One batch of events to be filled into an [`EftHistogram`].
///
/// Every axis of the histogram needs a value: one identifier for each categorical axis, shared by
/// all events of the batch, and one value per event (or one value for all of them) for each
/// numeric axis. Without weights every event counts once.
///
/// The coefficient matrix is pre-weighted, see [`CoefficientMatrix`]. An empty or absent matrix
/// fills only the sums of weights.
#[derive(Clone, Debug)]
pub struct FillRequest<T> {
    weights: Option<Vec<T>>,
    coefficients: Option<CoefficientMatrix<T>>,
    categories: Vec<(String, String)>,
    values: Vec<(String, NumericValues<T>)>,
}

impl<T: Float> Default for FillRequest<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Float> FillRequest<T> {
    /// An empty request.
    pub fn new() -> Self {
        Self {
            weights: None,
            coefficients: None,
            categories: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Sets the per-event weights.
    pub fn weights(mut self, weights: Vec<T>) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Sets the pre-weighted per-event polynomial coefficients.
    pub fn eft_coefficients(mut self, coefficients: CoefficientMatrix<T>) -> Self {
        self.coefficients = Some(coefficients);
        self
    }

    /// Puts the batch into `identifier` of the categorical axis `axis`.
    pub fn category(mut self, axis: &str, identifier: &str) -> Self {
        self.categories
            .push((axis.to_string(), identifier.to_string()));
        self
    }

    /// Sets one value per event for the numeric axis `axis`.
    pub fn values(mut self, axis: &str, values: Vec<T>) -> Self {
        self.values
            .push((axis.to_string(), NumericValues::Array(values)));
        self
    }

    /// Sets the same value for all events for the numeric axis `axis`.
    pub fn value(mut self, axis: &str, value: T) -> Self {
        self.values
            .push((axis.to_string(), NumericValues::Scalar(value)));
        self
    }
}

impl<T: Float> EftHistogram<T> {
    fn check_request(&self, request: &FillRequest<T>) -> Result<()> {
        let given = request
            .categories
            .iter()
            .map(|(name, _)| (name, true))
            .chain(request.values.iter().map(|(name, _)| (name, false)));

        for (index, (name, categorical)) in given.enumerate() {
            if self.axis(name)?.is_categorical() != categorical {
                return Err(Error::Configuration(format!(
                    "axis '{}' is {}, but was given {}",
                    name,
                    if categorical { "numeric" } else { "categorical" },
                    if categorical { "an identifier" } else { "numbers" },
                )));
            }

            let repeated = request
                .categories
                .iter()
                .map(|(n, _)| n)
                .chain(request.values.iter().map(|(n, _)| n))
                .take(index)
                .any(|n| n == name);
            if repeated {
                return Err(Error::Configuration(format!(
                    "axis '{}' was given more than once",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Determines the number of events of a request; all per-event inputs must agree.
    fn batch_size(request: &FillRequest<T>) -> Result<usize> {
        let mut lengths = Vec::new();

        if let Some(weights) = &request.weights {
            lengths.push(("event weights", weights.len()));
        }
        if let Some(m) = &request.coefficients {
            if m.nrows() > 0 {
                lengths.push(("coefficient matrix rows", m.nrows()));
            }
        }
        for (_, values) in &request.values {
            if let NumericValues::Array(v) = values {
                lengths.push(("axis values", v.len()));
            }
        }

        match lengths.first() {
            None => Ok(1),
            Some(&(_, expected)) => {
                if let Some(&(what, actual)) = lengths.iter().find(|(_, n)| *n != expected) {
                    return Err(Error::shape(what, expected, actual));
                }
                Ok(expected)
            }
        }
    }

    /// Fills a batch of events.
    ///
    /// Besides the sums of weights and squared weights, every polynomial coefficient and every
    /// coefficient of the squared polynomial is scattered into the bins the events fall into. The
    /// coefficients are summed as given; they must already include the event weights.
    ///
    /// Weights filled without coefficients into a key that has them, or the other way round, are
    /// constant in the Wilson coefficients and go into the constant terms.
    ///
    /// An evaluated histogram is restored first. Materialised fits of the key are dropped.
    pub fn fill(&mut self, request: FillRequest<T>) -> Result<()> {
        self.check_request(&request)?;
        let events = Self::batch_size(&request)?;

        let ncoeff = self.num_coefficients();
        let coefficients = request.coefficients.as_ref().filter(|m| m.nrows() > 0);
        if let Some(m) = &coefficients {
            if m.ncols() != ncoeff {
                return Err(Error::shape("coefficient matrix columns", ncoeff, m.ncols()));
            }
        }

        let key: BinKey = self
            .categorical_axes()
            .iter()
            .map(|axis| {
                request
                    .categories
                    .iter()
                    .find(|(name, _)| name == axis.name())
                    .map(|(_, identifier)| identifier.clone())
                    .ok_or_else(|| Error::MissingAxisValue(axis.name().to_string()))
            })
            .collect::<Result<_>>()?;

        let flat: Vec<usize> = {
            let numeric = self.numeric_axes();
            let columns = numeric
                .iter()
                .map(|axis| {
                    request
                        .values
                        .iter()
                        .find(|(name, _)| name == axis.name())
                        .map(|(_, values)| values)
                        .ok_or_else(|| Error::MissingAxisValue(axis.name().to_string()))
                })
                .collect::<Result<Vec<_>>>()?;
            let shape = self.dense_shape();
            let mut indices = vec![0; numeric.len()];

            (0..events)
                .map(|event| {
                    for ((index, axis), column) in indices.iter_mut().zip(&numeric).zip(&columns) {
                        *index = axis.slot(column.get(event));
                    }
                    ravel(&indices, &shape)
                })
                .collect()
        };

        self.restore();

        let mut identifiers = key.iter();
        for axis in self.axes.iter_mut() {
            if let Axis::Categorical(axis) = axis {
                if let Some(identifier) = identifiers.next() {
                    axis.insert(identifier);
                }
            }
        }

        let len = self.dense_len();
        let nerr = self.num_error_coefficients();
        let contents = self
            .bins
            .entry(key.clone())
            .or_insert_with(|| BinContents::zeros(len));

        if coefficients.is_some() {
            contents.init_eft(ncoeff, nerr);
        }
        let constant = coefficients.is_none() && contents.is_eft();

        for (event, &b) in flat.iter().enumerate() {
            let w = request.weights.as_ref().map_or_else(T::one, |w| w[event]);
            contents.sumw[b] = contents.sumw[b] + w;
            contents.sumw2[b] = contents.sumw2[b] + w * w;

            if constant {
                contents.coeffs[0][b] = contents.coeffs[0][b] + w;
                contents.errcoeffs[0][b] = contents.errcoeffs[0][b] + w * w;
            }
        }

        if let Some(m) = coefficients {
            for (row, &b) in m.rows().zip(&flat) {
                for (array, &c) in contents.coeffs.iter_mut().zip(row) {
                    array[b] = array[b] + c;
                }
                for (array, e) in contents.errcoeffs.iter_mut().zip(error_terms(row)) {
                    array[b] = array[b] + e;
                }
            }
        }

        log::debug!(
            "filled {} events into {:?} of '{}'{}",
            events,
            key,
            self.label,
            if coefficients.is_some() { " with EFT coefficients" } else { "" }
        );
        self.fits.remove(&key);
        self.last_key = Some(key);

        Ok(())
    }
}
