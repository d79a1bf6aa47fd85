//! Evaluation of the per-bin weight polynomials.
use crate::coefficients::{error_basis, term_basis, triangular_index, WcBasis};
use crate::error::{Error, Result};
use num_traits::Float;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::ops::{Add, AddAssign};

/// A yield together with its variance, both evaluated at one EFT point.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub struct Yield<T> {
    value: T,
    variance: T,
}

impl<T: Float> Yield<T> {
    /// Constructor.
    pub const fn new(value: T, variance: T) -> Self {
        Self { value, variance }
    }

    /// Returns the yield.
    pub fn value(&self) -> T {
        self.value
    }

    /// Returns the variance, $V$, exactly as propagated; it can be negative after cancellations.
    pub fn variance(&self) -> T {
        self.variance
    }

    /// Returns the standard deviation, $\sigma = \sqrt{V}$, refusing negative variances.
    pub fn std(&self) -> Result<T> {
        if self.variance < T::zero() {
            return Err(Error::NegativeVariance(
                self.variance.to_f64().unwrap_or(f64::NAN),
            ));
        }
        Ok(self.variance.sqrt())
    }
}

impl<T: Add<Output = T>> Add for Yield<T> {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            value: self.value + other.value,
            variance: self.variance + other.variance,
        }
    }
}

impl<T: AddAssign> AddAssign for Yield<T> {
    fn add_assign(&mut self, other: Self) {
        self.value += other.value;
        self.variance += other.variance;
    }
}

/// Values of Wilson coefficients, keyed by name. Coefficients that are not set are zero, so the
/// empty point is the Standard Model.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(transparent)]
pub struct WcPoint<T> {
    values: BTreeMap<String, T>,
}

impl<T: Float> WcPoint<T> {
    /// The Standard-Model point, where every Wilson coefficient vanishes.
    pub fn sm() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    /// Sets `name` to `value`.
    pub fn with(mut self, name: &str, value: T) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }

    /// Returns the value of `name`.
    pub fn get(&self, name: &str) -> T {
        self.values.get(name).copied().unwrap_or_else(T::zero)
    }

    /// Orders the values as in `basis`. Naming a coefficient that is not part of the basis is an
    /// error, since it would silently be ignored otherwise.
    pub fn values_for(&self, basis: &WcBasis) -> Result<Vec<T>> {
        if let Some(name) = self.values.keys().find(|n| basis.index_of(n).is_none()) {
            return Err(Error::Configuration(format!(
                "point sets '{}' which is not part of the basis {:?}",
                name,
                basis.names()
            )));
        }

        Ok(basis.names().iter().map(|n| self.get(n)).collect())
    }
}

impl<T: Float> std::iter::FromIterator<(String, T)> for WcPoint<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// The quadratic response of one bin to the Wilson coefficients, together with the polynomial
/// of its variance.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct PolynomialFit<T> {
    tag: String,
    names: WcBasis,
    coeffs: Vec<T>,
    errors: Vec<T>,
}

impl<T: Float> PolynomialFit<T> {
    /// Creates a fit. `coeffs` must hold one entry per polynomial term of `names` and `errors` one
    /// entry per variance term.
    pub fn new(tag: &str, names: WcBasis, coeffs: Vec<T>, errors: Vec<T>) -> Result<Self> {
        if coeffs.len() != names.num_coefficients() {
            return Err(Error::shape(
                "fit coefficients",
                names.num_coefficients(),
                coeffs.len(),
            ));
        }
        if errors.len() != names.num_error_coefficients() {
            return Err(Error::shape(
                "fit error coefficients",
                names.num_error_coefficients(),
                errors.len(),
            ));
        }

        Ok(Self {
            tag: tag.to_string(),
            names,
            coeffs,
            errors,
        })
    }

    /// Returns the tag, usually the flat index of the bin this fit belongs to.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the Wilson-coefficient basis.
    pub fn names(&self) -> &WcBasis {
        &self.names
    }

    /// Returns the polynomial coefficients.
    pub fn coeffs(&self) -> &[T] {
        &self.coeffs
    }

    /// Returns the variance coefficients.
    pub fn errors(&self) -> &[T] {
        &self.errors
    }

    /// Coefficient of the product of the Wilson coefficients `f` and `i`, where `0` stands for the
    /// constant and `k` for the `k`-th name of the basis.
    pub fn coefficient(&self, f: usize, i: usize) -> T {
        self.coeffs[triangular_index(f, i)]
    }

    fn check_point(&self, point: &[T]) -> Result<()> {
        if point.len() != self.names.len() {
            return Err(Error::shape("EFT point", self.names.len(), point.len()));
        }
        Ok(())
    }

    /// Evaluates the weight at `point`, given in basis order. At the origin this is the constant
    /// coefficient.
    pub fn eval_point(&self, point: &[T]) -> Result<T> {
        self.check_point(point)?;

        Ok(dot(&self.coeffs, &term_basis(point)))
    }

    /// Evaluates the propagated variance of the weight at `point`. The value is returned as is,
    /// a negative result signals numerical cancellation.
    pub fn eval_point_error(&self, point: &[T]) -> Result<T> {
        self.check_point(point)?;

        Ok(dot(&self.errors, &error_basis(&term_basis(point))))
    }

    /// Evaluates weight and variance at a named point.
    pub fn eval(&self, point: &WcPoint<T>) -> Result<Yield<T>> {
        let values = point.values_for(&self.names)?;
        let terms = term_basis(&values);

        Ok(Yield::new(
            dot(&self.coeffs, &terms),
            dot(&self.errors, &error_basis(&terms)),
        ))
    }

    /// Adds the coefficients of `other`, which must have the same basis in the same order.
    pub fn try_add(&mut self, other: &Self) -> Result<()> {
        if self.names != other.names {
            return Err(Error::Configuration(format!(
                "cannot add fit with basis {:?} to fit with basis {:?}",
                other.names.names(),
                self.names.names()
            )));
        }

        self.add_terms(other);
        Ok(())
    }

    fn add_terms(&mut self, other: &Self) {
        for (a, &b) in self.coeffs.iter_mut().zip(&other.coeffs) {
            *a = *a + b;
        }
        for (a, &b) in self.errors.iter_mut().zip(&other.errors) {
            *a = *a + b;
        }
    }

    /// Multiplies the weight by `factor`, and hence the variance by `factor` squared.
    pub fn scale(&mut self, factor: T) {
        let factor2 = factor * factor;
        self.coeffs.iter_mut().for_each(|c| *c = *c * factor);
        self.errors.iter_mut().for_each(|e| *e = *e * factor2);
    }
}

fn dot<T: Float>(a: &[T], b: &[T]) -> T {
    a.iter()
        .zip(b)
        .fold(T::zero(), |acc, (&x, &y)| acc + x * y)
}

impl<T: Float> Add for PolynomialFit<T> {
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        self += other;
        self
    }
}

/// # Panics
///
/// Panics if the two fits have different bases; use [`PolynomialFit::try_add`] to get an error
/// instead.
impl<T: Float> AddAssign for PolynomialFit<T> {
    fn add_assign(&mut self, other: Self) {
        assert_eq!(
            self.names, other.names,
            "cannot add fits of different Wilson-coefficient bases"
        );

        self.add_terms(&other);
    }
}

impl<T: Float + Display> Display for PolynomialFit<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = |k: usize| {
            if k == 0 {
                "sm"
            } else {
                self.names.names()[k - 1].as_str()
            }
        };

        write!(f, "Fit {}:", self.tag)?;
        for (k, (a, b)) in crate::coefficients::term_pairs(self.names.len())
            .into_iter()
            .enumerate()
        {
            write!(f, " {}*{}*{}", self.coeffs[k], label(a), label(b))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficients::error_terms;

    fn two_wc_fit() -> PolynomialFit<f64> {
        let coeffs = vec![10.0, 1.0, 1.0, 0.1, 0.1, 0.05];
        let errors = error_terms(&coeffs);
        PolynomialFit::new("0", WcBasis::parse("c1,c2").unwrap(), coeffs, errors).unwrap()
    }

    #[test]
    fn sm_point_returns_constant() {
        let fit = two_wc_fit();
        assert_eq!(fit.eval_point(&[0.0, 0.0]).unwrap(), 10.0);
        assert_eq!(fit.eval_point_error(&[0.0, 0.0]).unwrap(), 100.0);
        assert_eq!(fit.eval(&WcPoint::sm()).unwrap().value(), 10.0);
    }

    #[test]
    fn quadratic_expansion() {
        let fit = two_wc_fit();
        let (c1, c2) = (2.0, -3.0);
        let expected = 10.0 + c1 + c1 * c1 + 0.1 * c2 + 0.1 * c1 * c2 + 0.05 * c2 * c2;

        let w = fit.eval_point(&[c1, c2]).unwrap();
        assert!((w - expected).abs() < 1e-12);

        let point = WcPoint::sm().with("c2", c2).with("c1", c1);
        let y = fit.eval(&point).unwrap();
        assert!((y.value() - expected).abs() < 1e-12);
        assert!((y.variance() - expected * expected).abs() < 1e-9);
        assert!((y.std().unwrap() - expected.abs()).abs() < 1e-9);
        assert_eq!(fit.coefficient(2, 1), 0.1);
    }

    #[test]
    fn scale_is_linear_and_quadratic() {
        let fit = two_wc_fit();
        let mut scaled = fit.clone();
        scaled.scale(3.0);

        let p = [0.5, 1.5];
        let w = fit.eval_point(&p).unwrap();
        let e = fit.eval_point_error(&p).unwrap();
        assert!((scaled.eval_point(&p).unwrap() - 3.0 * w).abs() < 1e-12);
        assert!((scaled.eval_point_error(&p).unwrap() - 9.0 * e).abs() < 1e-9);
    }

    #[test]
    fn wrong_lengths_are_rejected() {
        let basis = WcBasis::parse("c1").unwrap();
        assert!(matches!(
            PolynomialFit::new("x", basis.clone(), vec![1.0; 4], vec![0.0; 6]),
            Err(Error::ShapeMismatch { expected: 3, actual: 4, .. })
        ));
        assert!(PolynomialFit::new("x", basis, vec![1.0; 3], vec![0.0; 5]).is_err());

        let fit = two_wc_fit();
        assert!(fit.eval_point(&[1.0]).is_err());
        assert!(fit.eval(&WcPoint::sm().with("c3", 1.0)).is_err());
    }

    #[test]
    fn negative_variance_is_reported() {
        let y = Yield::new(1.0, -1e-3);
        assert!(matches!(y.std(), Err(Error::NegativeVariance(_))));
    }

    #[test]
    fn fits_add_coefficientwise() {
        let sum = two_wc_fit() + two_wc_fit();
        assert_eq!(sum.coeffs()[0], 20.0);
        assert_eq!(sum.eval_point(&[1.0, 1.0]).unwrap(), 2.0 * two_wc_fit().eval_point(&[1.0, 1.0]).unwrap());
    }

    #[test]
    fn fits_of_different_bases_do_not_add() {
        let mut fit = two_wc_fit();
        let coeffs = vec![10.0, 0.1, 0.05, 1.0, 0.1, 1.0];
        let errors = error_terms(&coeffs);
        let swapped =
            PolynomialFit::new("0", WcBasis::parse("c2,c1").unwrap(), coeffs, errors).unwrap();

        assert!(matches!(fit.try_add(&swapped), Err(Error::Configuration(_))));
        assert_eq!(fit, two_wc_fit());

        fit.try_add(&two_wc_fit()).unwrap();
        assert_eq!(fit.coeffs()[0], 20.0);
    }

    #[test]
    #[should_panic(expected = "different Wilson-coefficient bases")]
    fn operator_panics_on_different_bases() {
        let coeffs = vec![1.0; 6];
        let errors = error_terms(&coeffs);
        let other = PolynomialFit::new("0", WcBasis::parse("c3,c4").unwrap(), coeffs, errors).unwrap();
        let _ = two_wc_fit() + other;
    }

    #[test]
    fn display_lists_terms() {
        let text = two_wc_fit().to_string();
        assert!(text.starts_with("Fit 0: 10*sm*sm"));
        assert!(text.contains("0.1*c2*c1"));
    }
}
