//! The coefficient index spaces of the quadratic weight polynomial.
//!
//! For a basis of $n$ Wilson coefficients $c_1, \ldots, c_n$ we set $x_0 = 1$ and $x_k = c_k$.
//! The event weight at an EFT point is then
//!
//! $$ w(c) = \sum_{0 \le i \le f \le n} a_{fi} \, x_f x_i $$
//!
//! which consists of one constant, $n$ linear, $n$ squared and $n(n-1)/2$ mixed terms. The
//! coefficient $a_{fi}$ is always stored at position $f(f+1)/2 + i$, so that for `["c1", "c2"]`
//! the terms read `1, c1, c1^2, c2, c1*c2, c2^2`.
//!
//! The variance of a summed weight is the sum of the squared per-event polynomials; its
//! coefficients are indexed by the pairs $(a, b)$, $0 \le b \le a$, of polynomial terms using the
//! same triangular numbering.
use crate::error::{Error, Result};
use num_traits::Float;
use serde::{Deserialize, Serialize};

/// Number of independent coefficients of the weight polynomial for `n` Wilson coefficients,
/// `1 + 2n + n(n-1)/2`.
pub const fn num_coefficients(n: usize) -> usize {
    (n + 1) * (n + 2) / 2
}

/// Number of independent coefficients of the variance polynomial for `n` Wilson coefficients.
pub const fn num_error_coefficients(n: usize) -> usize {
    let ncoeff = num_coefficients(n);
    ncoeff * (ncoeff + 1) / 2
}

/// Position of the product of the entries `f` and `i` in a triangular enumeration. The order of
/// the two arguments does not matter.
pub const fn triangular_index(f: usize, i: usize) -> usize {
    let (hi, lo) = if f >= i { (f, i) } else { (i, f) };
    hi * (hi + 1) / 2 + lo
}

fn triangular_pairs(n: usize) -> Vec<(usize, usize)> {
    (0..n).flat_map(|f| (0..=f).map(move |i| (f, i))).collect()
}

/// The `(f, i)` pairs identifying each weight-polynomial term, in storage order.
pub fn term_pairs(n: usize) -> Vec<(usize, usize)> {
    triangular_pairs(n + 1)
}

/// The `(a, b)` pairs of weight-polynomial terms identifying each variance term, in storage order.
pub fn error_pairs(n: usize) -> Vec<(usize, usize)> {
    triangular_pairs(num_coefficients(n))
}

/// Returns both [`term_pairs`] and [`error_pairs`] for a basis of `n` Wilson coefficients.
pub fn pair_indices(n: usize) -> (Vec<(usize, usize)>, Vec<(usize, usize)>) {
    (term_pairs(n), error_pairs(n))
}

/// Given the coefficients of one event, returns the coefficients of its squared polynomial: the
/// products `c_a * c_b` for the diagonal and `2 * c_a * c_b` off the diagonal.
pub fn error_terms<T: Float>(coeffs: &[T]) -> Vec<T> {
    let two = T::one() + T::one();
    let mut out = Vec::with_capacity(coeffs.len() * (coeffs.len() + 1) / 2);

    for (a, &ca) in coeffs.iter().enumerate() {
        for &cb in &coeffs[..a] {
            out.push(two * ca * cb);
        }
        out.push(ca * ca);
    }

    out
}

/// Expands the values of the Wilson coefficients into the monomials multiplying each
/// coefficient of the weight polynomial.
pub fn term_basis<T: Float>(point: &[T]) -> Vec<T> {
    let x: Vec<T> = std::iter::once(T::one()).chain(point.iter().copied()).collect();
    let mut out = Vec::with_capacity(num_coefficients(point.len()));

    for f in 0..x.len() {
        for i in 0..=f {
            out.push(x[f] * x[i]);
        }
    }

    out
}

/// Expands the monomials of the weight polynomial into those multiplying each coefficient of the
/// variance polynomial.
pub fn error_basis<T: Float>(terms: &[T]) -> Vec<T> {
    let mut out = Vec::with_capacity(terms.len() * (terms.len() + 1) / 2);

    for a in 0..terms.len() {
        for b in 0..=a {
            out.push(terms[a] * terms[b]);
        }
    }

    out
}

/// An ordered list of Wilson-coefficient names.
///
/// The order fixes the meaning of every coefficient position, so two histograms may only be
/// merged if their bases agree. Coefficients computed in a different order must be brought into
/// this one with [`remap`].
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct WcBasis {
    names: Vec<String>,
}

impl WcBasis {
    /// Creates a basis from a list of names, which must be unique.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();

        for (index, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(Error::Configuration(
                    "Wilson coefficient names must not be empty".to_string(),
                ));
            }
            if names[..index].contains(name) {
                return Err(Error::Configuration(format!(
                    "Wilson coefficient '{}' appears twice in the basis",
                    name
                )));
            }
        }

        Ok(Self { names })
    }

    /// Parses a comma-separated list such as `"ctW, ctZ,cpt"`; white space is ignored.
    pub fn parse(names: &str) -> Result<Self> {
        let stripped: String = names.chars().filter(|c| !c.is_whitespace()).collect();

        if stripped.is_empty() {
            return Ok(Self::default());
        }

        Self::new(stripped.split(','))
    }

    /// Returns the names in basis order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Returns the number of Wilson coefficients.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` for the Standard-Model-only basis.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Returns the position of `name`, if it is part of the basis.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Number of weight-polynomial coefficients for this basis.
    pub fn num_coefficients(&self) -> usize {
        num_coefficients(self.len())
    }

    /// Number of variance-polynomial coefficients for this basis.
    pub fn num_error_coefficients(&self) -> usize {
        num_error_coefficients(self.len())
    }
}

/// Per-event polynomial coefficients of one batch, one row per event.
///
/// Rows are **pre-weighted**: row `r` already contains the scalar weight of event `r`, and
/// [`EftHistogram::fill`](crate::histograms::EftHistogram::fill) sums the rows as they are. Use
/// [`CoefficientMatrix::from_unweighted`] to fold the weights in when constructing the matrix.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct CoefficientMatrix<T> {
    nrows: usize,
    ncols: usize,
    data: Vec<T>,
}

impl<T: Float> CoefficientMatrix<T> {
    /// Wraps row-major `data` with `ncols` coefficients per event.
    pub fn new(ncols: usize, data: Vec<T>) -> Result<Self> {
        if ncols == 0 {
            if !data.is_empty() {
                return Err(Error::shape("coefficient matrix columns", data.len(), 0));
            }
            return Ok(Self {
                nrows: 0,
                ncols,
                data,
            });
        }
        if data.len() % ncols != 0 {
            return Err(Error::shape(
                "coefficient matrix entries",
                (data.len() / ncols + 1) * ncols,
                data.len(),
            ));
        }

        Ok(Self {
            nrows: data.len() / ncols,
            ncols,
            data,
        })
    }

    /// Builds the matrix from one vector per event; all rows must have the same length.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self> {
        let ncols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * ncols);

        for row in rows {
            if row.len() != ncols {
                return Err(Error::shape("coefficient matrix row", ncols, row.len()));
            }
            data.extend(row);
        }

        Self::new(ncols, data)
    }

    /// Builds the matrix from coefficients that do not yet include the event weights, multiplying
    /// each row by its weight.
    pub fn from_unweighted(rows: Vec<Vec<T>>, weights: &[T]) -> Result<Self> {
        if rows.len() != weights.len() {
            return Err(Error::shape("event weights", rows.len(), weights.len()));
        }

        Self::from_rows(
            rows.into_iter()
                .zip(weights)
                .map(|(row, &w)| row.into_iter().map(|c| c * w).collect())
                .collect(),
        )
    }

    /// Number of events.
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of coefficients per event.
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// The coefficients of event `r`.
    pub fn row(&self, r: usize) -> &[T] {
        &self.data[r * self.ncols..(r + 1) * self.ncols]
    }

    /// Iterates over the events.
    pub fn rows(&self) -> impl Iterator<Item = &[T]> + '_ {
        (0..self.nrows).map(move |r| self.row(r))
    }
}

/// For every term of the `dst` basis, the position of the same term in the `src` basis.
///
/// Every name of `dst` must be part of `src`. Names of `src` missing in `dst` are dropped, which
/// amounts to fixing them to zero.
pub fn remap_indices(src: &WcBasis, dst: &WcBasis) -> Result<Vec<usize>> {
    let mut positions = Vec::with_capacity(dst.len() + 1);
    positions.push(0);

    for name in dst.names() {
        let index = src.index_of(name).ok_or_else(|| {
            Error::Configuration(format!(
                "cannot remap onto '{}' which is not part of the source basis {:?}",
                name,
                src.names()
            ))
        })?;
        positions.push(index + 1);
    }

    Ok(term_pairs(dst.len())
        .into_iter()
        .map(|(f, i)| triangular_index(positions[f], positions[i]))
        .collect())
}

/// Reorders a coefficient matrix computed in the `src` basis into the `dst` basis.
pub fn remap<T: Float>(
    src: &WcBasis,
    dst: &WcBasis,
    matrix: &CoefficientMatrix<T>,
) -> Result<CoefficientMatrix<T>> {
    if matrix.ncols() != src.num_coefficients() && matrix.nrows() != 0 {
        return Err(Error::shape(
            "coefficient matrix columns",
            src.num_coefficients(),
            matrix.ncols(),
        ));
    }

    let indices = remap_indices(src, dst)?;
    let data = matrix
        .rows()
        .flat_map(|row| indices.iter().map(move |&k| row[k]))
        .collect();

    CoefficientMatrix::new(indices.len(), data)
}
