#![warn(clippy::all, clippy::cargo, clippy::nursery, clippy::pedantic)]
#![warn(missing_docs)]

//! The crate `histeft` provides histograms for [effective field theory] (EFT) reweighting. Every
//! bin does not only store the sum of event weights, but the sum of the quadratic polynomials that
//! give each event's weight as a function of the Wilson coefficients. After filling, the
//! histogram can be evaluated at any point in Wilson-coefficient space without looking at the
//! events again.
//!
//! # Features
//!
//! This library was designed with the following features as essential in mind:
//!
//! - **Generic numeric type**. The numeric type used in this library is not fixed, but instead a
//! generic parameter, so that the histograms can be used with either `f32`, `f64`, or a custom
//! numeric type that implements the `Float` trait from the `num-traits` crate.
//! - **Mergeable**. Histograms filled on different workers, possibly with different samples, are
//! added bin key by bin key. Addition is commutative and associative and has an identity, so
//! partial results can be combined in any grouping.
//! - **Uncertainties**. Next to the polynomial of the summed weights every bin stores the
//! polynomial of the summed squared weights, which gives the statistical variance at every EFT
//! point.
//! - **Slicing and projecting**. Categorical and numeric axes can be restricted, summed over and
//! regrouped. Polynomial coefficients are reduced together with the sums of weights, so reduced
//! histograms can still be evaluated.
//! - **Serializable**. Histograms and their schemas (de)serialize with `serde`, which makes it
//! easy to ship partial results from workers to the process combining them.
//!
//! # What is ...?
//!
//! This section is a dictionary of terms that are used in this documentation. Given $n$ Wilson
//! coefficients $c_1, \ldots, c_n$ and $x_0 = 1$, $x_k = c_k$, the weight of an event reads
//!
//! $$ w(c) = \sum_{0 \le i \le f \le n} a_{fi} \, x_f x_i $$
//!
//! and the variance of a bin with events $e$ is estimated by
//!
//! $$ V(c) = \sum_e w_e(c)^2 $$
//!
//! which is again a polynomial, of fourth order, in the Wilson coefficients. We use the following
//! terms:
//!
//! - the *basis* is the ordered list of Wilson-coefficient names; the order fixes the meaning of
//! every coefficient position,
//! - the *coefficients* are the $1 + 2n + n(n-1)/2$ numbers $a_{fi}$,
//! - the *error coefficients* are the coefficients of $w^2$, one for every pair of coefficients,
//! - a *bin key* is the tuple of identifiers of all categorical axes, under which the sums over
//! the numeric axes are stored,
//! - a *fit* is the polynomial and its variance polynomial for one bin, materialized on request,
//! - *evaluating* a histogram replaces the displayed sums by the polynomials evaluated at a point;
//! the accumulated sums are kept and restored before the next fill or addition.
//!
//! [effective field theory]: https://en.wikipedia.org/wiki/Effective_field_theory

pub mod axis;
pub mod callbacks;
pub mod coefficients;
mod error;
pub mod fit;
pub mod histograms;
pub mod processor;
pub mod regions;
pub mod specification;

pub use crate::axis::{Axis, CategoricalAxis, NumericAxis, Overflow};
pub use crate::coefficients::{CoefficientMatrix, WcBasis};
pub use crate::error::{Error, Result};
pub use crate::fit::{PolynomialFit, WcPoint, Yield};
pub use crate::histograms::{BinContents, BinKey, EftHistogram, FillRequest, Select, Selection};
pub use crate::specification::HistogramSpecification;
