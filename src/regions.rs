//! Signal and application regions.
//!
//! Analyses fill a categorical axis that tells signal regions apart from the application regions
//! of data-driven background estimates. Once the background estimate has been taken care of, only
//! the signal regions are kept and the axis is integrated out.
use crate::error::{Error, Result};
use crate::histograms::{EftHistogram, Selection};
use num_traits::Float;

/// The marker identifying signal regions among the identifiers of the region axis.
pub const SIGNAL_REGION_MARKER: &str = "SR";

/// Sums the identifiers of the categorical axis `axis` that contain `marker`, removing the axis.
///
/// An empty histogram integrates to an empty histogram. Otherwise at least one identifier has to
/// match, or [`Error::MissingSignalRegion`] is returned.
pub fn integrate_signal_regions<T: Float>(
    hist: &EftHistogram<T>,
    axis: &str,
    marker: &str,
) -> Result<EftHistogram<T>> {
    if hist.is_empty() {
        log::warn!("histogram '{}' is empty, returning an empty histogram", hist.label());
        return hist.sum(&[axis], Default::default());
    }

    let regions: Vec<&str> = hist
        .identifiers(axis)?
        .iter()
        .map(String::as_str)
        .filter(|i| i.contains(marker))
        .collect();

    if regions.is_empty() {
        return Err(Error::MissingSignalRegion(hist.label().to_string()));
    }
    log::debug!("integrating '{}' over {:?}", hist.label(), regions);

    hist.select(&Selection::new().identifiers(axis, &regions))?
        .sum(&[axis], Default::default())
}
