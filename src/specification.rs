//! Histogram schemas read from JSON.
use crate::axis::Axis;
use crate::coefficients::WcBasis;
use crate::error::Result;
use crate::histograms::EftHistogram;
use num_traits::Float;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Wilson-coefficient names, either as a list or as one comma-joined string.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum WcNames {
    /// `["ctW", "ctZ"]`
    List(Vec<String>),
    /// `"ctW, ctZ"`
    Joined(String),
}

impl Default for WcNames {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl WcNames {
    /// Turns the names into a basis, checking them for duplicates.
    pub fn basis(&self) -> Result<WcBasis> {
        match self {
            Self::List(names) => WcBasis::new(names.iter().map(|n| n.trim())),
            Self::Joined(names) => WcBasis::parse(names),
        }
    }
}

/// Definition of one axis.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum AxisSpecification<T> {
    /// An axis of string identifiers.
    Categorical {
        /// Name used in fill requests and selections.
        name: String,
        /// Human-readable label.
        label: String,
    },
    /// An axis with `bins` equally wide bins between `low` and `high`.
    Regular {
        /// Name used in fill requests and selections.
        name: String,
        /// Human-readable label.
        label: String,
        /// Number of bins.
        bins: usize,
        /// Lower edge of the first bin.
        low: T,
        /// Upper edge of the last bin.
        high: T,
    },
    /// An axis with explicit bin edges.
    Variable {
        /// Name used in fill requests and selections.
        name: String,
        /// Human-readable label.
        label: String,
        /// Strictly increasing bin edges.
        edges: Vec<T>,
    },
}

impl<T: Float> AxisSpecification<T> {
    /// Builds the axis.
    pub fn build(&self) -> Result<Axis<T>> {
        match self {
            Self::Categorical { name, label } => Ok(Axis::categorical(name, label)),
            Self::Regular {
                name,
                label,
                bins,
                low,
                high,
            } => Axis::regular(name, label, *bins, *low, *high),
            Self::Variable { name, label, edges } => Axis::variable(name, label, edges.clone()),
        }
    }
}

/// The schema of an [`EftHistogram`]: its label, the Wilson coefficients and the axes.
///
/// ```
/// use histeft::HistogramSpecification;
///
/// let spec = HistogramSpecification::<f64>::from_json(
///     r#"{
///         "label": "Events",
///         "wc_names": "ctW, ctZ",
///         "axes": [
///             {"categorical": {"name": "sample", "label": "sample"}},
///             {"regular": {"name": "njets", "label": "jet multiplicity", "bins": 10, "low": 0, "high": 10}}
///         ]
///     }"#,
/// )
/// .unwrap();
/// let h = spec.build().unwrap();
/// assert_eq!(h.num_coefficients(), 6);
/// ```
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct HistogramSpecification<T> {
    label: String,
    #[serde(default)]
    wc_names: WcNames,
    axes: Vec<AxisSpecification<T>>,
}

impl<T: Float> HistogramSpecification<T> {
    /// Constructor.
    pub fn new(label: &str, wc_names: WcNames, axes: Vec<AxisSpecification<T>>) -> Self {
        Self {
            label: label.to_string(),
            wc_names,
            axes,
        }
    }

    /// Returns the label of the histogram.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the Wilson-coefficient names as given.
    pub fn wc_names(&self) -> &WcNames {
        &self.wc_names
    }

    /// Returns the axis definitions.
    pub fn axes(&self) -> &[AxisSpecification<T>] {
        &self.axes
    }

    /// Builds an empty histogram.
    pub fn build(&self) -> Result<EftHistogram<T>> {
        let axes = self
            .axes
            .iter()
            .map(AxisSpecification::build)
            .collect::<Result<Vec<_>>>()?;

        EftHistogram::new(&self.label, self.wc_names.basis()?, axes)
    }
}

impl<T> HistogramSpecification<T>
where
    T: Float + serde::de::DeserializeOwned,
{
    /// Reads a specification from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Reads a JSON object mapping histogram names to specifications and builds every histogram.
pub fn load_specifications<T>(json: &str) -> Result<BTreeMap<String, EftHistogram<T>>>
where
    T: Float + serde::de::DeserializeOwned,
{
    let specs: BTreeMap<String, HistogramSpecification<T>> = serde_json::from_str(json)?;
    log::debug!("building {} histograms from specifications", specs.len());

    specs
        .into_iter()
        .map(|(name, spec)| Ok((name, spec.build()?)))
        .collect()
}
