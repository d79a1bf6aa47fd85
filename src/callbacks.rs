//! Implementation of different callback functions.
use crate::histograms::EftHistogram;
use num_traits::Float;
use std::fmt::Display;

/// Trait for implementing callbacks for the chunked event processing.
pub trait Callback<T> {
    /// This method is called by a worker after it has processed a chunk of events and may print
    /// information about the worker's partial histogram.
    fn print_chunk(&self, worker: usize, chunk: usize, hist: &EftHistogram<T>);

    /// This method is called after the partial histogram of `worker` has been added to the result,
    /// which is passed as `hist`.
    fn print_merge(&self, _worker: usize, _hist: &EftHistogram<T>) {}
}

/// A callback function that does nothing
pub struct SinkCallback {}

impl<T> Callback<T> for SinkCallback {
    fn print_chunk(&self, _: usize, _: usize, _: &EftHistogram<T>) {}
}

/// A callback function that logs every processed chunk
pub struct SimpleCallback {}

impl<T: Float + Display> Callback<T> for SimpleCallback {
    fn print_chunk(&self, worker: usize, chunk: usize, hist: &EftHistogram<T>) {
        log::info!(
            "worker {} finished chunk {}: {} bin keys, sum of weights {}",
            worker,
            chunk,
            hist.keys().count(),
            hist.integral()
        );
    }
}

/// Simple cumulative callback that logs every processed chunk together with the running total
/// of the merged partial results.
pub struct SimpleCumulativeCallback {}

impl<T: Float + Display> Callback<T> for SimpleCumulativeCallback {
    fn print_chunk(&self, worker: usize, chunk: usize, hist: &EftHistogram<T>) {
        SimpleCallback {}.print_chunk(worker, chunk, hist);
    }

    fn print_merge(&self, worker: usize, hist: &EftHistogram<T>) {
        log::info!(
            "[worker {}: merged] [cumulative: {} bin keys, sum of weights {}]",
            worker,
            hist.keys().count(),
            hist.integral()
        );
    }
}
