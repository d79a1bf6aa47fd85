//! Map-reduce over chunks of events.
//!
//! Every worker thread fills its own empty copy of a template histogram with the chunks assigned
//! to it. The partial histograms are added in worker order afterwards, so the result does not
//! depend on how the threads were scheduled.
use crate::callbacks::Callback;
use crate::error::{Error, Result};
use crate::histograms::EftHistogram;
use num_traits::Float;
use std::ops::Range;

use crossbeam as cb;

/// Compute the range of items handled by `worker` (zero-based) out of `n_workers`, given the total
/// number of items `total`. The ranges of all workers partition `0..total`.
pub fn chunk_range(worker: usize, n_workers: usize, total: usize) -> Range<usize> {
    // make sure passed data is valid
    debug_assert!(worker < n_workers);
    let per_worker = (total + n_workers - 1) / n_workers;

    // the last workers may receive fewer items, or none at all
    let start = (worker * per_worker).min(total);
    let end = (start + per_worker).min(total);

    start..end
}

/// Process `chunks` on `n_workers` threads.
///
/// For every chunk `process` is called with the chunk and the partial histogram of the worker it
/// was assigned to, followed by [`Callback::print_chunk`]. The partial histograms start as
/// `template.identity()` and are added in worker order; [`Callback::print_merge`] is called after
/// each addition.
pub fn process_chunks<T, E, C, F>(
    template: &EftHistogram<T>,
    chunks: &[E],
    n_workers: usize,
    callback: &C,
    process: F,
) -> Result<EftHistogram<T>>
where
    T: Float + Send + Sync,
    E: Sync,
    C: Callback<T> + Sync,
    F: Fn(&E, &mut EftHistogram<T>) -> Result<()> + Sync,
{
    if n_workers == 0 {
        return Err(Error::Configuration(
            "at least one worker is needed to process events".to_string(),
        ));
    }

    let process = &process;

    // distribute the chunks evenly across the workers
    let partials = cb::thread::scope(|s| {
        let mut handles = Vec::with_capacity(n_workers);

        for worker in 0..n_workers {
            let range = chunk_range(worker, n_workers, chunks.len());
            let mut hist = template.identity();

            handles.push(s.spawn(move |_| -> Result<EftHistogram<T>> {
                for (chunk, events) in chunks[range.clone()].iter().enumerate() {
                    process(events, &mut hist)?;
                    callback.print_chunk(worker, range.start + chunk, &hist);
                }
                Ok(hist)
            }));
        }

        // wait for the threads to finish
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect::<Vec<_>>()
    })
    .unwrap_or_else(|e| std::panic::resume_unwind(e));

    let mut result = template.identity();
    for (worker, partial) in partials.into_iter().enumerate() {
        result.add(&partial?)?;
        callback.print_merge(worker, &result);
    }

    log::info!(
        "processed {} chunks on {} workers into '{}'",
        chunks.len(),
        n_workers,
        result.label()
    );

    Ok(result)
}
