use rayon::prelude::*;

/**
 * Evaluates `f(idx)` for every `idx in 0..n` and returns the results in index order.
 *
 * With `parallel` the calls are spread over the rayon thread pool; the result
 * is the same either way.
 */
pub fn map_indexed<T: Send, F: Fn(usize) -> T + Send + Sync>(n: usize, parallel: bool, f: F) -> Vec<T> {
    if parallel {
        (0..n).into_par_iter().map(|idx| f(idx)).collect()
    } else {
        (0..n).map(|idx| f(idx)).collect()
    }
}
