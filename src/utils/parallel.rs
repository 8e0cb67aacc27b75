//! # Parallelism Utilities (CPU Threading)
//!
//! Fan-out helpers on top of `rayon`'s global pool.

use rayon::prelude::*;

/// Runs `task` for every index in `0..count` on the rayon pool and collects
/// the results in index order.
///
/// Stops at the first error; which error is reported when several tasks fail
/// is unspecified.
pub fn try_map_indexed<T, E, F>(count: usize, task: F) -> Result<Vec<T>, E>
where
    T: Send,
    E: Send,
    F: Fn(usize) -> Result<T, E> + Sync + Send,
{
    (0..count).into_par_iter().map(task).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_keep_index_order() {
        let squares: Result<Vec<usize>, ()> = try_map_indexed(64, |i| Ok(i * i));
        let squares = squares.unwrap();
        assert_eq!(squares.len(), 64);
        assert!(squares.iter().enumerate().all(|(i, &v)| v == i * i));
    }

    #[test]
    fn first_error_aborts() {
        let result: Result<Vec<usize>, String> =
            try_map_indexed(10, |i| if i == 3 { Err(format!("task {}", i)) } else { Ok(i) });
        assert_eq!(result.unwrap_err(), "task 3");
    }

    #[test]
    fn zero_tasks_is_empty() {
        let result: Result<Vec<u8>, ()> = try_map_indexed(0, |_| Ok(1));
        assert!(result.unwrap().is_empty());
    }
}
