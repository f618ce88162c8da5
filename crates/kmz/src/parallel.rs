//! Processing strategies for the batch driver

use geokmz_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::maybe_rayon::*;

/// How a batch distributes files over threads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProcessingMode {
    /// One file at a time on the calling thread
    Sequential,
    /// One worker per file on the global thread pool
    #[default]
    Parallel,
    /// Dedicated pool with the given number of threads
    ParallelWith(usize),
}

impl ProcessingMode {
    /// Mode for an optional `--jobs` value
    pub fn from_jobs(jobs: Option<usize>) -> Self {
        match jobs {
            Some(1) => ProcessingMode::Sequential,
            Some(n) if n > 1 => ProcessingMode::ParallelWith(n),
            _ => ProcessingMode::Parallel,
        }
    }

    /// Map `f` over `items`, preserving order.
    ///
    /// Without the `parallel` feature every mode runs sequentially.
    pub fn map<I, T, F>(&self, items: Vec<I>, f: F) -> Result<Vec<T>>
    where
        I: Send,
        T: Send,
        F: Fn(I) -> T + Sync + Send,
    {
        match self {
            ProcessingMode::Sequential => Ok(items.into_iter().map(f).collect()),
            ProcessingMode::Parallel => Ok(items.into_par_iter().map(f).collect()),
            ProcessingMode::ParallelWith(threads) => run_on_pool(*threads, items, f),
        }
    }
}

#[cfg(feature = "parallel")]
fn run_on_pool<I, T, F>(threads: usize, items: Vec<I>, f: F) -> Result<Vec<T>>
where
    I: Send,
    T: Send,
    F: Fn(I) -> T + Sync + Send,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| Error::InvalidParameter {
            name: "jobs",
            value: threads.to_string(),
            reason: e.to_string(),
        })?;
    Ok(pool.install(|| items.into_par_iter().map(f).collect()))
}

#[cfg(not(feature = "parallel"))]
fn run_on_pool<I, T, F>(threads: usize, items: Vec<I>, f: F) -> Result<Vec<T>>
where
    F: Fn(I) -> T,
{
    if threads == 0 {
        return Err(Error::InvalidParameter {
            name: "jobs",
            value: threads.to_string(),
            reason: "must be at least 1".into(),
        });
    }
    Ok(items.into_iter().map(f).collect())
}

/// Number of threads the default parallel mode would use
pub fn num_threads() -> usize {
    #[cfg(feature = "parallel")]
    {
        rayon::current_num_threads()
    }
    #[cfg(not(feature = "parallel"))]
    {
        1
    }
}
