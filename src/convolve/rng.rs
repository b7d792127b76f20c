//! Per-thread random streams for the sampling workers.
//!
//! Every worker owns one `StdRng` in thread-local storage. The recycle
//! modes differ only in when and with what these streams are reseeded;
//! the sampling code itself always draws through `with_thread_rng`.

use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::rngs::StdRng;
use rand::SeedableRng;

thread_local! {
    static THREAD_RNG: RefCell<StdRng> = RefCell::new(StdRng::from_entropy());
}

/// Reseed the calling thread's stream deterministically.
pub fn seed_thread_rng(seed: u64) {
    THREAD_RNG.with(|rng| *rng.borrow_mut() = StdRng::seed_from_u64(seed));
}

/// Reseed the calling thread's stream from OS entropy.
pub fn seed_thread_rng_entropy() {
    THREAD_RNG.with(|rng| *rng.borrow_mut() = StdRng::from_entropy());
}

/// Run `f` with mutable access to the calling thread's stream.
pub fn with_thread_rng<R>(f: impl FnOnce(&mut StdRng) -> R) -> R {
    THREAD_RNG.with(|rng| f(&mut rng.borrow_mut()))
}

/// Derive a per-task seed from the batch seed and the task index.
///
/// Hashing decorrelates the streams of neighbouring tasks, and because
/// the derivation depends only on the task index, a batch produces the
/// same draws no matter how many workers it runs on.
pub fn task_seed(seed: u64, task: usize) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    task.hash(&mut hasher);
    hasher.finish()
}
