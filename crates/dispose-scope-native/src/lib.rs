//! Scope-tracked tensors over a simulated native heap.
//!
//! This crate plays the part of the foreign-library wrapper that
//! `dispose-scope` manages: every [`Tensor`] owns a block on the
//! [`NativeHeap`] and joins the thread's current dispose scope when created.

mod error;
mod heap;
mod tensor;

pub use self::error::*;
pub use self::heap::*;
pub use self::tensor::*;

#[cfg(test)]
pub(crate) fn test_guard() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};

    static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
    GUARD
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
