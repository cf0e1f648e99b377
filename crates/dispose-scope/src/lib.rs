//! Lexical lifetime management for externally-allocated handles.
//!
//! Values that wrap a native handle (tensors, buffers, file descriptors owned
//! by a foreign library) implement [`Disposable`]. While a [`DisposeScope`] is
//! open on the current thread, freshly created resources register themselves
//! into it through [`track_new`]; when the scope ends, everything it still
//! owns is released.
//!
//! ```rust,ignore
//! let outer = dispose_scope::new_dispose_scope()?;
//! let kept = {
//!     let inner = dispose_scope::new_dispose_scope()?;
//!     let a = Tensor::ones(&[4])?;
//!     let b = a.add(&a)?;
//!     inner.move_to_outer(b)
//! }; // `a` is released here, `b` now belongs to `outer`
//! ```
//!
//! Lifetime can be extended one level with [`Scope::move_to_outer`], or
//! forever with [`Scope::detach`], after which releasing the value is the
//! caller's job.
//!
//! # Threads
//!
//! Each thread has its own stack of scopes ([`DisposeScopeManager::thread_singleton`]).
//! Scopes and resources are `!Send`; only the [`statistics`] counters are
//! shared by the whole process.
//!
//! # Configuration
//!
//! | Variable | Values | Effect |
//! |----------|--------|--------|
//! | `DISPOSE_SCOPE_OUT_OF_ORDER` | `warn` (default), `ignore` | Logging when a scope that is not innermost is ended. |

mod config;
mod error;
mod ids;
mod manager;
mod resource;
mod scope;
mod statistics;

pub use self::config::*;
pub use self::error::*;
pub use self::ids::*;
pub use self::manager::*;
pub use self::resource::*;
pub use self::scope::*;
pub use self::statistics::*;

use compact_str::CompactString;

/// Opens a scope on the calling thread, nested in the current one.
pub fn new_dispose_scope() -> Result<DisposeScope, ScopeError> {
    Ok(DisposeScopeManager::thread_singleton()?.new_scope())
}

pub fn new_named_dispose_scope(name: impl Into<CompactString>) -> Result<DisposeScope, ScopeError> {
    Ok(DisposeScopeManager::thread_singleton()?.new_named_scope(name))
}

/// The calling thread's innermost open scope.
pub fn current_scope() -> Option<Scope> {
    DisposeScopeManager::thread_singleton()
        .ok()
        .and_then(|manager| manager.current_scope())
}

#[cfg(test)]
fn test_guard() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};

    static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
    GUARD
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
