use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use compact_str::CompactString;
use tracing::{debug, warn};

use crate::{DisposeScope, OutOfOrderPolicy, Scope, ScopeConfig, ScopeError};

struct ManagerState {
    // Top of the stack is the current scope.
    stack: RefCell<Vec<Scope>>,
    config: Cell<ScopeConfig>,
}

impl Drop for ManagerState {
    fn drop(&mut self) {
        // Scopes still open when the manager goes away (thread exit, leaked
        // guards) release their resources innermost first.
        let scopes = std::mem::take(self.stack.get_mut());
        for scope in scopes.into_iter().rev() {
            scope.end_scope();
        }
    }
}

thread_local! {
    static THREAD_MANAGER: DisposeScopeManager = DisposeScopeManager::new(config_from_env());
}

fn config_from_env() -> ScopeConfig {
    config_or_default(ScopeConfig::from_env())
}

pub(crate) fn config_or_default(config: Result<ScopeConfig, ScopeError>) -> ScopeConfig {
    config.unwrap_or_else(|e| {
        warn!(%e, "using default dispose scope config");
        ScopeConfig::default()
    })
}

/// Per-thread stack of active scopes.
///
/// Handles are cheap to clone and confined to the thread that created them.
#[derive(Clone)]
pub struct DisposeScopeManager {
    state: Rc<ManagerState>,
}

impl DisposeScopeManager {
    pub fn new(config: ScopeConfig) -> Self {
        Self {
            state: Rc::new(ManagerState {
                stack: RefCell::new(Vec::new()),
                config: Cell::new(config),
            }),
        }
    }

    /// The calling thread's manager.
    ///
    /// Fails once the thread's local storage has been torn down.
    pub fn thread_singleton() -> Result<Self, ScopeError> {
        THREAD_MANAGER
            .try_with(Clone::clone)
            .map_err(|_| ScopeError::ManagerUnavailable)
    }

    pub fn config(&self) -> ScopeConfig {
        self.state.config.get()
    }

    /// Replaces the configuration, e.g. on the thread singleton after parsing a CLI.
    pub fn set_config(&self, config: ScopeConfig) {
        self.state.config.set(config);
    }

    pub fn downgrade(&self) -> WeakScopeManager {
        WeakScopeManager {
            state: Rc::downgrade(&self.state),
        }
    }

    /// Opens a scope nested in the current one.
    pub fn new_scope(&self) -> DisposeScope {
        self.open(None)
    }

    pub fn new_named_scope(&self, name: impl Into<CompactString>) -> DisposeScope {
        self.open(Some(name.into()))
    }

    pub fn current_scope(&self) -> Option<Scope> {
        self.state.stack.borrow().last().cloned()
    }

    pub fn depth(&self) -> usize {
        self.state.stack.borrow().len()
    }

    fn open(&self, name: Option<CompactString>) -> DisposeScope {
        let scope = Scope::new(self.current_scope(), name, self.downgrade());
        self.push(scope.clone());
        debug!(
            scope = %scope.id(),
            name = scope.name().unwrap_or(""),
            parent = ?scope.parent().map(Scope::id),
            depth = self.depth(),
            "scope opened"
        );
        DisposeScope::from_scope(scope)
    }

    fn push(&self, scope: Scope) {
        self.state.stack.borrow_mut().push(scope);
    }

    /// Removes `scope` from the stack, wherever it sits.
    pub(crate) fn pop(&self, scope: &Scope) {
        let removed = {
            let mut stack = self.state.stack.borrow_mut();
            match stack.iter().rposition(|candidate| candidate.ptr_eq(scope)) {
                Some(index) => {
                    let out_of_order = index + 1 != stack.len();
                    let removed = stack.remove(index);
                    Some((removed, out_of_order, stack.len()))
                }
                None => None,
            }
        };
        match removed {
            Some((_, true, depth)) if self.config().out_of_order_end == OutOfOrderPolicy::Warn => {
                warn!(
                    scope = %scope.id(),
                    depth,
                    "scope ended while nested scopes were still open"
                );
            }
            Some(_) => {}
            None => debug!(scope = %scope.id(), "scope was not on the stack"),
        }
    }
}

impl fmt::Debug for DisposeScopeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposeScopeManager")
            .field("depth", &self.depth())
            .field("config", &self.config())
            .finish()
    }
}

/// Non-owning handle to a [`DisposeScopeManager`].
#[derive(Clone, Default)]
pub struct WeakScopeManager {
    state: Weak<ManagerState>,
}

impl WeakScopeManager {
    pub fn upgrade(&self) -> Option<DisposeScopeManager> {
        self.state.upgrade().map(|state| DisposeScopeManager { state })
    }
}

impl fmt::Debug for WeakScopeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakScopeManager")
            .field("alive", &(self.state.strong_count() > 0))
            .finish()
    }
}
