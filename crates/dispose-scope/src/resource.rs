use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::scope::{Scope, ScopeState};
use crate::{DisposeScopeManager, ResourceId, ScopeId, statistics};

/// Identity plus owning-scope back-reference, embedded in every trackable resource.
///
/// The back-reference is a `Weak` pointer: a resource never keeps its scope
/// alive. It is written only by scope bookkeeping and is `Some(S)` exactly
/// while the resource is a member of `S`.
pub struct ScopeLink {
    id: ResourceId,
    owner: RefCell<Option<Weak<ScopeState>>>,
}

impl ScopeLink {
    pub fn new() -> Self {
        Self {
            id: ResourceId::next(),
            owner: RefCell::new(None),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// The scope currently responsible for releasing this resource.
    pub fn owner(&self) -> Option<Scope> {
        self.owner
            .borrow()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Scope::from_state)
    }

    pub fn owner_id(&self) -> Option<ScopeId> {
        self.owner().map(|scope| scope.id())
    }

    pub fn is_tracked(&self) -> bool {
        self.owner().is_some()
    }

    pub(crate) fn set_owner(&self, scope: Option<&Scope>) {
        *self.owner.borrow_mut() = scope.map(Scope::downgrade);
    }

    pub(crate) fn is_owned_by(&self, scope: &Scope) -> bool {
        self.owner
            .borrow()
            .as_ref()
            .is_some_and(|owner| std::ptr::eq(owner.as_ptr(), scope.state_ptr()))
    }
}

impl Default for ScopeLink {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ScopeLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeLink")
            .field("id", &self.id)
            .field("owner", &self.owner_id())
            .finish()
    }
}

/// A value wrapping an externally-owned handle that must be released exactly once.
///
/// `release` is the raw release invoked by scopes. It must be idempotent and
/// must not call [`notify_disposed`]; public "dispose now" entry points of a
/// collaborator call [`notify_disposed`] first and then `release`.
pub trait Disposable {
    fn scope_link(&self) -> &ScopeLink;

    fn release(&self);

    fn is_released(&self) -> bool {
        false
    }
}

impl<T: Disposable + ?Sized> Disposable for Rc<T> {
    fn scope_link(&self) -> &ScopeLink {
        (**self).scope_link()
    }

    fn release(&self) {
        (**self).release()
    }

    fn is_released(&self) -> bool {
        (**self).is_released()
    }
}

/// Auto-registration entry point for freshly created resources.
///
/// Registers into the calling thread's current scope when one is active.
pub fn track_new<R>(resource: R) -> R
where
    R: Disposable + Clone + 'static,
{
    let current = DisposeScopeManager::thread_singleton()
        .ok()
        .and_then(|manager| manager.current_scope());
    match current {
        Some(scope) if !scope.is_ended() => {
            statistics().record_created_in_scope();
            scope.register(resource)
        }
        _ => {
            statistics().record_created_outside_scope();
            resource
        }
    }
}

/// Tells the owning scope, if any, that `resource` is being released directly.
///
/// Call before releasing the handle. Untracked resources are counted as
/// disposed outside any scope, unless they were already released.
pub fn notify_disposed(resource: &dyn Disposable) {
    match resource.scope_link().owner() {
        Some(scope) => scope.mark_disposed(resource),
        None => {
            if !resource.is_released() {
                statistics().record_disposed_outside_scope();
            }
        }
    }
}
