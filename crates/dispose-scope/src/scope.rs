use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::ops::Deref;
use std::rc::{Rc, Weak};

use compact_str::CompactString;
use tracing::{debug, trace, warn};

use crate::{Disposable, ResourceId, ScopeError, ScopeId, WeakScopeManager, statistics};

type Owned = BTreeMap<ResourceId, Rc<dyn Disposable>>;

/// A tuple of resources of possibly different types, accepted by the
/// `*_group` operations so several values can be handed over and returned at once.
pub trait DisposableGroup {
    fn members(&self) -> Vec<&dyn Disposable>;
}

macro_rules! impl_disposable_group {
    ($($name:ident: $idx:tt),+) => {
        impl<$($name: Disposable),+> DisposableGroup for ($($name,)+) {
            fn members(&self) -> Vec<&dyn Disposable> {
                vec![$(&self.$idx as &dyn Disposable),+]
            }
        }
    };
}

impl_disposable_group!(A: 0, B: 1);
impl_disposable_group!(A: 0, B: 1, C: 2);

pub(crate) struct ScopeState {
    id: ScopeId,
    name: Option<CompactString>,
    parent: Option<Scope>,
    manager: WeakScopeManager,
    // Keyed by `ResourceId`, never by the resource's own equality.
    owned: RefCell<Owned>,
    ended: Cell<bool>,
}

/// A bounded-lifetime owner of tracked resources.
///
/// `Scope` is a cheap handle; clones refer to the same scope. Resources still
/// owned when the scope ends are released.
#[derive(Clone)]
pub struct Scope {
    state: Rc<ScopeState>,
}

impl Scope {
    pub(crate) fn new(
        parent: Option<Scope>,
        name: Option<CompactString>,
        manager: WeakScopeManager,
    ) -> Self {
        Self {
            state: Rc::new(ScopeState {
                id: ScopeId::next(),
                name,
                parent,
                manager,
                owned: RefCell::new(BTreeMap::new()),
                ended: Cell::new(false),
            }),
        }
    }

    pub(crate) fn from_state(state: Rc<ScopeState>) -> Self {
        Self { state }
    }

    pub(crate) fn downgrade(&self) -> Weak<ScopeState> {
        Rc::downgrade(&self.state)
    }

    pub(crate) fn state_ptr(&self) -> *const ScopeState {
        Rc::as_ptr(&self.state)
    }

    pub fn id(&self) -> ScopeId {
        self.state.id
    }

    pub fn name(&self) -> Option<&str> {
        self.state.name.as_deref()
    }

    /// The scope that was current when this one was opened.
    pub fn parent(&self) -> Option<&Scope> {
        self.state.parent.as_ref()
    }

    pub fn is_ended(&self) -> bool {
        self.state.ended.get()
    }

    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    /// Starts tracking `resource` and returns it.
    ///
    /// A resource owned by another live scope is moved here.
    pub fn register<R>(&self, resource: R) -> R
    where
        R: Disposable + Clone + 'static,
    {
        let link = resource.scope_link();
        let id = link.id();
        if self.is_ended() {
            warn!(scope = %self.id(), resource = %id, "registration into an ended scope ignored");
            return resource;
        }
        if let Some(previous) = link.owner() {
            if previous.ptr_eq(self) {
                return resource;
            }
            previous.take(id);
            trace!(
                from = %previous.id(),
                to = %self.id(),
                resource = %id,
                "resource re-registered"
            );
        }
        let entry: Rc<dyn Disposable> = Rc::new(resource.clone());
        self.state.owned.borrow_mut().insert(id, entry);
        link.set_owner(Some(self));
        trace!(scope = %self.id(), resource = %id, "resource registered");
        resource
    }

    pub fn contains(&self, resource: &dyn Disposable) -> bool {
        self.state
            .owned
            .borrow()
            .contains_key(&resource.scope_link().id())
    }

    /// Hands `resource` to the enclosing scope, or detaches it at the root.
    pub fn move_to_outer<R: Disposable>(&self, resource: R) -> R {
        self.move_all_to_outer(&[&resource]);
        resource
    }

    /// Batch form of [`Scope::move_to_outer`]. Resources not owned here are skipped.
    pub fn move_all_to_outer(&self, resources: &[&dyn Disposable]) {
        for resource in resources {
            if let Some(entry) = self.take(resource.scope_link().id()) {
                self.add_to_parent(entry);
            }
        }
    }

    /// Tuple form of [`Scope::move_all_to_outer`].
    pub fn move_group_to_outer<G: DisposableGroup>(&self, group: G) -> G {
        self.move_all_to_outer(&group.members());
        group
    }

    /// Removes `resource` from all scope tracking; releasing it becomes the caller's job.
    pub fn detach<R: Disposable>(&self, resource: R) -> R {
        self.detach_all(&[&resource]);
        resource
    }

    pub fn detach_all(&self, resources: &[&dyn Disposable]) {
        for resource in resources {
            if let Some(entry) = self.take(resource.scope_link().id()) {
                entry.scope_link().set_owner(None);
                statistics().record_detached_from_scope();
                let resource = entry.scope_link().id();
                trace!(scope = %self.id(), resource = %resource, "resource detached");
            }
        }
    }

    pub fn detach_group<G: DisposableGroup>(&self, group: G) -> G {
        self.detach_all(&group.members());
        group
    }

    pub fn dispose_everything(&self) {
        self.dispose_everything_but(&[]);
    }

    /// Releases `resource`'s siblings and keeps `resource` tracked here.
    pub fn dispose_everything_but_one<R: Disposable>(&self, resource: R) -> R {
        self.dispose_everything_but(&[&resource]);
        resource
    }

    /// Keeps every member of `group` that is owned here and releases the rest.
    pub fn dispose_everything_but_group<G: DisposableGroup>(&self, group: G) -> G {
        self.dispose_everything_but(&group.members());
        group
    }

    /// Releases every owned resource not in `keep`.
    ///
    /// Afterwards the scope owns exactly the members of `keep` it owned before.
    pub fn dispose_everything_but(&self, keep: &[&dyn Disposable]) {
        let keep: HashSet<ResourceId> = keep
            .iter()
            .map(|resource| resource.scope_link().id())
            .collect();

        // Swap in the kept set before releasing anything, so release callbacks
        // that re-enter this scope see the final membership.
        let previous = std::mem::take(&mut *self.state.owned.borrow_mut());
        let (kept, doomed): (Owned, Owned) =
            previous.into_iter().partition(|(id, _)| keep.contains(id));
        *self.state.owned.borrow_mut() = kept;

        let mut released = 0usize;
        for (id, entry) in doomed {
            entry.scope_link().set_owner(None);
            // Already-released handles were counted when they were released.
            let live = !entry.is_released();
            if live {
                statistics().record_disposed_in_scope();
                released += 1;
            }
            entry.release();
            trace!(scope = %self.id(), resource = %id, live, "resource released");
        }
        if released > 0 {
            debug!(
                scope = %self.id(),
                released,
                kept = self.disposables_count(),
                "scope disposed resources"
            );
        }
    }

    /// Bookkeeping for a resource released outside this scope's bulk release.
    pub fn mark_disposed(&self, resource: &dyn Disposable) {
        let link = resource.scope_link();
        if self.take(link.id()).is_some() {
            statistics().record_disposed_in_scope();
            trace!(scope = %self.id(), resource = %link.id(), "resource disposed directly");
        }
        if link.is_owned_by(self) {
            link.set_owner(None);
        }
    }

    /// Snapshot of the tracked resources. Not kept in sync with the scope.
    pub fn disposables_view(&self) -> Vec<Rc<dyn Disposable>> {
        self.state.owned.borrow().values().cloned().collect()
    }

    pub fn tracked_ids(&self) -> Vec<ResourceId> {
        self.state.owned.borrow().keys().copied().collect()
    }

    pub fn disposables_count(&self) -> usize {
        self.state.owned.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.owned.borrow().is_empty()
    }

    /// Releases everything still owned and leaves the manager's stack.
    /// Calling it again is a no-op.
    pub fn end_scope(&self) {
        if self.state.ended.replace(true) {
            return;
        }
        let owned = self.disposables_count();
        self.dispose_everything();
        if let Some(manager) = self.state.manager.upgrade() {
            manager.pop(self);
        }
        debug!(
            scope = %self.id(),
            name = self.name().unwrap_or(""),
            released = owned,
            "scope ended"
        );
    }

    fn take(&self, id: ResourceId) -> Option<Rc<dyn Disposable>> {
        self.state.owned.borrow_mut().remove(&id)
    }

    fn add_to_parent(&self, entry: Rc<dyn Disposable>) {
        let id = entry.scope_link().id();
        match self.live_ancestor() {
            Some(parent) => {
                entry.scope_link().set_owner(Some(&parent));
                parent.state.owned.borrow_mut().insert(id, entry);
                trace!(
                    from = %self.id(),
                    to = %parent.id(),
                    resource = %id,
                    "resource moved to outer scope"
                );
            }
            None => {
                entry.scope_link().set_owner(None);
                statistics().record_detached_from_scope();
                trace!(scope = %self.id(), resource = %id, "resource moved out of the root scope");
            }
        }
    }

    // Nearest enclosing scope that has not ended yet.
    fn live_ancestor(&self) -> Option<Scope> {
        let mut candidate = self.parent();
        while let Some(scope) = candidate {
            if !scope.is_ended() {
                return Some(scope.clone());
            }
            candidate = scope.parent();
        }
        None
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("parent", &self.parent().map(Scope::id))
            .field("owned", &self.disposables_count())
            .field("ended", &self.is_ended())
            .finish()
    }
}

/// Guard for an open scope; dropping it ends the scope.
#[must_use = "dropping a DisposeScope immediately ends it"]
pub struct DisposeScope {
    scope: Scope,
}

impl DisposeScope {
    /// Opens a scope on `manager`, nested in its current scope.
    pub fn enter(manager: &WeakScopeManager) -> Result<Self, ScopeError> {
        let manager = manager.upgrade().ok_or(ScopeError::ManagerUnavailable)?;
        Ok(manager.new_scope())
    }

    pub(crate) fn from_scope(scope: Scope) -> Self {
        Self { scope }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn end(self) {}
}

impl Deref for DisposeScope {
    type Target = Scope;

    fn deref(&self) -> &Scope {
        &self.scope
    }
}

impl Drop for DisposeScope {
    fn drop(&mut self) {
        self.scope.end_scope();
    }
}

impl fmt::Debug for DisposeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DisposeScope").field(&self.scope).finish()
    }
}
