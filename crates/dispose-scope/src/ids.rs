use facet::Facet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! define_u64_id {
    (
        $(#[$meta:meta])*
        $name:ident,
        label = $label:literal
    ) => {
        #[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[facet(transparent)]
        $(#[$meta])*
        pub struct $name(u64);

        impl $name {
            /// Allocates the next process-local id. Never returns zero.
            pub fn next() -> Self {
                static NEXT_COUNTER: AtomicU64 = AtomicU64::new(1);
                Self(NEXT_COUNTER.fetch_add(1, Ordering::Relaxed))
            }

            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

define_u64_id!(
    /// Identity of a scope for the lifetime of the process.
    ScopeId,
    label = "scope"
);

define_u64_id!(
    /// Identity of a tracked resource. Assigned once per [`crate::ScopeLink`],
    /// shared by every clone of the handle that owns that link.
    ResourceId,
    label = "resource"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_non_zero() {
        let a = ResourceId::next();
        let b = ResourceId::next();
        assert_ne!(a, b);
        assert!(a.get() > 0);
        assert!(b.get() > a.get());
    }

    #[test]
    fn display_carries_the_kind() {
        let id = ScopeId::next();
        assert_eq!(id.to_string(), format!("scope#{}", id.get()));
    }
}
