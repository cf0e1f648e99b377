//! Process-wide bookkeeping counters.
//!
//! Counters only ever grow and are never reset. Diagnostics and
//! tests compare two [`StatisticsSnapshot`]s with [`StatisticsSnapshot::since`].

use facet::Facet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::ScopeError;

pub struct Statistics {
    disposed_in_scope: AtomicU64,
    detached_from_scope: AtomicU64,
    created_in_scope: AtomicU64,
    created_outside_scope: AtomicU64,
    disposed_outside_scope: AtomicU64,
}

static STATISTICS: Statistics = Statistics {
    disposed_in_scope: AtomicU64::new(0),
    detached_from_scope: AtomicU64::new(0),
    created_in_scope: AtomicU64::new(0),
    created_outside_scope: AtomicU64::new(0),
    disposed_outside_scope: AtomicU64::new(0),
};

/// The registry shared by every thread in the process.
pub fn statistics() -> &'static Statistics {
    &STATISTICS
}

impl Statistics {
    /// Resources released by a scope, either in bulk or via `mark_disposed`.
    pub fn disposed_in_scope_count(&self) -> u64 {
        self.disposed_in_scope.load(Ordering::Relaxed)
    }

    /// Resources removed from all scope tracking without being released.
    pub fn detached_from_scope_count(&self) -> u64 {
        self.detached_from_scope.load(Ordering::Relaxed)
    }

    pub fn created_in_scope_count(&self) -> u64 {
        self.created_in_scope.load(Ordering::Relaxed)
    }

    pub fn created_outside_scope_count(&self) -> u64 {
        self.created_outside_scope.load(Ordering::Relaxed)
    }

    pub fn disposed_outside_scope_count(&self) -> u64 {
        self.disposed_outside_scope.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            disposed_in_scope: self.disposed_in_scope_count(),
            detached_from_scope: self.detached_from_scope_count(),
            created_in_scope: self.created_in_scope_count(),
            created_outside_scope: self.created_outside_scope_count(),
            disposed_outside_scope: self.disposed_outside_scope_count(),
        }
    }

    pub(crate) fn record_disposed_in_scope(&self) {
        self.disposed_in_scope.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_detached_from_scope(&self) {
        self.detached_from_scope.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_created_in_scope(&self) {
        self.created_in_scope.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_created_outside_scope(&self) {
        self.created_outside_scope.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_disposed_outside_scope(&self) {
        self.disposed_outside_scope.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time copy of the counters.
#[derive(Facet, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatisticsSnapshot {
    pub disposed_in_scope: u64,
    pub detached_from_scope: u64,
    pub created_in_scope: u64,
    pub created_outside_scope: u64,
    pub disposed_outside_scope: u64,
}

impl StatisticsSnapshot {
    /// Counter growth between `earlier` and `self`.
    pub fn since(&self, earlier: &StatisticsSnapshot) -> StatisticsSnapshot {
        StatisticsSnapshot {
            disposed_in_scope: self.disposed_in_scope.saturating_sub(earlier.disposed_in_scope),
            detached_from_scope: self
                .detached_from_scope
                .saturating_sub(earlier.detached_from_scope),
            created_in_scope: self.created_in_scope.saturating_sub(earlier.created_in_scope),
            created_outside_scope: self
                .created_outside_scope
                .saturating_sub(earlier.created_outside_scope),
            disposed_outside_scope: self
                .disposed_outside_scope
                .saturating_sub(earlier.disposed_outside_scope),
        }
    }

    pub fn to_json(&self) -> Result<String, ScopeError> {
        facet_json::to_string(self).map_err(|e| ScopeError::Serialization {
            message: e.to_string(),
        })
    }
}

impl fmt::Display for StatisticsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "created in scope:       {}", self.created_in_scope)?;
        writeln!(f, "created outside scope:  {}", self.created_outside_scope)?;
        writeln!(f, "disposed in scope:      {}", self.disposed_in_scope)?;
        writeln!(f, "disposed outside scope: {}", self.disposed_outside_scope)?;
        write!(f, "detached from scope:    {}", self.detached_from_scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn since_reports_growth() {
        let earlier = StatisticsSnapshot {
            disposed_in_scope: 2,
            detached_from_scope: 1,
            ..Default::default()
        };
        let later = StatisticsSnapshot {
            disposed_in_scope: 5,
            detached_from_scope: 1,
            created_in_scope: 4,
            ..Default::default()
        };
        let delta = later.since(&earlier);
        assert_eq!(delta.disposed_in_scope, 3);
        assert_eq!(delta.detached_from_scope, 0);
        assert_eq!(delta.created_in_scope, 4);
    }

    #[test]
    fn counters_never_decrease() {
        let _guard = crate::test_guard();
        let before = statistics().snapshot();
        statistics().record_detached_from_scope();
        let after = statistics().snapshot();
        assert!(after.detached_from_scope > before.detached_from_scope);
        assert!(after.disposed_in_scope >= before.disposed_in_scope);
    }

    #[test]
    fn snapshot_serializes_every_counter() {
        let json = StatisticsSnapshot::default()
            .to_json()
            .expect("snapshot should serialize");
        for key in [
            "disposed_in_scope",
            "detached_from_scope",
            "created_in_scope",
            "created_outside_scope",
            "disposed_outside_scope",
        ] {
            assert!(json.contains(key), "missing {key} in {json}");
        }
    }

    #[test]
    fn serialization_error_names_the_cause() {
        let err = ScopeError::Serialization {
            message: "unsupported shape".to_owned(),
        };
        assert_eq!(err.to_string(), "failed to serialize statistics: unsupported shape");
    }
}
