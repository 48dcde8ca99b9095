//! Mock substitution (§C5 "Mocks").
//!
//! A `MockMap` redirects one `ProviderSpec` to another before graph construction, so
//! a test can swap a real provider for a stand-in without changing a handler's
//! declared parameters. Grounded in the teacher's global, process-wide `state.rs`
//! store in spirit (a single shared table, not per-request), narrowed here to a
//! stack so nested `with_mocks` scopes compose and unwind correctly; documented as
//! test-only, matching the shared-resource policy in §5.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use parking_lot::Mutex;

use crate::provider::spec::ProviderSpec;

/// Identity of a particular mock set, used as half of the graph cache key so each
/// distinct substitution table gets its own cached graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MockMapId(u64);

impl MockMapId {
    fn none() -> Self {
        Self(0)
    }
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A substitution table from original provider spec to replacement spec.
pub struct MockMap {
    id: MockMapId,
    substitutions: HashMap<ProviderSpec, ProviderSpec>,
}

impl MockMap {
    /// The no-op mock map used for ordinary (unmocked) dispatch.
    pub fn empty() -> Self {
        Self {
            id: MockMapId::none(),
            substitutions: HashMap::new(),
        }
    }

    pub fn new(substitutions: HashMap<ProviderSpec, ProviderSpec>) -> Self {
        Self {
            id: MockMapId(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
            substitutions,
        }
    }

    pub fn id(&self) -> MockMapId {
        self.id
    }

    pub fn substitute(&self, spec: &ProviderSpec) -> ProviderSpec {
        self.substitutions.get(spec).cloned().unwrap_or_else(|| spec.clone())
    }
}

/// Process-wide stack of active mock maps, documented test-only: production code
/// should never push onto this. A scoped activation via [`with_mocks`] is the only
/// sanctioned way to use it.
static MOCK_STACK: Mutex<Vec<std::sync::Arc<MockMap>>> = Mutex::new(Vec::new());

/// Runs `f` with `mocks` active for its duration, then pops it back off regardless
/// of whether `f` panics.
pub fn with_mocks<R>(mocks: MockMap, f: impl FnOnce() -> R) -> R {
    let mocks = std::sync::Arc::new(mocks);
    MOCK_STACK.lock().push(mocks.clone());
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));
    MOCK_STACK.lock().pop();
    match result {
        Ok(value) => value,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

/// The currently active mock map, or the no-op map if none is active.
pub fn active_mocks() -> std::sync::Arc<MockMap> {
    MOCK_STACK
        .lock()
        .last()
        .cloned()
        .unwrap_or_else(|| std::sync::Arc::new(MockMap::empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::TypeId;

    #[test]
    fn unmocked_spec_passes_through_unchanged() {
        let mocks = MockMap::empty();
        let spec = ProviderSpec::param_source(
            crate::provider::spec::SourceTag::Header,
            Some("x".into()),
            TypeId::of::<String>(),
        );
        assert_eq!(mocks.substitute(&spec), spec);
    }

    #[test]
    fn distinct_mock_maps_get_distinct_ids() {
        let a = MockMap::new(HashMap::new());
        let b = MockMap::new(HashMap::new());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn with_mocks_activates_and_then_restores() {
        assert_eq!(active_mocks().id(), MockMapId::none());
        with_mocks(MockMap::new(HashMap::new()), || {
            assert_ne!(active_mocks().id(), MockMapId::none());
        });
        assert_eq!(active_mocks().id(), MockMapId::none());
    }
}
