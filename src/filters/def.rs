//! # Filter definitions and the per-handler-type definition cache.
//!
//! A [`FilterDef`] is a deferred filter: an order plus a factory that builds
//! the instance. Definitions come from two places — the global filter list in
//! [`Options`](crate::Options), and the [`DeclarativeFilters`] collaborator
//! that reports filters a handler type declares for itself. In both cases the
//! factory runs once per cold subscription; the *definitions* are computed
//! once per handler type and cached (including a cached "none" result, so a
//! handler type without declarations is never scanned twice).
//!
//! Definitions are type-erased so a single collection can cover every message
//! type; `instantiate` recovers the typed filter and returns `None` when the
//! definition was registered for a different message type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::filters::{Filter, FilterOrder};
use crate::handlers::Message;

type MakeFilter<T> = Arc<dyn Fn() -> Arc<dyn Filter<T>> + Send + Sync>;

/// Deferred filter: wrap order plus an instance factory.
#[derive(Clone)]
pub struct FilterDef {
    order: FilterOrder,
    make: Arc<dyn Any + Send + Sync>,
}

impl FilterDef {
    /// Creates a definition for message type `T`.
    ///
    /// The factory is invoked once for every subscription the definition
    /// applies to.
    pub fn new<T, F>(order: FilterOrder, make: F) -> Self
    where
        T: Message,
        F: Fn() -> Arc<dyn Filter<T>> + Send + Sync + 'static,
    {
        let make: MakeFilter<T> = Arc::new(make);
        Self {
            order,
            make: Arc::new(make),
        }
    }

    /// The wrap order carried by this definition. It overrides whatever the
    /// constructed instance reports.
    pub fn order(&self) -> FilterOrder {
        self.order
    }

    /// Builds the filter instance, or `None` when the definition targets a
    /// different message type.
    pub(crate) fn instantiate<T: Message>(&self) -> Option<Arc<dyn Filter<T>>> {
        self.make
            .downcast_ref::<MakeFilter<T>>()
            .map(|make| (make.as_ref())())
    }
}

/// Collaborator reporting the filters a handler type declares for itself.
///
/// The pipeline queries it at most once per handler type (`None` results are
/// cached too). Implementations map a handler's [`TypeId`] to the filter
/// definitions attached to it by whatever registration scheme the host uses.
pub trait DeclarativeFilters: Send + Sync + 'static {
    /// Filters declared by the given handler type, or `None` when it
    /// declares nothing.
    fn filters_for(&self, handler: TypeId) -> Option<Vec<FilterDef>>;
}

/// Discovery source that declares nothing. The factory default.
pub struct NoDeclarativeFilters;

impl DeclarativeFilters for NoDeclarativeFilters {
    fn filters_for(&self, _handler: TypeId) -> Option<Vec<FilterDef>> {
        None
    }
}

/// Per-handler-type definition cache with a cached-empty sentinel.
///
/// Owned by the pipeline, not a process-global. The scan runs outside the
/// lock; when two subscriptions race the same cold handler type, the first
/// inserted result wins and the other scan is discarded.
pub(crate) struct DefCache {
    map: Mutex<HashMap<TypeId, Arc<[FilterDef]>>>,
}

impl DefCache {
    pub(crate) fn new() -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn get_or_scan(
        &self,
        handler: TypeId,
        scan: impl FnOnce() -> Option<Vec<FilterDef>>,
    ) -> Arc<[FilterDef]> {
        if let Some(cached) = self.map.lock().unwrap().get(&handler) {
            return cached.clone();
        }
        let defs: Arc<[FilterDef]> = scan().unwrap_or_default().into();
        self.map
            .lock()
            .unwrap()
            .entry(handler)
            .or_insert(defs)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::filters::PredicateFilter;

    #[test]
    fn test_instantiate_recovers_the_typed_filter() {
        let def = FilterDef::new::<u32, _>(FilterOrder::At(3), || {
            Arc::new(PredicateFilter::new(|m: &u32| *m > 0))
        });

        assert_eq!(def.order(), FilterOrder::At(3));
        assert!(def.instantiate::<u32>().is_some());
        // Registered for u32, so a String lookup misses.
        assert!(def.instantiate::<String>().is_none());
    }

    #[test]
    fn test_cache_scans_each_handler_type_once() {
        struct SomeHandler;

        let cache = DefCache::new();
        let scans = AtomicUsize::new(0);
        let key = TypeId::of::<SomeHandler>();

        for _ in 0..3 {
            let defs = cache.get_or_scan(key, || {
                scans.fetch_add(1, Ordering::SeqCst);
                None
            });
            assert!(defs.is_empty());
        }
        assert_eq!(scans.load(Ordering::SeqCst), 1);
    }
}
