//! # Factory-scoped configuration.
//!
//! [`Options`] fixes, at [`BrokerFactory`](crate::BrokerFactory)
//! construction, the behavior every broker created by that factory shares:
//! the default parallel-vs-sequential strategy, the subscribe-after-dispose
//! policy, and the ordered list of global filter definitions applied to every
//! publish broker of a matching message type in addition to that broker's own
//! filters.
//!
//! # Example
//! ```
//! use evbus::{DispatchStrategy, DisposedPolicy, Options};
//!
//! let mut options = Options::default();
//! options.default_strategy = DispatchStrategy::Sequential;
//! options.disposed_policy = DisposedPolicy::Fail;
//!
//! assert_eq!(options.default_strategy, DispatchStrategy::Sequential);
//! ```

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::dispatch::DispatchStrategy;
use crate::filters::{Filter, FilterDef, FilterOrder};
use crate::handlers::Message;

/// What `subscribe` does on a broker that was already disposed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DisposedPolicy {
    /// Return an inert subscription handle that was never registered and
    /// whose dispose is a no-op.
    #[default]
    Ignore,
    /// Reject with [`BusError::Disposed`](crate::BusError::Disposed).
    Fail,
}

/// Shared configuration for every broker a factory creates.
#[derive(Clone, Default)]
pub struct Options {
    /// Strategy used by async publishing and requesting when the caller does
    /// not pick one. Defaults to [`DispatchStrategy::Parallel`].
    pub default_strategy: DispatchStrategy,
    /// Behavior of `subscribe` after the broker was disposed.
    pub disposed_policy: DisposedPolicy,
    /// Global filter definitions, keyed by message type.
    global_filters: HashMap<TypeId, Vec<FilterDef>>,
}

impl Options {
    /// Registers a global filter for message type `T`.
    ///
    /// The factory closure runs once per cold subscription on every publish
    /// broker of that message type; registration order is preserved and
    /// breaks ties between equal [`FilterOrder`]s.
    pub fn add_global_filter<T, F>(&mut self, order: FilterOrder, make: F)
    where
        T: Message,
        F: Fn() -> Arc<dyn Filter<T>> + Send + Sync + 'static,
    {
        self.global_filters
            .entry(TypeId::of::<T>())
            .or_default()
            .push(FilterDef::new::<T, _>(order, make));
    }

    pub(crate) fn global_filters_for<T: Message>(&self) -> &[FilterDef] {
        self.global_filters
            .get(&TypeId::of::<T>())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("default_strategy", &self.default_strategy)
            .field("disposed_policy", &self.disposed_policy)
            .field("global_filter_types", &self.global_filters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::PredicateFilter;

    #[test]
    fn test_defaults() {
        let options = Options::default();
        assert_eq!(options.default_strategy, DispatchStrategy::Parallel);
        assert_eq!(options.disposed_policy, DisposedPolicy::Ignore);
        assert!(options.global_filters_for::<u32>().is_empty());
    }

    #[test]
    fn test_global_filters_are_scoped_to_their_message_type() {
        let mut options = Options::default();
        options.add_global_filter::<u32, _>(FilterOrder::At(1), || {
            Arc::new(PredicateFilter::new(|_: &u32| true))
        });

        assert_eq!(options.global_filters_for::<u32>().len(), 1);
        assert!(options.global_filters_for::<String>().is_empty());
    }
}
