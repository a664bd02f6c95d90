//! Delivery strategy for async dispatch.

/// How async publishing and requesting traverse the subscriber snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DispatchStrategy {
    /// Start every handler concurrently and await the aggregated completion.
    /// Output collections still follow snapshot order, not completion order.
    #[default]
    Parallel,
    /// Await each handler strictly in snapshot order; the first failure
    /// aborts the remaining handlers.
    Sequential,
}
