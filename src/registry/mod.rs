//! Subscriber registries and the subscription handle.
//!
//! ## Contents
//! - `ListRegistry` keyless store: entry list + optional replay buffer +
//!   disposed flag, all behind one mutex (the broker gate)
//! - `KeyedRegistry` key → group map; a group vanishes with its last entry
//! - [`Subscription`] disposable handle owning exactly one registry entry
//!
//! ## Rules
//! - All mutation is serialized by the per-broker gate; the gate is never
//!   held across an await.
//! - `snapshot` returns a point-in-time view (the `Arc` entries current at
//!   the moment of the call); dispatch over a snapshot may overlap later
//!   mutation, so a just-disposed handler can still see one in-flight
//!   dispatch.
//! - Removal is by `Arc` pointer identity of the entry created at subscribe.

mod keyed;
mod list;
mod subscription;

pub use subscription::Subscription;

pub(crate) use keyed::KeyedRegistry;
pub(crate) use list::ListRegistry;
