//! Gateway entity graph
//!
//! Builds the scopes that configuration is generated for from a snapshot of
//! the cluster's routing resources:
//!
//! - Each HTTP `Listener` of a `Gateway` of the configured class accepts the
//!   `HTTPRoute`s whose parent references select it.
//! - Each hostname a listener and a route agree on, on each port, becomes a
//!   `VirtualServer`. Its matches are bucketed by path into `PathRule`s and
//!   ordered by route precedence within each bucket.
//! - Policies are attached to the scopes built from the resources they target.
//!
//! ```text
//! [ Gateway ] -> [ Listener ] <- [ HTTPRoute ] <- [ Policy ]
//!                     |               |
//!              [ VirtualServer ] ⊇ [ PathRule ] ⊇ [ MatchRule ]
//! ```
//!
//! The graph is rebuilt from scratch for every snapshot and is never mutated
//! once built.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod graph;
mod hostname;
pub mod routes;
mod snapshot;


pub use self::{
    graph::{Config, Graph, GraphError, RouteRejection},
    snapshot::{Snapshot, SnapshotError},
};
