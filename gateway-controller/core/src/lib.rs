//! Gateway configuration core
//!
//! Converts a graph of routing scopes into configuration artifacts for the
//! data-plane proxy. The graph itself is built elsewhere; this crate defines
//! its shape and the two pure transformations applied to it:
//!
//! - [`precedence`] orders the routes that compete for the same host and path
//!   so that the proxy always tries the winning match first.
//! - [`policies`] defines the generator capability that renders the policies
//!   attached to a scope into named include files, and a composite that fans a
//!   scope out to every registered generator.
//!
//! ```text
//! [ VirtualServer ] ⊇ [ PathRule ] ⊇ [ MatchRule ]
//!        \                 |               /
//!         `------ [ Generator(s) ] -------'
//!                        |
//!                 [ named files ]
//! ```

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod dataplane;
pub mod policies;
pub mod precedence;
pub mod routes;

pub use self::{
    dataplane::{MatchRule, PathRule, VirtualServer},
    policies::{Policy, PolicyKind},
    precedence::Route,
    routes::ResourceId,
};
