//! Route precedence.
//!
//! Per the Gateway API, precedence must be given to the rule with the largest
//! number of (continuing on ties):
//!
//! - Characters in a matching non-wildcard hostname.
//! - Characters in a matching hostname.
//! - Characters in a matching path.
//! - Header matches.
//! - Query param matches.
//!
//! If ties still exist across multiple routes, precedence goes to the oldest
//! route by creation timestamp, then to the route appearing first in
//! alphabetical order by `{namespace}/{name}`. If ties still exist within a
//! route, the first matching rule wins.
//!
//! Hostname and path length are left to the proxy's own longest-match
//! evaluation: routes are only ever compared here within a single
//! (hostname, path) bucket. Everything after that is decided by [`compare`].

use crate::routes::{HttpRouteMatch, ResourceId};
use chrono::{offset::Utc, DateTime};
use std::cmp::Ordering;

/// A single match of a route rule, together with the provenance of the route
/// that authored it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    pub id: ResourceId,

    /// This is required for ordering routes by their creation timestamp.
    pub creation_timestamp: Option<DateTime<Utc>>,

    /// Position of the rule within the route.
    pub rule_index: usize,

    /// Position of the match within the rule.
    pub match_index: usize,

    pub route_match: HttpRouteMatch,
}

// === impl Route ===

impl Route {
    /// The match this route entry is compared by.
    #[inline]
    pub fn get_match(&self) -> &HttpRouteMatch {
        &self.route_match
    }
}

/// Returns true if `a` must be tried before `b`.
pub fn higher_priority(a: &Route, b: &Route) -> bool {
    compare(a, b) == Ordering::Less
}

/// Orders two routes so that the one that must be tried first sorts first.
///
/// Matches that belong to the same route and carry the same number of header
/// and query parameter matches compare equal, so a stable sort keeps them in
/// authored order.
pub fn compare(a: &Route, b: &Route) -> Ordering {
    let (ma, mb) = (a.get_match(), b.get_match());

    // More header matches win, then more query param matches.
    mb.headers
        .len()
        .cmp(&ma.headers.len())
        .then_with(|| mb.query_params.len().cmp(&ma.query_params.len()))
        .then_with(|| timestamp_then_name(a, b))
}

fn timestamp_then_name(a: &Route, b: &Route) -> Ordering {
    let by_ts = match (&a.creation_timestamp, &b.creation_timestamp) {
        (Some(a_ts), Some(b_ts)) => a_ts.cmp(b_ts),
        (None, None) => Ordering::Equal,
        // Routes with timestamps are preferred over routes without.
        (Some(_), None) => return Ordering::Less,
        (None, Some(_)) => return Ordering::Greater,
    };
    by_ts.then_with(|| a.id.cmp(&b.id))
}

/// Sorts routes in place, highest priority first.
pub fn sort(routes: &mut [Route]) {
    // `sort_by` is stable, which keeps the authored order of matches that do
    // not otherwise differ.
    routes.sort_by(compare);
}

/// Returns the routes ordered highest priority first.
pub fn order(routes: impl IntoIterator<Item = Route>) -> Vec<Route> {
    let mut routes = routes.into_iter().collect::<Vec<_>>();
    sort(&mut routes);
    routes
}
