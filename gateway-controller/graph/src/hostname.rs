use gateway_controller_core::dataplane::WILDCARD_HOSTNAME;

/// Returns the hostnames a listener accepts for a route, in the route's
/// order.
///
/// A route without hostnames takes the listener's; if neither names one, the
/// catch-all hostname is used. An empty result means the route does not
/// attach to the listener.
pub(crate) fn accepted(listener: Option<&str>, route: &[String]) -> Vec<String> {
    match (listener, route) {
        (None, []) => vec![WILDCARD_HOSTNAME.to_string()],
        (Some(listener), []) => vec![listener.to_string()],
        (None, route) => dedup(route.iter().map(String::as_str)),
        (Some(listener), route) => dedup(route.iter().filter_map(|r| intersect(listener, r))),
    }
}

/// Returns the more specific of two hostnames if they overlap.
///
/// A wildcard hostname `*.example.com` matches any hostname with at least one
/// more label ending in `.example.com`, but not `example.com` itself.
fn intersect<'a>(listener: &'a str, route: &'a str) -> Option<&'a str> {
    if listener == route {
        return Some(route);
    }
    if let Some(suffix) = listener.strip_prefix('*') {
        if route.ends_with(suffix) {
            return Some(route);
        }
    }
    if let Some(suffix) = route.strip_prefix('*') {
        if listener.ends_with(suffix) {
            return Some(listener);
        }
    }
    None
}

fn dedup<'a>(hosts: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out = Vec::<String>::new();
    for host in hosts {
        if !out.iter().any(|h| h == host) {
            out.push(host.to_string());
        }
    }
    out
}
