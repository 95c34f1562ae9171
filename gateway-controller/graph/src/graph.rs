use crate::{hostname, routes, snapshot::Snapshot};
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use gateway_controller_core::{
    dataplane::{MatchRule, PathRule, VirtualServer},
    precedence,
    routes::{HttpRouteMatch, PathType},
    Policy, Route, ResourceId,
};
use gateway_controller_k8s_api::{
    gateway::{Gateway, HttpRoute, Listener},
    ObjectMeta, Resource, Time,
};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Selects the gateways this controller configures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub gateway_class_name: String,
}

/// The scopes configuration is generated for.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Graph {
    /// Ordered by port, then hostname.
    pub servers: Vec<VirtualServer>,

    /// Routes that were not attached because their matches are invalid.
    pub rejected_routes: Vec<RouteRejection>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteRejection {
    pub route: ResourceId,
    pub reason: String,
}

/// A snapshot that violates the invariants every graph relies on.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("{kind} has no name")]
    MissingName { kind: &'static str },

    #[error("{kind} {name} has no namespace")]
    MissingNamespace { kind: &'static str, name: String },

    #[error("duplicate {kind} {id}")]
    Duplicate { kind: &'static str, id: ResourceId },
}

/// A route whose matches have been converted.
struct AcceptedRoute<'s> {
    id: ResourceId,
    creation_timestamp: Option<chrono::DateTime<chrono::Utc>>,
    hostnames: &'s [String],
    route: &'s HttpRoute,
    matches: Vec<(usize, usize, HttpRouteMatch)>,
}

#[derive(Default)]
struct ServerBuilder<'s> {
    gateways: Vec<ResourceId>,
    routes: Vec<&'s AcceptedRoute<'s>>,
}

// === impl Graph ===

impl Graph {
    pub fn build(config: &Config, snapshot: &Snapshot) -> Result<Self, GraphError> {
        validate(snapshot)?;

        let mut rejected_routes = Vec::new();
        let mut accepted = Vec::with_capacity(snapshot.http_routes.len());
        for route in &snapshot.http_routes {
            let id = resource_id("HTTPRoute", &route.metadata)?;
            match routes::try_matches(&route.spec) {
                Ok(matches) => accepted.push(AcceptedRoute {
                    creation_timestamp: route.metadata.creation_timestamp.clone().map(|Time(t)| t),
                    hostnames: route.spec.hostnames.as_deref().unwrap_or_default(),
                    id,
                    route,
                    matches,
                }),
                Err(error) => {
                    let reason = format!("{error:#}");
                    info!(route = %id, %reason, "Rejecting route");
                    rejected_routes.push(RouteRejection { route: id, reason });
                }
            }
        }

        let mut builders = BTreeMap::<(u16, String), ServerBuilder<'_>>::new();
        for gateway in &snapshot.gateways {
            let gateway_id = resource_id("Gateway", &gateway.metadata)?;
            if gateway.spec.gateway_class_name != config.gateway_class_name {
                debug!(gateway = %gateway_id, class = %gateway.spec.gateway_class_name, "Ignoring gateway of another class");
                continue;
            }

            for listener in &gateway.spec.listeners {
                if listener.protocol != "HTTP" {
                    debug!(gateway = %gateway_id, listener = %listener.name, protocol = %listener.protocol, "Skipping listener");
                    continue;
                }

                for route in &accepted {
                    if !attaches(route, &gateway_id, listener) {
                        continue;
                    }
                    let hosts = hostname::accepted(listener.hostname.as_deref(), route.hostnames);
                    if hosts.is_empty() {
                        debug!(route = %route.id, listener = %listener.name, "No intersecting hostnames");
                    }
                    for host in hosts {
                        let builder = builders.entry((listener.port, host)).or_default();
                        push_gateway(builder, &gateway_id);
                        if !builder.routes.iter().any(|r| r.id == route.id) {
                            builder.routes.push(route);
                        }
                    }
                }
            }
        }

        let mut servers = builders
            .into_iter()
            .map(|((port, host), builder)| build_server(host, port, builder))
            .collect::<Vec<_>>();
        attach_policies(&mut servers, &snapshot.policies);

        Ok(Self {
            servers,
            rejected_routes,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

fn validate(snapshot: &Snapshot) -> Result<(), GraphError> {
    let mut seen = HashSet::<(&'static str, ResourceId)>::new();
    let metas = snapshot
        .gateways
        .iter()
        .map(|gw| ("Gateway", &gw.metadata))
        .chain(
            snapshot
                .http_routes
                .iter()
                .map(|r| ("HTTPRoute", &r.metadata)),
        )
        .chain(snapshot.policies.iter().map(policy_meta));
    for (kind, meta) in metas {
        let id = resource_id(kind, meta)?;
        if !seen.insert((kind, id.clone())) {
            return Err(GraphError::Duplicate { kind, id });
        }
    }
    Ok(())
}

fn resource_id(kind: &'static str, meta: &ObjectMeta) -> Result<ResourceId, GraphError> {
    let name = match meta.name.as_deref() {
        Some(name) if !name.is_empty() => name,
        _ => return Err(GraphError::MissingName { kind }),
    };
    match meta.namespace.as_deref() {
        Some(ns) if !ns.is_empty() => Ok(ResourceId::new(ns, name)),
        _ => Err(GraphError::MissingNamespace {
            kind,
            name: name.to_string(),
        }),
    }
}

fn policy_meta(policy: &Policy) -> (&'static str, &ObjectMeta) {
    let kind = policy.kind().as_str();
    match policy {
        Policy::ClientSettings(p) => (kind, p.meta()),
        Policy::Observability(p) => (kind, p.meta()),
    }
}

/// Returns true if one of the route's parent references selects the listener.
fn attaches(route: &AcceptedRoute<'_>, gateway_id: &ResourceId, listener: &Listener) -> bool {
    route
        .route
        .spec
        .parent_refs
        .iter()
        .flatten()
        .any(|parent| {
            parent.targets_gateway(&route.id.namespace, &gateway_id.namespace, &gateway_id.name)
                && parent
                    .section_name
                    .as_deref()
                    .map_or(true, |s| s == listener.name)
                && parent.port.map_or(true, |p| p == listener.port)
        })
}

fn push_gateway(builder: &mut ServerBuilder<'_>, gateway: &ResourceId) {
    if !builder.gateways.contains(gateway) {
        builder.gateways.push(gateway.clone());
    }
}

fn build_server(hostname: String, port: u16, builder: ServerBuilder<'_>) -> VirtualServer {
    let mut server = VirtualServer::new(hostname, port);

    let mut buckets = BTreeMap::<(String, PathType), Vec<Route>>::new();
    for route in builder.routes {
        for (rule_index, match_index, route_match) in &route.matches {
            let key = (
                route_match.path.path().to_string(),
                route_match.path.path_type(),
            );
            buckets.entry(key).or_default().push(Route {
                id: route.id.clone(),
                creation_timestamp: route.creation_timestamp,
                rule_index: *rule_index,
                match_index: *match_index,
                route_match: route_match.clone(),
            });
        }
    }

    server.path_rules = buckets
        .into_iter()
        .enumerate()
        .map(|(index, ((path, path_type), routes))| {
            let mut rule = PathRule::new(&server, index, path, path_type);
            rule.match_rules = precedence::order(routes)
                .into_iter()
                .map(|route| MatchRule {
                    route,
                    policies: vec![],
                })
                .collect();
            rule
        })
        .collect();
    server.gateways = builder.gateways;
    server
}

/// Attaches each policy to the scopes built from the resources it targets.
fn attach_policies(servers: &mut [VirtualServer], policies: &[Policy]) {
    let mut by_gateway = HashMap::<ResourceId, Vec<usize>>::new();
    let mut by_route = HashMap::<ResourceId, Vec<(usize, usize, usize)>>::new();
    for (s, server) in servers.iter().enumerate() {
        for gateway in &server.gateways {
            by_gateway.entry(gateway.clone()).or_default().push(s);
        }
        for (p, path_rule) in server.path_rules.iter().enumerate() {
            for (m, match_rule) in path_rule.match_rules.iter().enumerate() {
                by_route
                    .entry(match_rule.route.id.clone())
                    .or_default()
                    .push((s, p, m));
            }
        }
    }

    for policy in policies {
        let id = policy.id();
        for target in policy.target_refs() {
            let target_id = ResourceId::new(id.namespace.clone(), target.name.clone());
            if target.targets_kind::<Gateway>() {
                let Some(indices) = by_gateway.get(&target_id) else {
                    debug!(policy = %id, gateway = %target_id, "Policy target not found");
                    continue;
                };
                for &s in indices {
                    push_policy(&mut servers[s].policies, policy);
                }
            } else if target.targets_kind::<HttpRoute>() {
                let Some(indices) = by_route.get(&target_id) else {
                    debug!(policy = %id, route = %target_id, "Policy target not found");
                    continue;
                };
                for &(s, p, m) in indices {
                    let path_rule = &mut servers[s].path_rules[p];
                    push_policy(&mut path_rule.policies, policy);
                    push_policy(&mut path_rule.match_rules[m].policies, policy);
                }
            } else {
                debug!(policy = %id, kind = %target.kind, "Unsupported policy target");
            }
        }
    }
}

fn push_policy(policies: &mut Vec<Policy>, policy: &Policy) {
    if !policies.contains(policy) {
        policies.push(policy.clone());
    }
}
