//! The subset of the Gateway API resources that the controller consumes.

/// Gateway represents an instance of a service-traffic handling
/// infrastructure by binding Listeners to a set of IP addresses.
#[derive(
    Clone,
    Debug,
    Default,
    PartialEq,
    kube::CustomResource,
    serde::Deserialize,
    serde::Serialize,
    schemars::JsonSchema,
)]
#[kube(
    group = "gateway.networking.k8s.io",
    version = "v1",
    kind = "Gateway",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySpec {
    /// GatewayClassName used for this Gateway. Gateways of other classes are
    /// ignored.
    pub gateway_class_name: String,

    /// Listeners associated with this Gateway.
    #[serde(default)]
    pub listeners: Vec<Listener>,
}

/// Listener embodies the concept of a logical endpoint where a Gateway
/// accepts network connections.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Listener {
    /// Name of the listener, unique within the Gateway.
    pub name: String,

    /// Hostname restricts the requests this listener accepts. When
    /// unspecified, all hostnames are matched.
    pub hostname: Option<String>,

    pub port: u16,

    /// Protocol of the listener, e.g. `HTTP`.
    pub protocol: String,
}

/// HTTPRoute provides a way to route HTTP requests. This includes the
/// capability to match requests by hostname, path, header, or query param.
#[derive(
    Clone,
    Debug,
    Default,
    PartialEq,
    kube::CustomResource,
    serde::Deserialize,
    serde::Serialize,
    schemars::JsonSchema,
)]
#[kube(
    group = "gateway.networking.k8s.io",
    version = "v1",
    kind = "HTTPRoute",
    root = "HttpRoute",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct HttpRouteSpec {
    /// The Gateways (and their listeners) this route wants to be attached to.
    pub parent_refs: Option<Vec<ParentReference>>,

    /// Hostnames defines a set of hostname that should match against the HTTP
    /// Host header to select a HTTPRoute to process the request. A hostname
    /// may be prefixed with a wildcard label (`*.`).
    pub hostnames: Option<Vec<String>>,

    /// Rules are a list of HTTP matchers.
    pub rules: Option<Vec<HttpRouteRule>>,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParentReference {
    pub group: Option<String>,
    pub kind: Option<String>,
    pub namespace: Option<String>,
    pub name: String,
    pub section_name: Option<String>,
    pub port: Option<u16>,
}

/// HTTPRouteRule defines semantics for matching an HTTP request based on
/// conditions (matches).
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HttpRouteRule {
    /// Matches define conditions used for matching the rule against incoming
    /// HTTP requests. Each match is independent, i.e. this rule will be matched
    /// if **any** one of the matches is satisfied.
    ///
    /// If no matches are specified, the default is a prefix path match on
    /// "/", which has the effect of matching every HTTP request.
    ///
    /// If ties still exist within the Route that has been given precedence,
    /// matching precedence MUST be granted to the first matching rule meeting
    /// the precedence criteria, so the authored order of matches is
    /// significant.
    pub matches: Option<Vec<HttpRouteMatch>>,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HttpRouteMatch {
    pub path: Option<HttpPathMatch>,
    pub headers: Option<Vec<HttpHeaderMatch>>,
    pub query_params: Option<Vec<HttpQueryParamMatch>>,
    pub method: Option<String>,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(tag = "type", rename_all = "PascalCase")]
pub enum HttpPathMatch {
    Exact { value: String },
    PathPrefix { value: String },
    RegularExpression { value: String },
}

#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
pub enum MatchType {
    #[default]
    Exact,
    RegularExpression,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct HttpHeaderMatch {
    #[serde(default, rename = "type")]
    pub match_type: MatchType,
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct HttpQueryParamMatch {
    #[serde(default, rename = "type")]
    pub match_type: MatchType,
    pub name: String,
    pub value: String,
}

impl ParentReference {
    /// Checks whether the reference points at the named Gateway, resolving an
    /// omitted namespace against the route's namespace.
    pub fn targets_gateway(&self, route_ns: &str, gateway_ns: &str, gateway_name: &str) -> bool {
        let group_ok = self
            .group
            .as_deref()
            .map_or(true, |g| g == crate::GATEWAY_GROUP);
        let kind_ok = self.kind.as_deref().map_or(true, |k| k == "Gateway");
        let ns = self.namespace.as_deref().unwrap_or(route_ns);
        group_ok && kind_ok && ns == gateway_ns && self.name == gateway_name
    }
}
