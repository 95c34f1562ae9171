//! The scopes at which configuration is generated.
//!
//! Scopes nest strictly: a [`VirtualServer`] holds [`PathRule`]s, which hold
//! [`MatchRule`]s. Each scope carries the policies attached to it directly;
//! nothing is inherited from an enclosing scope.

use crate::{
    policies::Policy,
    precedence::Route,
    routes::{PathType, ResourceId},
};

/// A virtual host: one hostname on one port.
#[derive(Clone, Debug, PartialEq)]
pub struct VirtualServer {
    pub hostname: String,
    pub port: u16,

    /// The gateways whose listeners produced this server.
    pub gateways: Vec<ResourceId>,

    pub path_rules: Vec<PathRule>,
    pub policies: Vec<Policy>,
}

/// All matches within a server that share a path and path type.
#[derive(Clone, Debug, PartialEq)]
pub struct PathRule {
    pub path: String,
    pub path_type: PathType,

    /// Uniquely identifies this path rule within the configuration. It is
    /// safe to embed in a file name.
    pub match_key: String,

    /// Ordered by precedence, highest first.
    pub match_rules: Vec<MatchRule>,

    pub policies: Vec<Policy>,
}

/// A single route match, which becomes one proxy location.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchRule {
    pub route: Route,
    pub policies: Vec<Policy>,
}

/// The catch-all hostname used when neither a listener nor a route names one.
pub const WILDCARD_HOSTNAME: &str = "~^";

// === impl VirtualServer ===

impl VirtualServer {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            gateways: vec![],
            path_rules: vec![],
            policies: vec![],
        }
    }

    /// Uniquely identifies this server within the configuration.
    pub fn key(&self) -> String {
        format!("{}_{}", self.port, file_token(&self.hostname))
    }
}

// === impl PathRule ===

impl PathRule {
    /// `index` is the rule's position within its server. It keeps keys
    /// distinct for paths that differ only in separators, like `/a/b` and
    /// `/ab`.
    pub fn new(
        server: &VirtualServer,
        index: usize,
        path: impl Into<String>,
        path_type: PathType,
    ) -> Self {
        let path = path.into();
        let match_key = format!(
            "{}_{index}_{}{}",
            server.key(),
            path_type.as_str(),
            file_token(&path)
        );
        Self {
            path,
            path_type,
            match_key,
            match_rules: vec![],
            policies: vec![],
        }
    }
}

// === impl MatchRule ===

impl MatchRule {
    /// Uniquely identifies this match rule within the configuration.
    pub fn key(&self, path_rule: &PathRule) -> String {
        format!(
            "{}_{}_{}_{}_{}",
            path_rule.match_key,
            self.route.id.namespace,
            self.route.id.name,
            self.route.rule_index,
            self.route.match_index
        )
    }
}

/// Strips path separators and any other character that does not belong in a
/// file name.
fn file_token(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect()
}
