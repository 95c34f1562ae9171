pub use http::{
    header::{HeaderName, HeaderValue},
    Method,
};
use regex::Regex;
use std::{cmp::Ordering, fmt, iter};

/// Identifies a namespaced resource.
///
/// Resource ids order as their `{namespace}/{name}` string form, which is the
/// order route precedence falls back to when everything else ties.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ResourceId {
    pub namespace: String,
    pub name: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathType {
    Exact,
    Prefix,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathMatch {
    Exact(String),
    Prefix(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRouteMatch {
    pub path: PathMatch,
    pub headers: Vec<HeaderMatch>,
    pub query_params: Vec<QueryParamMatch>,
    pub method: Option<Method>,
}

#[derive(Clone, Debug)]
pub enum HeaderMatch {
    Exact(HeaderName, HeaderValue),
    Regex(HeaderName, Regex),
}

#[derive(Clone, Debug)]
pub enum QueryParamMatch {
    Exact(String, String),
    Regex(String, Regex),
}

// === impl ResourceId ===

impl ResourceId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    fn key_bytes(&self) -> impl Iterator<Item = u8> + '_ {
        self.namespace
            .bytes()
            .chain(iter::once(b'/'))
            .chain(self.name.bytes())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl Ord for ResourceId {
    fn cmp(&self, other: &Self) -> Ordering {
        // Compare the joined key rather than the (namespace, name) tuple: the
        // two disagree when one namespace is a prefix of the other.
        self.key_bytes().cmp(other.key_bytes())
    }
}

impl PartialOrd for ResourceId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// === impl PathType ===

impl PathType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Prefix => "prefix",
        }
    }
}

// === impl PathMatch ===

impl PathMatch {
    pub fn path(&self) -> &str {
        match self {
            Self::Exact(p) | Self::Prefix(p) => p,
        }
    }

    pub fn path_type(&self) -> PathType {
        match self {
            Self::Exact(_) => PathType::Exact,
            Self::Prefix(_) => PathType::Prefix,
        }
    }
}

impl Default for PathMatch {
    fn default() -> Self {
        Self::Prefix("/".to_string())
    }
}

// === impl HttpRouteMatch ===

impl Default for HttpRouteMatch {
    /// Matches every request.
    fn default() -> Self {
        Self {
            path: PathMatch::default(),
            headers: vec![],
            query_params: vec![],
            method: None,
        }
    }
}

// === impl HeaderMatch ===

impl PartialEq for HeaderMatch {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Exact(n0, v0), Self::Exact(n1, v1)) => n0 == n1 && v0 == v1,
            (Self::Regex(n0, r0), Self::Regex(n1, r1)) => n0 == n1 && r0.as_str() == r1.as_str(),
            _ => false,
        }
    }
}

impl Eq for HeaderMatch {}

// === impl QueryParamMatch ===

impl PartialEq for QueryParamMatch {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Exact(n0, v0), Self::Exact(n1, v1)) => n0 == n1 && v0 == v1,
            (Self::Regex(n0, r0), Self::Regex(n1, r1)) => n0 == n1 && r0.as_str() == r1.as_str(),
            _ => false,
        }
    }
}

impl Eq for QueryParamMatch {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_ids_order_by_joined_key() {
        let a = ResourceId::new("a", "x");
        let b = ResourceId::new("a", "y");
        assert!(a < b);

        // "a-b/x" < "a/x" because '-' sorts before '/'.
        let dashed = ResourceId::new("a-b", "x");
        assert!(dashed < a);
        assert_eq!(dashed.to_string().cmp(&a.to_string()), dashed.cmp(&a));
    }

    #[test]
    fn header_regexes_compare_by_pattern() {
        let name = HeaderName::from_static("x-tier");
        assert_eq!(
            HeaderMatch::Regex(name.clone(), Regex::new("gold|silver").unwrap()),
            HeaderMatch::Regex(name.clone(), Regex::new("gold|silver").unwrap()),
        );
        assert_ne!(
            HeaderMatch::Regex(name.clone(), Regex::new("gold").unwrap()),
            HeaderMatch::Exact(name, HeaderValue::from_static("gold")),
        );
    }
}
