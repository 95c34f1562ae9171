//! Policy generation.
//!
//! Policies are attached to scopes by the graph builder, which stores them
//! without interpreting them. A [`Generator`] interprets the policies of the
//! kinds it knows and renders them into include files for the proxy. Several
//! generators are combined with a [`CompositeGenerator`], which is itself a
//! generator.

use crate::{
    dataplane::{MatchRule, PathRule, VirtualServer},
    routes::ResourceId,
};
use gateway_controller_k8s_api::{
    policy::{ClientSettingsPolicy, LocalTargetRef, ObservabilityPolicy},
    ResourceExt,
};
use std::{collections::BTreeMap, fmt, sync::Arc};

mod composite;
mod error;

pub use self::{
    composite::CompositeGenerator,
    error::{Errors, GenerateError, PolicyError},
};

/// A user-authored policy, tagged by kind.
///
/// Policies are immutable: a change to the underlying resource produces a new
/// value.
#[derive(Clone, Debug)]
pub enum Policy {
    ClientSettings(Arc<ClientSettingsPolicy>),
    Observability(Arc<ObservabilityPolicy>),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PolicyKind {
    ClientSettings,
    Observability,
}

/// Inline directives, keyed by directive name, that are substituted into the
/// enclosing proxy configuration rather than written as include files.
pub type Settings = BTreeMap<String, String>;

/// An include file for a server block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct File {
    pub name: String,
    pub content: Vec<u8>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenerateResult {
    pub files: Vec<File>,
    pub settings: Settings,
}

/// Classifies the proxy location a location-scoped file is included in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LocationType {
    /// The location that proxies a single match after an internal redirect.
    Internal,
    /// The location clients hit directly.
    External,
    /// The external location that evaluates matches and redirects to an
    /// internal location.
    ExternalRedirect,
}

/// An include file for a location block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocationFile {
    pub name: String,
    pub location_type: LocationType,
    pub content: Vec<u8>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenerateForLocationResult {
    pub files: Vec<LocationFile>,
    pub settings: Settings,
}

/// Renders the policies attached to a scope into proxy configuration.
///
/// Implementations must be free of side effects: the same policies and scope
/// always produce the same result. Policies of kinds a generator does not
/// handle are ignored.
pub trait Generator {
    fn generate_for_server(
        &self,
        policies: &[Policy],
        server: &VirtualServer,
    ) -> Result<GenerateResult, Errors>;

    fn generate_for_path_rule(
        &self,
        policies: &[Policy],
        rule: &PathRule,
    ) -> Result<GenerateForLocationResult, Errors>;

    fn generate_for_match_rule(
        &self,
        policies: &[Policy],
        rule: &MatchRule,
    ) -> Result<GenerateForLocationResult, Errors>;

    /// Renders configuration for the proxy's `http` context, given every
    /// policy attached anywhere in the configuration. Most kinds have none.
    fn generate_for_http(&self, _policies: &[Policy]) -> Result<GenerateResult, Errors> {
        Ok(GenerateResult::default())
    }
}

/// The scope a policy file is generated for. It determines the file name's
/// suffix.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FileScope {
    Server,
    Internal,
    External,
}

/// Names the file generated for a single policy at a scope:
/// `<PolicyKind>_<Namespace>_<Name>_<suffix>.conf`.
pub fn file_name(kind: PolicyKind, policy: &ResourceId, scope: FileScope) -> String {
    let suffix = match scope {
        FileScope::Server => "server",
        FileScope::Internal => "int",
        FileScope::External => "ext",
    };
    format!("{kind}_{}_{}_{suffix}.conf", policy.namespace, policy.name)
}

/// Names an `http` context file shared by every policy of a kind that renders
/// the same `token`.
pub fn http_file_name(kind: PolicyKind, token: &str) -> String {
    format!("{kind}_{token}_http.conf")
}

/// Names the redirect file generated for a path rule from all of the policies
/// of one kind attached to it.
pub fn redirect_file_name(kind: PolicyKind, rule: &PathRule) -> String {
    format!("{kind}_{}_redirect.conf", rule.match_key)
}

// === impl Policy ===

impl Policy {
    pub fn kind(&self) -> PolicyKind {
        match self {
            Self::ClientSettings(_) => PolicyKind::ClientSettings,
            Self::Observability(_) => PolicyKind::Observability,
        }
    }

    pub fn id(&self) -> ResourceId {
        let (namespace, name) = match self {
            Self::ClientSettings(p) => (p.namespace(), p.name_any()),
            Self::Observability(p) => (p.namespace(), p.name_any()),
        };
        ResourceId::new(namespace.unwrap_or_default(), name)
    }

    pub fn target_refs(&self) -> Vec<&LocalTargetRef> {
        match self {
            Self::ClientSettings(p) => vec![&p.spec.target_ref],
            Self::Observability(p) => p.spec.target_refs.iter().collect(),
        }
    }
}

impl PartialEq for Policy {
    /// Policies are identified by kind and `{namespace}/{name}`.
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind() && self.id() == other.id()
    }
}

impl From<ClientSettingsPolicy> for Policy {
    fn from(policy: ClientSettingsPolicy) -> Self {
        Self::ClientSettings(Arc::new(policy))
    }
}

impl From<ObservabilityPolicy> for Policy {
    fn from(policy: ObservabilityPolicy) -> Self {
        Self::Observability(Arc::new(policy))
    }
}

// === impl PolicyKind ===

impl PolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientSettings => "ClientSettingsPolicy",
            Self::Observability => "ObservabilityPolicy",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl GenerateResult ===

impl GenerateResult {
    /// Appends another result's files and merges its settings. On a key
    /// collision the other result's value wins.
    pub fn extend(&mut self, other: GenerateResult) {
        self.files.extend(other.files);
        self.settings.extend(other.settings);
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.settings.is_empty()
    }
}

// === impl GenerateForLocationResult ===

impl GenerateForLocationResult {
    /// Appends another result's files and merges its settings. On a key
    /// collision the other result's value wins.
    pub fn extend(&mut self, other: GenerateForLocationResult) {
        self.files.extend(other.files);
        self.settings.extend(other.settings);
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.settings.is_empty()
    }

    pub fn for_internal_location(&self) -> impl Iterator<Item = &LocationFile> {
        self.of_type(LocationType::Internal)
    }

    pub fn for_external_location(&self) -> impl Iterator<Item = &LocationFile> {
        self.of_type(LocationType::External)
    }

    pub fn for_external_redirect_location(&self) -> impl Iterator<Item = &LocationFile> {
        self.of_type(LocationType::ExternalRedirect)
    }

    fn of_type(&self, location_type: LocationType) -> impl Iterator<Item = &LocationFile> {
        self.files
            .iter()
            .filter(move |f| f.location_type == location_type)
    }
}

// === impl Generator ===

impl<G: Generator + ?Sized> Generator for Arc<G> {
    fn generate_for_server(
        &self,
        policies: &[Policy],
        server: &VirtualServer,
    ) -> Result<GenerateResult, Errors> {
        (**self).generate_for_server(policies, server)
    }

    fn generate_for_path_rule(
        &self,
        policies: &[Policy],
        rule: &PathRule,
    ) -> Result<GenerateForLocationResult, Errors> {
        (**self).generate_for_path_rule(policies, rule)
    }

    fn generate_for_match_rule(
        &self,
        policies: &[Policy],
        rule: &MatchRule,
    ) -> Result<GenerateForLocationResult, Errors> {
        (**self).generate_for_match_rule(policies, rule)
    }
}
