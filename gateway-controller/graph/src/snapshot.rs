use gateway_controller_core::Policy;
use gateway_controller_k8s_api::{
    gateway::{Gateway, HttpRoute},
    policy::{ClientSettingsPolicy, ObservabilityPolicy},
};
use serde::Deserialize;
use tracing::debug;

/// The resources a graph is built from, in discovery order.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub gateways: Vec<Gateway>,
    pub http_routes: Vec<HttpRoute>,
    pub policies: Vec<Policy>,
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("document {index}: {source}")]
    Yaml {
        index: usize,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("document {index} has no kind")]
    MissingKind { index: usize },
}

// === impl Snapshot ===

impl Snapshot {
    /// Loads a multi-document YAML stream. Resources of kinds that do not
    /// affect generated configuration are skipped.
    pub fn from_yaml(yaml: &str) -> Result<Self, SnapshotError> {
        let mut snapshot = Self::default();
        for (index, document) in serde_yaml::Deserializer::from_str(yaml).enumerate() {
            let value = serde_yaml::Value::deserialize(document)
                .map_err(|source| SnapshotError::Yaml { index, source })?;
            if value.is_null() {
                continue;
            }
            snapshot.apply(index, value)?;
        }
        Ok(snapshot)
    }

    fn apply(&mut self, index: usize, value: serde_yaml::Value) -> Result<(), SnapshotError> {
        let kind = value
            .get("kind")
            .and_then(|k| k.as_str())
            .ok_or(SnapshotError::MissingKind { index })?
            .to_string();
        let parse = |source| SnapshotError::Yaml { index, source };

        match kind.as_str() {
            "Gateway" => self
                .gateways
                .push(serde_yaml::from_value(value).map_err(parse)?),
            "HTTPRoute" => self
                .http_routes
                .push(serde_yaml::from_value(value).map_err(parse)?),
            "ClientSettingsPolicy" => {
                let policy: ClientSettingsPolicy = serde_yaml::from_value(value).map_err(parse)?;
                self.policies.push(policy.into());
            }
            "ObservabilityPolicy" => {
                let policy: ObservabilityPolicy = serde_yaml::from_value(value).map_err(parse)?;
                self.policies.push(policy.into());
            }
            kind => debug!(index, %kind, "Skipping resource"),
        }
        Ok(())
    }
}
