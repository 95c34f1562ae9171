pub mod client_settings;
pub mod observability;

pub use self::{
    client_settings::{
        ClientBody, ClientKeepAlive, ClientKeepAliveTimeout, ClientSettingsPolicy,
        ClientSettingsPolicySpec,
    },
    observability::{
        ObservabilityPolicy, ObservabilityPolicySpec, SpanAttribute, TraceContext, TraceStrategy,
        Tracing,
    },
};

/// Targets a resource within the policy's own namespace.
#[derive(
    Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
pub struct LocalTargetRef {
    pub group: String,
    pub kind: String,
    pub name: String,
}

impl LocalTargetRef {
    /// Checks whether the target references the given resource type
    pub fn targets_kind<T>(&self) -> bool
    where
        T: kube::Resource,
        T::DynamicType: Default,
    {
        let dt = Default::default();
        *self.group == *T::group(&dt) && *self.kind == *T::kind(&dt)
    }

    /// Checks whether the target references the given resource, which must
    /// live in the policy's namespace.
    pub fn targets<T>(&self, resource: &T, policy_ns: &str) -> bool
    where
        T: kube::Resource,
        T::DynamicType: Default,
    {
        if !self.targets_kind::<T>() {
            return false;
        }

        let meta = resource.meta();
        meta.namespace.as_deref() == Some(policy_ns) && meta.name.as_deref() == Some(&*self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{Gateway, GatewaySpec, HttpRoute, HttpRouteSpec};

    fn mk_gateway(ns: &str, name: &str) -> Gateway {
        let mut gw = Gateway::new(name, GatewaySpec::default());
        gw.metadata.namespace = Some(ns.to_string());
        gw
    }

    #[test]
    fn targets_by_group_kind_and_name() {
        let target = LocalTargetRef {
            group: "gateway.networking.k8s.io".to_string(),
            kind: "Gateway".to_string(),
            name: "gateway".to_string(),
        };

        assert!(target.targets_kind::<Gateway>());
        assert!(!target.targets_kind::<HttpRoute>());
        assert!(target.targets(&mk_gateway("default", "gateway"), "default"));
        assert!(!target.targets(&mk_gateway("other", "gateway"), "default"));
        assert!(!target.targets(&mk_gateway("default", "gw"), "default"));

        let mut route = HttpRoute::new("gateway", HttpRouteSpec::default());
        route.metadata.namespace = Some("default".to_string());
        assert!(!target.targets(&route, "default"));
    }
}
