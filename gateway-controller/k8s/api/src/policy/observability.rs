use super::LocalTargetRef;

/// ObservabilityPolicy configures request tracing for the HTTPRoutes it
/// targets.
#[derive(
    Clone, Debug, Default, kube::CustomResource, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
#[kube(
    group = "gateway.nginx.org",
    version = "v1alpha1",
    kind = "ObservabilityPolicy",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ObservabilityPolicySpec {
    /// The HTTPRoutes this policy applies to.
    pub target_refs: Vec<LocalTargetRef>,

    pub tracing: Option<Tracing>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Tracing {
    #[serde(default)]
    pub strategy: TraceStrategy,

    /// Percentage of requests to sample when using the `ratio` strategy.
    /// Defaults to 100.
    pub ratio: Option<u32>,

    pub context: Option<TraceContext>,

    pub span_name: Option<String>,

    pub span_attributes: Option<Vec<SpanAttribute>>,
}

#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum TraceStrategy {
    /// Sample a fixed percentage of requests.
    #[default]
    Ratio,
    /// Sample a request only when its parent span was sampled.
    Parent,
}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum TraceContext {
    Extract,
    Inject,
    Propagate,
    Ignore,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct SpanAttribute {
    pub key: String,
    pub value: String,
}

impl TraceContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extract => "extract",
            Self::Inject => "inject",
            Self::Propagate => "propagate",
            Self::Ignore => "ignore",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_policy() {
        let policy: ObservabilityPolicy = serde_yaml::from_str(
            r#"
apiVersion: gateway.nginx.org/v1alpha1
kind: ObservabilityPolicy
metadata:
  name: tracing
  namespace: default
spec:
  targetRefs:
  - group: gateway.networking.k8s.io
    kind: HTTPRoute
    name: coffee
  tracing:
    strategy: parent
    context: propagate
    spanAttributes:
    - key: team
      value: beans
"#,
        )
        .unwrap();

        let tracing = policy.spec.tracing.unwrap();
        assert_eq!(tracing.strategy, TraceStrategy::Parent);
        assert_eq!(tracing.context, Some(TraceContext::Propagate));
        assert_eq!(tracing.ratio, None);
        assert_eq!(tracing.span_attributes.unwrap().len(), 1);
    }
}
