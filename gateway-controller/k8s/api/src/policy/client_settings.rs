use super::LocalTargetRef;
use crate::{Duration, Size};

/// ClientSettingsPolicy configures how the gateway handles client
/// connections and request bodies for a Gateway or an HTTPRoute.
#[derive(
    Clone, Debug, Default, kube::CustomResource, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
#[kube(
    group = "gateway.nginx.org",
    version = "v1alpha1",
    kind = "ClientSettingsPolicy",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ClientSettingsPolicySpec {
    /// The Gateway or HTTPRoute this policy applies to.
    pub target_ref: LocalTargetRef,

    pub body: Option<ClientBody>,

    pub keep_alive: Option<ClientKeepAlive>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientBody {
    /// The maximum allowed size of the client request body. Requests larger
    /// than this are rejected with a 413.
    pub max_size: Option<Size>,

    /// Timeout for reading the client request body.
    pub timeout: Option<Duration>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientKeepAlive {
    /// The maximum number of requests served over one keep-alive connection.
    pub requests: Option<u32>,

    /// The maximum time a keep-alive connection may serve requests.
    pub time: Option<Duration>,

    pub timeout: Option<ClientKeepAliveTimeout>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientKeepAliveTimeout {
    /// How long an idle keep-alive connection stays open on the server side.
    pub server: Option<Duration>,

    /// The value advertised to clients in the `Keep-Alive` response header.
    /// Only honored together with `server`.
    pub header: Option<Duration>,
}

impl ClientSettingsPolicySpec {
    /// The body size limit, if one is set.
    pub fn max_body_size(&self) -> Option<&Size> {
        self.body
            .as_ref()
            .and_then(|b| b.max_size.as_ref())
            .filter(|s| !s.is_unset())
    }

    /// Every duration this spec carries, labeled by field path.
    pub fn durations(&self) -> impl Iterator<Item = (&'static str, &Duration)> {
        let body = self.body.as_ref().and_then(|b| b.timeout.as_ref());
        let keep_alive = self.keep_alive.as_ref();
        let time = keep_alive.and_then(|k| k.time.as_ref());
        let timeout = keep_alive.and_then(|k| k.timeout.as_ref());
        let server = timeout.and_then(|t| t.server.as_ref());
        let header = timeout.and_then(|t| t.header.as_ref());

        [
            ("body.timeout", body),
            ("keepAlive.time", time),
            ("keepAlive.timeout.server", server),
            ("keepAlive.timeout.header", header),
        ]
        .into_iter()
        .filter_map(|(field, d)| d.map(|d| (field, d)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_policy() {
        let policy: ClientSettingsPolicy = serde_yaml::from_str(
            r#"
apiVersion: gateway.nginx.org/v1alpha1
kind: ClientSettingsPolicy
metadata:
  name: limits
  namespace: default
spec:
  targetRef:
    group: gateway.networking.k8s.io
    kind: HTTPRoute
    name: coffee
  body:
    maxSize: 10m
    timeout: 30s
  keepAlive:
    requests: 100
    timeout:
      server: 60s
"#,
        )
        .unwrap();

        assert_eq!(policy.spec.target_ref.kind, "HTTPRoute");
        assert_eq!(policy.spec.max_body_size(), Some(&Size::from("10m")));
        let durations = policy
            .spec
            .durations()
            .map(|(f, d)| (f, d.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            durations,
            vec![("body.timeout", "30s"), ("keepAlive.timeout.server", "60s")]
        );
    }

    #[test]
    fn empty_max_size_is_unset() {
        let spec = ClientSettingsPolicySpec {
            body: Some(ClientBody {
                max_size: Some(Size::default()),
                timeout: None,
            }),
            ..Default::default()
        };
        assert_eq!(spec.max_body_size(), None);
    }
}
