//! Renders ClientSettingsPolicies.
//!
//! A policy attached to a Gateway renders into each server built from that
//! gateway. A policy attached to an HTTPRoute renders into both the internal
//! and the external location of every match built from that route; the two
//! locations are configured independently, so the content is duplicated.
//!
//! When a path's matches are dispatched through an internal redirect, the
//! request body is read by the external redirect location before any match
//! is evaluated. That location must therefore accept the largest body any of
//! its matches accepts, which is computed by merging the limits of every
//! policy attached to the path rule.

use crate::{environment, render};
use gateway_controller_core::{
    dataplane::{MatchRule, PathRule, VirtualServer},
    policies::{
        file_name, redirect_file_name, Errors, File, FileScope, GenerateError,
        GenerateForLocationResult, GenerateResult, Generator, LocationFile, LocationType, Policy,
        PolicyError, PolicyKind,
    },
    ResourceId,
};
use gateway_controller_k8s_api::{
    policy::{ClientSettingsPolicy, ClientSettingsPolicySpec},
    Size,
};
use minijinja::Environment;
use std::fmt;
use tracing::debug;

const DIRECTIVES: &str = "client_settings.conf";
const REDIRECT: &str = "client_settings_redirect.conf";

const DIRECTIVES_TEMPLATE: &str = r#"{% if max_body_size is not none %}
client_max_body_size {{ max_body_size }};
{% endif %}
{% if body_timeout is not none %}
client_body_timeout {{ body_timeout }};
{% endif %}
{% if keepalive_requests is not none %}
keepalive_requests {{ keepalive_requests }};
{% endif %}
{% if keepalive_time is not none %}
keepalive_time {{ keepalive_time }};
{% endif %}
{% if keepalive_timeout_server is not none and keepalive_timeout_header is not none %}
keepalive_timeout {{ keepalive_timeout_server }} {{ keepalive_timeout_header }};
{% elif keepalive_timeout_server is not none %}
keepalive_timeout {{ keepalive_timeout_server }};
{% endif %}
"#;

const REDIRECT_TEMPLATE: &str = "client_max_body_size {{ max_body_size }};\n";

pub struct ClientSettingsGenerator {
    env: Environment<'static>,
}

/// The flattened render context for a single policy.
#[derive(Debug, Default, serde::Serialize)]
struct Directives<'a> {
    max_body_size: Option<&'a str>,
    body_timeout: Option<&'a str>,
    keepalive_requests: Option<u32>,
    keepalive_time: Option<&'a str>,
    keepalive_timeout_server: Option<&'a str>,
    keepalive_timeout_header: Option<&'a str>,
}

// === impl ClientSettingsGenerator ===

impl ClientSettingsGenerator {
    pub fn new() -> Self {
        Self {
            env: environment(&[(DIRECTIVES, DIRECTIVES_TEMPLATE), (REDIRECT, REDIRECT_TEMPLATE)]),
        }
    }

    /// Renders each policy's directives, collecting validation failures.
    fn render_each(
        &self,
        policies: &[Policy],
    ) -> (Vec<(ResourceId, Vec<u8>)>, Errors) {
        let mut rendered = Vec::new();
        let mut errors = Errors::default();

        for (policy, csp) in client_settings(policies) {
            let id = policy.id();
            let invalid = validate(&csp.spec);
            if !invalid.is_empty() {
                errors.extend(
                    invalid
                        .into_iter()
                        .map(|error| GenerateError {
                            kind: PolicyKind::ClientSettings,
                            policy: id.clone(),
                            error,
                        })
                        .collect(),
                );
                continue;
            }

            let content = render(&self.env, DIRECTIVES, Directives::from(&csp.spec));
            if content.is_empty() {
                debug!(policy = %id, "Policy renders no directives");
                continue;
            }
            rendered.push((id, content));
        }

        (rendered, errors)
    }
}

impl Default for ClientSettingsGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ClientSettingsGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSettingsGenerator").finish_non_exhaustive()
    }
}

impl Generator for ClientSettingsGenerator {
    fn generate_for_server(
        &self,
        policies: &[Policy],
        _: &VirtualServer,
    ) -> Result<GenerateResult, Errors> {
        let (rendered, errors) = self.render_each(policies);
        let files = rendered
            .into_iter()
            .map(|(id, content)| File {
                name: file_name(PolicyKind::ClientSettings, &id, FileScope::Server),
                content,
            })
            .collect();
        errors.into_result(GenerateResult {
            files,
            ..Default::default()
        })
    }

    fn generate_for_path_rule(
        &self,
        policies: &[Policy],
        rule: &PathRule,
    ) -> Result<GenerateForLocationResult, Errors> {
        let mut max = Size::default();
        let mut errors = Errors::default();

        for (policy, csp) in client_settings(policies) {
            let Some(size) = csp.spec.max_body_size() else {
                continue;
            };
            // Each size is parsed on its own first so that a malformed literal
            // is attributed to the policy that carries it.
            let merged = size
                .to_bytes()
                .and_then(|_| max.clone().max(size.clone()));
            match merged {
                Ok(m) => max = m,
                Err(source) => errors.push(GenerateError {
                    kind: PolicyKind::ClientSettings,
                    policy: policy.id(),
                    error: PolicyError::InvalidSize {
                        field: "body.maxSize",
                        value: size.to_string(),
                        source,
                    },
                }),
            }
        }

        let mut result = GenerateForLocationResult::default();
        if !max.is_unset() {
            let ctx = Directives {
                max_body_size: Some(max.as_str()),
                ..Default::default()
            };
            result.files.push(LocationFile {
                name: redirect_file_name(PolicyKind::ClientSettings, rule),
                location_type: LocationType::ExternalRedirect,
                content: render(&self.env, REDIRECT, ctx),
            });
        }
        errors.into_result(result)
    }

    fn generate_for_match_rule(
        &self,
        policies: &[Policy],
        _: &MatchRule,
    ) -> Result<GenerateForLocationResult, Errors> {
        let (rendered, errors) = self.render_each(policies);
        let mut result = GenerateForLocationResult::default();
        for (id, content) in rendered {
            for (scope, location_type) in [
                (FileScope::Internal, LocationType::Internal),
                (FileScope::External, LocationType::External),
            ] {
                result.files.push(LocationFile {
                    name: file_name(PolicyKind::ClientSettings, &id, scope),
                    location_type,
                    content: content.clone(),
                });
            }
        }
        errors.into_result(result)
    }
}

// === impl Directives ===

impl<'a> From<&'a ClientSettingsPolicySpec> for Directives<'a> {
    fn from(spec: &'a ClientSettingsPolicySpec) -> Self {
        let body = spec.body.as_ref();
        let keep_alive = spec.keep_alive.as_ref();
        let timeout = keep_alive.and_then(|k| k.timeout.as_ref());
        Self {
            max_body_size: spec.max_body_size().map(Size::as_str),
            body_timeout: body.and_then(|b| b.timeout.as_ref()).map(|d| d.as_str()),
            keepalive_requests: keep_alive.and_then(|k| k.requests),
            keepalive_time: keep_alive.and_then(|k| k.time.as_ref()).map(|d| d.as_str()),
            keepalive_timeout_server: timeout
                .and_then(|t| t.server.as_ref())
                .map(|d| d.as_str()),
            keepalive_timeout_header: timeout
                .and_then(|t| t.header.as_ref())
                .map(|d| d.as_str()),
        }
    }
}

fn client_settings(policies: &[Policy]) -> impl Iterator<Item = (&Policy, &ClientSettingsPolicy)> {
    policies.iter().filter_map(|p| match p {
        Policy::ClientSettings(csp) => Some((p, csp.as_ref())),
        _ => None,
    })
}

fn validate(spec: &ClientSettingsPolicySpec) -> Vec<PolicyError> {
    let mut errors = Vec::new();
    if let Some(size) = spec.max_body_size() {
        if let Err(source) = size.to_bytes() {
            errors.push(PolicyError::InvalidSize {
                field: "body.maxSize",
                value: size.to_string(),
                source,
            });
        }
    }
    for (field, duration) in spec.durations() {
        if let Err(source) = duration.to_std() {
            errors.push(PolicyError::InvalidDuration {
                field,
                value: duration.to_string(),
                source,
            });
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_controller_core::{
        precedence::Route,
        routes::{HttpRouteMatch, PathType},
    };
    use gateway_controller_k8s_api::{
        policy::{ClientBody, ClientKeepAlive, ClientKeepAliveTimeout, LocalTargetRef},
        Duration,
    };
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn mk_policy(name: &str, spec: ClientSettingsPolicySpec) -> Policy {
        let mut csp = ClientSettingsPolicy::new(
            name,
            ClientSettingsPolicySpec {
                target_ref: LocalTargetRef {
                    group: "gateway.networking.k8s.io".to_string(),
                    kind: "HTTPRoute".to_string(),
                    name: "coffee".to_string(),
                },
                ..spec
            },
        );
        csp.metadata.namespace = Some("default".to_string());
        Policy::from(csp)
    }

    fn max_size(size: &str) -> ClientSettingsPolicySpec {
        ClientSettingsPolicySpec {
            body: Some(ClientBody {
                max_size: Some(Size::from(size)),
                timeout: None,
            }),
            ..Default::default()
        }
    }

    fn keep_alive(
        requests: Option<u32>,
        server: Option<&str>,
        header: Option<&str>,
    ) -> ClientSettingsPolicySpec {
        ClientSettingsPolicySpec {
            keep_alive: Some(ClientKeepAlive {
                requests,
                time: None,
                timeout: Some(ClientKeepAliveTimeout {
                    server: server.map(Duration::from),
                    header: header.map(Duration::from),
                }),
            }),
            ..Default::default()
        }
    }

    fn mk_server() -> VirtualServer {
        VirtualServer::new("cafe.example.com", 80)
    }

    fn mk_path_rule() -> PathRule {
        PathRule::new(&mk_server(), 0, "/coffee", PathType::Prefix)
    }

    fn mk_match_rule() -> MatchRule {
        MatchRule {
            route: Route {
                id: ResourceId::new("default", "coffee"),
                creation_timestamp: None,
                rule_index: 0,
                match_index: 0,
                route_match: HttpRouteMatch::default(),
            },
            policies: vec![],
        }
    }

    fn content(file: &[u8]) -> &str {
        std::str::from_utf8(file).unwrap()
    }

    #[test]
    fn renders_every_directive() {
        let spec = ClientSettingsPolicySpec {
            body: Some(ClientBody {
                max_size: Some(Size::from("10m")),
                timeout: Some(Duration::from("30s")),
            }),
            keep_alive: Some(ClientKeepAlive {
                requests: Some(100),
                time: Some(Duration::from("5m")),
                timeout: Some(ClientKeepAliveTimeout {
                    server: Some(Duration::from("60s")),
                    header: Some(Duration::from("50s")),
                }),
            }),
            ..Default::default()
        };
        let gen = ClientSettingsGenerator::new();
        let result = gen
            .generate_for_server(&[mk_policy("limits", spec)], &mk_server())
            .unwrap();

        assert_eq!(result.files.len(), 1);
        assert_eq!(
            result.files[0].name,
            "ClientSettingsPolicy_default_limits_server.conf"
        );
        assert_eq!(
            content(&result.files[0].content),
            "client_max_body_size 10m;\n\
             client_body_timeout 30s;\n\
             keepalive_requests 100;\n\
             keepalive_time 5m;\n\
             keepalive_timeout 60s 50s;\n"
        );
        assert!(result.settings.is_empty());
    }

    #[rstest]
    #[case(keep_alive(Some(0), None, None), "keepalive_requests 0;\n")]
    #[case(keep_alive(None, Some("60s"), None), "keepalive_timeout 60s;\n")]
    #[case(keep_alive(None, Some("60s"), Some("50s")), "keepalive_timeout 60s 50s;\n")]
    #[case(keep_alive(None, None, Some("50s")), "")]
    #[case(ClientSettingsPolicySpec::default(), "")]
    #[case(max_size(""), "")]
    fn keep_alive_variants(#[case] spec: ClientSettingsPolicySpec, #[case] expected: &str) {
        let gen = ClientSettingsGenerator::new();
        let result = gen
            .generate_for_match_rule(&[mk_policy("limits", spec)], &mk_match_rule())
            .unwrap();

        if expected.is_empty() {
            assert!(result.is_empty(), "{result:?}");
        } else {
            assert_eq!(result.files.len(), 2);
            for file in &result.files {
                assert_eq!(content(&file.content), expected);
            }
        }
    }

    #[test]
    fn match_rule_files_are_duplicated() {
        let gen = ClientSettingsGenerator::new();
        let result = gen
            .generate_for_match_rule(&[mk_policy("limits", max_size("1m"))], &mk_match_rule())
            .unwrap();

        let int = result.for_internal_location().collect::<Vec<_>>();
        let ext = result.for_external_location().collect::<Vec<_>>();
        assert_eq!(int.len(), 1);
        assert_eq!(ext.len(), 1);
        assert_eq!(int[0].name, "ClientSettingsPolicy_default_limits_int.conf");
        assert_eq!(ext[0].name, "ClientSettingsPolicy_default_limits_ext.conf");
        assert_eq!(int[0].content, ext[0].content);
        assert_eq!(content(&int[0].content), "client_max_body_size 1m;\n");
        assert_eq!(result.for_external_redirect_location().count(), 0);
    }

    #[test]
    fn no_policies_no_files() {
        let gen = ClientSettingsGenerator::new();
        assert!(gen.generate_for_server(&[], &mk_server()).unwrap().is_empty());
        assert!(gen
            .generate_for_path_rule(&[], &mk_path_rule())
            .unwrap()
            .is_empty());
        assert!(gen
            .generate_for_match_rule(&[], &mk_match_rule())
            .unwrap()
            .is_empty());
    }

    #[rstest]
    #[case(&["1m", "2m"], "2m")]
    #[case(&["2m", "1m"], "2m")]
    #[case(&["1024k", "1m"], "1m")]
    #[case(&["1m", "1024k"], "1024k")]
    #[case(&["1g", "1m", "10k"], "1g")]
    #[case(&["", "5k"], "5k")]
    fn redirect_carries_the_largest_size(#[case] sizes: &[&str], #[case] expected: &str) {
        let policies = sizes
            .iter()
            .enumerate()
            .map(|(i, s)| mk_policy(&format!("p{i}"), max_size(s)))
            .collect::<Vec<_>>();

        let gen = ClientSettingsGenerator::new();
        let result = gen.generate_for_path_rule(&policies, &mk_path_rule()).unwrap();

        assert_eq!(result.files.len(), 1);
        let file = &result.files[0];
        assert_eq!(file.location_type, LocationType::ExternalRedirect);
        assert_eq!(
            file.name,
            "ClientSettingsPolicy_80_cafe.example.com_0_prefixcoffee_redirect.conf"
        );
        assert_eq!(
            content(&file.content),
            format!("client_max_body_size {expected};\n")
        );
    }

    #[test]
    fn redirect_requires_a_size() {
        let gen = ClientSettingsGenerator::new();
        let policies = [
            mk_policy("keepalive", keep_alive(Some(10), None, None)),
            mk_policy("unset", max_size("")),
        ];
        let result = gen.generate_for_path_rule(&policies, &mk_path_rule()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn malformed_size_is_attributed_to_its_policy() {
        let gen = ClientSettingsGenerator::new();
        let policies = [mk_policy("bad", max_size("12b")), mk_policy("good", max_size("1m"))];

        let errors = gen
            .generate_for_path_rule(&policies, &mk_path_rule())
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        let error = errors.iter().next().unwrap();
        assert_eq!(error.kind, PolicyKind::ClientSettings);
        assert_eq!(error.policy, ResourceId::new("default", "bad"));
        assert!(matches!(
            error.error,
            PolicyError::InvalidSize { field: "body.maxSize", .. }
        ));

        let errors = gen
            .generate_for_match_rule(&policies, &mk_match_rule())
            .unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn malformed_durations_are_reported() {
        let spec = ClientSettingsPolicySpec {
            body: Some(ClientBody {
                max_size: None,
                timeout: Some(Duration::from("30d")),
            }),
            keep_alive: Some(ClientKeepAlive {
                requests: None,
                time: Some(Duration::from("12345s")),
                timeout: None,
            }),
            ..Default::default()
        };
        let gen = ClientSettingsGenerator::new();
        let errors = gen
            .generate_for_server(&[mk_policy("slow", spec)], &mk_server())
            .unwrap_err();

        let fields = errors
            .iter()
            .map(|e| match &e.error {
                PolicyError::InvalidDuration { field, .. } => *field,
                other => panic!("unexpected error: {other}"),
            })
            .collect::<Vec<_>>();
        assert_eq!(fields, vec!["body.timeout", "keepAlive.time"]);
    }

    #[test]
    fn names_are_stable() {
        let gen = ClientSettingsGenerator::new();
        let policies = [mk_policy("limits", max_size("1m"))];
        let first = gen.generate_for_match_rule(&policies, &mk_match_rule()).unwrap();
        let second = gen.generate_for_match_rule(&policies, &mk_match_rule()).unwrap();
        assert_eq!(first, second);
    }
}
