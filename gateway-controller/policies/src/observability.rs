//! Renders ObservabilityPolicies.
//!
//! Tracing is configured per location. The sampling decision cannot be an
//! include file because the proxy evaluates it in the enclosing location, so
//! it is returned as the inline `otel_trace` setting instead. Partial ratios
//! sample through a `$otel_ratio_<n>` variable, which is defined once per ratio
//! in the `http` context.

use crate::{environment, render};
use gateway_controller_core::{
    dataplane::{MatchRule, PathRule, VirtualServer},
    policies::{
        file_name, http_file_name, Errors, FileScope, GenerateError, GenerateForLocationResult, GenerateResult,
        File, Generator, LocationFile, LocationType, Policy, PolicyError, PolicyKind,
    },
};
use gateway_controller_k8s_api::policy::{SpanAttribute, TraceStrategy, Tracing};
use minijinja::Environment;
use std::{collections::BTreeSet, fmt};

const TRACING: &str = "observability.conf";

const TRACING_TEMPLATE: &str = r#"{% if context is not none %}
otel_trace_context {{ context }};
{% endif %}
{% if span_name is not none %}
otel_span_name {{ span_name | quote }};
{% endif %}
{% for attr in span_attributes %}
otel_span_attr {{ attr.key | quote }} {{ attr.value | quote }};
{% endfor %}
"#;

const RATIO: &str = "observability_ratio.conf";

const RATIO_TEMPLATE: &str = r#"split_clients $request_id $otel_ratio_{{ ratio }} {
    {{ ratio }}% on;
    * off;
}
"#;

/// The inline setting that enables sampling in a location.
pub const OTEL_TRACE: &str = "otel_trace";

pub struct ObservabilityGenerator {
    env: Environment<'static>,
}

#[derive(Debug, serde::Serialize)]
struct TracingDirectives<'a> {
    context: Option<&'static str>,
    span_name: Option<&'a str>,
    span_attributes: &'a [SpanAttribute],
}

#[derive(Debug, serde::Serialize)]
struct RatioVariable {
    ratio: u32,
}

// === impl ObservabilityGenerator ===

impl ObservabilityGenerator {
    pub fn new() -> Self {
        Self {
            env: environment(&[(TRACING, TRACING_TEMPLATE), (RATIO, RATIO_TEMPLATE)]),
        }
    }
}

impl Default for ObservabilityGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObservabilityGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservabilityGenerator").finish_non_exhaustive()
    }
}

impl Generator for ObservabilityGenerator {
    fn generate_for_server(
        &self,
        _: &[Policy],
        _: &VirtualServer,
    ) -> Result<GenerateResult, Errors> {
        Ok(GenerateResult::default())
    }

    fn generate_for_path_rule(
        &self,
        _: &[Policy],
        _: &PathRule,
    ) -> Result<GenerateForLocationResult, Errors> {
        Ok(GenerateForLocationResult::default())
    }

    fn generate_for_match_rule(
        &self,
        policies: &[Policy],
        _: &MatchRule,
    ) -> Result<GenerateForLocationResult, Errors> {
        let mut result = GenerateForLocationResult::default();
        let mut errors = Errors::default();

        for policy in policies {
            let Policy::Observability(op) = policy else {
                continue;
            };
            let Some(tracing) = op.spec.tracing.as_ref() else {
                continue;
            };

            let id = policy.id();
            let sampling = match sampling(tracing) {
                Ok(sampling) => sampling,
                Err(error) => {
                    errors.push(GenerateError {
                        kind: PolicyKind::Observability,
                        policy: id,
                        error,
                    });
                    continue;
                }
            };
            // Later policies override earlier ones.
            result.settings.insert(OTEL_TRACE.to_string(), sampling);

            let ctx = TracingDirectives {
                context: tracing.context.map(|c| c.as_str()),
                span_name: tracing.span_name.as_deref(),
                span_attributes: tracing.span_attributes.as_deref().unwrap_or_default(),
            };
            let content = render(&self.env, TRACING, ctx);
            if content.is_empty() {
                continue;
            }
            for (scope, location_type) in [
                (FileScope::Internal, LocationType::Internal),
                (FileScope::External, LocationType::External),
            ] {
                result.files.push(LocationFile {
                    name: file_name(PolicyKind::Observability, &id, scope),
                    location_type,
                    content: content.clone(),
                });
            }
        }

        errors.into_result(result)
    }

    fn generate_for_http(&self, policies: &[Policy]) -> Result<GenerateResult, Errors> {
        let mut ratios = BTreeSet::new();
        let mut errors = Errors::default();
        for policy in policies {
            let Policy::Observability(op) = policy else {
                continue;
            };
            let Some(tracing) = op.spec.tracing.as_ref() else {
                continue;
            };
            match sampling(tracing) {
                Ok(_) => {
                    if let Some(ratio) = partial_ratio(tracing) {
                        ratios.insert(ratio);
                    }
                }
                Err(error) => errors.push(GenerateError {
                    kind: PolicyKind::Observability,
                    policy: policy.id(),
                    error,
                }),
            }
        }

        let files = ratios
            .into_iter()
            .map(|ratio| File {
                name: http_file_name(PolicyKind::Observability, &format!("ratio{ratio}")),
                content: render(&self.env, RATIO, RatioVariable { ratio }),
            })
            .collect();
        errors.into_result(GenerateResult {
            files,
            ..Default::default()
        })
    }
}

/// Returns the ratio of a tracing configuration that samples some, but not
/// all, requests.
fn partial_ratio(tracing: &Tracing) -> Option<u32> {
    if tracing.strategy == TraceStrategy::Parent {
        return None;
    }
    tracing.ratio.filter(|n| (1..100).contains(n))
}

/// Computes the `otel_trace` value for a tracing configuration.
fn sampling(tracing: &Tracing) -> Result<String, PolicyError> {
    if tracing.strategy == TraceStrategy::Parent {
        return Ok("$otel_parent_sampled".to_string());
    }
    match tracing.ratio {
        None | Some(100) => Ok("on".to_string()),
        Some(0) => Ok("off".to_string()),
        Some(n) if n < 100 => Ok(format!("$otel_ratio_{n}")),
        Some(value) => Err(PolicyError::InvalidRatio {
            field: "tracing.ratio",
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_controller_core::{precedence::Route, routes::HttpRouteMatch, ResourceId};
    use gateway_controller_k8s_api::policy::{
        LocalTargetRef, ObservabilityPolicy, ObservabilityPolicySpec, TraceContext,
    };
    use maplit::btreemap;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn mk_policy(name: &str, tracing: Option<Tracing>) -> Policy {
        let mut op = ObservabilityPolicy::new(
            name,
            ObservabilityPolicySpec {
                target_refs: vec![LocalTargetRef {
                    group: "gateway.networking.k8s.io".to_string(),
                    kind: "HTTPRoute".to_string(),
                    name: "coffee".to_string(),
                }],
                tracing,
            },
        );
        op.metadata.namespace = Some("default".to_string());
        Policy::from(op)
    }

    fn ratio(ratio: Option<u32>) -> Tracing {
        Tracing {
            ratio,
            ..Default::default()
        }
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

    #[rstest]
    #[case(ratio(None), "on")]
    #[case(ratio(Some(100)), "on")]
    #[case(ratio(Some(0)), "off")]
    #[case(ratio(Some(25)), "$otel_ratio_25")]
    #[case(Tracing { strategy: TraceStrategy::Parent, ratio: Some(5), ..Default::default() }, "$otel_parent_sampled")]
    fn sampling_setting(#[case] tracing: Tracing, #[case] expected: &str) {
        let gen = ObservabilityGenerator::new();
        let result = gen
            .generate_for_match_rule(&[mk_policy("trace", Some(tracing))], &mk_match_rule())
            .unwrap();
        assert_eq!(
            result.settings,
            btreemap! { OTEL_TRACE.to_string() => expected.to_string() }
        );
        // Sampling alone renders no include files.
        assert!(result.files.is_empty());
    }

    #[test]
    fn renders_span_directives() {
        let tracing = Tracing {
            context: Some(TraceContext::Propagate),
            span_name: Some("coffee \"shop\"".to_string()),
            span_attributes: Some(vec![SpanAttribute {
                key: "team".to_string(),
                value: "beans".to_string(),
            }]),
            ..Default::default()
        };
        let gen = ObservabilityGenerator::new();
        let result = gen
            .generate_for_match_rule(&[mk_policy("trace", Some(tracing))], &mk_match_rule())
            .unwrap();

        let names = result
            .files
            .iter()
            .map(|f| f.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "ObservabilityPolicy_default_trace_int.conf",
                "ObservabilityPolicy_default_trace_ext.conf",
            ]
        );
        assert_eq!(
            std::str::from_utf8(&result.files[0].content).unwrap(),
            "otel_trace_context propagate;\n\
             otel_span_name \"coffee \\\"shop\\\"\";\n\
             otel_span_attr \"team\" \"beans\";\n"
        );
        assert_eq!(result.files[0].content, result.files[1].content);
    }

    #[test]
    fn ratio_out_of_range() {
        let gen = ObservabilityGenerator::new();
        let policies = [
            mk_policy("bad", Some(ratio(Some(101)))),
            mk_policy("good", Some(ratio(Some(50)))),
        ];
        let errors = gen
            .generate_for_match_rule(&policies, &mk_match_rule())
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        let error = errors.iter().next().unwrap();
        assert_eq!(error.policy, ResourceId::new("default", "bad"));
        assert_eq!(
            error.error,
            PolicyError::InvalidRatio {
                field: "tracing.ratio",
                value: 101
            }
        );
    }

    #[test]
    fn later_policy_wins() {
        let gen = ObservabilityGenerator::new();
        let policies = [
            mk_policy("a", Some(ratio(Some(0)))),
            mk_policy("b", Some(ratio(Some(10)))),
        ];
        let result = gen
            .generate_for_match_rule(&policies, &mk_match_rule())
            .unwrap();
        assert_eq!(result.settings[OTEL_TRACE], "$otel_ratio_10");
    }

    #[test]
    fn defines_each_partial_ratio_once_for_http() {
        let gen = ObservabilityGenerator::new();
        let policies = [
            mk_policy("quarter", Some(ratio(Some(25)))),
            mk_policy("tenth", Some(ratio(Some(10)))),
            mk_policy("also-quarter", Some(ratio(Some(25)))),
            mk_policy("all", Some(ratio(Some(100)))),
            mk_policy("none", Some(ratio(Some(0)))),
            mk_policy(
                "parent",
                Some(Tracing {
                    strategy: TraceStrategy::Parent,
                    ratio: Some(50),
                    ..Default::default()
                }),
            ),
            mk_policy("idle", None),
        ];
        let result = gen.generate_for_http(&policies).unwrap();

        let files = result
            .files
            .iter()
            .map(|f| (f.name.as_str(), std::str::from_utf8(&f.content).unwrap()))
            .collect::<Vec<_>>();
        assert_eq!(
            files,
            vec![
                (
                    "ObservabilityPolicy_ratio10_http.conf",
                    "split_clients $request_id $otel_ratio_10 {\n    10% on;\n    * off;\n}\n"
                ),
                (
                    "ObservabilityPolicy_ratio25_http.conf",
                    "split_clients $request_id $otel_ratio_25 {\n    25% on;\n    * off;\n}\n"
                ),
            ]
        );
        assert!(result.settings.is_empty());
    }

    #[test]
    fn reports_invalid_ratios_for_http() {
        let gen = ObservabilityGenerator::new();
        let errors = gen
            .generate_for_http(&[mk_policy("over", Some(ratio(Some(150))))])
            .unwrap_err();
        assert_eq!(
            errors.iter().map(|e| e.policy.name.as_str()).collect::<Vec<_>>(),
            vec!["over"]
        );
    }

    #[test]
    fn ignores_other_scopes_and_untraced_policies() {
        let gen = ObservabilityGenerator::new();
        let policies = [mk_policy("trace", Some(ratio(None)))];
        let server = VirtualServer::new("cafe.example.com", 80);
        assert!(gen.generate_for_server(&policies, &server).unwrap().is_empty());

        let path = PathRule::new(
            &server,
            0,
            "/",
            gateway_controller_core::routes::PathType::Prefix,
        );
        assert!(gen.generate_for_path_rule(&policies, &path).unwrap().is_empty());

        let result = gen
            .generate_for_match_rule(&[mk_policy("idle", None)], &mk_match_rule())
            .unwrap();
        assert!(result.is_empty());
    }
}
