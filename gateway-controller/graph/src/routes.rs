//! Converts HTTPRoute matches into the core route model.

use anyhow::{bail, Context, Result};
use gateway_controller_core::routes;
use gateway_controller_k8s_api::gateway::{self as api, MatchType};

/// Converts every match of a route, in authored order, as
/// `(rule index, match index, match)`. A route without rules, or a rule
/// without matches, matches every request.
pub fn try_matches(spec: &api::HttpRouteSpec) -> Result<Vec<(usize, usize, routes::HttpRouteMatch)>> {
    let rules = spec.rules.as_deref().unwrap_or_default();
    if rules.is_empty() {
        return Ok(vec![(0, 0, routes::HttpRouteMatch::default())]);
    }

    let mut matches = Vec::new();
    for (rule_index, rule) in rules.iter().enumerate() {
        let rule_matches = rule.matches.as_deref().unwrap_or_default();
        if rule_matches.is_empty() {
            matches.push((rule_index, 0, routes::HttpRouteMatch::default()));
            continue;
        }
        for (match_index, m) in rule_matches.iter().enumerate() {
            let m = try_match(m.clone())
                .with_context(|| format!("rule {rule_index} match {match_index}"))?;
            matches.push((rule_index, match_index, m));
        }
    }
    Ok(matches)
}

pub fn try_match(
    api::HttpRouteMatch {
        path,
        headers,
        query_params,
        method,
    }: api::HttpRouteMatch,
) -> Result<routes::HttpRouteMatch> {
    let path = path.map(path_match).transpose()?.unwrap_or_default();

    let headers = headers
        .into_iter()
        .flatten()
        .map(header_match)
        .collect::<Result<_>>()?;

    let query_params = query_params
        .into_iter()
        .flatten()
        .map(query_param_match)
        .collect::<Result<_>>()?;

    let method = method
        .as_deref()
        .map(routes::Method::try_from)
        .transpose()?;

    Ok(routes::HttpRouteMatch {
        path,
        headers,
        query_params,
        method,
    })
}

pub fn path_match(path_match: api::HttpPathMatch) -> Result<routes::PathMatch> {
    match path_match {
        api::HttpPathMatch::Exact { value } | api::HttpPathMatch::PathPrefix { value }
            if !value.starts_with('/') =>
        {
            bail!("paths must be absolute (begin with `/`); {value:?} is not an absolute path")
        }
        api::HttpPathMatch::Exact { value } => Ok(routes::PathMatch::Exact(value)),
        api::HttpPathMatch::PathPrefix { value } => Ok(routes::PathMatch::Prefix(value)),
        api::HttpPathMatch::RegularExpression { value } => {
            bail!("regular expression path matches are not supported: {value:?}")
        }
    }
}

pub fn header_match(header_match: api::HttpHeaderMatch) -> Result<routes::HeaderMatch> {
    let api::HttpHeaderMatch {
        match_type,
        name,
        value,
    } = header_match;
    match match_type {
        MatchType::Exact => Ok(routes::HeaderMatch::Exact(name.parse()?, value.parse()?)),
        MatchType::RegularExpression => {
            Ok(routes::HeaderMatch::Regex(name.parse()?, value.parse()?))
        }
    }
}

pub fn query_param_match(query_match: api::HttpQueryParamMatch) -> Result<routes::QueryParamMatch> {
    let api::HttpQueryParamMatch {
        match_type,
        name,
        value,
    } = query_match;
    match match_type {
        MatchType::Exact => Ok(routes::QueryParamMatch::Exact(name, value)),
        MatchType::RegularExpression => Ok(routes::QueryParamMatch::Regex(name, value.parse()?)),
    }
}
