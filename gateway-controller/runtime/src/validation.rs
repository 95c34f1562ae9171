use regex::Regex;
use thiserror::Error;

const CONTROLLER_NAME_PREFIX: &str = "gateway.nginx.org";

const DNS_LABEL_REGEX: &str = r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$";
const DNS_SUBDOMAIN_REGEX: &str =
    r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$";

const MAX_LABEL_LEN: usize = 63;
const MAX_SUBDOMAIN_LEN: usize = 253;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ArgError {
    #[error(
        "controller name must be of the form {prefix}/<namespace>/<name>; got {0:?}",
        prefix = CONTROLLER_NAME_PREFIX
    )]
    ControllerNameFormat(String),

    /// The namespace or name segment of the controller name is not a DNS
    /// label.
    #[error("controller name segment {0:?} must be a DNS-1123 label")]
    ControllerNameSegment(String),

    #[error("gateway class name must not be empty")]
    EmptyGatewayClass,

    #[error(
        "gateway class name {0:?} must be a DNS-1123 subdomain of at most {max} characters",
        max = MAX_SUBDOMAIN_LEN
    )]
    InvalidGatewayClass(String),
}

/// Validates a controller name of the form
/// `gateway.nginx.org/<namespace>/<name>`.
pub(crate) fn validate_controller_name(name: &str) -> Result<(), ArgError> {
    let format = || ArgError::ControllerNameFormat(name.to_string());

    let rest = name
        .strip_prefix(CONTROLLER_NAME_PREFIX)
        .and_then(|rest| rest.strip_prefix('/'))
        .ok_or_else(format)?;
    let (namespace, ctlr) = rest.split_once('/').ok_or_else(format)?;

    let label = Regex::new(DNS_LABEL_REGEX).expect("should compile");
    for segment in [namespace, ctlr] {
        if segment.is_empty() || segment.contains('/') {
            return Err(format());
        }
        if segment.len() > MAX_LABEL_LEN || !label.is_match(segment) {
            return Err(ArgError::ControllerNameSegment(segment.to_string()));
        }
    }
    Ok(())
}

pub(crate) fn validate_gateway_class(name: &str) -> Result<(), ArgError> {
    if name.is_empty() {
        return Err(ArgError::EmptyGatewayClass);
    }

    let subdomain = Regex::new(DNS_SUBDOMAIN_REGEX).expect("should compile");
    if name.len() > MAX_SUBDOMAIN_LEN || !subdomain.is_match(name) {
        return Err(ArgError::InvalidGatewayClass(name.to_string()));
    }
    Ok(())
}
