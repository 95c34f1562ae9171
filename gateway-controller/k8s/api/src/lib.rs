#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod duration;
pub mod gateway;
pub mod policy;
pub mod size;

pub use self::{duration::Duration, size::Size};
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
pub use kube::{Resource, ResourceExt};

/// The API group shared by the gateway's own policy resources.
pub const POLICY_GROUP: &str = "gateway.nginx.org";

/// The API group of the Gateway API resources.
pub const GATEWAY_GROUP: &str = "gateway.networking.k8s.io";
