use crate::{
    config,
    graph::{Config, Graph, Snapshot},
    policies,
    validation::{validate_controller_name, validate_gateway_class},
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[clap(
    name = "gateway",
    about = "Generates proxy configuration for Gateway API resources"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "gateway=info,warn",
        env = "GATEWAY_CONTROLLER_LOG"
    )]
    log_level: LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: LogFormat,

    /// The name of this controller, as referenced by GatewayClasses.
    #[clap(
        long = "gateway-ctlr-name",
        default_value = "gateway.nginx.org/nginx-gateway/nginx-gateway",
        env = "GATEWAY_CONTROLLER_NAME"
    )]
    controller_name: String,

    /// Only Gateways of this class are configured.
    #[clap(long = "gatewayclass", default_value = "nginx", env = "GATEWAY_CLASS")]
    gateway_class: String,

    /// A multi-document YAML file of the resources to configure.
    #[clap(long, env = "GATEWAY_SNAPSHOT")]
    snapshot: PathBuf,

    #[clap(long, default_value = "/etc/nginx", env = "GATEWAY_OUTPUT_DIR")]
    output_dir: PathBuf,
}

/// A validated `EnvFilter` directive string.
#[derive(Clone, Debug)]
struct LogFilter(String);

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
enum LogFormat {
    #[default]
    Plain,
    Json,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            controller_name,
            gateway_class,
            snapshot,
            output_dir,
        } = self;

        log_format.try_init(log_level)?;

        validate_controller_name(&controller_name)?;
        validate_gateway_class(&gateway_class)?;

        let yaml = tokio::fs::read_to_string(&snapshot)
            .await
            .with_context(|| format!("reading {}", snapshot.display()))?;
        let snapshot = Snapshot::from_yaml(&yaml)?;
        info!(
            gateways = snapshot.gateways.len(),
            routes = snapshot.http_routes.len(),
            policies = snapshot.policies.len(),
            "Loaded snapshot"
        );

        let graph = Graph::build(
            &Config {
                gateway_class_name: gateway_class,
            },
            &snapshot,
        )?;
        for rejection in &graph.rejected_routes {
            warn!(route = %rejection.route, reason = %rejection.reason, "Route not accepted");
        }
        if graph.is_empty() {
            warn!(controller = %controller_name, "No servers to configure");
        }

        let output = match config::generate(&graph, &policies::default_generator()) {
            Ok(output) => output,
            Err(config::ConfigError::Generate(errors)) => {
                for e in errors.iter() {
                    error!(kind = %e.kind, policy = %e.policy, error = %e.error, "Invalid policy");
                }
                bail!("{} policy errors; configuration was not written", errors.len());
            }
            Err(e) => return Err(e.into()),
        };

        config::write(&output, &output_dir).await
    }
}

// === impl LogFilter ===

impl std::str::FromStr for LogFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        EnvFilter::try_new(s)?;
        Ok(Self(s.to_string()))
    }
}

// === impl LogFormat ===

impl LogFormat {
    fn try_init(self, LogFilter(filter): LogFilter) -> Result<()> {
        let registry = tracing_subscriber::registry().with(EnvFilter::try_new(filter)?);
        match self {
            Self::Plain => registry.with(fmt::layer()).try_init()?,
            Self::Json => registry.with(fmt::layer().json()).try_init()?,
        }
        Ok(())
    }
}
