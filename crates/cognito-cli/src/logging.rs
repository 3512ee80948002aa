use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "cognito=info,cognito_auth=info,cognito_core=info";

/// Log to stderr so `--json` output on stdout stays parseable.
///
/// `RUST_LOG` overrides the default filter, e.g. `RUST_LOG=cognito_auth=debug`
/// shows why tokens were rejected.
pub fn init() -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init()
        .context("failed to initialize tracing subscriber")?;

    Ok(())
}
