use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_DIRECTIVES: &str = "oauth2mock=info,oauth2mock_core=info";

/// Installs the global subscriber: `RUST_LOG` when set, `default_directives`
/// otherwise. Returns `false` if a subscriber was already installed.
pub fn init_tracing(default_directives: Option<&str>) -> bool {
    let directives = default_directives.unwrap_or(DEFAULT_DIRECTIVES);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).try_init().is_ok()
}
