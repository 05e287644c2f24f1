use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global subscriber. `RUST_LOG` wins when set; otherwise
/// `verbose` selects debug output for this crate.
pub fn init(verbose: bool) {
    let default = if verbose { "crmdesk=debug,info" } else { "crmdesk=info,warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    if fmt().with_env_filter(filter).with_target(verbose).try_init().is_err() {
        tracing::debug!("logging already initialized");
    }
}
