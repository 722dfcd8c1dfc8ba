//! Tracing subscriber setup for router hosts.

use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber writing to stderr.
///
/// The filter comes from `RUST_LOG` when set, otherwise `default_directive`
/// (e.g. `"router_core=info"`). Stdout stays free for JSON output.
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_reports_already_installed() {
        let _ = init_tracing("warn");
        assert!(!init_tracing("warn"));
    }
}
