use tracing_subscriber::EnvFilter;

/// Filter variable consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "MESSENGER_LOG";

/// Installs a compact fmt subscriber for hosts that have none.
/// Returns false when a global subscriber was already set.
pub fn init() -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_harmless() {
        init();
        assert!(!init());
    }
}
