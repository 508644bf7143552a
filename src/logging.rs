//! `tracing` subscriber bootstrap for hosts embedding the controller.

use tracing_subscriber::EnvFilter;

use crate::config::{SessionConfig, DEFAULT_LOG_FILTER};

/// Installs a formatted subscriber filtered by `filter`.
///
/// Returns `false` when a global subscriber is already installed, so calling
/// this more than once is harmless.
pub fn init(filter: &str) -> bool {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Like [`init`], using the filter resolved into `config`.
pub fn init_from_config(config: &SessionConfig) -> bool {
    init(&config.log_filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_reports_existing_subscriber() {
        let config = SessionConfig::new("/tmp/cred.json").with_log_filter("mail_chat=debug");
        let _ = init_from_config(&config);
        assert!(!init_from_config(&config));
        assert!(!init("mail_chat=info"));
    }
}
