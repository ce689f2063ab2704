use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Installs a global `tracing` subscriber honouring `Config.log_level`,
/// falling back to the `RUST_LOG` directive if set. Matches the teacher's
/// use of `tracing` + `tracing-subscriber` across its engine crates.
pub fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_tracing_level().to_string()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if config.log_dir.is_some() {
        // A directory-based sink is the excluded bootstrap layer's concern
        // to wire up (file rotation, etc); here we only honour the level.
        let _ = builder.json().try_init();
    } else {
        let _ = builder.pretty().try_init();
    }
}
