//! Tracing setup for embedding applications. The library itself only emits
//! events; hosts that want output call `init` once at startup.

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Installs a global `fmt` subscriber filtered by verbosity, with `RUST_LOG`
/// taking precedence when set. Returns an error if a subscriber is already
/// installed.
pub fn init(verbosity: u8) -> Result<()> {
    let verbosity_level = match verbosity {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::WARN,
        2 => tracing::Level::INFO,
        3 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let fmt_layer = fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false);

    // RUST_LOG=
    let env_filter = EnvFilter::builder()
        .with_default_directive(verbosity_level.into())
        .from_env_lossy();

    let subscriber = Registry::default().with(fmt_layer).with(env_filter);

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_installs_once() {
        // The first call wins; a second call must report the conflict rather
        // than panic.
        assert!(init(2).is_ok());
        assert!(init(4).is_err());
    }
}
