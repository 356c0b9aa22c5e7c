//! Tracing setup: console layer (pretty or JSON) plus an optional rolling file.

use corrector_config::Logging;
use eyre::WrapErr;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::FILE_GUARD;

fn rotation(name: Option<&str>) -> Rotation {
    match name {
        Some("daily") => Rotation::DAILY,
        Some("hourly") => Rotation::HOURLY,
        _ => Rotation::NEVER,
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `level`.
///
/// Console output goes to stderr so stdout only carries command results.
pub fn init_tracing(json: bool, level: &str, cfg: &Logging) -> eyre::Result<()> {
    // --log-level wins unless left at its default
    let level = match (level, cfg.level.as_deref()) {
        ("info", Some(from_cfg)) => from_cfg,
        (cli, _) => cli,
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid log level '{level}'"))?;

    let console = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let file = match cfg.file.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            let dir = path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file has no file name: {}", path.display()))?;
            let appender = RollingFileAppender::new(rotation(cfg.rotation.as_deref()), dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_rotation_falls_back_to_never() {
        assert_eq!(rotation(Some("weekly")), Rotation::NEVER);
        assert_eq!(rotation(None), Rotation::NEVER);
        assert_eq!(rotation(Some("hourly")), Rotation::HOURLY);
    }
}
