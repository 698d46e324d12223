use crate::error::LoggingError;
use stampede_config::{LogFormat, LoggingConfig};
use tracing::Subscriber;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Filter from `RUST_LOG` if set, otherwise from the configured level and directives
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        return Ok(EnvFilter::try_from_default_env()?);
    }

    let mut filter = EnvFilter::new(config.level.as_str());
    for directive in &config.directives {
        let parsed: Directive = directive.parse().map_err(|source| LoggingError::InvalidDirective {
            directive: directive.clone(),
            source,
        })?;
        filter = filter.add_directive(parsed);
    }
    Ok(filter)
}

fn fmt_layer<S>(config: &LoggingConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    // Logs go to stderr so the run summary owns stdout
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    match config.format {
        LogFormat::Json => layer.json().with_current_span(true).with_span_list(false).boxed(),
        LogFormat::Text => layer.with_ansi(config.ansi).boxed(),
        LogFormat::Compact => layer.compact().with_ansi(config.ansi).boxed(),
        LogFormat::Pretty => layer.pretty().with_ansi(config.ansi).boxed(),
    }
}

/// Install the global subscriber described by `config`
///
/// Returns `Ok(false)` when a subscriber was already installed, which is
/// harmless (tests and embedding binaries may have set one up first).
pub fn init_logging(config: &LoggingConfig) -> Result<bool, LoggingError> {
    let filter = build_filter(config)?;

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer(config))
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(
            level = config.level.as_str(),
            format = ?config.format,
            "logging initialised"
        );
    } else {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }
    Ok(installed)
}

/// Plain text logging at `level`, for commands that run before configuration loads
pub fn init_simple_tracing(level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stampede_config::LogLevel;

    #[test]
    fn test_filter_from_level_and_directives() {
        temp_env::with_var_unset("RUST_LOG", || {
            let config = LoggingConfig {
                level: LogLevel::Warn,
                directives: vec!["stampede_engine::session=debug".to_string()],
                ..LoggingConfig::default()
            };
            let filter = build_filter(&config).unwrap().to_string();
            assert!(filter.contains("warn"));
            assert!(filter.contains("stampede_engine::session=debug"));
        });
    }

    #[test]
    fn test_invalid_directive_is_reported() {
        temp_env::with_var_unset("RUST_LOG", || {
            let config = LoggingConfig {
                directives: vec!["stampede_engine=loud".to_string()],
                ..LoggingConfig::default()
            };
            let err = build_filter(&config).unwrap_err();
            assert!(matches!(err, LoggingError::InvalidDirective { ref directive, .. } if directive == "stampede_engine=loud"));
        });
    }

    #[test]
    fn test_rust_log_overrides_config() {
        temp_env::with_var("RUST_LOG", Some("stampede_http=trace"), || {
            let filter = build_filter(&LoggingConfig::default()).unwrap().to_string();
            assert!(filter.contains("stampede_http=trace"));
            assert!(!filter.contains("info"));
        });
    }

    #[test]
    fn test_second_init_is_harmless() {
        temp_env::with_var_unset("RUST_LOG", || {
            let config = LoggingConfig {
                format: LogFormat::Json,
                ..LoggingConfig::default()
            };
            let _ = init_logging(&config).unwrap();
            assert!(!init_logging(&config).unwrap());
            assert!(!init_simple_tracing("debug"));
        });
    }
}
