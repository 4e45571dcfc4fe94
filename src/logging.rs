//! Tracing subscriber setup
//!
//! `RUST_LOG` wins when set; otherwise the level comes from `--verbose` or
//! `[logging].level`. Output format is `compact`, `pretty` or `json`.

use crate::config::LoggingConfig;
use anyhow::Result;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("Unknown log format: {}", other),
        }
    }
}

/// Level to use when `RUST_LOG` is unset
pub fn default_level(config: &LoggingConfig, verbose: bool) -> Level {
    if verbose {
        return Level::DEBUG;
    }
    config.level.to_lowercase().parse().unwrap_or(Level::INFO)
}

/// Build the env filter with `level` as the default directive
pub fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_tracing(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let filter = env_filter(default_level(config, verbose));
    let format: LogFormat = config.format.parse()?;

    // stdout is reserved for command output
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let installed = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tracing::info;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_default_level() {
        let mut config = LoggingConfig::default();
        assert_eq!(default_level(&config, false), Level::INFO);
        assert_eq!(default_level(&config, true), Level::DEBUG);

        config.level = "warn".to_string();
        assert_eq!(default_level(&config, false), Level::WARN);

        config.level = "nonsense".to_string();
        assert_eq!(default_level(&config, false), Level::INFO);
    }

    #[test]
    fn test_json_output_is_parseable() {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            info!(delivery_id = "abc", events = 2, "Webhook event received");
        });

        let output = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        let line = output.lines().next().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(parsed["fields"]["delivery_id"], "abc");
        assert_eq!(parsed["fields"]["message"], "Webhook event received");
    }
}
