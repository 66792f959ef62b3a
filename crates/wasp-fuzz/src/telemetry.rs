//! Tracing subscriber setup and metric-style log events.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,wasp_gen=debug";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// `WASP_LOG_FORMAT=json` selects structured output
    pub fn from_env() -> Self {
        match std::env::var("WASP_LOG_FORMAT") {
            Ok(value) => Self::parse(&value),
            Err(_) => LogFormat::Text,
        }
    }

    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

pub fn init_telemetry(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(fmt::layer().json().with_target(true)).try_init()?,
        LogFormat::Text => registry.with(fmt::layer().with_target(true)).try_init()?,
    }

    info!("Telemetry initialized ({:?} output)", format);
    Ok(())
}

/// Record a counter metric
#[macro_export]
macro_rules! record_counter {
    ($name:expr, $value:expr) => {
        tracing::info!(
            counter_name = $name,
            counter_value = $value,
            "Counter metric"
        );
    };
    ($name:expr, $value:expr, $($key:ident = $val:expr),+) => {
        tracing::info!(
            counter_name = $name,
            counter_value = $value,
            $($key = $val,)+
            "Counter metric"
        );
    };
}

/// Record a histogram metric
#[macro_export]
macro_rules! record_histogram {
    ($name:expr, $value:expr) => {
        tracing::info!(
            histogram_name = $name,
            histogram_value = $value,
            "Histogram metric"
        );
    };
    ($name:expr, $value:expr, $($key:ident = $val:expr),+) => {
        tracing::info!(
            histogram_name = $name,
            histogram_value = $value,
            $($key = $val,)+
            "Histogram metric"
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Text);
    }

    #[test]
    fn test_metric_macros_expand() {
        crate::record_counter!("programs_generated", 1u64);
        crate::record_counter!("programs_stored", 2u64, worker = 3usize);
        crate::record_histogram!("program_instructions", 40usize, worker = 0usize, template = "WasmFuzzer");
    }
}
