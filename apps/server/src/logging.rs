//! Logging and telemetry initialization.
//!
//! Console output is always enabled (plain text or JSON). A rolling log file
//! and an OTLP trace exporter can be switched on through [`LoggingConfig`].

use anyhow::Context;
use opentelemetry::{trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    trace::{self as sdktrace, Sampler},
    Resource,
};
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

/// Keeps background writers and exporters alive; flushes them when dropped.
pub struct TelemetryGuard {
    _file_guard: Option<WorkerGuard>,
    tracer_provider: Option<sdktrace::TracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("Failed to shut down tracer provider: {e}");
            }
        }
    }
}

pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<TelemetryGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("Invalid log level")?;

    let console_layer = if config.json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    let (file_layer, file_guard) = if config.file_enabled {
        let appender = match config.file_rotation.as_str() {
            "hourly" => tracing_appender::rolling::hourly(&config.file_directory, &config.file_prefix),
            "minutely" => {
                tracing_appender::rolling::minutely(&config.file_directory, &config.file_prefix)
            }
            "never" => tracing_appender::rolling::never(&config.file_directory, &config.file_prefix),
            _ => tracing_appender::rolling::daily(&config.file_directory, &config.file_prefix),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(writer)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let (otel_layer, tracer_provider) = if config.opentelemetry_enabled {
        let provider = build_tracer_provider(config)?;
        let tracer = provider.tracer(config.service_name.clone());
        opentelemetry::global::set_tracer_provider(provider.clone());
        let layer = tracing_opentelemetry::layer().with_tracer(tracer).boxed();
        (Some(layer), Some(provider))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .with(otel_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if config.opentelemetry_enabled {
        tracing::info!(
            endpoint = %config.otlp_endpoint,
            sample_ratio = config.trace_sample_ratio,
            "OpenTelemetry tracing enabled"
        );
    }

    Ok(TelemetryGuard {
        _file_guard: file_guard,
        tracer_provider,
    })
}

fn build_tracer_provider(config: &LoggingConfig) -> anyhow::Result<sdktrace::TracerProvider> {
    let service_version = config
        .service_version
        .clone()
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    let resource = Resource::new(vec![
        KeyValue::new(
            opentelemetry_semantic_conventions::resource::SERVICE_NAME,
            config.service_name.clone(),
        ),
        KeyValue::new(
            opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
            service_version,
        ),
        KeyValue::new(
            opentelemetry_semantic_conventions::attribute::DEPLOYMENT_ENVIRONMENT_NAME,
            config.deployment_environment.clone(),
        ),
    ]);

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .with_timeout(Duration::from_secs(config.otlp_timeout_seconds))
        .with_metadata(otlp_metadata(&config.otlp_headers));

    let provider = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(
            sdktrace::Config::default()
                .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
                    config.trace_sample_ratio,
                ))))
                .with_resource(resource),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio)
        .context("Failed to install OTLP trace pipeline")?;

    Ok(provider)
}

/// Parses `key=value` pairs into gRPC metadata; malformed entries are skipped.
fn otlp_metadata(headers: &[String]) -> tonic::metadata::MetadataMap {
    let mut metadata = tonic::metadata::MetadataMap::new();
    for header in headers {
        let Some((key, value)) = header.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let (Ok(key), Ok(value)) = (
            key.parse::<tonic::metadata::MetadataKey<tonic::metadata::Ascii>>(),
            value.trim().parse(),
        ) else {
            continue;
        };
        metadata.insert(key, value);
    }
    metadata
}

/// Flush and shut down the global tracer provider.
pub fn shutdown_telemetry() {
    opentelemetry::global::shutdown_tracer_provider();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otlp_metadata_skips_malformed_entries() {
        let metadata = otlp_metadata(&[
            "x-api-key=secret".to_string(),
            "no-separator".to_string(),
            "Bad Key=value".to_string(),
        ]);
        assert_eq!(metadata.len(), 1);
        assert_eq!(
            metadata.get("x-api-key").and_then(|v| v.to_str().ok()),
            Some("secret")
        );
    }
}
