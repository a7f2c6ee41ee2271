//! 日志与分布式追踪初始化

use checkind_common::config::{CheckindConfig, LogConfig, ObservabilityConfig};
use std::fs;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[cfg(feature = "opentelemetry")]
use crate::error::Error;
use crate::error::Result;
#[cfg(feature = "opentelemetry")]
use opentelemetry::KeyValue;
#[cfg(feature = "opentelemetry")]
use opentelemetry_otlp::WithExportConfig;
#[cfg(feature = "opentelemetry")]
use opentelemetry_sdk::propagation::TraceContextPropagator;
#[cfg(feature = "opentelemetry")]
use opentelemetry_sdk::{
    Resource,
    trace::{Sampler, SdkTracerProvider},
};

const LOG_FILE_NAME: &str = "checkind.log";

/// 持有日志 writer 和 tracer provider，drop 时刷新
#[derive(Default)]
pub struct ObservabilityGuard {
    #[cfg(feature = "opentelemetry")]
    tracer_provider: Option<SdkTracerProvider>,
    log_guard: Option<WorkerGuard>,
}

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        #[cfg(feature = "opentelemetry")]
        if let Some(provider) = self.tracer_provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("Failed to shutdown tracer provider: {e:?}");
        }
    }
}

/// 按配置初始化日志和追踪
pub fn init_observability(config: &CheckindConfig) -> Result<ObservabilityGuard> {
    let mut guard = ObservabilityGuard::default();
    let log_config = config.log_config();

    if config.is_console_logging() {
        init_subscriber_with_writer(std::io::stdout, true, &mut guard, config)?;
    } else {
        fs::create_dir_all(&log_config.path)?;
        let (non_blocking, worker_guard) = build_file_writer(log_config)?;
        guard.log_guard = Some(worker_guard);

        init_subscriber_with_writer(non_blocking, false, &mut guard, config)?;
    }

    Ok(guard)
}

/// RUST_LOG 优先于配置中的 filter_level
fn create_env_filter(config: &ObservabilityConfig) -> EnvFilter {
    let directive = std::env::var("RUST_LOG")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| config.filter_level.clone());

    EnvFilter::try_new(&directive).unwrap_or_else(|_| {
        eprintln!("Failed to parse filter directive: {directive}. Falling back to: info");
        EnvFilter::new("info")
    })
}

fn init_subscriber_with_writer<W>(
    writer: W,
    use_ansi: bool,
    #[cfg_attr(not(feature = "opentelemetry"), allow(unused_variables))]
    guard: &mut ObservabilityGuard,
    config: &CheckindConfig,
) -> Result<()>
where
    W: for<'a> fmt::MakeWriter<'a> + Send + Sync + 'static,
{
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(use_ansi)
        .with_writer(writer);

    let observability_config = config.observability_config();

    #[cfg(feature = "opentelemetry")]
    {
        if let Some(provider) = build_tracing_provider(config)? {
            use opentelemetry::trace::TracerProvider as _;
            let tracer = provider.tracer(observability_config.tracing.service_name().to_string());
            guard.tracer_provider = Some(provider);

            tracing_subscriber::registry()
                .with(create_env_filter(observability_config))
                .with(fmt_layer)
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .try_init()
                .ok();
            return Ok(());
        }
    }

    tracing_subscriber::registry()
        .with(create_env_filter(observability_config))
        .with(fmt_layer)
        .try_init()
        .ok();

    Ok(())
}

fn build_file_writer(log_config: &LogConfig) -> Result<(NonBlocking, WorkerGuard)> {
    println!(
        "日志写入文件: {}/{} (按天轮转: {})",
        log_config.path,
        LOG_FILE_NAME,
        if log_config.rotate { "开启" } else { "关闭" }
    );

    if log_config.rotate {
        let file_appender = tracing_appender::rolling::daily(&log_config.path, LOG_FILE_NAME);
        Ok(tracing_appender::non_blocking(file_appender))
    } else {
        let log_file_path = std::path::Path::new(&log_config.path).join(LOG_FILE_NAME);
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file_path)?;
        Ok(tracing_appender::non_blocking(file))
    }
}

#[cfg(feature = "opentelemetry")]
fn build_tracing_provider(config: &CheckindConfig) -> Result<Option<SdkTracerProvider>> {
    let tracing_cfg = config.tracing_config();

    if !tracing_cfg.is_enabled() {
        return Ok(None);
    }

    tracing_cfg.validate().map_err(Error::custom)?;

    println!(
        "📊 Initializing OpenTelemetry tracing: service_name={}, endpoint={}, sample_ratio={}",
        tracing_cfg.service_name(),
        tracing_cfg.endpoint(),
        tracing_cfg.sample_ratio
    );

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(tracing_cfg.endpoint())
        .build()
        .map_err(|e| Error::custom(format!("Failed to build OTLP exporter: {e}")))?;

    let resource = Resource::builder()
        .with_service_name(tracing_cfg.service_name().to_string())
        .with_attributes([
            KeyValue::new("service.instance.id", config.name.clone()),
            KeyValue::new("service.environment", config.env.clone()),
        ])
        .build();

    let tracer_provider = SdkTracerProvider::builder()
        .with_resource(resource)
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
            tracing_cfg.sample_ratio,
        ))))
        .with_batch_exporter(exporter)
        .build();

    opentelemetry::global::set_tracer_provider(tracer_provider.clone());
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    Ok(Some(tracer_provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_writer_appends_to_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let log_config = LogConfig {
            output: "file".to_string(),
            rotate: false,
            path: dir.path().to_string_lossy().into_owned(),
        };

        let (_writer, guard) = build_file_writer(&log_config).unwrap();
        drop(guard);
        assert!(dir.path().join(LOG_FILE_NAME).exists());
    }

    #[test]
    fn test_invalid_filter_falls_back_to_info() {
        let config = ObservabilityConfig {
            filter_level: "not a [valid filter".to_string(),
            ..Default::default()
        };
        // 只要不 panic 即可；RUST_LOG 可能被测试环境设置
        let _ = create_env_filter(&config);
    }
}
