use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use metra_api::{ApiError, BearerToken, MetricsHandler, ServerConfig, serve, stop_metrics_server};
use metra_core::{CoreError, MetricsRegistry, StaticTaxonomy, Taxonomy};
use metra_model::Labels;
use metra_observe::LoggerError;
use metra_prometheus::{
    EnvIdentity, ExporterConfig, ExporterError, PrometheusExporter, TokioSignals,
    ensure_unique_series, register_prometheus_shutdown,
};
use tracing::{info, warn};

use crate::cli::{ExportArgs, ExportFormat, ExporterArgs, ServeArgs};

/// Dependency missing (`EX_UNAVAILABLE`).
pub const EXIT_UNAVAILABLE: i32 = 69;
/// Configuration invalid (`EX_CONFIG`).
pub const EXIT_CONFIG: i32 = 78;
pub const EXIT_FAILURE: i32 = 1;

/// Exit status for a failed command, from the most specific error in its chain.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<ExporterError>() {
            match e {
                ExporterError::ClientUnavailable(_) => return EXIT_UNAVAILABLE,
                ExporterError::InvalidConfig(_) | ExporterError::DuplicateSeries(_) => {
                    return EXIT_CONFIG;
                }
                _ => {}
            }
        }
        if let Some(ApiError::InvalidConfig(_)) = cause.downcast_ref::<ApiError>() {
            return EXIT_CONFIG;
        }
        if let Some(CoreError::InvalidTaxonomy(_)) = cause.downcast_ref::<CoreError>() {
            return EXIT_CONFIG;
        }
        if cause.downcast_ref::<LoggerError>().is_some() {
            return EXIT_CONFIG;
        }
    }
    EXIT_FAILURE
}

/// Registry, taxonomy and exporter wired from the command line.
struct Stack {
    registry: MetricsRegistry,
    exporter: Arc<PrometheusExporter>,
}

fn build(args: &ExporterArgs) -> anyhow::Result<Stack> {
    let taxonomy: Arc<dyn Taxonomy> = match &args.taxonomy {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading taxonomy {}", path.display()))?;
            Arc::new(StaticTaxonomy::from_json(&json)?)
        }
        None => Arc::new(StaticTaxonomy::new()),
    };
    let registry = MetricsRegistry::with_taxonomy(Arc::clone(&taxonomy));

    let mut config = ExporterConfig::from_identity(&EnvIdentity)
        .with_taxonomy(taxonomy)
        .with_instrument(!args.no_instrument);
    if let Some(ns) = &args.namespace {
        config = config.with_namespace(ns.as_str());
    }
    if let Some(sub) = &args.subsystem {
        config = config.with_subsystem(sub.as_str());
    }
    for (k, v) in &args.labels {
        config = config.with_default_label(k.as_str(), v.as_str());
    }

    let exporter = PrometheusExporter::new(Arc::new(registry.clone()), config)?;
    registry
        .gauge("build_info")?
        .set(1.0, &Labels::single("version", env!("CARGO_PKG_VERSION")));

    Ok(Stack {
        registry,
        exporter: Arc::new(exporter),
    })
}

pub async fn serve_cmd(args: ServeArgs) -> anyhow::Result<()> {
    let stack = build(&args.exporter)?;
    let server_config = ServerConfig {
        host: args.host,
        port: args.port,
        path: args.path,
        refresh_on_scrape: args.refresh_on_scrape,
        instrument: true,
    };

    let mut handler = MetricsHandler::new(Arc::clone(&stack.exporter), server_config);
    if let Some(token) = args.bearer_token {
        handler = handler.with_authenticate(Arc::new(BearerToken::new(token)));
    }

    stack.exporter.refresh().await?;
    stack
        .exporter
        .start_refresh(Duration::from_secs(args.interval_secs), None)
        .await?;
    let server = serve(handler).await?;
    info!(url = %server.url(), "serving metrics; press Ctrl+C to stop");

    let signals = TokioSignals::new();
    register_prometheus_shutdown(&stack.exporter, &signals);
    let signal = signals.wait().await.context("waiting for shutdown signal")?;
    info!(%signal, "shutting down");

    if let Err(e) = stop_metrics_server(server, Duration::from_secs(args.shutdown_timeout_secs)).await
    {
        warn!(error = %e, "metrics server did not stop cleanly");
    }
    let stats = stack.exporter.get_stats();
    info!(
        refreshes = stats.refresh_count,
        errors = stats.error_count,
        "exporter stopped"
    );
    Ok(())
}

pub async fn export_cmd(args: ExportArgs) -> anyhow::Result<()> {
    let stack = build(&args.exporter)?;
    stack.exporter.refresh().await?;

    match args.format {
        ExportFormat::Text => print!("{}", stack.exporter.get_metrics().await?),
        ExportFormat::Json => {
            let snapshot = stack.registry.export();
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
    }
    Ok(())
}

pub async fn validate_cmd(args: ExporterArgs) -> anyhow::Result<()> {
    let stack = build(&args)?;
    stack.exporter.refresh().await?;
    let text = stack.exporter.get_metrics().await?;

    ensure_unique_series(&text)?;
    let stats = stack.exporter.get_stats();
    println!("ok: {} metric families", stats.metrics_count);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_the_error_chain() {
        let missing = anyhow::Error::new(metra_prometheus::RefreshError::new(
            ExporterError::ClientUnavailable("no client".into()),
        ));
        assert_eq!(exit_code(&missing), EXIT_UNAVAILABLE);

        let config = anyhow::Error::new(ExporterError::InvalidConfig("bad".into()))
            .context("building exporter");
        assert_eq!(exit_code(&config), EXIT_CONFIG);

        let api = anyhow::Error::new(ApiError::InvalidConfig("path".into()));
        assert_eq!(exit_code(&api), EXIT_CONFIG);

        let duplicates = anyhow::Error::new(ExporterError::DuplicateSeries(vec!["a_total".into()]));
        assert_eq!(exit_code(&duplicates), EXIT_CONFIG);
        let from_text = anyhow::Error::new(
            metra_prometheus::ensure_unique_series("a_total 1\na_total 2\n").unwrap_err(),
        );
        assert_eq!(exit_code(&from_text), EXIT_CONFIG);

        let other = anyhow::anyhow!("boom");
        assert_eq!(exit_code(&other), EXIT_FAILURE);
    }

    #[test]
    fn invalid_namespace_is_a_config_error() {
        let args = ExporterArgs {
            namespace: Some("my-app".into()),
            subsystem: None,
            labels: Vec::new(),
            taxonomy: None,
            no_instrument: false,
        };
        let err = build(&args).err().unwrap();
        assert_eq!(exit_code(&err), EXIT_CONFIG);
    }

    #[tokio::test]
    async fn validate_passes_on_a_fresh_registry() {
        let args = ExporterArgs {
            namespace: Some("test".into()),
            subsystem: Some("cli".into()),
            labels: vec![("env".into(), "ci".into())],
            taxonomy: None,
            no_instrument: false,
        };
        validate_cmd(args).await.unwrap();
    }
}
