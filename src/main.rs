use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use farewatch::alerts;
use farewatch::config::FareWatchConfig;
use farewatch::quotes::AmadeusQuoteSource;
use farewatch::scheduler::{FareCheckScheduler, parse_schedule};
use farewatch::{FareEvaluator, PersistentCache, PriceRecordStore, telemetry};
use tokio::signal;

fn config_path_from_args() -> Result<Option<PathBuf>> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().context("--config requires a path")?;
                return Ok(Some(PathBuf::from(path)));
            }
            other => return Err(anyhow!("Unknown argument '{other}'")),
        }
    }
    Ok(None)
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        tracing::error!(panic = %info, "Unrecoverable failure, exiting");
        eprintln!("{info}");
        std::process::exit(1);
    }));
}

async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to listen for SIGTERM")?
            .recv()
            .await;
        Ok::<(), anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        result = ctrl_c => result,
        result = terminate => result,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    let _ = dotenvy::dotenv();

    let config = FareWatchConfig::load_from_path(config_path_from_args()?)
        .context("Failed to load configuration")?;

    let _telemetry_guard = telemetry::init(&config.logging)?;
    install_panic_hook();

    tracing::info!(
        version = farewatch::VERSION,
        routes = config.routes.len(),
        schedule = %config.schedule.expression,
        alerts = ?config.alerts.channel,
        "Starting error fare monitor"
    );

    let schedule = parse_schedule(&config.schedule.expression)?;

    let token_cache = config
        .amadeus
        .token_cache_path
        .as_ref()
        .map(|path| PersistentCache::open(path).map(Arc::new))
        .transpose()
        .context("Failed to open token cache")?;

    let quote_source = Arc::new(AmadeusQuoteSource::new(&config.amadeus, token_cache)?);
    let alert_sink = alerts::from_config(&config.alerts)?;
    let store = PriceRecordStore::new(&config.store.path).with_retention(config.store.retention_days);
    let evaluator = FareEvaluator::new(
        config.detection.min_seats,
        config.detection.discount_threshold,
    );

    let scheduler = Arc::new(
        FareCheckScheduler::new(
            config.routes.clone(),
            quote_source,
            store,
            evaluator,
            alert_sink,
        )
        .with_window_days(config.detection.window_days)
        .with_call_timeout(Duration::from_secs(u64::from(
            config.schedule.call_timeout_seconds,
        ))),
    );

    tokio::select! {
        () = scheduler.run(schedule, config.schedule.run_on_startup) => {}
        result = shutdown_signal() => {
            result?;
            tracing::info!("Shutdown signal received, exiting");
        }
    }

    Ok(())
}
