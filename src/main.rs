use anyhow::Result;
use statlog::*;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting {}",
        env!("CARGO_PKG_NAME")
    );

    let app_config = config::AppConfig::load()?;
    let stat_repo = Arc::new(
        stat_repo::StatRepo::connect(
            &app_config.database.path,
            app_config.database.max_pool_size,
        )
        .await?,
    );
    stat_repo.init().await?;

    let (sampler_shutdown_tx, sampler_shutdown_rx) = oneshot::channel();
    let sampler_handle = if app_config.hyper_v.enabled {
        let sampler = sampler::PeriodicSampler::new(
            app_config.hyper_v.sampler_config(),
            Arc::new(perf_counter::ProcessRunner),
            stat_repo.clone(),
        )?;
        tracing::info!(
            interval_secs = app_config.hyper_v.interval_secs,
            virtual_machines = app_config.hyper_v.virtual_machines.len(),
            "Hyper-V sampler started"
        );
        Some(sampler::spawn(sampler, sampler_shutdown_rx))
    } else {
        tracing::info!("Hyper-V sampler disabled");
        None
    };

    let (mqtt_shutdown_tx, mqtt_shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Received shutdown signal");
        let _ = mqtt_shutdown_tx.send(());
        let _ = sampler_shutdown_tx.send(());
    });

    let ingestor = ingestor::MessageIngestor::new(stat_repo.clone());
    mqtt::run(&app_config.mqtt, &ingestor, mqtt_shutdown_rx).await;

    if let Some(handle) = sampler_handle {
        let _ = handle.await;
    }
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
