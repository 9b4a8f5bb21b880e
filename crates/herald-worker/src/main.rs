//! herald-worker: runs the poll and notification workers until Ctrl-C.

mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use herald_core::app::{App, WorkerPlan};
use herald_core::config::{QueueBackend, Settings};
use herald_core::domain::QueueName;
use herald_core::impls::{
    HttpStatusOracle, InMemoryJobStore, LogMailer, RedisJobStore, SmtpMailer,
};
use herald_core::ports::{JobStore, Mailer};
use tracing::{info, warn};

const STATS_INTERVAL: Duration = Duration::from_secs(60);

async fn build_store(settings: &Settings) -> anyhow::Result<Arc<dyn JobStore>> {
    match settings.queue_backend {
        QueueBackend::Memory => {
            warn!("using the in-memory job store; queued jobs are lost on exit");
            Ok(Arc::new(InMemoryJobStore::new()))
        }
        QueueBackend::Redis => {
            let url = settings
                .redis_url
                .as_deref()
                .context("REDIS_URL is required for the redis backend")?;
            let store = RedisJobStore::connect(
                url,
                settings.queue_prefix.clone(),
                settings.store_poll_interval(),
            )
            .await
            .context("connecting to redis")?;
            Ok(Arc::new(store))
        }
    }
}

fn build_mailer(settings: &Settings) -> anyhow::Result<Arc<dyn Mailer>> {
    match settings.smtp()? {
        Some(smtp) => {
            let mailer = SmtpMailer::new(&smtp).context("building smtp transport")?;
            info!(
                host = %smtp.host,
                port = ?smtp.port,
                tls = ?smtp.tls,
                authenticated = smtp.credentials.is_some(),
                "smtp mailer configured"
            );
            Ok(Arc::new(mailer))
        }
        None => {
            warn!("SMTP_HOST is not set; completion emails are written to the log and not sent");
            Ok(Arc::new(LogMailer))
        }
    }
}

async fn log_queue_stats(store: &dyn JobStore) {
    for queue in QueueName::ALL {
        match store.counts(queue).await {
            Ok(counts) => info!(
                %queue,
                ready = counts.ready,
                scheduled = counts.scheduled,
                in_flight = counts.in_flight,
                completed = counts.completed,
                failed = counts.failed,
                "queue stats"
            ),
            Err(err) => warn!(%queue, error = %err, "queue stats unavailable"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();
    let settings = Settings::from_env();
    telemetry::init(settings.as_ref().map(|s| s.log_format).unwrap_or_default());
    let settings = settings.context("loading configuration")?;

    if let Ok(path) = &dotenv {
        info!(path = %path.display(), "loaded environment file");
    }

    let store = build_store(&settings).await?;
    let oracle = Arc::new(
        HttpStatusOracle::new(
            &settings.task_api_endpoint,
            &settings.oracle_status_path,
            settings.oracle_timeout(),
        )
        .context("building status oracle client")?,
    );
    info!(url = oracle.url(), "status oracle configured");

    let mailer = build_mailer(&settings)?;

    let app = App::standard(&settings, Arc::clone(&store), oracle, mailer)?;
    let group = app.start(&WorkerPlan::from_settings(&settings))?;
    info!(
        task_workers = settings.task_workers,
        notification_workers = settings.notification_workers,
        backend = ?settings.queue_backend,
        "herald workers running"
    );

    let mut stats = tokio::time::interval(STATS_INTERVAL);
    stats.tick().await;
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("listening for shutdown signal")?;
                break;
            }
            _ = stats.tick() => log_queue_stats(store.as_ref()).await,
        }
    }

    info!("shutdown requested, waiting for in-flight jobs");
    group.shutdown_and_join().await;
    info!("herald workers stopped");
    Ok(())
}
