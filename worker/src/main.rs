//! Reconciliation worker.
//!
//! Wires the `PostgreSQL` repositories and the UNAB client into the four
//! pipeline jobs and runs them on their intervals until interrupted.

mod config;
mod sink;

use anyhow::Context;
use bookings_core::repository::{
    Clock, ClosureRepository, HolidayCalendar, NotificationSink, ReservationRepository,
    ScheduleRepository, SpaceCatalog, SubscriptionRepository, SystemClock,
};
use bookings_core::ConfigurationResolver;
use bookings_pipeline::{
    ClosureSyncJob, DigestJob, ExpiryJob, PipelineConfig, ReconciliationGateway, ReportingJob,
    RetryPolicy, Scheduler,
};
use bookings_postgres::{
    PgClosureRepository, PgHolidayCalendar, PgReservationRepository, PgScheduleRepository,
    PgSpaceCatalog, PgSubscriptionRepository,
};
use bookings_unab::{UnabClient, UnabConfig};
use config::Config;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    if config.metrics.enabled {
        let addr: SocketAddr = format!("{}:{}", config.metrics.host, config.metrics.port)
            .parse()
            .context("invalid metrics bind address")?;
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("could not install Prometheus exporter")?;
        tracing::info!(%addr, "metrics exporter listening");
    }

    let pool = bookings_postgres::connect(&config.database.url, config.database.max_connections)
        .await
        .context("could not connect to the database")?;
    tracing::info!(
        max_connections = config.database.max_connections,
        "database pool ready"
    );

    let schedules: Arc<dyn ScheduleRepository> =
        Arc::new(PgScheduleRepository::new(pool.clone()));
    let closures: Arc<dyn ClosureRepository> = Arc::new(PgClosureRepository::new(pool.clone()));
    let reservations: Arc<dyn ReservationRepository> =
        Arc::new(PgReservationRepository::new(pool.clone()));
    let subscriptions: Arc<dyn SubscriptionRepository> =
        Arc::new(PgSubscriptionRepository::new(pool.clone()));
    let catalog: Arc<dyn SpaceCatalog> = Arc::new(PgSpaceCatalog::new(pool.clone()));
    let holidays: Arc<dyn HolidayCalendar> = Arc::new(PgHolidayCalendar::new(pool));
    let resolver = ConfigurationResolver::new(Arc::clone(&schedules), holidays);

    let unab = UnabClient::new(UnabConfig {
        base_url: config.unab.base_url.clone(),
        username: config.unab.username.clone(),
        password: config.unab.password.clone(),
        connect_timeout: config.unab.connect_timeout(),
        request_timeout: config.unab.request_timeout(),
    })
    .context("could not build UNAB client")?;
    let gateway: Arc<dyn ReconciliationGateway> = Arc::new(unab);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let sink: Arc<dyn NotificationSink> = Arc::new(sink::LogSink);
    let pipeline = PipelineConfig {
        chunk_size: config.jobs.chunk_size,
        expiry_grace_minutes: config.jobs.expiry_grace_minutes,
        closure_window_days: config.jobs.closure_window_days,
        quarantine_threshold: config.jobs.quarantine_threshold,
    };
    let retry = RetryPolicy::default();

    let mut scheduler = Scheduler::new();
    scheduler.register(
        Arc::new(ExpiryJob::new(
            Arc::clone(&reservations),
            Arc::clone(&gateway),
            Arc::clone(&clock),
            pipeline,
            retry.clone(),
        )),
        Duration::from_secs(config.jobs.expiry_interval_secs),
    );
    scheduler.register(
        Arc::new(ClosureSyncJob::new(
            Arc::clone(&catalog),
            closures,
            resolver,
            Arc::clone(&gateway),
            Arc::clone(&clock),
            pipeline,
            retry.clone(),
        )),
        Duration::from_secs(config.jobs.closure_sync_interval_secs),
    );
    scheduler.register(
        Arc::new(ReportingJob::new(
            Arc::clone(&reservations),
            Arc::clone(&subscriptions),
            catalog,
            gateway,
            pipeline,
            retry,
        )),
        Duration::from_secs(config.jobs.reporting_interval_secs),
    );
    scheduler.register(
        Arc::new(DigestJob::new(
            reservations,
            subscriptions,
            sink,
            clock,
            pipeline,
        )),
        Duration::from_secs(config.jobs.digest_interval_secs),
    );

    let handle = scheduler.spawn();
    tracing::info!("reconciliation worker started");

    tokio::signal::ctrl_c()
        .await
        .context("could not listen for shutdown signal")?;
    tracing::info!("shutdown signal received, draining jobs");
    handle.shutdown().await;
    tracing::info!("worker stopped");

    Ok(())
}
