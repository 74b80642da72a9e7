use std::sync::Arc;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;
use tokio::sync::watch;

mod api;
mod attendance;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod routes;
mod store;

use attendance::calendar::HolidayCalendar;
use attendance::finalizer::DailyFinalizer;
use attendance::leave_oracle::MySqlLeaveOracle;
use attendance::scheduler::{self, FinalizerSchedule};
use attendance::service::{AttendanceService, ServiceSettings};
use attendance::shift_registry::ShiftRegistry;
use config::Config;
use db::init_db;
use store::directory::MySqlEmployeeDirectory;
use store::mysql::MySqlAttendanceStore;

use crate::docs::ApiDoc;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Site attendance service"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(config.log_level)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config).await?;

    let shifts = match &config.shift_profiles_path {
        Some(path) => ShiftRegistry::from_json_file(path)?,
        None => ShiftRegistry::builtin(),
    };
    info!(profiles = shifts.len(), "Shift registry loaded");

    let calendar = HolidayCalendar::load(&pool)
        .await
        .context("loading holiday calendar")?;

    let service = AttendanceService::new(
        Arc::new(MySqlAttendanceStore::new(pool.clone())),
        Arc::new(MySqlLeaveOracle::new(pool.clone())),
        Arc::new(MySqlEmployeeDirectory::new(pool.clone())),
        Arc::new(calendar),
        Arc::new(shifts),
        ServiceSettings {
            store_timeout: config.store_timeout,
            geofence_radius_meters: config.geofence_radius_meters,
        },
    );
    let finalizer = DailyFinalizer::new(service.clone(), config.finalizer_concurrency);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    scheduler::spawn(
        finalizer.clone(),
        FinalizerSchedule {
            day_pass_at: config.finalizer_run_at,
            night_pass_at: config.night_finalizer_run_at,
        },
        shutdown_rx.clone(),
    );

    let server_addr = config.server_addr.clone();
    let service = Data::new(service);
    let finalizer = Data::new(finalizer);
    let shutdown_rx = Data::new(shutdown_rx);
    let config_data = Data::new(config);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(config_data.clone())
            .app_data(service.clone())
            .app_data(finalizer.clone())
            .app_data(shutdown_rx.clone())
            .service(index)
            .configure(|cfg| routes::configure(cfg, &config_data))
    })
    .bind(&server_addr)
    .with_context(|| format!("binding {server_addr}"))?
    .run()
    .await?;

    // Stops scheduled passes and any run between employees.
    let _ = shutdown_tx.send(true);
    info!("Server stopped");
    Ok(())
}
