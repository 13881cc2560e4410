#[macro_use]
extern crate rocket;

mod api;
mod auth;
mod config;
mod db;
mod env;
mod error;
mod messaging;
mod models;
mod response;
mod scheduling;
mod telemetry;
mod validation;
#[cfg(test)]
mod test;

use std::time::Duration;

use config::{AppConfig, ConfigError};
use db::appointments::{complete_elapsed_appointments, now};
use rocket::fairing::AdHoc;
use rocket::{Build, Rocket, tokio};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use telemetry::{TelemetryFairing, init_tracing};
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Anyhow(anyhow::Error),
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("Failed to load environment: {0}")]
    Env(#[from] dotenvy::Error),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Database migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("{0}")]
    Rocket(#[from] Box<rocket::Error>),
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Error::Anyhow(value)
    }
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    let env_files = env::load_environment()?;
    let config = AppConfig::load()?;
    let _otel_guard = init_tracing(&config)?;
    info!(?env_files, ?config, "Configuration loaded");

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations completed successfully");

    init_rocket(pool, config)
        .launch()
        .await
        .map_err(Box::new)?;

    Ok(())
}

pub fn init_rocket(pool: SqlitePool, config: AppConfig) -> Rocket<Build> {
    info!("Starting CoachFit API");
    let sweep_interval = config.sweep_interval_secs;

    rocket::build()
        .manage(pool)
        .manage(config)
        .mount("/api/auth", api::auth::routes())
        .mount("/api/users", api::users::routes())
        .mount("/api/programs", api::programs::routes())
        .mount("/api/workouts", api::workouts::routes())
        .mount("/api/exercises", api::exercises::routes())
        .mount("/api/appointments", api::appointments::routes())
        .mount("/api/messages", api::messages::routes())
        .mount("/api/notifications", api::notifications::routes())
        .mount("/api/nutrition", api::nutrition::routes())
        .mount("/api", api::stats::routes())
        .mount("/api", routes![api::health])
        .register(
            "/",
            catchers![
                api::bad_request,
                api::unauthorized,
                api::forbidden,
                api::not_found,
                api::unprocessable,
                api::internal_error
            ],
        )
        .attach(TelemetryFairing)
        .attach(appointment_sweeper(sweep_interval))
}

/// Completes confirmed appointments that have ended, every `interval_secs`
/// until the server shuts down. An interval of zero disables it.
fn appointment_sweeper(interval_secs: u64) -> AdHoc {
    AdHoc::on_liftoff("Appointment sweeper", move |rocket| {
        Box::pin(async move {
            if interval_secs == 0 {
                info!("Appointment sweeper disabled");
                return;
            }
            let Some(pool) = rocket.state::<SqlitePool>().cloned() else {
                error!("Appointment sweeper has no database pool");
                return;
            };
            let shutdown = rocket.shutdown();

            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
                loop {
                    tokio::select! {
                        _ = shutdown.clone() => {
                            info!("Appointment sweeper stopped");
                            break;
                        }
                        _ = ticker.tick() => {
                            match complete_elapsed_appointments(&pool, now()).await {
                                Ok(0) => {}
                                Ok(count) => info!("Completed {} elapsed appointments", count),
                                Err(e) => error!("Failed to complete elapsed appointments: {}", e),
                            }
                        }
                    }
                }
            });
        })
    })
}
