use chrono::Duration;
use serde::Serialize;
use sqlx::{FromRow, Pool, Sqlite};
use tracing::{info, instrument};

use crate::auth::Role;
use crate::db::appointments::now;
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ClientStats {
    pub active_programs: i64,
    pub completed_workouts: i64,
    pub upcoming_appointments: i64,
    pub meals_last_7_days: i64,
    pub unread_messages: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CoachStats {
    pub active_clients: i64,
    pub active_programs: i64,
    pub upcoming_appointments: i64,
    pub unread_messages: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct GlobalStats {
    pub total_clients: i64,
    pub total_coaches: i64,
    pub total_programs: i64,
    pub total_appointments: i64,
    pub completed_workouts: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum UserStats {
    Client(ClientStats),
    Coach(CoachStats),
    Global(GlobalStats),
}

#[instrument(skip(pool))]
pub async fn client_stats(pool: &Pool<Sqlite>, client_id: i64) -> Result<ClientStats, AppError> {
    info!("Computing client stats");
    let now = now();
    let week_ago = (now - Duration::days(7)).date();

    let stats = sqlx::query_as::<_, ClientStats>(
        "SELECT
            (SELECT COUNT(*) FROM programs WHERE client_id = ?1 AND status = 'active')
                AS active_programs,
            (SELECT COUNT(*) FROM workouts WHERE client_id = ?1 AND status = 'completed')
                AS completed_workouts,
            (SELECT COUNT(*) FROM appointments
                WHERE client_id = ?1 AND status IN ('scheduled', 'confirmed') AND scheduled_at >= ?2)
                AS upcoming_appointments,
            (SELECT COUNT(*) FROM meals WHERE client_id = ?1 AND date > ?3)
                AS meals_last_7_days,
            (SELECT COUNT(*) FROM messages WHERE recipient_id = ?1 AND read_at IS NULL)
                AS unread_messages",
    )
    .bind(client_id)
    .bind(now)
    .bind(week_ago)
    .fetch_one(pool)
    .await?;

    Ok(stats)
}

#[instrument(skip(pool))]
pub async fn coach_stats(pool: &Pool<Sqlite>, coach_id: i64) -> Result<CoachStats, AppError> {
    info!("Computing coach stats");
    let stats = sqlx::query_as::<_, CoachStats>(
        "SELECT
            (SELECT COUNT(*) FROM (
                SELECT client_id FROM programs
                    WHERE coach_id = ?1 AND status = 'active' AND client_id IS NOT NULL
                UNION
                SELECT id FROM users
                    WHERE coach_id = ?1 AND role = 'client' AND status = 'active'
            )) AS active_clients,
            (SELECT COUNT(*) FROM programs WHERE coach_id = ?1 AND status = 'active')
                AS active_programs,
            (SELECT COUNT(*) FROM appointments
                WHERE coach_id = ?1 AND status IN ('scheduled', 'confirmed') AND scheduled_at >= ?2)
                AS upcoming_appointments,
            (SELECT COUNT(*) FROM messages WHERE recipient_id = ?1 AND read_at IS NULL)
                AS unread_messages",
    )
    .bind(coach_id)
    .bind(now())
    .fetch_one(pool)
    .await?;

    Ok(stats)
}

#[instrument(skip(pool))]
pub async fn global_stats(pool: &Pool<Sqlite>) -> Result<GlobalStats, AppError> {
    info!("Computing global stats");
    let stats = sqlx::query_as::<_, GlobalStats>(
        "SELECT
            (SELECT COUNT(*) FROM users WHERE role = 'client' AND status = 'active') AS total_clients,
            (SELECT COUNT(*) FROM users WHERE role = 'coach' AND status = 'active') AS total_coaches,
            (SELECT COUNT(*) FROM programs) AS total_programs,
            (SELECT COUNT(*) FROM appointments) AS total_appointments,
            (SELECT COUNT(*) FROM workouts WHERE status = 'completed') AS completed_workouts",
    )
    .fetch_one(pool)
    .await?;

    Ok(stats)
}

/// Stats shaped by the subject's role.
pub async fn stats_for(pool: &Pool<Sqlite>, user_id: i64, role: Role) -> Result<UserStats, AppError> {
    Ok(match role {
        Role::Client => UserStats::Client(client_stats(pool, user_id).await?),
        Role::Coach => UserStats::Coach(coach_stats(pool, user_id).await?),
        Role::Admin => UserStats::Global(global_stats(pool).await?),
    })
}
