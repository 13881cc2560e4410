use sqlx::{Pool, QueryBuilder, Sqlite};
use tracing::{info, instrument};

use crate::auth::{Role, User};
use crate::error::AppError;
use crate::models::{NewProgram, Program, ProgramChanges, ProgramStatus};
use crate::response::PageRequest;

const PROGRAM_SELECT: &str = "
    SELECT p.id, p.name, p.description, p.coach_id, coach.name AS coach_name,
           p.client_id, client.name AS client_name, p.program_type, p.status,
           p.difficulty, p.duration_weeks, p.sessions_per_week, p.start_date, p.end_date,
           (SELECT COUNT(*) FROM workouts w WHERE w.program_id = p.id) AS workout_count,
           p.created_at, p.updated_at
    FROM programs p
    JOIN users coach ON coach.id = p.coach_id
    LEFT JOIN users client ON client.id = p.client_id";

#[derive(Debug, Clone, Default)]
pub struct ProgramFilter {
    pub status: Option<ProgramStatus>,
    pub client_id: Option<i64>,
}

#[instrument(skip(pool))]
pub async fn get_program(pool: &Pool<Sqlite>, id: i64) -> Result<Program, AppError> {
    info!("Fetching program");
    sqlx::query_as::<_, Program>(&format!("{} WHERE p.id = ?", PROGRAM_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Program not found".to_string()))
}

fn push_scope(qb: &mut QueryBuilder<'_, Sqlite>, viewer: &User, filter: &ProgramFilter) {
    qb.push(" WHERE 1 = 1");
    match viewer.role {
        Role::Admin => {}
        Role::Coach => {
            qb.push(" AND p.coach_id = ").push_bind(viewer.id);
        }
        Role::Client => {
            qb.push(" AND p.client_id = ").push_bind(viewer.id);
        }
    }
    if let Some(status) = filter.status {
        qb.push(" AND p.status = ").push_bind(status.as_str());
    }
    if let Some(client_id) = filter.client_id {
        qb.push(" AND p.client_id = ").push_bind(client_id);
    }
}

/// Programs visible to `viewer`: a client's assigned programs, a coach's own
/// programs, or everything for admins.
#[instrument(skip(pool, viewer), fields(viewer_id = viewer.id))]
pub async fn list_programs(
    pool: &Pool<Sqlite>,
    viewer: &User,
    filter: &ProgramFilter,
    page: &PageRequest,
) -> Result<(Vec<Program>, i64), AppError> {
    info!("Listing programs");
    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM programs p");
    push_scope(&mut count, viewer, filter);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut query = QueryBuilder::<Sqlite>::new(PROGRAM_SELECT);
    push_scope(&mut query, viewer, filter);
    query
        .push(" ORDER BY p.created_at DESC, p.id DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let programs = query.build_query_as::<Program>().fetch_all(pool).await?;
    Ok((programs, total))
}

#[instrument(skip(pool, program), fields(coach_id = program.coach_id))]
pub async fn create_program(pool: &Pool<Sqlite>, program: &NewProgram) -> Result<i64, AppError> {
    info!("Creating program");
    let result = sqlx::query(
        "INSERT INTO programs
            (name, description, coach_id, client_id, program_type, difficulty,
             duration_weeks, sessions_per_week, status, start_date, end_date)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&program.name)
    .bind(&program.description)
    .bind(program.coach_id)
    .bind(program.client_id)
    .bind(program.program_type.as_str())
    .bind(program.difficulty.map(|d| d.as_str()))
    .bind(program.duration_weeks)
    .bind(program.sessions_per_week)
    .bind(program.status.as_str())
    .bind(program.start_date)
    .bind(program.end_date)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

#[instrument(skip(pool, changes))]
pub async fn update_program(
    pool: &Pool<Sqlite>,
    id: i64,
    changes: &ProgramChanges,
) -> Result<(), AppError> {
    info!("Updating program");
    sqlx::query(
        "UPDATE programs SET
            name = COALESCE(?, name),
            description = COALESCE(?, description),
            program_type = COALESCE(?, program_type),
            difficulty = COALESCE(?, difficulty),
            duration_weeks = COALESCE(?, duration_weeks),
            sessions_per_week = COALESCE(?, sessions_per_week),
            status = COALESCE(?, status),
            start_date = COALESCE(?, start_date),
            end_date = COALESCE(?, end_date),
            updated_at = CURRENT_TIMESTAMP
         WHERE id = ?",
    )
    .bind(&changes.name)
    .bind(&changes.description)
    .bind(changes.program_type.map(|t| t.as_str()))
    .bind(changes.difficulty.map(|d| d.as_str()))
    .bind(changes.duration_weeks)
    .bind(changes.sessions_per_week)
    .bind(changes.status.map(|s| s.as_str()))
    .bind(changes.start_date)
    .bind(changes.end_date)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Assigns the program to a client and activates drafts in one statement.
#[instrument(skip(pool))]
pub async fn assign_program(pool: &Pool<Sqlite>, id: i64, client_id: i64) -> Result<(), AppError> {
    info!("Assigning program to client");
    sqlx::query(
        "UPDATE programs SET
            client_id = ?,
            status = CASE WHEN status = 'draft' THEN 'active' ELSE status END,
            updated_at = CURRENT_TIMESTAMP
         WHERE id = ?",
    )
    .bind(client_id)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Hard delete; the schema cascades to the program's workouts.
#[instrument(skip(pool))]
pub async fn delete_program(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting program");
    let result = sqlx::query("DELETE FROM programs WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Program not found".to_string()));
    }
    Ok(())
}
