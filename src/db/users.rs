use sqlx::{Pool, QueryBuilder, Sqlite};
use tracing::{info, instrument};

use crate::auth::{DbUser, ProfileChanges, Role, User, UserProfile, UserStatus};
use crate::error::AppError;
use crate::response::PageRequest;

const USER_COLUMNS: &str = "u.id, u.email, u.name, u.role, u.phone, u.coach_id, u.status, u.created_at";

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub coach_id: Option<i64>,
    pub status: UserStatus,
}

#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    pub coach_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    pub search: Option<String>,
    /// Restricts results to clients linked to this coach.
    pub linked_to_coach: Option<i64>,
}

#[instrument(skip(pool))]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {} FROM users u WHERE u.id = ?",
        USER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::NotFound("User not found".to_string())),
    }
}

#[instrument(skip(pool))]
pub async fn find_user_by_email(pool: &Pool<Sqlite>, email: &str) -> Result<Option<User>, AppError> {
    info!("Looking up user by email");
    let row = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {} FROM users u WHERE u.email = ? COLLATE NOCASE",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(User::from))
}

/// Returns the user only when the password matches and the account is
/// active. Every other outcome is `None` so callers cannot tell them apart.
#[instrument(skip(pool, password))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    email: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");
    let Some(user) = find_user_by_email(pool, email).await? else {
        return Ok(None);
    };

    let hash: String = sqlx::query_scalar("SELECT password_hash FROM users WHERE id = ?")
        .bind(user.id)
        .fetch_one(pool)
        .await?;

    if !bcrypt::verify(password, &hash)? || !user.is_active() {
        return Ok(None);
    }

    Ok(Some(user))
}

#[instrument(skip(pool, password))]
pub async fn verify_password(pool: &Pool<Sqlite>, user_id: i64, password: &str) -> Result<bool, AppError> {
    let hash: String = sqlx::query_scalar("SELECT password_hash FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    Ok(bcrypt::verify(password, &hash)?)
}

#[instrument(skip(pool, user), fields(email = %user.email, role = %user.role))]
pub async fn create_user(pool: &Pool<Sqlite>, user: &NewUser, bcrypt_cost: u32) -> Result<i64, AppError> {
    info!("Creating user");
    let password_hash = bcrypt::hash(&user.password, bcrypt_cost)?;

    let result = sqlx::query(
        "INSERT INTO users (email, password_hash, name, role, phone, coach_id, status)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user.email.to_lowercase())
    .bind(password_hash)
    .bind(&user.name)
    .bind(user.role.as_str())
    .bind(&user.phone)
    .bind(user.coach_id)
    .bind(user.status.as_str())
    .execute(pool)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict("Email is already registered".to_string()),
        other => other,
    })?;

    Ok(result.last_insert_rowid())
}

#[instrument(skip_all, fields(user_id))]
pub async fn update_user_password(
    pool: &Pool<Sqlite>,
    user_id: i64,
    new_password: &str,
    bcrypt_cost: u32,
) -> Result<(), AppError> {
    info!("Updating user password");
    let hashed_password = bcrypt::hash(new_password, bcrypt_cost)?;

    sqlx::query("UPDATE users SET password_hash = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(hashed_password)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn update_user(pool: &Pool<Sqlite>, user_id: i64, changes: &UserChanges) -> Result<(), AppError> {
    info!("Updating user");
    sqlx::query(
        "UPDATE users SET
            email = COALESCE(?, email),
            name = COALESCE(?, name),
            phone = COALESCE(?, phone),
            role = COALESCE(?, role),
            status = COALESCE(?, status),
            coach_id = COALESCE(?, coach_id),
            updated_at = CURRENT_TIMESTAMP
         WHERE id = ?",
    )
    .bind(changes.email.as_ref().map(|e| e.to_lowercase()))
    .bind(&changes.name)
    .bind(&changes.phone)
    .bind(changes.role.map(|r| r.as_str()))
    .bind(changes.status.map(|s| s.as_str()))
    .bind(changes.coach_id)
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict("Email is already registered".to_string()),
        other => other,
    })?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn set_user_status(pool: &Pool<Sqlite>, user_id: i64, status: UserStatus) -> Result<(), AppError> {
    info!("Setting user status");
    sqlx::query("UPDATE users SET status = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(status.as_str())
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

fn push_user_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &UserFilter) {
    qb.push(" WHERE 1 = 1");

    if let Some(role) = filter.role {
        qb.push(" AND u.role = ").push_bind(role.as_str());
    }
    if let Some(status) = filter.status {
        qb.push(" AND u.status = ").push_bind(status.as_str());
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        qb.push(" AND (u.name LIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.email LIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(coach_id) = filter.linked_to_coach {
        qb.push(" AND u.role = 'client' AND (u.coach_id = ")
            .push_bind(coach_id)
            .push(" OR EXISTS (SELECT 1 FROM programs p WHERE p.client_id = u.id AND p.coach_id = ")
            .push_bind(coach_id)
            .push(") OR EXISTS (SELECT 1 FROM appointments a WHERE a.client_id = u.id AND a.coach_id = ")
            .push_bind(coach_id)
            .push("))");
    }
}

#[instrument(skip(pool))]
pub async fn list_users(
    pool: &Pool<Sqlite>,
    filter: &UserFilter,
    page: &PageRequest,
) -> Result<(Vec<User>, i64), AppError> {
    info!("Listing users");
    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM users u");
    push_user_filters(&mut count, filter);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM users u", USER_COLUMNS));
    push_user_filters(&mut query, filter);
    query
        .push(" ORDER BY u.name, u.id LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let rows: Vec<DbUser> = query.build_query_as().fetch_all(pool).await?;

    Ok((rows.into_iter().map(User::from).collect(), total))
}

/// Unpaginated variant used by the coach and client pickers.
pub async fn list_all_users(pool: &Pool<Sqlite>, filter: &UserFilter) -> Result<Vec<User>, AppError> {
    let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM users u", USER_COLUMNS));
    push_user_filters(&mut query, filter);
    query.push(" ORDER BY u.name, u.id");

    let rows: Vec<DbUser> = query.build_query_as().fetch_all(pool).await?;
    Ok(rows.into_iter().map(User::from).collect())
}

#[instrument(skip(pool))]
pub async fn get_profile(pool: &Pool<Sqlite>, user_id: i64) -> Result<Option<UserProfile>, AppError> {
    let profile = sqlx::query_as::<_, UserProfile>(
        "SELECT height_cm, weight_kg, body_fat_percentage, fitness_level, goals,
                medical_conditions, bio
         FROM user_profiles WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(profile)
}

#[instrument(skip(pool, changes))]
pub async fn upsert_profile(
    pool: &Pool<Sqlite>,
    user_id: i64,
    changes: &ProfileChanges,
) -> Result<(), AppError> {
    info!("Updating user profile");
    sqlx::query(
        "INSERT INTO user_profiles
            (user_id, height_cm, weight_kg, body_fat_percentage, fitness_level, goals,
             medical_conditions, bio)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT (user_id) DO UPDATE SET
            height_cm = COALESCE(?2, height_cm),
            weight_kg = COALESCE(?3, weight_kg),
            body_fat_percentage = COALESCE(?4, body_fat_percentage),
            fitness_level = COALESCE(?5, fitness_level),
            goals = COALESCE(?6, goals),
            medical_conditions = COALESCE(?7, medical_conditions),
            bio = COALESCE(?8, bio),
            updated_at = CURRENT_TIMESTAMP",
    )
    .bind(user_id)
    .bind(changes.height_cm)
    .bind(changes.weight_kg)
    .bind(changes.body_fat_percentage)
    .bind(changes.fitness_level.map(|l| l.as_str()))
    .bind(&changes.goals)
    .bind(&changes.medical_conditions)
    .bind(&changes.bio)
    .execute(pool)
    .await?;

    Ok(())
}

/// Looks up an active account with the given role, used when a request
/// names the other party of a booking or program.
pub async fn get_active_user_with_role(
    pool: &Pool<Sqlite>,
    id: i64,
    role: Role,
) -> Result<Option<User>, AppError> {
    let user = match get_user(pool, id).await {
        Ok(user) => user,
        Err(AppError::NotFound(_)) => return Ok(None),
        Err(err) => return Err(err),
    };

    Ok((user.role == role && user.is_active()).then_some(user))
}
