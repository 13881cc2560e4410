use rocket::State;
use serde::Deserialize;
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::policy::{require, require_visible};
use crate::auth::{
    Access, Permission, ProfileChanges, Resource, Role, User, UserStatus, UserWithProfile,
};
use crate::config::AppConfig;
use crate::db::stats::{UserStats, stats_for};
use crate::db::users::{
    NewUser, UserChanges, UserFilter, create_user, get_active_user_with_role, get_profile,
    get_user, list_all_users, list_users, set_user_status, update_user, upsert_profile,
};
use crate::error::AppError;
use crate::models::Difficulty;
use crate::response::{ApiResult, PageRequest, created, message_only, ok, paginated};
use crate::validation::{JsonBody, JsonValidateExt, non_blank, require_email};

pub fn routes() -> Vec<rocket::Route> {
    routes![
        list,
        coaches,
        clients,
        show,
        create,
        update,
        deactivate,
        user_stats
    ]
}

#[derive(FromForm)]
pub struct UsersQuery {
    page: Option<i64>,
    limit: Option<i64>,
    role: Option<String>,
    status: Option<String>,
    search: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct CreateUserRequest {
    pub email: String,
    #[validate(length(min = 6, message = "must be at least 6 characters"))]
    pub password: String,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub coach_id: Option<i64>,
}

#[derive(Deserialize, Validate)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    #[validate(length(min = 1, max = 100, message = "must be 1 to 100 characters"))]
    pub name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    pub coach_id: Option<i64>,
    #[validate(range(min = 50.0, max = 300.0, message = "must be between 50 and 300"))]
    pub height_cm: Option<f64>,
    #[validate(range(min = 20.0, max = 500.0, message = "must be between 20 and 500"))]
    pub weight_kg: Option<f64>,
    #[validate(range(min = 0.0, max = 100.0, message = "must be between 0 and 100"))]
    pub body_fat_percentage: Option<f64>,
    pub fitness_level: Option<Difficulty>,
    pub goals: Option<String>,
    pub medical_conditions: Option<String>,
    pub bio: Option<String>,
}

async fn require_active_coach(db: &Pool<Sqlite>, coach_id: i64) -> Result<(), AppError> {
    match get_active_user_with_role(db, coach_id, Role::Coach).await? {
        Some(_) => Ok(()),
        None => Err(AppError::Validation(
            "coach_id: must reference an active coach".to_string(),
        )),
    }
}

/// Admins see every account; coaches see the clients linked to them.
#[get("/?<q..>")]
pub async fn list(q: UsersQuery, user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Vec<User>> {
    user.require_permission(Permission::ViewLinkedClients)?;
    let page = PageRequest::new(q.page, q.limit);

    let mut filter = UserFilter {
        role: q.role.as_deref().map(str::parse).transpose()?,
        status: q.status.as_deref().map(str::parse).transpose()?,
        search: q.search,
        linked_to_coach: None,
    };
    if !user.has_permission(Permission::ViewAllUsers) {
        filter.role = Some(Role::Client);
        filter.linked_to_coach = Some(user.id);
    }

    let (users, total) = list_users(db, &filter, &page).await?;
    paginated(users, &page, total)
}

#[get("/coaches")]
pub async fn coaches(_user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Vec<User>> {
    let filter = UserFilter {
        role: Some(Role::Coach),
        status: Some(UserStatus::Active),
        ..Default::default()
    };
    ok(list_all_users(db, &filter).await?)
}

#[get("/clients")]
pub async fn clients(user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Vec<User>> {
    user.require_permission(Permission::ViewLinkedClients)?;

    let filter = UserFilter {
        role: Some(Role::Client),
        status: Some(UserStatus::Active),
        linked_to_coach: (!user.is_admin()).then_some(user.id),
        ..Default::default()
    };
    ok(list_all_users(db, &filter).await?)
}

async fn load_visible(
    db: &Pool<Sqlite>,
    actor: &User,
    id: i64,
) -> Result<User, AppError> {
    let target = get_user(db, id).await?;
    require_visible(
        db,
        actor,
        Resource::UserAccount {
            user_id: target.id,
            role: target.role,
        },
        Access::Read,
        "User",
    )
    .await?;
    Ok(target)
}

#[get("/<id>", rank = 2)]
pub async fn show(id: i64, user: User, db: &State<Pool<Sqlite>>) -> ApiResult<UserWithProfile> {
    let target = load_visible(db, &user, id).await?;
    let profile = get_profile(db, target.id).await?;
    ok(UserWithProfile {
        user: target,
        profile,
    })
}

#[post("/", data = "<body>")]
pub async fn create(
    body: JsonBody<'_, CreateUserRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> ApiResult<User> {
    user.require_permission(Permission::ManageUsers)?;
    let request = body.validated()?;

    if let Some(coach_id) = request.coach_id {
        require_active_coach(db, coach_id).await?;
    }

    let id = create_user(
        db,
        &NewUser {
            email: require_email(&request.email)?,
            password: request.password,
            name: non_blank("name", &request.name)?,
            role: request.role,
            phone: request.phone,
            coach_id: request.coach_id,
            status: UserStatus::Active,
        },
        config.bcrypt_cost,
    )
    .await?;

    created(get_user(db, id).await?, "User created successfully")
}

/// Updates account fields and upserts the profile. Role, status and coach
/// assignment are reserved for admins.
#[put("/<id>", data = "<body>")]
pub async fn update(
    id: i64,
    body: JsonBody<'_, UpdateUserRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<UserWithProfile> {
    let request = body.validated()?;
    let target = load_visible(db, &user, id).await?;
    require(
        db,
        &user,
        Resource::UserAccount {
            user_id: target.id,
            role: target.role,
        },
        Access::Write,
    )
    .await?;

    let touches_account_admin =
        request.role.is_some() || request.status.is_some() || request.coach_id.is_some();
    if touches_account_admin {
        user.require_permission(Permission::EditUserRoles)?;
    }
    if request.email.is_some() && user.id != target.id && !user.is_admin() {
        return Err(AppError::Authorization(
            "Only the account owner can change its email".to_string(),
        ));
    }
    if let Some(coach_id) = request.coach_id {
        require_active_coach(db, coach_id).await?;
    }

    let changes = UserChanges {
        email: request.email.as_deref().map(require_email).transpose()?,
        name: request
            .name
            .as_deref()
            .map(|n| non_blank("name", n))
            .transpose()?,
        phone: request.phone,
        role: request.role,
        status: request.status,
        coach_id: request.coach_id,
    };
    update_user(db, target.id, &changes).await?;

    let profile = ProfileChanges {
        height_cm: request.height_cm,
        weight_kg: request.weight_kg,
        body_fat_percentage: request.body_fat_percentage,
        fitness_level: request.fitness_level,
        goals: request.goals,
        medical_conditions: request.medical_conditions,
        bio: request.bio,
    };
    if !profile.is_empty() {
        upsert_profile(db, target.id, &profile).await?;
    }

    ok(UserWithProfile {
        user: get_user(db, target.id).await?,
        profile: get_profile(db, target.id).await?,
    })
}

/// Accounts are never removed; deactivation blocks login and revokes
/// outstanding tokens at the guard.
#[delete("/<id>")]
pub async fn deactivate(id: i64, user: User, db: &State<Pool<Sqlite>>) -> ApiResult<()> {
    user.require_permission(Permission::ManageUsers)?;
    if id == user.id {
        return Err(AppError::Validation(
            "You cannot deactivate your own account".to_string(),
        ));
    }

    let target = get_user(db, id).await?;
    set_user_status(db, target.id, UserStatus::Inactive).await?;
    tracing::info!(user_id = target.id, "User deactivated");
    message_only("User deactivated successfully")
}

#[get("/<id>/stats")]
pub async fn user_stats(id: i64, user: User, db: &State<Pool<Sqlite>>) -> ApiResult<UserStats> {
    let target = load_visible(db, &user, id).await?;
    ok(stats_for(db, target.id, target.role).await?)
}
