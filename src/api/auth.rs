use rocket::State;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::token::issue_token;
use crate::auth::{Role, User, UserStatus, UserWithProfile};
use crate::config::AppConfig;
use crate::db::users::{
    NewUser, authenticate_user, create_user, get_profile, get_user, update_user_password,
    verify_password,
};
use crate::error::AppError;
use crate::response::{ApiResult, created, message_only, ok, ok_with_message};
use crate::validation::{JsonBody, JsonValidateExt, non_blank, require_email};

pub fn routes() -> Vec<rocket::Route> {
    routes![register, login, me, logout, change_password]
}

#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    pub email: String,
    #[validate(length(min = 6, message = "must be at least 6 characters"))]
    pub password: String,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub name: String,
    pub role: Option<Role>,
    pub phone: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Validate)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    #[validate(length(min = 6, message = "must be at least 6 characters"))]
    pub new_password: String,
}

#[derive(Serialize)]
pub struct AuthPayload {
    pub token: String,
    pub user: User,
}

#[post("/register", data = "<body>")]
pub async fn register(
    body: JsonBody<'_, RegisterRequest>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> ApiResult<AuthPayload> {
    let request = body.validated()?;

    let email = require_email(&request.email)?;
    let name = non_blank("name", &request.name)?;
    let role = request.role.unwrap_or(Role::Client);
    if !role.is_self_assignable() {
        return Err(AppError::Validation(
            "role: must be client or coach".to_string(),
        ));
    }

    let user_id = create_user(
        db,
        &NewUser {
            email,
            password: request.password,
            name,
            role,
            phone: request.phone,
            coach_id: None,
            status: UserStatus::Active,
        },
        config.bcrypt_cost,
    )
    .await?;

    let user = get_user(db, user_id).await?;
    let token = issue_token(&user, &config.jwt_secret, config.token_ttl_hours)?;
    tracing::info!(user_id, role = %user.role, "User registered");

    created(AuthPayload { token, user }, "Registration successful")
}

#[post("/login", data = "<body>")]
pub async fn login(
    body: JsonBody<'_, LoginRequest>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> ApiResult<AuthPayload> {
    let request = body.validated()?;

    let Some(user) = authenticate_user(db, request.email.trim(), &request.password).await? else {
        return Err(AppError::Authentication(
            "Invalid email or password".to_string(),
        ));
    };

    let token = issue_token(&user, &config.jwt_secret, config.token_ttl_hours)?;
    ok_with_message(AuthPayload { token, user }, "Login successful")
}

#[get("/me")]
pub async fn me(user: User, db: &State<Pool<Sqlite>>) -> ApiResult<UserWithProfile> {
    let profile = get_profile(db, user.id).await?;
    ok(UserWithProfile { user, profile })
}

/// Tokens are stateless; the client discards its copy.
#[post("/logout")]
pub async fn logout(user: User) -> ApiResult<()> {
    tracing::info!(user_id = user.id, "User logged out");
    message_only("Logged out successfully")
}

#[post("/change-password", data = "<body>")]
pub async fn change_password(
    body: JsonBody<'_, ChangePasswordRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> ApiResult<()> {
    let request = body.validated()?;

    if !verify_password(db, user.id, &request.current_password).await? {
        return Err(AppError::Validation(
            "current_password: is incorrect".to_string(),
        ));
    }

    update_user_password(db, user.id, &request.new_password, config.bcrypt_cost).await?;
    message_only("Password updated successfully")
}
