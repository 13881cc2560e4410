use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use sqlx::SqlitePool;
use tracing::Instrument;

use super::{User, token::verify_token};
use crate::config::AppConfig;
use crate::db::users::get_user;
use crate::error::AppError;

/// Why the request guard refused a request; read back by the 401 catcher.
#[derive(Debug, Clone, Default)]
pub struct AuthFailure(pub Option<String>);

fn bearer_token<'a>(request: &'a Request<'_>) -> Option<&'a str> {
    request
        .headers()
        .get_one("Authorization")
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn reject(request: &Request<'_>, err: AppError) -> Outcome<User, AppError> {
    let status = err.status_code();
    request.local_cache(|| AuthFailure(Some(err.public_message())));
    Outcome::Error((status, err))
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = AppError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        authenticate(request)
            .instrument(tracing::info_span!("user_auth_guard"))
            .await
    }
}

async fn authenticate(request: &Request<'_>) -> Outcome<User, AppError> {
    let Some(token) = bearer_token(request) else {
        return reject(
            request,
            AppError::Authentication("Authentication required".to_string()),
        );
    };

    let (Some(pool), Some(config)) = (
        request.rocket().state::<SqlitePool>(),
        request.rocket().state::<AppConfig>(),
    ) else {
        tracing::error!("Database pool or configuration missing from managed state");
        return reject(
            request,
            AppError::Internal("Server misconfigured".to_string()),
        );
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(claims) => claims,
        Err(err) => {
            tracing::warn!(error = %err, "Rejected bearer token");
            return reject(
                request,
                AppError::Authentication("Invalid or expired token".to_string()),
            );
        }
    };

    let user_id = match claims.user_id() {
        Ok(id) => id,
        Err(err) => return reject(request, err),
    };

    match get_user(pool, user_id).await {
        Ok(user) if user.is_active() => {
            tracing::info!(user_id = user.id, role = %user.role, "User authenticated via bearer token");
            Outcome::Success(user)
        }
        Ok(user) => {
            tracing::warn!(user_id = user.id, status = %user.status, "Token for inactive account");
            reject(
                request,
                AppError::Authentication("Account is not active".to_string()),
            )
        }
        Err(AppError::NotFound(_)) => reject(
            request,
            AppError::Authentication("Invalid or expired token".to_string()),
        ),
        Err(err) => {
            tracing::error!(user_id, error = %err, "Failed to load user for valid token");
            reject(request, err)
        }
    }
}
