pub mod appointments;
pub mod auth;
pub mod exercises;
pub mod messages;
pub mod notifications;
pub mod nutrition;
pub mod programs;
pub mod stats;
pub mod users;
pub mod workouts;

use rocket::Request;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use tracing::warn;

use crate::auth::AuthFailure;
use crate::response::ApiResponse;

type ErrorBody = Custom<Json<ApiResponse<()>>>;

fn error_body(status: Status, message: impl Into<String>) -> ErrorBody {
    Custom(status, Json(ApiResponse::failure(message)))
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}

#[catch(400)]
pub fn bad_request(req: &Request) -> ErrorBody {
    warn!(uri = %req.uri(), "Bad request");
    error_body(Status::BadRequest, "Bad request")
}

#[catch(401)]
pub fn unauthorized(req: &Request) -> ErrorBody {
    let reason = req
        .local_cache(AuthFailure::default)
        .0
        .clone()
        .unwrap_or_else(|| "Authentication required".to_string());
    warn!(uri = %req.uri(), reason = %reason, "Unauthorized access attempt");
    error_body(Status::Unauthorized, reason)
}

#[catch(403)]
pub fn forbidden(req: &Request) -> ErrorBody {
    warn!(uri = %req.uri(), "Forbidden access attempt");
    error_body(Status::Forbidden, "Forbidden")
}

#[catch(404)]
pub fn not_found(req: &Request) -> ErrorBody {
    warn!(uri = %req.uri(), "No route matched");
    error_body(Status::NotFound, "Resource not found")
}

#[catch(422)]
pub fn unprocessable(req: &Request) -> ErrorBody {
    warn!(uri = %req.uri(), "Request could not be parsed");
    error_body(Status::UnprocessableEntity, "Invalid request parameters")
}

#[catch(500)]
pub fn internal_error(req: &Request) -> ErrorBody {
    tracing::error!(uri = %req.uri(), "Unhandled server error");
    error_body(Status::InternalServerError, "Internal server error")
}
