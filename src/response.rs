use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// JSON envelope shared by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
            pagination: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            error: Some(error.into()),
            pagination: None,
        }
    }
}

pub type ApiResult<T> = Result<Custom<Json<ApiResponse<T>>>, AppError>;

pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Custom(Status::Ok, Json(ApiResponse::success(data))))
}

pub fn ok_with_message<T>(data: T, message: &str) -> ApiResult<T> {
    Ok(Custom(
        Status::Ok,
        Json(ApiResponse::success(data).with_message(message)),
    ))
}

pub fn created<T>(data: T, message: &str) -> ApiResult<T> {
    Ok(Custom(
        Status::Created,
        Json(ApiResponse::success(data).with_message(message)),
    ))
}

pub fn message_only(message: &str) -> ApiResult<()> {
    Ok(Custom(
        Status::Ok,
        Json(ApiResponse {
            success: true,
            data: None,
            message: Some(message.to_string()),
            error: None,
            pagination: None,
        }),
    ))
}

pub fn paginated<T>(data: T, page: &PageRequest, total: i64) -> ApiResult<T> {
    let mut body = ApiResponse::success(data);
    body.pagination = Some(page.pagination(total));
    Ok(Custom(Status::Ok, Json(body)))
}

/// Normalized `page`/`limit` query values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }

    pub fn pagination(&self, total: i64) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
            total,
            total_pages: (total + self.limit - 1) / self.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_clamps_inputs() {
        let page = PageRequest::new(Some(0), Some(500));
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, MAX_PAGE_SIZE);

        let page = PageRequest::new(None, None);
        assert_eq!(page.limit, DEFAULT_PAGE_SIZE);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn total_pages_rounds_up() {
        let page = PageRequest::new(Some(2), Some(10));
        assert_eq!(page.offset(), 10);
        assert_eq!(page.pagination(21).total_pages, 3);
        assert_eq!(page.pagination(20).total_pages, 2);
        assert_eq!(page.pagination(0).total_pages, 0);
    }

    #[test]
    fn failure_envelope_omits_data() {
        let body = serde_json::to_value(ApiResponse::<()>::failure("nope")).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "nope");
        assert!(body.get("data").is_none());
        assert!(body.get("pagination").is_none());
    }
}
