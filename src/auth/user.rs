use chrono::NaiveDateTime;
use serde::Serialize;

use super::{Permission, Role};
use crate::error::AppError;
use crate::models::{Difficulty, string_enum, utc};

string_enum! {
    UserStatus("user status") {
        Active => "active",
        Inactive => "inactive",
        Pending => "pending",
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub coach_id: Option<i64>,
    pub status: UserStatus,
    #[serde(serialize_with = "utc::serialize")]
    pub created_at: NaiveDateTime,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbUser {
    pub id: Option<i64>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub coach_id: Option<i64>,
    pub status: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbUser> for User {
    fn from(user: DbUser) -> Self {
        Self {
            id: user.id.unwrap_or_default(),
            email: user.email.unwrap_or_default(),
            name: user.name.unwrap_or_default(),
            role: user
                .role
                .and_then(|r| r.parse().ok())
                .unwrap_or(Role::Client),
            phone: user.phone,
            coach_id: user.coach_id,
            status: user
                .status
                .and_then(|s| s.parse().ok())
                .unwrap_or(UserStatus::Inactive),
            created_at: user.created_at.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Clone, Default, sqlx::FromRow)]
pub struct UserProfile {
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub body_fat_percentage: Option<f64>,
    pub fitness_level: Option<String>,
    pub goals: Option<String>,
    pub medical_conditions: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub body_fat_percentage: Option<f64>,
    pub fitness_level: Option<Difficulty>,
    pub goals: Option<String>,
    pub medical_conditions: Option<String>,
    pub bio: Option<String>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.height_cm.is_none()
            && self.weight_kg.is_none()
            && self.body_fat_percentage.is_none()
            && self.fitness_level.is_none()
            && self.goals.is_none()
            && self.medical_conditions.is_none()
            && self.bio.is_none()
    }
}

#[derive(Debug, Serialize)]
pub struct UserWithProfile {
    #[serde(flatten)]
    pub user: User,
    pub profile: Option<UserProfile>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.has_permission(permission)
    }

    pub fn require_permission(&self, permission: Permission) -> Result<(), AppError> {
        if self.role.has_permission(permission) {
            Ok(())
        } else {
            tracing::warn!(
                user_id = self.id,
                role = %self.role,
                permission = ?permission,
                "Permission denied"
            );
            Err(AppError::Authorization(
                "You don't have permission to perform this action".to_string(),
            ))
        }
    }
}
