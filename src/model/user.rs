use chrono::NaiveDateTime;
use serde::Serialize;
use utoipa::ToSchema;

use super::role::Role;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    /// argon2 PHC string, never serialized
    pub password: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub shift_id: Option<u64>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 7,
    "name": "Siti Rahma",
    "email": "siti@company.com",
    "role": "EMPLOYEE",
    "shiftId": 2,
    "createdAt": "2026-01-05T08:00:00"
}))]
pub struct UserResponse {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub shift_id: Option<u64>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            shift_id: user.shift_id,
            created_at: user.created_at,
        }
    }
}

/// The slice of a user embedded in shift listings.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: u64,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub shift_id: Option<u64>,
}
