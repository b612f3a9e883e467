use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::role::Role;
use crate::model::user::UserResponse;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterReq {
    #[schema(example = "Siti Rahma")]
    pub name: String,
    #[schema(example = "siti@company.com", format = "email")]
    pub email: String,
    #[schema(example = "correct-horse-battery")]
    pub password: String,
    /// Defaults to EMPLOYEE
    pub role: Option<Role>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "siti@company.com", format = "email")]
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserResponse,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    /// email at issue time
    pub sub: String,
    pub role: Role,
    pub exp: usize,
    pub jti: String,

    pub token_type: TokenType,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}
