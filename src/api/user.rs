use crate::{
    api::shift::find_shift,
    auth::{auth::AuthUser, handlers::USER_COLUMNS},
    error::{AppError, AppResult},
    model::user::{User, UserResponse},
    utils::{email_cache, email_filter},
};
use actix_web::{HttpResponse, Responder, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;

async fn find_user(pool: &MySqlPool, id: u64) -> AppResult<User> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("User"))
}

#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "All users", body = [UserResponse]),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn list_users(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<impl Responder> {
    auth.require_admin()?;

    let users: Vec<UserResponse> =
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY name"))
            .fetch_all(pool.get_ref())
            .await?
            .into_iter()
            .map(UserResponse::from)
            .collect();

    Ok(HttpResponse::Ok().json(users))
}

#[utoipa::path(
    get,
    path = "/api/users/profile",
    responses(
        (status = 200, description = "The caller with their shift", body = Object, example = json!({
            "user": {"id": 7, "name": "Siti Rahma", "email": "siti@company.com", "role": "EMPLOYEE", "shiftId": 2},
            "shift": {"id": 2, "name": "Morning", "startTime": "08:00", "endTime": "17:00"}
        })),
        (status = 404, description = "User no longer exists")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn profile(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<impl Responder> {
    let user = find_user(pool.get_ref(), auth.user_id).await?;
    let shift = match user.shift_id {
        Some(shift_id) => find_shift(pool.get_ref(), shift_id).await?,
        None => None,
    };

    Ok(HttpResponse::Ok().json(json!({
        "user": UserResponse::from(user),
        "shift": shift
    })))
}

#[utoipa::path(
    get,
    path = "/api/users/{user_id}",
    params(("user_id" = u64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn get_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<impl Responder> {
    auth.require_admin()?;

    let user = find_user(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

#[utoipa::path(
    delete,
    path = "/api/users/{user_id}",
    params(("user_id" = u64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted"),
        (status = 400, description = "Admins cannot delete themselves"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn delete_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<impl Responder> {
    auth.require_admin()?;

    let user_id = path.into_inner();
    if user_id == auth.user_id {
        return Err(AppError::bad_request("You cannot delete your own account"));
    }

    let user = find_user(pool.get_ref(), user_id).await?;

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(pool.get_ref())
        .await?;

    // Frees the address for re-registration.
    email_filter::remove(&user.email);
    email_cache::forget(&user.email).await;

    info!(user_id, admin_id = auth.user_id, "User deleted");

    Ok(HttpResponse::Ok().json(json!({ "message": "User deleted successfully" })))
}
