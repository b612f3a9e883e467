use crate::{
    auth::{
        auth::bearer_token,
        jwt::{TokenSubject, generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::{AppError, AppResult, is_duplicate_key},
    model::{
        role::Role,
        user::{User, UserResponse},
    },
    models::{Claims, LoginReqDto, LoginResponse, RegisterReq, TokenPair, TokenType},
    utils::{email_cache, email_filter},
};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};

const MIN_PASSWORD_LEN: usize = 8;

pub(crate) const USER_COLUMNS: &str = "id, name, email, password, role, shift_id, created_at";

pub(crate) fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// Checks the request body and returns the normalized email.
fn validate_registration(req: &RegisterReq, config: &Config) -> AppResult<String> {
    if req.name.trim().is_empty() {
        return Err(AppError::bad_request("Name must not be empty"));
    }

    let email = email_filter::normalize(&req.email);
    if !is_plausible_email(&email) {
        return Err(AppError::bad_request("Email is not valid"));
    }

    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    if req.role == Some(Role::Admin) && !config.allow_admin_signup {
        return Err(AppError::forbidden("Admin accounts cannot self-register"));
    }

    Ok(email)
}

/// true  => email AVAILABLE
/// false => email TAKEN
pub async fn is_email_available(email: &str, pool: &MySqlPool) -> AppResult<bool> {
    // Cuckoo filter: a miss means the email was never registered.
    if !email_filter::might_exist(email) {
        return Ok(true);
    }

    // Moka cache: a hit means it is taken.
    if email_cache::is_taken(email).await {
        return Ok(false);
    }

    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ? LIMIT 1)",
    )
    .bind(email)
    .fetch_one(pool)
    .await?;

    if exists {
        email_cache::mark_taken(email).await;
    }

    Ok(!exists)
}

async fn insert_user(
    name: &str,
    email: &str,
    password: &str,
    role: Role,
    pool: &MySqlPool,
) -> AppResult<User> {
    let hashed = hash_password(password).map_err(|e| AppError::Internal(e.to_string()))?;

    let result = sqlx::query("INSERT INTO users (name, email, password, role) VALUES (?, ?, ?, ?)")
        .bind(name)
        .bind(email)
        .bind(&hashed)
        .bind(role.as_ref())
        .execute(pool)
        .await
        .map_err(|e| {
            if is_duplicate_key(&e) {
                AppError::conflict("Email already registered")
            } else {
                AppError::from(e)
            }
        })?;

    email_filter::insert(email);
    email_cache::mark_taken(email).await;

    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(result.last_insert_id())
        .fetch_one(pool)
        .await?;

    Ok(user)
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "User registered", body = UserResponse),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Admin self-registration disabled"),
        (status = 409, description = "Email already registered")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_register", skip(req, pool, config), fields(email = %req.email))]
pub async fn register(
    req: web::Json<RegisterReq>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<impl Responder> {
    let email = validate_registration(&req, &config)?;

    if !is_email_available(&email, pool.get_ref()).await? {
        return Err(AppError::conflict("Email already registered"));
    }

    let role = req.role.unwrap_or_default();
    let user = insert_user(req.name.trim(), &email, &req.password, role, pool.get_ref()).await?;

    info!(user_id = user.id, role = %role, "User registered");

    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully",
        "user": UserResponse::from(user)
    })))
}

async fn store_refresh_token(pool: &MySqlPool, claims: &Claims) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(claims.user_id)
    .bind(&claims.jti)
    .bind(claims.exp as i64)
    .execute(pool)
    .await?;
    Ok(())
}

fn issue_tokens(user: &User, config: &Config) -> AppResult<(String, String, Claims)> {
    let subject = TokenSubject {
        user_id: user.id,
        email: &user.email,
        role: user.role,
    };
    let to_internal = |e: jsonwebtoken::errors::Error| AppError::Internal(e.to_string());

    let access_token =
        generate_access_token(&subject, &config.jwt_secret, config.access_token_ttl)
            .map_err(to_internal)?;
    let (refresh_token, refresh_claims) =
        generate_refresh_token(&subject, &config.jwt_secret, config.refresh_token_ttl)
            .map_err(to_internal)?;

    Ok((access_token, refresh_token, refresh_claims))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Email or password missing"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_login", skip(pool, config, req), fields(email = %req.email))]
pub async fn login(
    req: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<impl Responder> {
    info!("Login request received");

    let email = email_filter::normalize(&req.email);
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::bad_request("Email and password are required"));
    }

    debug!("Fetching user from database");

    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
        .bind(&email)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| {
            info!("Invalid credentials: user not found");
            AppError::unauthorized("Invalid credentials")
        })?;

    if let Err(e) = verify_password(&req.password, &user.password) {
        info!(error = %e, user_id = user.id, "Invalid credentials: password mismatch");
        return Err(AppError::unauthorized("Invalid credentials"));
    }

    let (access_token, refresh_token, refresh_claims) = issue_tokens(&user, &config)?;

    debug!(user_id = user.id, jti = %refresh_claims.jti, "Storing refresh token");
    store_refresh_token(pool.get_ref(), &refresh_claims).await?;

    // Non-fatal: login still succeeds.
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(user.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = user.id, "Login successful");

    Ok(HttpResponse::Ok().json(LoginResponse {
        access_token,
        refresh_token,
        user: user.into(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    responses(
        (status = 200, description = "Rotated token pair", body = TokenPair),
        (status = 401, description = "Refresh token invalid, expired or revoked")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<impl Responder> {
    let token = bearer_token(req.headers()).ok_or_else(|| AppError::unauthorized("No token"))?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| AppError::unauthorized("Invalid token"))?;

    if claims.token_type != TokenType::Refresh {
        return Err(AppError::unauthorized("Refresh token required"));
    }

    // Revoking and checking in one statement means a token can rotate once.
    let revoked = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = TRUE
        WHERE jti = ? AND user_id = ? AND revoked = FALSE AND expires_at > NOW()
        "#,
    )
    .bind(&claims.jti)
    .bind(claims.user_id)
    .execute(pool.get_ref())
    .await?;

    if revoked.rows_affected() == 0 {
        info!(user_id = claims.user_id, "Refresh token reused or expired");
        return Err(AppError::unauthorized("Invalid token"));
    }

    // Reload so a role change since login is reflected.
    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(claims.user_id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| AppError::unauthorized("Invalid token"))?;

    let (access_token, refresh_token, refresh_claims) = issue_tokens(&user, &config)?;
    store_refresh_token(pool.get_ref(), &refresh_claims).await?;

    Ok(HttpResponse::Ok().json(TokenPair {
        access_token,
        refresh_token,
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 204, description = "Refresh token revoked (idempotent)")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let Some(token) = bearer_token(req.headers()) else {
        return HttpResponse::NoContent().finish();
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(_) => return HttpResponse::NoContent().finish(),
    };

    // only refresh tokens can logout
    if claims.token_type != TokenType::Refresh {
        return HttpResponse::NoContent().finish();
    }

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, user_id = claims.user_id, "Failed to revoke refresh token");
    }

    HttpResponse::NoContent().finish()
}
