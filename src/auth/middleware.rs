use crate::auth::auth::{AuthUser, bearer_token};
use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::models::TokenType;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use serde_json::json;

fn reject(req: ServiceRequest, body: serde_json::Value) -> ServiceResponse<BoxBody> {
    let resp = HttpResponse::Unauthorized().json(body);
    req.into_response(resp.map_into_boxed_body())
}

pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;

    let claims = {
        let token = match bearer_token(req.headers()) {
            Some(t) => t,
            None => {
                return Ok(reject(
                    req,
                    json!({"error": "Missing or malformed Authorization header"}),
                ));
            }
        };

        match verify_token(token, &config.jwt_secret) {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(error = %e, "Rejected token");
                return Ok(reject(
                    req,
                    json!({"error": "Invalid or expired token", "details": e}),
                ));
            }
        }
    };

    if claims.token_type != TokenType::Access {
        return Ok(reject(req, json!({"error": "Access token required"})));
    }

    req.extensions_mut().insert(AuthUser::from(claims));

    next.call(req).await
}
