use actix_web::{HttpResponse, Responder, get, web};
use serde_json::json;
use sqlx::MySqlPool;

#[get("/")]
pub async fn index() -> impl Responder {
    "Shift attendance API"
}

#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service is up", body = Object, example = json!({"status": "ok"}))),
    tag = "Health"
)]
#[get("/api/health")]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

#[utoipa::path(
    get,
    path = "/api/db-health",
    responses(
        (status = 200, description = "Database reachable"),
        (status = 503, description = "Database unreachable")
    ),
    tag = "Health"
)]
#[get("/api/db-health")]
pub async fn db_health(pool: web::Data<MySqlPool>) -> impl Responder {
    match sqlx::query("SELECT 1").execute(pool.get_ref()).await {
        Ok(_) => HttpResponse::Ok().json(json!({ "status": "ok", "database": "connected" })),
        Err(e) => {
            tracing::error!(error = %e, "Database health check failed");
            HttpResponse::ServiceUnavailable()
                .json(json!({ "status": "error", "database": "disconnected" }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, test};

    #[actix_web::test]
    async fn health_reports_ok() {
        let app = test::init_service(App::new().service(index).service(health)).await;

        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ok");

        let req = test::TestRequest::get().uri("/").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }
}
