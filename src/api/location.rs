use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::{AppError, AppResult},
    model::location::Location,
    utils::geofence::is_valid_coordinate,
};
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

pub(crate) const LOCATION_COLUMNS: &str = "id, name, address, latitude, longitude, radius_meter";

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLocation {
    #[schema(example = "Head Office")]
    pub name: String,
    #[schema(example = "Jl. Sudirman No. 1, Jakarta")]
    pub address: String,
    #[schema(example = -6.2088)]
    pub latitude: f64,
    #[schema(example = 106.8456)]
    pub longitude: f64,
    /// Defaults to DEFAULT_RADIUS_METER
    #[schema(example = 100)]
    pub radius_meter: Option<u32>,
}

/// Fields left out keep their stored value.
#[derive(Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLocation {
    pub name: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_meter: Option<u32>,
}

impl UpdateLocation {
    fn apply(self, mut location: Location) -> Location {
        if let Some(name) = self.name {
            location.name = name;
        }
        if let Some(address) = self.address {
            location.address = address;
        }
        if let Some(latitude) = self.latitude {
            location.latitude = latitude;
        }
        if let Some(longitude) = self.longitude {
            location.longitude = longitude;
        }
        if let Some(radius_meter) = self.radius_meter {
            location.radius_meter = radius_meter;
        }
        location
    }
}

fn validate_location(location: &Location) -> AppResult<()> {
    if location.name.trim().is_empty() || location.address.trim().is_empty() {
        return Err(AppError::bad_request("Name and address are required"));
    }
    if !is_valid_coordinate(location.latitude, location.longitude) {
        return Err(AppError::bad_request(
            "Latitude must be within [-90, 90] and longitude within [-180, 180]",
        ));
    }
    if location.radius_meter == 0 {
        return Err(AppError::bad_request("radiusMeter must be greater than 0"));
    }
    Ok(())
}

pub(crate) async fn find_location(pool: &MySqlPool, id: u64) -> AppResult<Option<Location>> {
    let location =
        sqlx::query_as::<_, Location>(&format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await?;
    Ok(location)
}

#[utoipa::path(
    get,
    path = "/api/locations",
    responses((status = 200, description = "All locations", body = [Location])),
    security(("bearer_auth" = [])),
    tag = "Location"
)]
pub async fn list_locations(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> AppResult<impl Responder> {
    let locations =
        sqlx::query_as::<_, Location>(&format!("SELECT {LOCATION_COLUMNS} FROM locations ORDER BY name"))
            .fetch_all(pool.get_ref())
            .await?;

    Ok(HttpResponse::Ok().json(locations))
}

#[utoipa::path(
    get,
    path = "/api/locations/{location_id}",
    params(("location_id" = u64, Path, description = "Location ID")),
    responses(
        (status = 200, description = "Location found", body = Location),
        (status = 404, description = "Location not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Location"
)]
pub async fn get_location(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<impl Responder> {
    let location = find_location(pool.get_ref(), path.into_inner())
        .await?
        .ok_or(AppError::NotFound("Location"))?;

    Ok(HttpResponse::Ok().json(location))
}

#[utoipa::path(
    post,
    path = "/api/locations",
    request_body = CreateLocation,
    responses(
        (status = 201, description = "Location created", body = Location),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Location"
)]
pub async fn create_location(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CreateLocation>,
) -> AppResult<impl Responder> {
    auth.require_admin()?;

    let payload = payload.into_inner();
    let mut location = Location {
        id: 0,
        name: payload.name.trim().to_string(),
        address: payload.address.trim().to_string(),
        latitude: payload.latitude,
        longitude: payload.longitude,
        radius_meter: payload.radius_meter.unwrap_or(config.default_radius_meter),
    };
    validate_location(&location)?;

    let result = sqlx::query(
        r#"
        INSERT INTO locations (name, address, latitude, longitude, radius_meter)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&location.name)
    .bind(&location.address)
    .bind(location.latitude)
    .bind(location.longitude)
    .bind(location.radius_meter)
    .execute(pool.get_ref())
    .await?;

    location.id = result.last_insert_id();
    info!(location_id = location.id, admin_id = auth.user_id, "Location created");

    Ok(HttpResponse::Created().json(json!({
        "message": "Location created successfully",
        "location": location
    })))
}

#[utoipa::path(
    put,
    path = "/api/locations/{location_id}",
    params(("location_id" = u64, Path, description = "Location ID")),
    request_body = UpdateLocation,
    responses(
        (status = 200, description = "Location updated", body = Location),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Location not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Location"
)]
pub async fn update_location(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateLocation>,
) -> AppResult<impl Responder> {
    auth.require_admin()?;

    let location_id = path.into_inner();
    let current = find_location(pool.get_ref(), location_id)
        .await?
        .ok_or(AppError::NotFound("Location"))?;

    let location = payload.into_inner().apply(current);
    validate_location(&location)?;

    sqlx::query(
        r#"
        UPDATE locations
        SET name = ?, address = ?, latitude = ?, longitude = ?, radius_meter = ?
        WHERE id = ?
        "#,
    )
    .bind(&location.name)
    .bind(&location.address)
    .bind(location.latitude)
    .bind(location.longitude)
    .bind(location.radius_meter)
    .bind(location_id)
    .execute(pool.get_ref())
    .await?;

    info!(location_id, admin_id = auth.user_id, "Location updated");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Location updated successfully",
        "location": location
    })))
}

#[utoipa::path(
    delete,
    path = "/api/locations/{location_id}",
    params(("location_id" = u64, Path, description = "Location ID")),
    responses(
        (status = 200, description = "Location deleted"),
        (status = 404, description = "Location not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Location"
)]
pub async fn delete_location(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<impl Responder> {
    auth.require_admin()?;

    let location_id = path.into_inner();
    let result = sqlx::query("DELETE FROM locations WHERE id = ?")
        .bind(location_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Location"));
    }

    info!(location_id, admin_id = auth.user_id, "Location deleted");

    Ok(HttpResponse::Ok().json(json!({ "message": "Location deleted successfully" })))
}
