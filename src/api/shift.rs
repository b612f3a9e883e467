use std::collections::HashMap;

use crate::{
    api::location::find_location,
    auth::{auth::AuthUser, handlers::USER_COLUMNS},
    config::Config,
    error::{AppError, AppResult, is_duplicate_key},
    model::{
        location::{Location, ShiftLocation},
        shift::{Shift, ShiftDetail},
        user::{User, UserResponse, UserSummary},
    },
    utils::shift_time::{MINUTES_PER_DAY, is_valid_time, time_to_minutes},
};
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{info, instrument};
use utoipa::ToSchema;

pub(crate) const SHIFT_COLUMNS: &str =
    "id, name, start_time, end_time, late_tolerance_minutes, early_out_tolerance_minutes, is_active";

const SHIFT_LOCATION_SELECT: &str = r#"
    SELECT sl.shift_id, sl.location_id,
           l.id, l.name, l.address, l.latitude, l.longitude, l.radius_meter
    FROM shift_locations sl
    JOIN locations l ON l.id = sl.location_id
"#;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateShift {
    #[schema(example = "Morning")]
    pub name: String,
    #[schema(example = "08:00")]
    pub start_time: String,
    #[schema(example = "17:00")]
    pub end_time: String,
    pub late_tolerance_minutes: Option<u32>,
    pub early_out_tolerance_minutes: Option<u32>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateShift {
    pub name: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub late_tolerance_minutes: Option<u32>,
    pub early_out_tolerance_minutes: Option<u32>,
    pub is_active: Option<bool>,
}

impl UpdateShift {
    fn apply(self, mut shift: Shift) -> Shift {
        if let Some(name) = self.name {
            shift.name = name.trim().to_string();
        }
        if let Some(start_time) = self.start_time {
            shift.start_time = start_time;
        }
        if let Some(end_time) = self.end_time {
            shift.end_time = end_time;
        }
        if let Some(tolerance) = self.late_tolerance_minutes {
            shift.late_tolerance_minutes = tolerance;
        }
        if let Some(tolerance) = self.early_out_tolerance_minutes {
            shift.early_out_tolerance_minutes = tolerance;
        }
        if let Some(is_active) = self.is_active {
            shift.is_active = is_active;
        }
        shift
    }
}

/// Validates the merged shift, so a partial update is checked against stored values.
fn validate_shift(shift: &Shift) -> AppResult<()> {
    if shift.name.trim().is_empty() {
        return Err(AppError::bad_request("Shift name is required"));
    }
    for time in [&shift.start_time, &shift.end_time] {
        if !is_valid_time(time) {
            return Err(AppError::bad_request(format!(
                "Invalid time `{time}`, expected HH:mm"
            )));
        }
    }
    if time_to_minutes(&shift.start_time)? >= time_to_minutes(&shift.end_time)? {
        return Err(AppError::bad_request("Start time must be before end time"));
    }
    for (field, minutes) in [
        ("lateToleranceMinutes", shift.late_tolerance_minutes),
        ("earlyOutToleranceMinutes", shift.early_out_tolerance_minutes),
    ] {
        if minutes > MINUTES_PER_DAY {
            return Err(AppError::bad_request(format!(
                "{field} must be at most {MINUTES_PER_DAY}"
            )));
        }
    }
    Ok(())
}

pub(crate) async fn find_shift(pool: &MySqlPool, id: u64) -> AppResult<Option<Shift>> {
    let shift = sqlx::query_as::<_, Shift>(&format!("SELECT {SHIFT_COLUMNS} FROM shifts WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(shift)
}

async fn require_shift(pool: &MySqlPool, id: u64) -> AppResult<Shift> {
    find_shift(pool, id).await?.ok_or(AppError::NotFound("Shift"))
}

fn build_details(
    shifts: Vec<Shift>,
    shift_locations: Vec<ShiftLocation>,
    employees: Vec<UserSummary>,
) -> AppResult<Vec<ShiftDetail>> {
    let mut locations_by_shift: HashMap<u64, Vec<Location>> = HashMap::new();
    for sl in shift_locations {
        locations_by_shift.entry(sl.shift_id).or_default().push(sl.location);
    }

    let mut employees_by_shift: HashMap<u64, Vec<UserSummary>> = HashMap::new();
    for employee in employees {
        if let Some(shift_id) = employee.shift_id {
            employees_by_shift.entry(shift_id).or_default().push(employee);
        }
    }

    shifts
        .into_iter()
        .map(|shift| {
            Ok(ShiftDetail {
                late_boundary: shift.late_boundary()?,
                locations: locations_by_shift.remove(&shift.id).unwrap_or_default(),
                employees: employees_by_shift.remove(&shift.id).unwrap_or_default(),
                shift,
            })
        })
        .collect()
}

async fn load_detail(pool: &MySqlPool, shift: Shift) -> AppResult<ShiftDetail> {
    let shift_locations =
        sqlx::query_as::<_, ShiftLocation>(&format!("{SHIFT_LOCATION_SELECT} WHERE sl.shift_id = ?"))
            .bind(shift.id)
            .fetch_all(pool)
            .await?;

    let employees = sqlx::query_as::<_, UserSummary>(
        "SELECT id, name, email, shift_id FROM users WHERE shift_id = ? ORDER BY name",
    )
    .bind(shift.id)
    .fetch_all(pool)
    .await?;

    build_details(vec![shift], shift_locations, employees)?
        .pop()
        .ok_or(AppError::NotFound("Shift"))
}

#[utoipa::path(
    get,
    path = "/api/shifts",
    responses((status = 200, description = "All shifts with locations and employees", body = [ShiftDetail])),
    security(("bearer_auth" = [])),
    tag = "Shift"
)]
pub async fn list_shifts(_auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<impl Responder> {
    let pool = pool.get_ref();

    let shifts = sqlx::query_as::<_, Shift>(&format!(
        "SELECT {SHIFT_COLUMNS} FROM shifts ORDER BY start_time, id"
    ))
    .fetch_all(pool)
    .await?;

    let shift_locations = sqlx::query_as::<_, ShiftLocation>(SHIFT_LOCATION_SELECT)
        .fetch_all(pool)
        .await?;

    let employees = sqlx::query_as::<_, UserSummary>(
        "SELECT id, name, email, shift_id FROM users WHERE shift_id IS NOT NULL ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    Ok(HttpResponse::Ok().json(build_details(shifts, shift_locations, employees)?))
}

#[utoipa::path(
    get,
    path = "/api/shifts/{shift_id}",
    params(("shift_id" = u64, Path, description = "Shift ID")),
    responses(
        (status = 200, description = "Shift found", body = ShiftDetail),
        (status = 404, description = "Shift not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Shift"
)]
pub async fn get_shift(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<impl Responder> {
    let shift = require_shift(pool.get_ref(), path.into_inner()).await?;
    let detail = load_detail(pool.get_ref(), shift).await?;

    Ok(HttpResponse::Ok().json(detail))
}

#[utoipa::path(
    post,
    path = "/api/shifts",
    request_body = CreateShift,
    responses(
        (status = 201, description = "Shift created", body = Shift),
        (status = 400, description = "Invalid times"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Shift"
)]
#[instrument(skip(pool, config, payload), fields(admin_id = auth.user_id))]
pub async fn create_shift(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CreateShift>,
) -> AppResult<impl Responder> {
    auth.require_admin()?;

    let payload = payload.into_inner();
    let mut shift = Shift {
        id: 0,
        name: payload.name.trim().to_string(),
        start_time: payload.start_time,
        end_time: payload.end_time,
        late_tolerance_minutes: payload
            .late_tolerance_minutes
            .unwrap_or(config.default_late_tolerance_minutes),
        early_out_tolerance_minutes: payload
            .early_out_tolerance_minutes
            .unwrap_or(config.default_early_out_tolerance_minutes),
        is_active: payload.is_active.unwrap_or(true),
    };
    validate_shift(&shift)?;

    let result = sqlx::query(
        r#"
        INSERT INTO shifts
            (name, start_time, end_time, late_tolerance_minutes, early_out_tolerance_minutes, is_active)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&shift.name)
    .bind(&shift.start_time)
    .bind(&shift.end_time)
    .bind(shift.late_tolerance_minutes)
    .bind(shift.early_out_tolerance_minutes)
    .bind(shift.is_active)
    .execute(pool.get_ref())
    .await?;

    shift.id = result.last_insert_id();
    info!(shift_id = shift.id, "Shift created");

    Ok(HttpResponse::Created().json(json!({
        "message": "Shift created successfully",
        "shift": shift
    })))
}

#[utoipa::path(
    put,
    path = "/api/shifts/{shift_id}",
    params(("shift_id" = u64, Path, description = "Shift ID")),
    request_body = UpdateShift,
    responses(
        (status = 200, description = "Shift updated", body = ShiftDetail),
        (status = 400, description = "Invalid times"),
        (status = 404, description = "Shift not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Shift"
)]
#[instrument(skip(pool, payload), fields(admin_id = auth.user_id))]
pub async fn update_shift(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateShift>,
) -> AppResult<impl Responder> {
    auth.require_admin()?;

    let shift_id = path.into_inner();
    let current = require_shift(pool.get_ref(), shift_id).await?;
    let shift = payload.into_inner().apply(current);
    validate_shift(&shift)?;

    sqlx::query(
        r#"
        UPDATE shifts
        SET name = ?, start_time = ?, end_time = ?,
            late_tolerance_minutes = ?, early_out_tolerance_minutes = ?, is_active = ?
        WHERE id = ?
        "#,
    )
    .bind(&shift.name)
    .bind(&shift.start_time)
    .bind(&shift.end_time)
    .bind(shift.late_tolerance_minutes)
    .bind(shift.early_out_tolerance_minutes)
    .bind(shift.is_active)
    .bind(shift_id)
    .execute(pool.get_ref())
    .await?;

    info!(shift_id, "Shift updated");
    let detail = load_detail(pool.get_ref(), shift).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Shift updated successfully",
        "shift": detail
    })))
}

#[utoipa::path(
    delete,
    path = "/api/shifts/{shift_id}",
    params(("shift_id" = u64, Path, description = "Shift ID")),
    responses(
        (status = 200, description = "Shift deleted"),
        (status = 404, description = "Shift not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Shift"
)]
pub async fn delete_shift(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<impl Responder> {
    auth.require_admin()?;

    let shift_id = path.into_inner();
    let result = sqlx::query("DELETE FROM shifts WHERE id = ?")
        .bind(shift_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Shift"));
    }

    info!(shift_id, admin_id = auth.user_id, "Shift deleted");

    Ok(HttpResponse::Ok().json(json!({ "message": "Shift deleted successfully" })))
}

#[utoipa::path(
    get,
    path = "/api/shifts/{shift_id}/locations",
    params(("shift_id" = u64, Path, description = "Shift ID")),
    responses(
        (status = 200, description = "Locations valid for the shift", body = [ShiftLocation]),
        (status = 404, description = "Shift not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Shift"
)]
pub async fn list_shift_locations(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<impl Responder> {
    let shift = require_shift(pool.get_ref(), path.into_inner()).await?;

    let locations = sqlx::query_as::<_, ShiftLocation>(&format!(
        "{SHIFT_LOCATION_SELECT} WHERE sl.shift_id = ? ORDER BY l.name"
    ))
    .bind(shift.id)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(locations))
}

#[utoipa::path(
    post,
    path = "/api/shifts/{shift_id}/locations/{location_id}",
    params(
        ("shift_id" = u64, Path, description = "Shift ID"),
        ("location_id" = u64, Path, description = "Location ID")
    ),
    responses(
        (status = 201, description = "Location added to shift", body = ShiftLocation),
        (status = 404, description = "Shift or location not found"),
        (status = 409, description = "Location already assigned to this shift")
    ),
    security(("bearer_auth" = [])),
    tag = "Shift"
)]
pub async fn add_shift_location(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<(u64, u64)>,
) -> AppResult<impl Responder> {
    auth.require_admin()?;

    let (shift_id, location_id) = path.into_inner();
    let pool = pool.get_ref();

    require_shift(pool, shift_id).await?;
    let location = find_location(pool, location_id)
        .await?
        .ok_or(AppError::NotFound("Location"))?;

    sqlx::query("INSERT INTO shift_locations (shift_id, location_id) VALUES (?, ?)")
        .bind(shift_id)
        .bind(location_id)
        .execute(pool)
        .await
        .map_err(|e| {
            if is_duplicate_key(&e) {
                AppError::conflict("Location already assigned to this shift")
            } else {
                AppError::from(e)
            }
        })?;

    info!(shift_id, location_id, admin_id = auth.user_id, "Location added to shift");

    Ok(HttpResponse::Created().json(json!({
        "message": "Location added to shift successfully",
        "shiftLocation": ShiftLocation { shift_id, location_id, location }
    })))
}

#[utoipa::path(
    delete,
    path = "/api/shifts/{shift_id}/locations/{location_id}",
    params(
        ("shift_id" = u64, Path, description = "Shift ID"),
        ("location_id" = u64, Path, description = "Location ID")
    ),
    responses(
        (status = 200, description = "Location removed from shift"),
        (status = 404, description = "Shift location mapping not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Shift"
)]
pub async fn remove_shift_location(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<(u64, u64)>,
) -> AppResult<impl Responder> {
    auth.require_admin()?;

    let (shift_id, location_id) = path.into_inner();
    let result = sqlx::query("DELETE FROM shift_locations WHERE shift_id = ? AND location_id = ?")
        .bind(shift_id)
        .bind(location_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Shift location mapping"));
    }

    info!(shift_id, location_id, admin_id = auth.user_id, "Location removed from shift");

    Ok(HttpResponse::Ok().json(json!({ "message": "Location removed from shift successfully" })))
}

async fn require_user(pool: &MySqlPool, user_id: u64) -> AppResult<User> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("User"))
}

#[utoipa::path(
    post,
    path = "/api/shifts/{shift_id}/assign/{user_id}",
    params(
        ("shift_id" = u64, Path, description = "Shift ID"),
        ("user_id" = u64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Employee assigned", body = UserResponse),
        (status = 404, description = "Shift or user not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Shift"
)]
pub async fn assign_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<(u64, u64)>,
) -> AppResult<impl Responder> {
    auth.require_admin()?;

    let (shift_id, user_id) = path.into_inner();
    let pool = pool.get_ref();

    let shift = require_shift(pool, shift_id).await?;
    let mut user = require_user(pool, user_id).await?;

    sqlx::query("UPDATE users SET shift_id = ? WHERE id = ?")
        .bind(shift_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    user.shift_id = Some(shift_id);

    info!(shift_id, user_id, admin_id = auth.user_id, "Employee assigned to shift");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Employee assigned to shift successfully",
        "user": UserResponse::from(user),
        "shift": shift
    })))
}

#[utoipa::path(
    post,
    path = "/api/shifts/{shift_id}/unassign/{user_id}",
    params(
        ("shift_id" = u64, Path, description = "Shift ID"),
        ("user_id" = u64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Employee unassigned", body = UserResponse),
        (status = 400, description = "User is not on this shift"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Shift"
)]
pub async fn unassign_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<(u64, u64)>,
) -> AppResult<impl Responder> {
    auth.require_admin()?;

    let (shift_id, user_id) = path.into_inner();
    let pool = pool.get_ref();

    let mut user = require_user(pool, user_id).await?;
    if user.shift_id != Some(shift_id) {
        return Err(AppError::bad_request("User is not assigned to this shift"));
    }

    sqlx::query("UPDATE users SET shift_id = NULL WHERE id = ? AND shift_id = ?")
        .bind(user_id)
        .bind(shift_id)
        .execute(pool)
        .await?;
    user.shift_id = None;

    info!(shift_id, user_id, admin_id = auth.user_id, "Employee unassigned from shift");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Employee unassigned from shift successfully",
        "user": UserResponse::from(user)
    })))
}

#[utoipa::path(
    get,
    path = "/api/shifts/{shift_id}/employees",
    params(("shift_id" = u64, Path, description = "Shift ID")),
    responses(
        (status = 200, description = "Employees on the shift", body = [UserResponse]),
        (status = 404, description = "Shift not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Shift"
)]
pub async fn list_shift_employees(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<impl Responder> {
    let shift = require_shift(pool.get_ref(), path.into_inner()).await?;

    let employees: Vec<UserResponse> = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE shift_id = ? ORDER BY name"
    ))
    .bind(shift.id)
    .fetch_all(pool.get_ref())
    .await?
    .into_iter()
    .map(UserResponse::from)
    .collect();

    Ok(HttpResponse::Ok().json(employees))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn morning() -> Shift {
        Shift {
            id: 1,
            name: "Morning".into(),
            start_time: "08:00".into(),
            end_time: "17:00".into(),
            late_tolerance_minutes: 30,
            early_out_tolerance_minutes: 15,
            is_active: true,
        }
    }

    fn office(id: u64) -> Location {
        Location {
            id,
            name: format!("Office {id}"),
            address: "Jl. Gatot Subroto".into(),
            latitude: -6.2,
            longitude: 106.8,
            radius_meter: 100,
        }
    }

    #[test]
    fn start_must_precede_end() {
        assert!(validate_shift(&morning()).is_ok());

        let mut equal = morning();
        equal.end_time = "08:00".into();
        assert!(validate_shift(&equal).is_err());

        let mut overnight = morning();
        overnight.start_time = "22:00".into();
        overnight.end_time = "06:00".into();
        assert!(validate_shift(&overnight).is_err());
    }

    #[test]
    fn malformed_times_are_rejected() {
        let mut shift = morning();
        shift.start_time = "8:00".into();
        let err = validate_shift(&shift).unwrap_err();
        assert!(err.to_string().contains("8:00"));

        let mut shift = morning();
        shift.end_time = "24:00".into();
        assert!(validate_shift(&shift).is_err());
    }

    #[test]
    fn tolerances_are_bounded_to_a_day() {
        let mut shift = morning();
        shift.late_tolerance_minutes = MINUTES_PER_DAY;
        shift.early_out_tolerance_minutes = MINUTES_PER_DAY;
        assert!(validate_shift(&shift).is_ok());

        let mut shift = morning();
        shift.late_tolerance_minutes = u32::MAX;
        let err = validate_shift(&shift).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(err.to_string().contains("lateToleranceMinutes"));

        let patch = UpdateShift {
            early_out_tolerance_minutes: Some(MINUTES_PER_DAY + 1),
            ..Default::default()
        };
        let err = validate_shift(&patch.apply(morning())).unwrap_err();
        assert!(err.to_string().contains("earlyOutToleranceMinutes"));
    }

    #[test]
    fn partial_update_is_validated_against_stored_values() {
        // Moving only the start past the stored end must fail.
        let patch = UpdateShift {
            start_time: Some("18:00".into()),
            ..Default::default()
        };
        assert!(validate_shift(&patch.apply(morning())).is_err());

        let patch = UpdateShift {
            late_tolerance_minutes: Some(10),
            is_active: Some(false),
            ..Default::default()
        };
        let updated = patch.apply(morning());
        assert!(validate_shift(&updated).is_ok());
        assert_eq!(updated.late_tolerance_minutes, 10);
        assert!(!updated.is_active);
        assert_eq!(updated.end_time, "17:00");
    }

    #[test]
    fn details_group_locations_and_employees_by_shift() {
        let mut evening = morning();
        evening.id = 2;
        evening.start_time = "13:00".into();
        evening.end_time = "21:00".into();

        let shift_locations = vec![
            ShiftLocation { shift_id: 1, location_id: 10, location: office(10) },
            ShiftLocation { shift_id: 2, location_id: 11, location: office(11) },
            ShiftLocation { shift_id: 1, location_id: 11, location: office(11) },
        ];
        let employees = vec![
            UserSummary { id: 5, name: "Ana".into(), email: "ana@x.io".into(), shift_id: Some(2) },
            UserSummary { id: 6, name: "Budi".into(), email: "budi@x.io".into(), shift_id: None },
        ];

        let details = build_details(vec![morning(), evening], shift_locations, employees).unwrap();

        assert_eq!(details[0].late_boundary, "08:30");
        assert_eq!(details[0].locations.len(), 2);
        assert!(details[0].employees.is_empty());
        assert_eq!(details[1].locations[0].id, 11);
        assert_eq!(details[1].employees[0].name, "Ana");
    }

    #[test]
    fn detail_serializes_flat() {
        let details = build_details(vec![morning()], vec![], vec![]).unwrap();
        let json = serde_json::to_value(&details[0]).unwrap();
        assert_eq!(json["startTime"], "08:00");
        assert_eq!(json["lateBoundary"], "08:30");
        assert!(json["locations"].as_array().unwrap().is_empty());
    }
}
