use crate::{
    api::{location::find_location, shift::find_shift},
    auth::auth::AuthUser,
    error::{AppError, AppResult, is_duplicate_key},
    model::{
        attendance::{Attendance, AttendanceView},
        shift::Shift,
    },
    services::attendance_workflow::{
        AttendanceError, CheckInFacts, NewAttendance, plan_check_in, plan_check_out,
    },
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::{debug, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};

const ATTENDANCE_COLUMNS: &str = "id, user_id, date, check_in_time, check_out_time, latitude, \
     longitude, location_id, shift_id, status, is_late, is_early_out, overtime_minutes";

const ATTENDANCE_VIEW_SELECT: &str = r#"
    SELECT a.id, a.user_id, a.date, a.check_in_time, a.check_out_time, a.latitude,
           a.longitude, a.location_id, a.shift_id, a.status, a.is_late, a.is_early_out,
           a.overtime_minutes,
           u.name AS user_name, l.name AS location_name, s.name AS shift_name
    FROM attendances a
    JOIN users u ON u.id = a.user_id
    LEFT JOIN locations l ON l.id = a.location_id
    LEFT JOIN shifts s ON s.id = a.shift_id
"#;

const MAX_LIMIT: u32 = 500;
const HISTORY_DEFAULT_LIMIT: u32 = 30;
const REPORT_DEFAULT_LIMIT: u32 = 50;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckInReq {
    #[schema(example = -6.2088)]
    pub latitude: f64,
    #[schema(example = 106.8456)]
    pub longitude: f64,
    #[schema(example = 1)]
    pub location_id: u64,
}

/// Position at check-out is logged, not stored.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckOutReq {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckInInfo {
    #[schema(example = "LATE")]
    pub status: String,
    #[schema(example = "08:00")]
    pub shift_start_time: String,
    #[schema(example = "08:30")]
    pub late_boundary: String,
    #[schema(example = "08:45")]
    pub current_time: String,
    pub minutes_late: Option<u32>,
    pub minutes_early: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutInfo {
    #[schema(example = "OVERTIME")]
    pub status: String,
    #[schema(example = "17:00")]
    pub shift_end_time: String,
    #[schema(example = "18:10")]
    pub current_time: String,
    pub overtime_minutes: u32,
    pub minutes_early_out: Option<u32>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    #[param(value_type = Option<String>, format = "date", example = "2026-01-01")]
    pub start_date: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date", example = "2026-01-31")]
    pub end_date: Option<NaiveDate>,
    /// Defaults to 30, capped at 500
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AttendanceQuery {
    pub user_id: Option<u64>,
    pub shift_id: Option<u64>,
    #[param(value_type = Option<String>, format = "date", example = "2026-01-01")]
    pub start_date: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date", example = "2026-01-31")]
    pub end_date: Option<NaiveDate>,
    /// Defaults to 50, capped at 500
    pub limit: Option<u32>,
}

fn clamp_limit(limit: Option<u32>, default: u32) -> u32 {
    limit.unwrap_or(default).clamp(1, MAX_LIMIT)
}

fn check_date_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> AppResult<()> {
    match (start, end) {
        (Some(start), Some(end)) if start > end => {
            Err(AppError::bad_request("startDate must not be after endDate"))
        }
        _ => Ok(()),
    }
}

/// Filters shared by the history and report listings.
#[derive(Debug, Default)]
struct AttendanceFilter {
    user_id: Option<u64>,
    shift_id: Option<u64>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    limit: u32,
}

impl AttendanceFilter {
    fn query(&self) -> QueryBuilder<'static, MySql> {
        let mut qb = QueryBuilder::new(ATTENDANCE_VIEW_SELECT);
        qb.push(" WHERE 1 = 1");
        if let Some(user_id) = self.user_id {
            qb.push(" AND a.user_id = ").push_bind(user_id);
        }
        if let Some(shift_id) = self.shift_id {
            qb.push(" AND a.shift_id = ").push_bind(shift_id);
        }
        if let Some(start) = self.start_date {
            qb.push(" AND a.date >= ").push_bind(start);
        }
        if let Some(end) = self.end_date {
            qb.push(" AND a.date <= ").push_bind(end);
        }
        qb.push(" ORDER BY a.date DESC, a.id DESC LIMIT ").push_bind(self.limit);
        qb
    }

    async fn fetch(&self, pool: &MySqlPool) -> AppResult<Vec<AttendanceView>> {
        let rows = self
            .query()
            .build_query_as::<AttendanceView>()
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }
}

async fn find_today(pool: &MySqlPool, user_id: u64, date: NaiveDate) -> AppResult<Option<Attendance>> {
    let attendance = sqlx::query_as::<_, Attendance>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendances WHERE user_id = ? AND date = ?"
    ))
    .bind(user_id)
    .bind(date)
    .fetch_optional(pool)
    .await?;
    Ok(attendance)
}

async fn find_attendance(pool: &MySqlPool, id: u64) -> AppResult<Attendance> {
    sqlx::query_as::<_, Attendance>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendances WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Attendance"))
}

/// The shift currently assigned to the user. Errors when the user no longer exists.
async fn current_shift(pool: &MySqlPool, user_id: u64) -> AppResult<Option<Shift>> {
    let (shift_id,): (Option<u64>,) = sqlx::query_as("SELECT shift_id FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    match shift_id {
        Some(id) => find_shift(pool, id).await,
        None => Ok(None),
    }
}

async fn location_in_shift(pool: &MySqlPool, shift_id: u64, location_id: u64) -> AppResult<bool> {
    let found: Option<(u64,)> = sqlx::query_as(
        "SELECT location_id FROM shift_locations WHERE shift_id = ? AND location_id = ?",
    )
    .bind(shift_id)
    .bind(location_id)
    .fetch_optional(pool)
    .await?;
    Ok(found.is_some())
}

async fn insert_attendance(pool: &MySqlPool, record: &NewAttendance) -> AppResult<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO attendances
            (user_id, date, check_in_time, latitude, longitude, location_id, shift_id, status, is_late)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.user_id)
    .bind(record.date)
    .bind(record.check_in_time)
    .bind(record.latitude)
    .bind(record.longitude)
    .bind(record.location_id)
    .bind(record.shift_id)
    .bind(record.status.as_ref())
    .bind(record.is_late)
    .execute(pool)
    .await
    .map_err(|e| {
        // A concurrent check-in for the same day lost the race on uq_attendances_user_date.
        if is_duplicate_key(&e) {
            AppError::from(AttendanceError::AlreadyCheckedIn)
        } else {
            AppError::from(e)
        }
    })?;

    Ok(result.last_insert_id())
}

/// Fills in the check-in of an existing row for today that has none yet.
async fn fill_check_in(
    pool: &MySqlPool,
    attendance_id: u64,
    record: &NewAttendance,
) -> AppResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE attendances
        SET check_in_time = ?, latitude = ?, longitude = ?, location_id = ?,
            shift_id = ?, status = ?, is_late = ?
        WHERE id = ? AND user_id = ? AND check_in_time IS NULL
        "#,
    )
    .bind(record.check_in_time)
    .bind(record.latitude)
    .bind(record.longitude)
    .bind(record.location_id)
    .bind(record.shift_id)
    .bind(record.status.as_ref())
    .bind(record.is_late)
    .bind(attendance_id)
    .bind(record.user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AttendanceError::AlreadyCheckedIn.into());
    }
    Ok(attendance_id)
}

#[utoipa::path(
    post,
    path = "/api/attendances/check-in",
    request_body = CheckInReq,
    responses(
        (status = 201, description = "Checked in", body = Object, example = json!({
            "message": "Check-in successful",
            "attendance": {"id": 1, "status": "PRESENT", "isLate": false},
            "checkInInfo": {
                "status": "PRESENT",
                "shiftStartTime": "08:00",
                "lateBoundary": "08:30",
                "currentTime": "08:12",
                "minutesLate": 12,
                "minutesEarly": null
            }
        })),
        (status = 400, description = "No shift, inactive shift, location not in shift, or outside radius"),
        (status = 404, description = "Location not found"),
        (status = 409, description = "Already checked in today")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(skip(pool, req), fields(user_id = auth.user_id, location_id = req.location_id))]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    req: web::Json<CheckInReq>,
) -> AppResult<impl Responder> {
    let pool = pool.get_ref();
    let now = Local::now().naive_local();

    let shift = current_shift(pool, auth.user_id).await?;
    let location = find_location(pool, req.location_id).await?;
    let in_shift = match (&shift, &location) {
        (Some(shift), Some(location)) => location_in_shift(pool, shift.id, location.id).await?,
        _ => false,
    };
    let today = find_today(pool, auth.user_id, now.date()).await?;

    let plan = plan_check_in(
        CheckInFacts {
            user_id: auth.user_id,
            shift: shift.as_ref(),
            location: location.as_ref(),
            location_in_shift: in_shift,
            today: today.as_ref(),
        },
        req.latitude,
        req.longitude,
        now,
    )
    .inspect_err(|e| debug!(reason = %e, "Check-in rejected"))?;

    let attendance_id = match plan.existing_attendance_id {
        Some(id) => fill_check_in(pool, id, &plan.record).await?,
        None => insert_attendance(pool, &plan.record).await?,
    };
    let attendance = find_attendance(pool, attendance_id).await?;

    // plan_check_in only succeeds with a shift
    let shift = shift.ok_or(AttendanceError::NoShiftAssigned)?;
    info!(
        attendance_id,
        status = %plan.result.status(),
        distance_meters = plan.distance_meters,
        "Checked in"
    );

    Ok(HttpResponse::Created().json(json!({
        "message": "Check-in successful",
        "attendance": attendance,
        "checkInInfo": CheckInInfo {
            status: plan.result.status().to_string(),
            shift_start_time: shift.start_time.clone(),
            late_boundary: shift.late_boundary()?,
            current_time: plan.current_time,
            minutes_late: plan.result.minutes_late(),
            minutes_early: plan.result.minutes_early(),
        }
    })))
}

#[utoipa::path(
    post,
    path = "/api/attendances/check-out",
    request_body(content = CheckOutReq, description = "Optional current position"),
    responses(
        (status = 200, description = "Checked out", body = Object, example = json!({
            "message": "Check-out successful",
            "attendance": {"id": 1, "status": "OVERTIME", "overtimeMinutes": 70},
            "checkOutInfo": {
                "status": "OVERTIME",
                "shiftEndTime": "17:00",
                "currentTime": "18:10",
                "overtimeMinutes": 70,
                "minutesEarlyOut": null
            }
        })),
        (status = 400, description = "No check-in today or no shift"),
        (status = 409, description = "Already checked out")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(skip(pool, req), fields(user_id = auth.user_id))]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    req: Option<web::Json<CheckOutReq>>,
) -> AppResult<impl Responder> {
    let pool = pool.get_ref();
    let now = Local::now().naive_local();

    if let Some(position) = req.as_deref() {
        debug!(latitude = ?position.latitude, longitude = ?position.longitude, "Check-out position");
    }

    let today = find_today(pool, auth.user_id, now.date()).await?;

    // The shift stored at check-in wins; fall back when it has since been deleted.
    let snapshot = match today.as_ref().and_then(|a| a.shift_id) {
        Some(shift_id) => find_shift(pool, shift_id).await?,
        None => None,
    };
    let shift = match snapshot {
        Some(shift) => Some(shift),
        None if today.is_some() => current_shift(pool, auth.user_id).await?,
        None => None,
    };

    let plan = plan_check_out(today.as_ref(), shift.as_ref(), now)
        .inspect_err(|e| debug!(reason = %e, "Check-out rejected"))?;

    let result = sqlx::query(
        r#"
        UPDATE attendances
        SET check_out_time = ?, status = ?, is_early_out = ?, overtime_minutes = ?
        WHERE id = ? AND check_out_time IS NULL
        "#,
    )
    .bind(plan.check_out_time)
    .bind(plan.status.as_ref())
    .bind(plan.is_early_out)
    .bind(plan.overtime_minutes)
    .bind(plan.attendance_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        warn!(attendance_id = plan.attendance_id, "Concurrent check-out detected");
        return Err(AttendanceError::AlreadyCheckedOut.into());
    }

    let attendance = find_attendance(pool, plan.attendance_id).await?;
    let shift = shift.ok_or(AttendanceError::NoShiftAssigned)?;
    info!(
        attendance_id = plan.attendance_id,
        status = %plan.status,
        overtime_minutes = plan.overtime_minutes,
        "Checked out"
    );

    Ok(HttpResponse::Ok().json(json!({
        "message": "Check-out successful",
        "attendance": attendance,
        "checkOutInfo": CheckOutInfo {
            status: plan.status.to_string(),
            shift_end_time: shift.end_time.clone(),
            current_time: plan.current_time,
            overtime_minutes: plan.overtime_minutes,
            minutes_early_out: plan.result.minutes_early_out(),
        }
    })))
}

#[utoipa::path(
    get,
    path = "/api/attendances/today",
    responses(
        (status = 200, description = "Today's record, or the user's shift when there is none", body = AttendanceView)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn today(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<impl Responder> {
    let pool = pool.get_ref();
    let date = Local::now().date_naive();

    let filter = AttendanceFilter {
        user_id: Some(auth.user_id),
        start_date: Some(date),
        end_date: Some(date),
        limit: 1,
        ..Default::default()
    };

    match filter.fetch(pool).await?.pop() {
        Some(view) => Ok(HttpResponse::Ok().json(view)),
        None => {
            let shift = current_shift(pool, auth.user_id).await?;
            Ok(HttpResponse::Ok().json(json!({
                "message": "No attendance record for today",
                "attendance": null,
                "shift": shift
            })))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/attendances/history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "The caller's attendance, newest first", body = [AttendanceView]),
        (status = 400, description = "startDate after endDate")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn history(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<HistoryQuery>,
) -> AppResult<impl Responder> {
    check_date_range(query.start_date, query.end_date)?;

    let filter = AttendanceFilter {
        user_id: Some(auth.user_id),
        start_date: query.start_date,
        end_date: query.end_date,
        limit: clamp_limit(query.limit, HISTORY_DEFAULT_LIMIT),
        ..Default::default()
    };

    Ok(HttpResponse::Ok().json(filter.fetch(pool.get_ref()).await?))
}

#[utoipa::path(
    get,
    path = "/api/attendances",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Attendance across users, newest first", body = [AttendanceView]),
        (status = 400, description = "startDate after endDate"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendances(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceQuery>,
) -> AppResult<impl Responder> {
    auth.require_admin()?;
    check_date_range(query.start_date, query.end_date)?;

    let filter = AttendanceFilter {
        user_id: query.user_id,
        shift_id: query.shift_id,
        start_date: query.start_date,
        end_date: query.end_date,
        limit: clamp_limit(query.limit, REPORT_DEFAULT_LIMIT),
    };

    Ok(HttpResponse::Ok().json(filter.fetch(pool.get_ref()).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_are_clamped() {
        assert_eq!(clamp_limit(None, HISTORY_DEFAULT_LIMIT), 30);
        assert_eq!(clamp_limit(None, REPORT_DEFAULT_LIMIT), 50);
        assert_eq!(clamp_limit(Some(0), 30), 1);
        assert_eq!(clamp_limit(Some(10_000), 30), MAX_LIMIT);
        assert_eq!(clamp_limit(Some(75), 30), 75);
    }

    #[test]
    fn reversed_date_range_is_rejected() {
        let jan = |d| NaiveDate::from_ymd_opt(2026, 1, d).unwrap();
        assert!(check_date_range(Some(jan(10)), Some(jan(1))).is_err());
        assert!(check_date_range(Some(jan(1)), Some(jan(1))).is_ok());
        assert!(check_date_range(None, Some(jan(1))).is_ok());
    }

    #[test]
    fn filter_sql_only_includes_given_conditions() {
        let filter = AttendanceFilter {
            user_id: Some(4),
            limit: 30,
            ..Default::default()
        };
        let sql = filter.query().into_sql();
        assert!(sql.contains("a.user_id = ?"));
        assert!(!sql.contains("a.shift_id = ?"));
        assert!(!sql.contains("a.date >="));
        assert!(sql.trim_end().ends_with("LIMIT ?"));

        let filter = AttendanceFilter {
            shift_id: Some(2),
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2026, 1, 31),
            limit: 50,
            ..Default::default()
        };
        let sql = filter.query().into_sql();
        assert!(sql.contains("a.shift_id = ?"));
        assert!(sql.contains("a.date >= ?"));
        assert!(sql.contains("a.date <= ?"));
        assert!(!sql.contains("a.user_id = ?"));
    }

    #[test]
    fn query_params_are_camel_case() {
        let q: AttendanceQuery = serde_json::from_value(json!({
            "userId": 3,
            "startDate": "2026-02-01",
            "limit": 10
        }))
        .unwrap();
        assert_eq!(q.user_id, Some(3));
        assert_eq!(q.start_date, NaiveDate::from_ymd_opt(2026, 2, 1));
        assert!(q.end_date.is_none());
    }

    #[test]
    fn check_in_info_serializes_camel_case() {
        let info = CheckInInfo {
            status: "EARLY".into(),
            shift_start_time: "08:00".into(),
            late_boundary: "08:30".into(),
            current_time: "07:40".into(),
            minutes_late: None,
            minutes_early: Some(20),
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["shiftStartTime"], "08:00");
        assert_eq!(json["minutesEarly"], 20);
        assert!(json["minutesLate"].is_null());
    }
}
