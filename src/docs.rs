use crate::api::attendance::{CheckInInfo, CheckInReq, CheckOutInfo, CheckOutReq};
use crate::api::location::{CreateLocation, UpdateLocation};
use crate::api::shift::{CreateShift, UpdateShift};
use crate::model::attendance::{Attendance, AttendanceStatus, AttendanceView};
use crate::model::location::{Location, ShiftLocation};
use crate::model::role::Role;
use crate::model::shift::{Shift, ShiftDetail};
use crate::model::user::{UserResponse, UserSummary};
use crate::models::{LoginReqDto, LoginResponse, RegisterReq, TokenPair};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Shift Attendance API",
        version = "1.0.0",
        description = r#"
## Shift-based attendance tracking

Employees check in and out against **work shifts** at **geofenced locations**.

### Key Features
- **Shifts**
  - Start/end times in `HH:mm`, late and early-out tolerances
  - Locations valid per shift, employee assignment
- **Locations**
  - Coordinates with a radius in meters; check-ins outside the radius are rejected
- **Attendance**
  - Check-in classified as EARLY, PRESENT or LATE
  - Check-out classified as EARLY_OUT, on time or OVERTIME
  - Personal history and an admin report with filters

### Security
Endpoints outside `/auth` require a **JWT Bearer** access token.
Writes to shifts, locations and users are restricted to **ADMIN**.
"#,
    ),
    paths(
        crate::api::health::health,
        crate::api::health::db_health,

        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::user::list_users,
        crate::api::user::profile,
        crate::api::user::get_user,
        crate::api::user::delete_user,

        crate::api::location::list_locations,
        crate::api::location::get_location,
        crate::api::location::create_location,
        crate::api::location::update_location,
        crate::api::location::delete_location,

        crate::api::shift::list_shifts,
        crate::api::shift::get_shift,
        crate::api::shift::create_shift,
        crate::api::shift::update_shift,
        crate::api::shift::delete_shift,
        crate::api::shift::list_shift_locations,
        crate::api::shift::add_shift_location,
        crate::api::shift::remove_shift_location,
        crate::api::shift::assign_employee,
        crate::api::shift::unassign_employee,
        crate::api::shift::list_shift_employees,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::today,
        crate::api::attendance::history,
        crate::api::attendance::list_attendances
    ),
    components(
        schemas(
            RegisterReq,
            LoginReqDto,
            LoginResponse,
            TokenPair,
            Role,
            UserResponse,
            UserSummary,
            Location,
            ShiftLocation,
            CreateLocation,
            UpdateLocation,
            Shift,
            ShiftDetail,
            CreateShift,
            UpdateShift,
            Attendance,
            AttendanceStatus,
            AttendanceView,
            CheckInReq,
            CheckOutReq,
            CheckInInfo,
            CheckOutInfo
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and database checks"),
        (name = "Auth", description = "Registration, login and token rotation"),
        (name = "User", description = "User administration and profile"),
        (name = "Location", description = "Geofenced work locations"),
        (name = "Shift", description = "Shifts, their locations and employees"),
        (name = "Attendance", description = "Check-in, check-out and reports"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
