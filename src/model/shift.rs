use serde::Serialize;
use utoipa::ToSchema;

use super::location::Location;
use super::user::UserSummary;
use crate::utils::shift_time::{InvalidTime, late_boundary};

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 1,
    "name": "Morning",
    "startTime": "08:00",
    "endTime": "17:00",
    "lateToleranceMinutes": 30,
    "earlyOutToleranceMinutes": 30,
    "isActive": true
}))]
pub struct Shift {
    pub id: u64,
    pub name: String,
    pub start_time: String,
    pub end_time: String,
    pub late_tolerance_minutes: u32,
    pub early_out_tolerance_minutes: u32,
    pub is_active: bool,
}

impl Shift {
    pub fn late_boundary(&self) -> Result<String, InvalidTime> {
        late_boundary(&self.start_time, self.late_tolerance_minutes)
    }
}

/// A shift together with the locations valid for it and its employees.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShiftDetail {
    #[serde(flatten)]
    pub shift: Shift,
    #[schema(example = "08:30")]
    pub late_boundary: String,
    pub locations: Vec<Location>,
    pub employees: Vec<UserSummary>,
}
