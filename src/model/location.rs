use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 1,
    "name": "Head Office",
    "address": "Jl. Sudirman No. 1, Jakarta",
    "latitude": -6.2088,
    "longitude": 106.8456,
    "radiusMeter": 100
}))]
pub struct Location {
    pub id: u64,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meter: u32,
}

/// A location as listed under a shift.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShiftLocation {
    pub shift_id: u64,
    pub location_id: u64,
    #[sqlx(flatten)]
    pub location: Location,
}
