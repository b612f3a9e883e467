//! Decides what a check-in or check-out does to today's attendance row.
//!
//! Handlers load the facts (shift, location, today's row) and read the clock
//! once; everything here is a pure function of those inputs.

use chrono::{NaiveDate, NaiveDateTime};
use derive_more::Display;

use crate::model::attendance::{Attendance, AttendanceStatus};
use crate::model::location::Location;
use crate::model::shift::Shift;
use crate::utils::geofence::{distance_meters, is_valid_coordinate, is_within_radius};
use crate::utils::shift_status::{
    CheckInResult, CheckOutResult, evaluate_check_in, evaluate_check_out,
};
use crate::utils::shift_time::{InvalidTime, format_clock};

#[derive(Debug, Display, Clone, PartialEq)]
pub enum AttendanceError {
    #[display(fmt = "User is not assigned to any shift. Contact admin.")]
    NoShiftAssigned,

    #[display(fmt = "Your shift is not active")]
    ShiftInactive,

    #[display(fmt = "Location not found")]
    LocationNotFound,

    #[display(fmt = "This location is not assigned to your shift")]
    LocationNotInShift,

    #[display(fmt = "Latitude must be within [-90, 90] and longitude within [-180, 180]")]
    InvalidCoordinates,

    #[display(
        fmt = "You are outside the allowed check-in area ({:.0} m away, allowed {} m)",
        distance_meters,
        radius_meters
    )]
    OutsideRadius {
        distance_meters: f64,
        radius_meters: u32,
    },

    #[display(fmt = "Already checked in today")]
    AlreadyCheckedIn,

    #[display(fmt = "No check-in found for today")]
    NoCheckInToday,

    #[display(fmt = "Already checked out")]
    AlreadyCheckedOut,

    #[display(fmt = "Shift has an invalid time: {}", _0)]
    CorruptShift(InvalidTime),
}

impl From<InvalidTime> for AttendanceError {
    fn from(e: InvalidTime) -> Self {
        AttendanceError::CorruptShift(e)
    }
}

/// What the handler knows when a check-in arrives.
#[derive(Debug, Clone, Copy)]
pub struct CheckInFacts<'a> {
    pub user_id: u64,
    pub shift: Option<&'a Shift>,
    pub location: Option<&'a Location>,
    pub location_in_shift: bool,
    pub today: Option<&'a Attendance>,
}

/// Row to insert for a successful check-in.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttendance {
    pub user_id: u64,
    pub date: NaiveDate,
    pub check_in_time: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
    pub location_id: u64,
    pub shift_id: u64,
    pub status: AttendanceStatus,
    pub is_late: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckInPlan {
    pub record: NewAttendance,
    /// Today's row without a check-in, filled in instead of inserting a new one.
    pub existing_attendance_id: Option<u64>,
    pub result: CheckInResult,
    pub current_time: String,
    pub distance_meters: f64,
}

/// Update to apply to today's row for a successful check-out.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutPlan {
    pub attendance_id: u64,
    pub check_out_time: NaiveDateTime,
    pub status: AttendanceStatus,
    pub is_early_out: bool,
    pub overtime_minutes: u32,
    pub result: CheckOutResult,
    pub current_time: String,
}

pub fn plan_check_in(
    facts: CheckInFacts<'_>,
    latitude: f64,
    longitude: f64,
    now: NaiveDateTime,
) -> Result<CheckInPlan, AttendanceError> {
    let shift = facts.shift.ok_or(AttendanceError::NoShiftAssigned)?;
    if !shift.is_active {
        return Err(AttendanceError::ShiftInactive);
    }

    if !is_valid_coordinate(latitude, longitude) {
        return Err(AttendanceError::InvalidCoordinates);
    }

    let location = facts.location.ok_or(AttendanceError::LocationNotFound)?;
    if !facts.location_in_shift {
        return Err(AttendanceError::LocationNotInShift);
    }

    let distance = distance_meters(latitude, longitude, location.latitude, location.longitude);
    let radius = f64::from(location.radius_meter);
    if !is_within_radius(latitude, longitude, location.latitude, location.longitude, radius) {
        return Err(AttendanceError::OutsideRadius {
            distance_meters: distance,
            radius_meters: location.radius_meter,
        });
    }

    if facts.today.is_some_and(|a| a.check_in_time.is_some()) {
        return Err(AttendanceError::AlreadyCheckedIn);
    }

    let current_time = format_clock(now.time());
    let result = evaluate_check_in(&current_time, &shift.start_time, shift.late_tolerance_minutes)?;

    Ok(CheckInPlan {
        record: NewAttendance {
            user_id: facts.user_id,
            date: now.date(),
            check_in_time: now,
            latitude,
            longitude,
            location_id: location.id,
            shift_id: shift.id,
            status: result.status(),
            is_late: result.is_late(),
        },
        existing_attendance_id: facts.today.map(|a| a.id),
        result,
        current_time,
        distance_meters: distance,
    })
}

pub fn plan_check_out(
    today: Option<&Attendance>,
    shift: Option<&Shift>,
    now: NaiveDateTime,
) -> Result<CheckOutPlan, AttendanceError> {
    let attendance = today
        .filter(|a| a.check_in_time.is_some())
        .ok_or(AttendanceError::NoCheckInToday)?;
    if attendance.check_out_time.is_some() {
        return Err(AttendanceError::AlreadyCheckedOut);
    }

    let shift = shift.ok_or(AttendanceError::NoShiftAssigned)?;
    let current_time = format_clock(now.time());
    let result = evaluate_check_out(
        &current_time,
        &shift.end_time,
        shift.early_out_tolerance_minutes,
    )?;

    // An on-time check-out keeps whatever the check-in decided.
    let status = match result {
        CheckOutResult::EarlyOut { .. } | CheckOutResult::Overtime { .. } => result.status(),
        CheckOutResult::OnTime { .. } => attendance.status,
    };

    Ok(CheckOutPlan {
        attendance_id: attendance.id,
        check_out_time: now,
        status,
        is_early_out: result.is_early_out(),
        overtime_minutes: result.overtime_minutes(),
        result,
        current_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITE: (f64, f64) = (-6.2088, 106.8456);

    fn shift() -> Shift {
        Shift {
            id: 3,
            name: "Morning".into(),
            start_time: "08:00".into(),
            end_time: "17:00".into(),
            late_tolerance_minutes: 30,
            early_out_tolerance_minutes: 30,
            is_active: true,
        }
    }

    fn location() -> Location {
        Location {
            id: 9,
            name: "Head Office".into(),
            address: "Jl. Sudirman 1".into(),
            latitude: SITE.0,
            longitude: SITE.1,
            radius_meter: 100,
        }
    }

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(hour, minute, 12)
            .unwrap()
    }

    fn checked_in(status: AttendanceStatus) -> Attendance {
        Attendance {
            id: 42,
            user_id: 1,
            date: at(8, 0).date(),
            check_in_time: Some(at(8, 10)),
            check_out_time: None,
            latitude: Some(SITE.0),
            longitude: Some(SITE.1),
            location_id: Some(9),
            shift_id: Some(3),
            status,
            is_late: status == AttendanceStatus::Late,
            is_early_out: false,
            overtime_minutes: 0,
        }
    }

    fn facts<'a>(shift: &'a Shift, location: &'a Location) -> CheckInFacts<'a> {
        CheckInFacts {
            user_id: 1,
            shift: Some(shift),
            location: Some(location),
            location_in_shift: true,
            today: None,
        }
    }

    #[test]
    fn check_in_inside_grace_window_is_present() {
        let (s, l) = (shift(), location());
        let plan = plan_check_in(facts(&s, &l), SITE.0, SITE.1, at(8, 29)).unwrap();

        assert_eq!(plan.result, CheckInResult::Present { minutes_late: 29 });
        assert_eq!(plan.record.status, AttendanceStatus::Present);
        assert!(!plan.record.is_late);
        assert_eq!(plan.record.shift_id, 3);
        assert_eq!(plan.record.location_id, 9);
        assert_eq!(plan.record.date, at(0, 0).date());
        assert_eq!(plan.current_time, "08:29");
    }

    #[test]
    fn check_in_after_grace_window_is_late() {
        let (s, l) = (shift(), location());
        let plan = plan_check_in(facts(&s, &l), SITE.0, SITE.1, at(8, 31)).unwrap();

        assert_eq!(plan.result, CheckInResult::Late { minutes_late: 1 });
        assert_eq!(plan.record.status, AttendanceStatus::Late);
        assert!(plan.record.is_late);
    }

    #[test]
    fn check_in_before_shift_is_early() {
        let (s, l) = (shift(), location());
        let plan = plan_check_in(facts(&s, &l), SITE.0, SITE.1, at(7, 40)).unwrap();
        assert_eq!(plan.record.status, AttendanceStatus::Early);
        assert_eq!(plan.result.minutes_early(), Some(20));
    }

    #[test]
    fn check_in_requires_a_shift() {
        let l = location();
        let f = CheckInFacts {
            user_id: 1,
            shift: None,
            location: Some(&l),
            location_in_shift: false,
            today: None,
        };
        assert_eq!(
            plan_check_in(f, SITE.0, SITE.1, at(8, 0)),
            Err(AttendanceError::NoShiftAssigned)
        );
    }

    #[test]
    fn check_in_rejects_inactive_shift() {
        let mut s = shift();
        s.is_active = false;
        let l = location();
        assert_eq!(
            plan_check_in(facts(&s, &l), SITE.0, SITE.1, at(8, 0)),
            Err(AttendanceError::ShiftInactive)
        );
    }

    #[test]
    fn check_in_rejects_unknown_and_unassigned_locations() {
        let (s, l) = (shift(), location());

        let mut f = facts(&s, &l);
        f.location = None;
        assert_eq!(
            plan_check_in(f, SITE.0, SITE.1, at(8, 0)),
            Err(AttendanceError::LocationNotFound)
        );

        let mut f = facts(&s, &l);
        f.location_in_shift = false;
        assert_eq!(
            plan_check_in(f, SITE.0, SITE.1, at(8, 0)),
            Err(AttendanceError::LocationNotInShift)
        );
    }

    #[test]
    fn check_in_rejects_bad_coordinates() {
        let (s, l) = (shift(), location());
        assert_eq!(
            plan_check_in(facts(&s, &l), 91.0, SITE.1, at(8, 0)),
            Err(AttendanceError::InvalidCoordinates)
        );
    }

    #[test]
    fn check_in_outside_radius_reports_distance() {
        let (s, l) = (shift(), location());
        // ~0.01 degrees of latitude is a little over a kilometer.
        let err = plan_check_in(facts(&s, &l), SITE.0 + 0.01, SITE.1, at(8, 0)).unwrap_err();
        match err {
            AttendanceError::OutsideRadius {
                distance_meters,
                radius_meters,
            } => {
                assert_eq!(radius_meters, 100);
                assert!(distance_meters > 1_000.0 && distance_meters < 1_200.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn second_check_in_same_day_is_rejected() {
        let (s, l) = (shift(), location());
        let existing = checked_in(AttendanceStatus::Present);
        let mut f = facts(&s, &l);
        f.today = Some(&existing);
        assert_eq!(
            plan_check_in(f, SITE.0, SITE.1, at(9, 0)),
            Err(AttendanceError::AlreadyCheckedIn)
        );
    }

    #[test]
    fn row_without_check_in_is_reused_by_check_in() {
        let (s, l) = (shift(), location());
        let fresh = plan_check_in(facts(&s, &l), SITE.0, SITE.1, at(8, 0)).unwrap();
        assert_eq!(fresh.existing_attendance_id, None);

        let mut absent = checked_in(AttendanceStatus::Absent);
        absent.check_in_time = None;
        let mut f = facts(&s, &l);
        f.today = Some(&absent);
        let plan = plan_check_in(f, SITE.0, SITE.1, at(8, 0)).unwrap();

        assert_eq!(plan.existing_attendance_id, Some(42));
        assert_eq!(plan.record.status, AttendanceStatus::Present);
    }

    #[test]
    fn corrupt_shift_time_surfaces() {
        let mut s = shift();
        s.start_time = "8am".into();
        let l = location();
        assert!(matches!(
            plan_check_in(facts(&s, &l), SITE.0, SITE.1, at(8, 0)),
            Err(AttendanceError::CorruptShift(_))
        ));
    }

    #[test]
    fn on_time_check_out_keeps_check_in_status() {
        let s = shift();
        let row = checked_in(AttendanceStatus::Late);
        let plan = plan_check_out(Some(&row), Some(&s), at(17, 10)).unwrap();

        assert_eq!(plan.status, AttendanceStatus::Late);
        assert_eq!(plan.result, CheckOutResult::OnTime { minutes_late: 10 });
        assert!(!plan.is_early_out);
        assert_eq!(plan.overtime_minutes, 0);
        assert_eq!(plan.attendance_id, 42);
        assert_eq!(plan.current_time, "17:10");
    }

    #[test]
    fn early_check_out_overwrites_status() {
        let s = shift();
        let row = checked_in(AttendanceStatus::Present);
        let plan = plan_check_out(Some(&row), Some(&s), at(16, 29)).unwrap();

        assert_eq!(plan.status, AttendanceStatus::EarlyOut);
        assert!(plan.is_early_out);
        assert_eq!(plan.result.minutes_early_out(), Some(1));
    }

    #[test]
    fn late_check_out_is_overtime() {
        let s = shift();
        let row = checked_in(AttendanceStatus::Present);
        let plan = plan_check_out(Some(&row), Some(&s), at(17, 45)).unwrap();

        assert_eq!(plan.status, AttendanceStatus::Overtime);
        assert_eq!(plan.overtime_minutes, 45);
        assert!(!plan.is_early_out);
    }

    #[test]
    fn check_out_requires_a_check_in() {
        let s = shift();
        assert_eq!(
            plan_check_out(None, Some(&s), at(17, 0)),
            Err(AttendanceError::NoCheckInToday)
        );

        let mut row = checked_in(AttendanceStatus::Absent);
        row.check_in_time = None;
        assert_eq!(
            plan_check_out(Some(&row), Some(&s), at(17, 0)),
            Err(AttendanceError::NoCheckInToday)
        );
    }

    #[test]
    fn check_out_is_once_only() {
        let s = shift();
        let mut row = checked_in(AttendanceStatus::Present);
        row.check_out_time = Some(at(17, 0));
        assert_eq!(
            plan_check_out(Some(&row), Some(&s), at(17, 5)),
            Err(AttendanceError::AlreadyCheckedOut)
        );
    }

    #[test]
    fn check_out_requires_a_shift() {
        let row = checked_in(AttendanceStatus::Present);
        assert_eq!(
            plan_check_out(Some(&row), None, at(17, 0)),
            Err(AttendanceError::NoShiftAssigned)
        );
    }
}
