//! Classifies check-in and check-out times against a shift window.
//!
//! All inputs are minutes since midnight on the same calendar day; shifts
//! never wrap past midnight.

use super::shift_time::{InvalidTime, time_to_minutes};
use crate::model::attendance::AttendanceStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckInResult {
    /// Arrived before the shift started.
    Early { minutes_early: u32 },
    /// Arrived inside the grace window; `minutes_late` is time into the window.
    Present { minutes_late: u32 },
    /// Arrived after the grace window; `minutes_late` counts from its end.
    Late { minutes_late: u32 },
}

impl CheckInResult {
    pub fn status(&self) -> AttendanceStatus {
        match self {
            CheckInResult::Early { .. } => AttendanceStatus::Early,
            CheckInResult::Present { .. } => AttendanceStatus::Present,
            CheckInResult::Late { .. } => AttendanceStatus::Late,
        }
    }

    pub fn is_late(&self) -> bool {
        matches!(self, CheckInResult::Late { .. })
    }

    pub fn minutes_early(&self) -> Option<u32> {
        match *self {
            CheckInResult::Early { minutes_early } => Some(minutes_early),
            _ => None,
        }
    }

    pub fn minutes_late(&self) -> Option<u32> {
        match *self {
            CheckInResult::Present { minutes_late } | CheckInResult::Late { minutes_late } => {
                Some(minutes_late)
            }
            CheckInResult::Early { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutResult {
    /// Left before `end - tolerance`; counted from that boundary.
    EarlyOut { minutes_early_out: u32 },
    /// Left within `end ± tolerance`.
    OnTime { minutes_late: u32 },
    /// Left after `end + tolerance`; overtime counts from the shift end.
    Overtime { overtime_minutes: u32 },
}

impl CheckOutResult {
    pub fn status(&self) -> AttendanceStatus {
        match self {
            CheckOutResult::EarlyOut { .. } => AttendanceStatus::EarlyOut,
            CheckOutResult::OnTime { .. } => AttendanceStatus::Present,
            CheckOutResult::Overtime { .. } => AttendanceStatus::Overtime,
        }
    }

    pub fn is_early_out(&self) -> bool {
        matches!(self, CheckOutResult::EarlyOut { .. })
    }

    pub fn minutes_early_out(&self) -> Option<u32> {
        match *self {
            CheckOutResult::EarlyOut { minutes_early_out } => Some(minutes_early_out),
            _ => None,
        }
    }

    pub fn minutes_late(&self) -> Option<u32> {
        match *self {
            CheckOutResult::OnTime { minutes_late } => Some(minutes_late),
            _ => None,
        }
    }

    /// Zero unless the result is overtime.
    pub fn overtime_minutes(&self) -> u32 {
        match *self {
            CheckOutResult::Overtime { overtime_minutes } => overtime_minutes,
            _ => 0,
        }
    }
}

pub fn check_in_status(check_in: u32, shift_start: u32, late_tolerance: u32) -> CheckInResult {
    let c = u64::from(check_in);
    let s = u64::from(shift_start);
    let late_boundary = s + u64::from(late_tolerance);

    if c < s {
        CheckInResult::Early {
            minutes_early: (s - c) as u32,
        }
    } else if c <= late_boundary {
        CheckInResult::Present {
            minutes_late: (c - s) as u32,
        }
    } else {
        CheckInResult::Late {
            minutes_late: (c - late_boundary) as u32,
        }
    }
}

/// The same tolerance widens the window on both sides of the shift end.
pub fn check_out_status(check_out: u32, shift_end: u32, early_out_tolerance: u32) -> CheckOutResult {
    let c = i64::from(check_out);
    let e = i64::from(shift_end);
    let tolerance = i64::from(early_out_tolerance);
    let early_boundary = e - tolerance;
    let late_boundary = e + tolerance;

    if c < early_boundary {
        CheckOutResult::EarlyOut {
            minutes_early_out: (early_boundary - c) as u32,
        }
    } else if c <= late_boundary {
        CheckOutResult::OnTime {
            minutes_late: (c - e).max(0) as u32,
        }
    } else {
        CheckOutResult::Overtime {
            overtime_minutes: (c - e) as u32,
        }
    }
}

pub fn evaluate_check_in(
    check_in_time: &str,
    shift_start_time: &str,
    late_tolerance_minutes: u32,
) -> Result<CheckInResult, InvalidTime> {
    Ok(check_in_status(
        time_to_minutes(check_in_time)?,
        time_to_minutes(shift_start_time)?,
        late_tolerance_minutes,
    ))
}

pub fn evaluate_check_out(
    check_out_time: &str,
    shift_end_time: &str,
    early_out_tolerance_minutes: u32,
) -> Result<CheckOutResult, InvalidTime> {
    Ok(check_out_status(
        time_to_minutes(check_out_time)?,
        time_to_minutes(shift_end_time)?,
        early_out_tolerance_minutes,
    ))
}
