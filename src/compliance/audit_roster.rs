use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime, Weekday};
use tracing::{debug, info};

use crate::{
    compliance::violation::{ComplianceReport, ComplianceViolation, ViolationKind},
    roster::{Role, RosterSnapshot, Shift, StaffId},
};

const NURSE_MAX_DAILY_MINUTES: i64 = 8 * 60;
const DOCTOR_DAILY_MINUTES: i64 = 60;

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

const MORNING: (NaiveTime, NaiveTime) = (on_the_hour(8), on_the_hour(16));
const EVENING: (NaiveTime, NaiveTime) = (on_the_hour(14), on_the_hour(22));

const fn on_the_hour(hour: u32) -> NaiveTime {
    match NaiveTime::from_hms_opt(hour, 0, 0) {
        Some(time) => time,
        None => panic!("coverage window hour out of range"),
    }
}

/// Checks a roster snapshot against the weekly coverage windows and the
/// per-role daily hour limits. Holds no state of its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct ComplianceAuditor;

impl ComplianceAuditor {
    pub fn new() -> Self {
        Self
    }

    /// Every violation in the snapshot: weekly coverage Monday to Sunday
    /// first, then daily hours by staff id and date.
    pub fn audit(&self, snapshot: &RosterSnapshot) -> ComplianceReport {
        let mut violations = check_weekly_coverage(snapshot);
        violations.extend(check_daily_hours(snapshot));
        info!(
            staff = snapshot.entries.len(),
            shifts = snapshot.shift_count(),
            violations = violations.len(),
            "roster audit finished"
        );
        ComplianceReport { violations }
    }

    /// Stops at the first violation.
    pub fn check(&self, snapshot: &RosterSnapshot) -> Result<(), ComplianceViolation> {
        match self.audit(snapshot).violations.into_iter().next() {
            Some(violation) => Err(violation),
            None => Ok(()),
        }
    }
}

fn check_weekly_coverage(snapshot: &RosterSnapshot) -> Vec<ComplianceViolation> {
    let mut violations = Vec::new();
    for day in WEEK {
        let mut morning_covered = false;
        let mut evening_covered = false;
        let mut doctor_present = false;

        for entry in snapshot.entries.values() {
            for shift in entry.shifts.iter().filter(|shift| shift.day_of_week() == day) {
                match entry.role {
                    Role::Nurse => {
                        morning_covered |= shift.covers_window(MORNING.0, MORNING.1);
                        evening_covered |= shift.covers_window(EVENING.0, EVENING.1);
                    }
                    Role::Doctor => {
                        doctor_present |= shift.duration_minutes() == DOCTOR_DAILY_MINUTES;
                    }
                    Role::Manager => {}
                }
            }
        }

        debug!(%day, morning_covered, evening_covered, doctor_present, "coverage");
        if !morning_covered {
            violations.push(ComplianceViolation::missing_coverage(
                ViolationKind::MissingMorningCoverage,
                day,
            ));
        }
        if !evening_covered {
            violations.push(ComplianceViolation::missing_coverage(
                ViolationKind::MissingEveningCoverage,
                day,
            ));
        }
        if !doctor_present {
            violations.push(ComplianceViolation::missing_coverage(
                ViolationKind::MissingDoctorCoverage,
                day,
            ));
        }
    }
    violations
}

fn check_daily_hours(snapshot: &RosterSnapshot) -> Vec<ComplianceViolation> {
    let mut violations = Vec::new();
    for (staff_id, entry) in &snapshot.entries {
        for (date, minutes) in minutes_by_date(staff_id, &entry.shifts) {
            let hours = minutes as f64 / 60.;
            match entry.role {
                Role::Nurse if minutes > NURSE_MAX_DAILY_MINUTES => {
                    violations.push(ComplianceViolation::overtime(staff_id.clone(), date, hours));
                }
                Role::Doctor if minutes != DOCTOR_DAILY_MINUTES => {
                    violations.push(ComplianceViolation::malformed_doctor_shift(
                        staff_id.clone(),
                        date,
                        hours,
                    ));
                }
                _ => {}
            }
        }
    }
    violations
}

fn minutes_by_date(staff_id: &StaffId, shifts: &[Shift]) -> BTreeMap<NaiveDate, i64> {
    let mut minutes: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for shift in shifts {
        *minutes.entry(shift.calendar_day()).or_default() += shift.duration_minutes();
    }
    debug!(staff_id = %staff_id, days = minutes.len(), "daily minutes summed");
    minutes
}
