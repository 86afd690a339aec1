use chrono::{NaiveDate, Weekday};
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::warn;

use crate::roster::StaffId;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Overtime,
    MalformedDoctorShift,
    MissingMorningCoverage,
    MissingEveningCoverage,
    MissingDoctorCoverage,
}

/// A breached staffing rule. Either `staff_id` and `date` (per-staff daily
/// hours) or `day_of_week` (weekly coverage) is set.
#[derive(Error, Serialize, Debug, Clone, PartialEq)]
#[error("compliance failure: {message}")]
pub struct ComplianceViolation {
    pub kind: ViolationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staff_id: Option<StaffId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_weekday"
    )]
    pub day_of_week: Option<Weekday>,
    pub message: String,
}

fn serialize_weekday<S: Serializer>(day: &Option<Weekday>, serializer: S) -> Result<S::Ok, S::Error> {
    match day {
        Some(day) => serializer.serialize_str(&day.to_string()),
        None => serializer.serialize_none(),
    }
}

impl ComplianceViolation {
    pub fn overtime(staff_id: StaffId, date: NaiveDate, hours: f64) -> Self {
        let message = format!("nurse {staff_id} is scheduled for {hours} hours on {date} (max 8)");
        Self {
            kind: ViolationKind::Overtime,
            staff_id: Some(staff_id),
            date: Some(date),
            day_of_week: None,
            message,
        }
    }

    pub fn malformed_doctor_shift(staff_id: StaffId, date: NaiveDate, hours: f64) -> Self {
        let message =
            format!("doctor {staff_id} must have exactly 1 hour on {date} (found {hours} hours)");
        Self {
            kind: ViolationKind::MalformedDoctorShift,
            staff_id: Some(staff_id),
            date: Some(date),
            day_of_week: None,
            message,
        }
    }

    pub fn missing_coverage(kind: ViolationKind, day: Weekday) -> Self {
        let what = match kind {
            ViolationKind::MissingMorningCoverage => "no nurse covers the morning (08:00-16:00)",
            ViolationKind::MissingEveningCoverage => "no nurse covers the evening (14:00-22:00)",
            ViolationKind::MissingDoctorCoverage => "no doctor has a 1-hour shift",
            ViolationKind::Overtime | ViolationKind::MalformedDoctorShift => "staffing rule broken",
        };
        Self {
            kind,
            staff_id: None,
            date: None,
            day_of_week: Some(day),
            message: format!("{what} on {day}"),
        }
    }
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct ComplianceReport {
    pub violations: Vec<ComplianceViolation>,
}

impl ComplianceReport {
    pub fn is_compliant(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn of_kind(&self, kind: ViolationKind) -> impl Iterator<Item = &ComplianceViolation> {
        self.violations.iter().filter(move |violation| violation.kind == kind)
    }
}

/// Where violations found by scheduled audits are sent.
pub trait ComplianceSink: Send + Sync {
    fn report(&self, violation: &ComplianceViolation) -> anyhow::Result<()>;
}

/// Emits each violation as a `warn` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ComplianceSink for TracingSink {
    fn report(&self, violation: &ComplianceViolation) -> anyhow::Result<()> {
        warn!(
            kind = ?violation.kind,
            staff_id = violation.staff_id.as_ref().map(|id| id.as_str()),
            date = ?violation.date,
            day_of_week = ?violation.day_of_week,
            "{}",
            violation.message
        );
        Ok(())
    }
}
