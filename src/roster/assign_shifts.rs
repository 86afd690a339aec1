use std::{
    collections::BTreeMap,
    io::BufReader,
    path::Path,
    sync::{Arc, PoisonError, RwLock},
};

use anyhow::{Context, Error};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::roster::{
    shift::Shift,
    staff::{InMemoryDirectory, Role, StaffDirectory, StaffId},
};

/// Rejection of a shift that would exceed the role's daily cap.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "{role} {staff_id} already has {} shift(s) on {day} (starting {}); cannot add one at {}, limit is {cap} per day",
    .existing_starts.len(),
    fmt_starts(.existing_starts),
    .attempted_start.format("%H:%M")
)]
pub struct ConflictError {
    pub staff_id: StaffId,
    pub role: Role,
    pub day: NaiveDate,
    pub attempted_start: NaiveDateTime,
    pub existing_starts: Vec<NaiveDateTime>,
    pub cap: usize,
}

fn fmt_starts(starts: &[NaiveDateTime]) -> String {
    starts
        .iter()
        .map(|start| start.format("%H:%M").to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RosterError {
    #[error("staff {0} is not known to the staff directory")]
    UnknownStaff(StaffId),

    #[error("staff {staff_id} is a {actual}, not a {declared}")]
    RoleMismatch {
        staff_id: StaffId,
        declared: Role,
        actual: Role,
    },

    #[error(transparent)]
    Conflict(#[from] ConflictError),
}

/// Shifts for one staff member in the order they were assigned.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub role: Role,
    pub shifts: Vec<Shift>,
}

impl RosterEntry {
    fn new(role: Role) -> Self {
        Self {
            role,
            shifts: Vec::new(),
        }
    }

    fn starts_on(&self, day: NaiveDate) -> Vec<NaiveDateTime> {
        self.shifts
            .iter()
            .filter(|shift| shift.calendar_day() == day)
            .map(Shift::start)
            .collect()
    }
}

/// Point-in-time copy of the whole roster.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct RosterSnapshot {
    pub entries: BTreeMap<StaffId, RosterEntry>,
}

impl RosterSnapshot {
    pub fn shift_count(&self) -> usize {
        self.entries.values().map(|entry| entry.shifts.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The authoritative, append-only record of shift assignments.
///
/// Assignment holds the write lock across the cap check and the append, so
/// two conflicting shifts for the same staff can never both pass.
pub struct Roster {
    directory: Arc<dyn StaffDirectory>,
    entries: RwLock<BTreeMap<StaffId, RosterEntry>>,
}

impl Roster {
    pub fn new(directory: Arc<dyn StaffDirectory>) -> Self {
        Self {
            directory,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Rebuilds a roster by replaying every shift through the assignment rule.
    pub fn restore(
        directory: Arc<dyn StaffDirectory>,
        snapshot: RosterSnapshot,
    ) -> Result<Self, RosterError> {
        let roster = Self::new(directory);
        for (staff_id, entry) in snapshot.entries {
            for shift in entry.shifts {
                roster.assign_shift(&staff_id, entry.role, shift)?;
            }
        }
        Ok(roster)
    }

    pub fn assign_shift(
        &self,
        staff_id: &StaffId,
        role: Role,
        shift: Shift,
    ) -> Result<(), RosterError> {
        let actual = self
            .directory
            .role_of(staff_id)
            .ok_or_else(|| RosterError::UnknownStaff(staff_id.clone()))?;
        if actual != role {
            return Err(RosterError::RoleMismatch {
                staff_id: staff_id.clone(),
                declared: role,
                actual,
            });
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let entry = entries
            .entry(staff_id.clone())
            .or_insert_with(|| RosterEntry::new(role));

        if let Some(cap) = role.daily_shift_cap() {
            let existing_starts = entry.starts_on(shift.calendar_day());
            if existing_starts.len() >= cap {
                let conflict = ConflictError {
                    staff_id: staff_id.clone(),
                    role,
                    day: shift.calendar_day(),
                    attempted_start: shift.start(),
                    existing_starts,
                    cap,
                };
                warn!(%conflict, "shift assignment rejected");
                return Err(conflict.into());
            }
        }

        entry.shifts.push(shift);
        info!(
            staff_id = %staff_id,
            %role,
            start = %shift.start(),
            end = %shift.end(),
            "shift assigned"
        );
        Ok(())
    }

    pub fn is_on_duty(&self, staff_id: &StaffId, at: NaiveDateTime) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let on_duty = entries
            .get(staff_id)
            .is_some_and(|entry| entry.shifts.iter().any(|shift| shift.contains(at)));
        debug!(staff_id = %staff_id, %at, on_duty, "duty check");
        on_duty
    }

    pub fn shifts_on(&self, staff_id: &StaffId) -> Vec<Shift> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(staff_id)
            .map(|entry| entry.shifts.clone())
            .unwrap_or_default()
    }

    pub fn all_shifts(&self) -> BTreeMap<StaffId, Vec<Shift>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(staff_id, entry)| (staff_id.clone(), entry.shifts.clone()))
            .collect()
    }

    pub fn snapshot(&self) -> RosterSnapshot {
        RosterSnapshot {
            entries: self
                .entries
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct RawRosterFile {
    #[serde(rename(deserialize = "Staff"), default)]
    staff: Vec<RawStaff>,
    #[serde(rename(deserialize = "Shifts"), default)]
    shifts: Vec<RawShift>,
}

#[derive(Deserialize, Debug)]
struct RawStaff {
    #[serde(rename(deserialize = "StaffID"))]
    staff_id: String,
    #[serde(rename(deserialize = "Role"))]
    role: Role,
}

#[derive(Deserialize, Debug)]
struct RawShift {
    #[serde(rename(deserialize = "StaffID"))]
    staff_id: String,
    #[serde(rename(deserialize = "Role"))]
    role: Role,
    #[serde(rename(deserialize = "StartTime"))]
    start_time: String,
    #[serde(rename(deserialize = "EndTime"))]
    end_time: String,
}

/// Enrolls every listed staff member and assigns every shift in file order.
pub fn load_roster_from_json_file(
    path: &Path,
    directory: Arc<InMemoryDirectory>,
) -> Result<Roster, Error> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open roster file: {}", path.to_string_lossy()))?;
    let reader = BufReader::new(file);
    let raw: RawRosterFile = serde_json::from_reader(reader)
        .with_context(|| format!("Failed to parse roster file: {}", path.to_string_lossy()))?;

    for staff in &raw.staff {
        directory
            .enroll(StaffId::new(staff.staff_id.as_str()), staff.role)
            .with_context(|| format!("invalid staff record: {:?}", staff))?;
    }

    let roster = Roster::new(directory);
    for raw_shift in &raw.shifts {
        let shift = validate_shift(raw_shift)?;
        roster
            .assign_shift(&StaffId::new(raw_shift.staff_id.as_str()), raw_shift.role, shift)
            .with_context(|| format!("shift could not be assigned: {:?}", raw_shift))?;
    }
    Ok(roster)
}

fn validate_shift(shift: &RawShift) -> Result<Shift, Error> {
    let start = parse_local_time(&shift.start_time)
        .with_context(|| format!("start time was not an ISO-8601 local time: {:?}", shift))?;
    let end = parse_local_time(&shift.end_time)
        .with_context(|| format!("end time was not an ISO-8601 local time: {:?}", shift))?;
    Shift::new(start, end).with_context(|| format!("invalid shift: {:?}", shift))
}

fn parse_local_time(value: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
}
