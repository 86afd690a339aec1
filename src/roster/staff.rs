use std::{
    collections::HashMap,
    fmt,
    sync::{PoisonError, RwLock},
};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::roster::assign_shifts::Roster;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct StaffId(String);

impl StaffId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StaffId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StaffId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Nurse,
    Doctor,
    Manager,
}

impl Role {
    /// Maximum number of shifts that may start on one calendar day.
    /// `None` means unlimited.
    pub fn daily_shift_cap(self) -> Option<usize> {
        match self {
            Role::Nurse => Some(2),
            Role::Doctor => Some(1),
            Role::Manager => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Nurse => "nurse",
            Role::Doctor => "doctor",
            Role::Manager => "manager",
        };
        f.write_str(name)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Staff {
    pub id: StaffId,
    pub name: String,
    pub role: Role,
}

impl Staff {
    pub fn new(id: impl Into<StaffId>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
        }
    }
}

/// Anything that can be asked "are you rostered right now".
///
/// Every staff variant answers the same way: by looking itself up in the
/// roster, so privileged operations never need to inspect concrete types.
pub trait DutyCheckable {
    fn duty_id(&self) -> &StaffId;

    fn is_rostered_at(&self, roster: &Roster, at: NaiveDateTime) -> bool {
        roster.is_on_duty(self.duty_id(), at)
    }
}

impl DutyCheckable for Staff {
    fn duty_id(&self) -> &StaffId {
        &self.id
    }
}

impl DutyCheckable for StaffId {
    fn duty_id(&self) -> &StaffId {
        self
    }
}

/// The only thing the roster needs from the staff directory is a role tag.
pub trait StaffDirectory: Send + Sync {
    fn role_of(&self, staff_id: &StaffId) -> Option<Role>;
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("staff {staff_id} is already enrolled as {existing}, cannot re-enroll as {requested}")]
pub struct EnrollError {
    pub staff_id: StaffId,
    pub existing: Role,
    pub requested: Role,
}

#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    roles: RwLock<HashMap<StaffId, Role>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enrolling the same staff twice with the same role is a no-op.
    pub fn enroll(&self, staff_id: StaffId, role: Role) -> Result<(), EnrollError> {
        let mut roles = self.roles.write().unwrap_or_else(PoisonError::into_inner);
        match roles.get(&staff_id) {
            Some(existing) if *existing != role => Err(EnrollError {
                staff_id,
                existing: *existing,
                requested: role,
            }),
            Some(_) => Ok(()),
            None => {
                roles.insert(staff_id, role);
                Ok(())
            }
        }
    }

    pub fn enroll_staff(&self, staff: &Staff) -> Result<(), EnrollError> {
        self.enroll(staff.id.clone(), staff.role)
    }

    pub fn len(&self) -> usize {
        self.roles.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StaffDirectory for InMemoryDirectory {
    fn role_of(&self, staff_id: &StaffId) -> Option<Role> {
        self.roles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(staff_id)
            .copied()
    }
}
