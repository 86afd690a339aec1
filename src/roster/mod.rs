pub mod assign_shifts;
pub mod shift;
pub mod staff;

pub use assign_shifts::{
    load_roster_from_json_file, ConflictError, Roster, RosterEntry, RosterError, RosterSnapshot,
};
pub use shift::{Shift, ShiftError};
pub use staff::{DutyCheckable, EnrollError, InMemoryDirectory, Role, Staff, StaffDirectory, StaffId};
