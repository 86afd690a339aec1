//! Gate in front of every privileged care-home operation: the acting staff
//! member's role must permit the action and they must be on duty now.
//! Shift assignment checks the role only. Every granted action is handed to
//! an [`ActionSink`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
    clock::Clock,
    compliance::TracingSink,
    roster::{DutyCheckable, Role, Roster, RosterError, Shift, Staff, StaffId},
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    AddStaff,
    UpdateStaff,
    ViewResident,
    WritePrescription,
    AdministerMedication,
    AddResident,
    MoveResident,
    ShiftAssignment,
    UpdatePrescription,
    DischargeResident,
}

impl Role {
    pub fn permits(self, access: Access) -> bool {
        use Access::*;

        match self {
            Role::Manager => matches!(
                access,
                AddStaff | UpdateStaff | ViewResident | AddResident | DischargeResident | ShiftAssignment
            ),
            Role::Doctor => matches!(access, ViewResident | WritePrescription),
            Role::Nurse => matches!(
                access,
                ViewResident | MoveResident | AdministerMedication | UpdatePrescription
            ),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("{role} {staff_id} is not permitted to {access:?}")]
    NotPermitted {
        staff_id: StaffId,
        role: Role,
        access: Access,
    },

    #[error("staff {0} is not rostered at this time")]
    NotRostered(StaffId),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssignmentError {
    #[error(transparent)]
    Unauthorized(#[from] AuthorizationError),

    #[error(transparent)]
    Roster(#[from] RosterError),
}

/// Receives every privileged action the gate lets through.
pub trait ActionSink: Send + Sync {
    fn record(&self, staff_id: &StaffId, access: Access, message: &str) -> anyhow::Result<()>;
}

impl ActionSink for TracingSink {
    fn record(&self, staff_id: &StaffId, access: Access, message: &str) -> anyhow::Result<()> {
        info!(staff_id = %staff_id, ?access, "{}", message);
        Ok(())
    }
}

pub struct DutyGate {
    roster: Arc<Roster>,
    clock: Arc<dyn Clock>,
    actions: Arc<dyn ActionSink>,
}

impl DutyGate {
    pub fn new(roster: Arc<Roster>, clock: Arc<dyn Clock>, actions: Arc<dyn ActionSink>) -> Self {
        Self {
            roster,
            clock,
            actions,
        }
    }

    /// Checks role and duty, then records the grant.
    pub fn authorize(&self, staff: &Staff, access: Access) -> Result<(), AuthorizationError> {
        self.require_permission(staff, access)?;
        self.require_on_duty(staff)?;
        debug!(staff_id = %staff.id, ?access, "access granted");
        self.record(&staff.id, access, "access granted");
        Ok(())
    }

    /// Assigns a shift on behalf of `manager`. Only the role is checked: a
    /// manager may build the roster while off duty.
    pub fn assign_shift(
        &self,
        manager: &Staff,
        staff_id: &StaffId,
        role: Role,
        shift: Shift,
    ) -> Result<(), AssignmentError> {
        self.require_permission(manager, Access::ShiftAssignment)?;
        self.roster.assign_shift(staff_id, role, shift)?;
        self.record(
            &manager.id,
            Access::ShiftAssignment,
            &format!(
                "Assigned {role} shift {} to {} to {staff_id}",
                shift.start().format("%Y-%m-%d %H:%M"),
                shift.end().format("%Y-%m-%d %H:%M"),
            ),
        );
        Ok(())
    }

    pub fn require_on_duty(&self, staff: &impl DutyCheckable) -> Result<(), AuthorizationError> {
        if staff.is_rostered_at(&self.roster, self.clock.now()) {
            Ok(())
        } else {
            debug!(staff_id = %staff.duty_id(), "access denied, not on duty");
            Err(AuthorizationError::NotRostered(staff.duty_id().clone()))
        }
    }

    fn require_permission(&self, staff: &Staff, access: Access) -> Result<(), AuthorizationError> {
        if staff.role.permits(access) {
            return Ok(());
        }
        debug!(staff_id = %staff.id, role = %staff.role, ?access, "access denied by role");
        Err(AuthorizationError::NotPermitted {
            staff_id: staff.id.clone(),
            role: staff.role,
            access,
        })
    }

    // Runs after the action took effect; failures are only logged.
    fn record(&self, staff_id: &StaffId, access: Access, message: &str) {
        if let Err(err) = self.actions.record(staff_id, access, message) {
            error!(staff_id = %staff_id, ?access, error = %err, "failed to record privileged action");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;
    use crate::{
        audit_trail::{AuditEvent, AuditTrail},
        clock::FixedClock,
        roster::{ConflictError, InMemoryDirectory},
    };

    fn monday(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    struct Home {
        gate: DutyGate,
        clock: Arc<FixedClock>,
        trail: Arc<AuditTrail<Arc<FixedClock>>>,
        nurse: Staff,
        doctor: Staff,
        manager: Staff,
    }

    fn setup() -> Home {
        let nurse = Staff::new("STF-002", "Ada", Role::Nurse);
        let doctor = Staff::new("STF-003", "Grace", Role::Doctor);
        let manager = Staff::new("STF-001", "Manager", Role::Manager);

        let directory = InMemoryDirectory::new();
        for staff in [&nurse, &doctor, &manager] {
            directory.enroll_staff(staff).unwrap();
        }
        let roster = Arc::new(Roster::new(Arc::new(directory)));
        let day = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        roster.assign_shift(&nurse.id, Role::Nurse, Shift::on(day, 8, 16).unwrap()).unwrap();
        roster.assign_shift(&doctor.id, Role::Doctor, Shift::on(day, 10, 11).unwrap()).unwrap();
        roster.assign_shift(&manager.id, Role::Manager, Shift::on(day, 9, 17).unwrap()).unwrap();

        let clock = Arc::new(FixedClock::new(monday(10, 30)));
        let trail = Arc::new(AuditTrail::new(clock.clone()));
        Home {
            gate: DutyGate::new(roster, clock.clone(), trail.clone()),
            clock,
            trail,
            nurse,
            doctor,
            manager,
        }
    }

    #[test]
    fn test_permission_matrix() {
        assert!(Role::Manager.permits(Access::ShiftAssignment));
        assert!(Role::Manager.permits(Access::DischargeResident));
        assert!(!Role::Manager.permits(Access::AdministerMedication));
        assert!(Role::Doctor.permits(Access::WritePrescription));
        assert!(!Role::Doctor.permits(Access::MoveResident));
        assert!(Role::Nurse.permits(Access::AdministerMedication));
        assert!(!Role::Nurse.permits(Access::WritePrescription));
        assert!(!Role::Nurse.permits(Access::ShiftAssignment));
    }

    #[test]
    fn test_on_duty_staff_with_permission_is_authorized() {
        let home = setup();
        assert_eq!(home.gate.authorize(&home.nurse, Access::AdministerMedication), Ok(()));
        assert_eq!(home.gate.authorize(&home.doctor, Access::WritePrescription), Ok(()));
        assert_eq!(home.gate.authorize(&home.manager, Access::DischargeResident), Ok(()));
        assert_eq!(home.trail.len(), 3);
    }

    #[test]
    fn test_role_without_permission_is_denied_even_on_duty() {
        let home = setup();
        assert!(matches!(
            home.gate.authorize(&home.nurse, Access::WritePrescription),
            Err(AuthorizationError::NotPermitted { .. })
        ));
        assert!(home.trail.is_empty());
    }

    #[test]
    fn test_off_duty_staff_is_denied() {
        let home = setup();
        home.clock.set(monday(11, 1));

        assert_eq!(home.gate.authorize(&home.nurse, Access::MoveResident), Ok(()));
        assert_eq!(
            home.gate.authorize(&home.doctor, Access::WritePrescription),
            Err(AuthorizationError::NotRostered(home.doctor.id.clone()))
        );

        home.clock.set(monday(16, 0));
        assert_eq!(home.gate.authorize(&home.nurse, Access::MoveResident), Ok(()));
        home.clock.set(monday(16, 1));
        assert!(home.gate.require_on_duty(&home.nurse.id).is_err());

        assert_eq!(home.trail.actions_by(&home.doctor.id).len(), 0);
        assert_eq!(home.trail.actions_by(&home.nurse.id).len(), 2);
    }

    #[test]
    fn test_granted_access_adds_one_trail_entry() {
        let home = setup();
        home.gate.authorize(&home.nurse, Access::AdministerMedication).unwrap();

        let entries = home.trail.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].at, monday(10, 30));
        assert_eq!(
            entries[0].event,
            AuditEvent::Action {
                staff_id: home.nurse.id.clone(),
                access: Access::AdministerMedication,
                message: "access granted".to_owned(),
            }
        );
    }

    #[test]
    fn test_only_managers_assign_shifts() {
        let home = setup();
        let day = NaiveDate::from_ymd_opt(2024, 7, 2).unwrap();

        let err = home
            .gate
            .assign_shift(&home.nurse, &home.nurse.id, Role::Nurse, Shift::on(day, 8, 16).unwrap())
            .unwrap_err();
        assert!(matches!(
            err,
            AssignmentError::Unauthorized(AuthorizationError::NotPermitted {
                access: Access::ShiftAssignment,
                ..
            })
        ));
        assert!(home.gate.authorize(&home.doctor, Access::ShiftAssignment).is_err());
        assert_eq!(home.gate.roster.shifts_on(&home.nurse.id).len(), 1);
        assert!(home.trail.is_empty());
    }

    #[test]
    fn test_manager_assignment_is_recorded_even_off_duty() {
        let home = setup();
        home.clock.set(monday(20, 0));
        let day = NaiveDate::from_ymd_opt(2024, 7, 2).unwrap();

        home.gate
            .assign_shift(&home.manager, &home.nurse.id, Role::Nurse, Shift::on(day, 14, 22).unwrap())
            .unwrap();

        assert_eq!(home.gate.roster.shifts_on(&home.nurse.id).len(), 2);
        let entries = home.trail.actions_by(&home.manager.id);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].at, monday(20, 0));
        let AuditEvent::Action { access, message, .. } = &entries[0].event else {
            panic!("expected an action, got {:?}", entries[0].event);
        };
        assert_eq!(*access, Access::ShiftAssignment);
        assert_eq!(
            message,
            "Assigned nurse shift 2024-07-02 14:00 to 2024-07-02 22:00 to STF-002"
        );
    }

    #[test]
    fn test_rejected_assignment_is_not_recorded() {
        let home = setup();
        let day = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();

        let err = home
            .gate
            .assign_shift(&home.manager, &home.doctor.id, Role::Doctor, Shift::on(day, 15, 16).unwrap())
            .unwrap_err();

        assert!(matches!(
            err,
            AssignmentError::Roster(RosterError::Conflict(ConflictError { cap: 1, .. }))
        ));
        assert!(home.trail.is_empty());
    }
}
