//! Append-only, timestamped log of what happened in the care home: every
//! privileged action that was allowed and every compliance violation found.

use std::sync::{Mutex, PoisonError};

use chrono::NaiveDateTime;

use crate::{
    access::{Access, ActionSink},
    clock::Clock,
    compliance::{ComplianceSink, ComplianceViolation},
    roster::StaffId,
};

#[derive(Debug, Clone, PartialEq)]
pub enum AuditEvent {
    Action {
        staff_id: StaffId,
        access: Access,
        message: String,
    },
    Violation(ComplianceViolation),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditTrailEntry {
    pub at: NaiveDateTime,
    pub event: AuditEvent,
}

pub struct AuditTrail<C> {
    clock: C,
    entries: Mutex<Vec<AuditTrailEntry>>,
}

impl<C: Clock> AuditTrail<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn entries(&self) -> Vec<AuditTrailEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Actions performed by one staff member, oldest first.
    pub fn actions_by(&self, staff_id: &StaffId) -> Vec<AuditTrailEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|entry| {
                matches!(&entry.event, AuditEvent::Action { staff_id: actor, .. } if actor == staff_id)
            })
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn append(&self, event: AuditEvent) {
        let entry = AuditTrailEntry {
            at: self.clock.now(),
            event,
        };
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }
}

impl<C: Clock> ComplianceSink for AuditTrail<C> {
    fn report(&self, violation: &ComplianceViolation) -> anyhow::Result<()> {
        self.append(AuditEvent::Violation(violation.clone()));
        Ok(())
    }
}

impl<C: Clock> ActionSink for AuditTrail<C> {
    fn record(&self, staff_id: &StaffId, access: Access, message: &str) -> anyhow::Result<()> {
        self.append(AuditEvent::Action {
            staff_id: staff_id.clone(),
            access,
            message: message.to_owned(),
        });
        Ok(())
    }
}
