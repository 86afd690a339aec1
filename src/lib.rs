//! Roster and duty-authorization engine for a care home.
//!
//! The [`roster::Roster`] records shift assignments and answers "is this
//! staff member on duty", the [`compliance`] module audits the weekly roster
//! against staffing rules on a daily timer, and [`access::DutyGate`] guards
//! privileged operations with both checks. Allowed actions and violations
//! land in an [`audit_trail::AuditTrail`].

pub mod access;
pub mod audit_trail;
pub mod clock;
pub mod compliance;
pub mod config;
pub mod roster;
