pub mod audit_roster;
pub mod driver;
pub mod violation;

pub use audit_roster::ComplianceAuditor;
pub use driver::{delay_until_hour, ComplianceDriver, DriverError, TRIGGER_HOURS};
pub use violation::{
    ComplianceReport, ComplianceSink, ComplianceViolation, TracingSink, ViolationKind,
};
