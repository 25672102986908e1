pub mod config;
pub mod domain;
pub mod errors;
pub mod fixtures;
pub mod payroll;
pub mod roster;

pub use domain::employee::{Department, Employee, EmployeeId, NewEmployee};
pub use domain::payroll::{EmployeeView, PayrollBreakdown, PayrollRecord};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use payroll::{
    compute_breakdown, estimate_new_hire, PayrollComputationService, PayrollProjection,
    PayrollProjector, PayrollSummary, ProjectionIssue, ViewQuery,
};
pub use roster::{RosterSnapshot, RosterStore};
