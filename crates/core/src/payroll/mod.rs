//! Payroll rules, batch computation and the generation-checked projection.

pub mod projection;
pub mod projector;
pub mod remote;
pub mod rules;
pub mod service;
pub mod summary;

pub use projection::{project, PayrollProjection, ProjectionIssue};
pub use projector::{PayrollProjector, DEFAULT_MAX_RECOMPUTE_ATTEMPTS};
pub use remote::HttpComputationService;
pub use rules::{compute_breakdown, estimate_new_hire, DeterministicPayrollEngine, PayrollRuleEngine};
pub use service::{computation_service, LocalComputationService, PayrollComputationService};
pub use summary::{
    department_totals, DepartmentTotal, PayrollReport, PayrollSummary, SortKey, ViewQuery,
};
