use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::employee::{Employee, EmployeeId};
use crate::domain::payroll::{EmployeeView, PayrollBreakdown, PayrollRecord};
use crate::errors::ApplicationError;
use crate::payroll::rules::compute_breakdown;
use crate::payroll::service::PayrollComputationService;

/// Largest per-field difference accepted from a remote breakdown.
const RULE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Recoverable inconsistencies between a roster snapshot and a computation result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProjectionIssue {
    /// The service returned nothing for this employee; it is left out of the views.
    MissingBreakdown { id: EmployeeId },
    /// The service returned a breakdown for an id that is not in the snapshot.
    UnexpectedBreakdown { id: EmployeeId },
    /// The service returned more than one breakdown for the same id; only the first is used.
    DuplicateBreakdown { id: EmployeeId },
    /// The service disagreed with the payroll rules; the rule-engine figures are used.
    RuleMismatch { id: EmployeeId, reported: PayrollBreakdown, expected: PayrollBreakdown },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PayrollProjection {
    generation: u64,
    views: BTreeMap<EmployeeId, EmployeeView>,
    issues: Vec<ProjectionIssue>,
}

impl PayrollProjection {
    pub fn empty(generation: u64) -> Self {
        Self { generation, ..Self::default() }
    }

    pub fn at_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Roster generation the projection was computed from.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, id: EmployeeId) -> Option<&EmployeeView> {
        self.views.get(&id)
    }

    /// Views in id order, which is roster creation order.
    pub fn views(&self) -> impl Iterator<Item = &EmployeeView> {
        self.views.values()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn issues(&self) -> &[ProjectionIssue] {
        &self.issues
    }

    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Join a roster snapshot with breakdowns from `service`.
///
/// An empty roster short-circuits without contacting the service. The join is
/// inner: employees the service omits are excluded and reported as
/// [`ProjectionIssue::MissingBreakdown`].
pub async fn project<S>(
    employees: &[Employee],
    service: &S,
) -> Result<PayrollProjection, ApplicationError>
where
    S: PayrollComputationService + ?Sized,
{
    if employees.is_empty() {
        return Ok(PayrollProjection::default());
    }

    let records = service.compute(employees).await?;
    Ok(join(employees, records))
}

fn join(employees: &[Employee], records: Vec<PayrollRecord>) -> PayrollProjection {
    let roster_ids = employees.iter().map(|employee| employee.id).collect::<BTreeSet<_>>();
    let mut issues = Vec::new();
    let mut reported = BTreeMap::new();

    for record in records {
        if !roster_ids.contains(&record.id) {
            issues.push(ProjectionIssue::UnexpectedBreakdown { id: record.id });
            continue;
        }
        if reported.contains_key(&record.id) {
            issues.push(ProjectionIssue::DuplicateBreakdown { id: record.id });
            continue;
        }
        reported.insert(record.id, record.breakdown);
    }

    let mut views = BTreeMap::new();
    for employee in employees {
        let Some(reported) = reported.remove(&employee.id) else {
            issues.push(ProjectionIssue::MissingBreakdown { id: employee.id });
            continue;
        };

        let expected = compute_breakdown(employee);
        if !agrees_with_rules(&reported, &expected) {
            issues.push(ProjectionIssue::RuleMismatch {
                id: employee.id,
                reported,
                expected: expected.clone(),
            });
        }

        views.insert(employee.id, EmployeeView { employee: employee.clone(), payroll: expected });
    }

    if issues.is_empty() {
        debug!(
            event_name = "payroll.projection_joined",
            employee_count = views.len(),
            "payroll projection joined"
        );
    } else {
        warn!(
            event_name = "payroll.projection_inconsistent",
            employee_count = views.len(),
            issue_count = issues.len(),
            "computation result disagreed with roster snapshot"
        );
    }

    PayrollProjection { generation: 0, views, issues }
}

fn agrees_with_rules(reported: &PayrollBreakdown, expected: &PayrollBreakdown) -> bool {
    let pairs = [
        (reported.gross_pay, expected.gross_pay),
        (reported.taxes, expected.taxes),
        (reported.insurance, expected.insurance),
        (reported.pf, expected.pf),
        (reported.esic, expected.esic),
        (reported.net_pay, expected.net_pay),
    ];
    pairs.iter().all(|(reported, expected)| {
        reported.checked_sub(*expected).is_some_and(|delta| delta.abs() <= RULE_TOLERANCE)
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use crate::domain::employee::{Department, Employee, EmployeeId};
    use crate::domain::payroll::PayrollRecord;
    use crate::errors::ApplicationError;
    use crate::payroll::rules::compute_breakdown;
    use crate::payroll::service::{LocalComputationService, PayrollComputationService};

    use super::{project, ProjectionIssue};

    #[derive(Default)]
    struct CountingService {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PayrollComputationService for CountingService {
        async fn compute(
            &self,
            employees: &[Employee],
        ) -> Result<Vec<PayrollRecord>, ApplicationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            LocalComputationService::deterministic().compute(employees).await
        }
    }

    struct ScriptedService {
        records: Vec<PayrollRecord>,
    }

    #[async_trait]
    impl PayrollComputationService for ScriptedService {
        async fn compute(
            &self,
            _employees: &[Employee],
        ) -> Result<Vec<PayrollRecord>, ApplicationError> {
            Ok(self.records.clone())
        }
    }

    struct FailingService;

    #[async_trait]
    impl PayrollComputationService for FailingService {
        async fn compute(
            &self,
            _employees: &[Employee],
        ) -> Result<Vec<PayrollRecord>, ApplicationError> {
            Err(ApplicationError::ComputationServiceFailure("upstream returned 502".to_string()))
        }
    }

    fn employee(id: u64, salary: i64) -> Employee {
        Employee {
            id: EmployeeId(id),
            name: format!("Employee {id}"),
            department: Department::Sales,
            role: "Sales Executive".to_string(),
            salary: Decimal::from(salary),
            hours_worked: Decimal::from(160),
            overtime_hours: Decimal::from(4),
        }
    }

    fn record(employee: &Employee) -> PayrollRecord {
        PayrollRecord { id: employee.id, breakdown: compute_breakdown(employee) }
    }

    #[tokio::test]
    async fn empty_roster_never_reaches_the_service() {
        let service = CountingService::default();
        let projection = project(&[], &service).await.expect("empty projection");

        assert!(projection.is_empty());
        assert!(projection.is_consistent());
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn joins_every_employee_by_id() {
        let roster = vec![employee(1, 900_000), employee(2, 1_500_000)];
        let service = CountingService::default();
        let projection = project(&roster, &service).await.expect("projection");

        assert_eq!(projection.len(), 2);
        assert!(projection.is_consistent());
        let view = projection.get(EmployeeId(2)).expect("view for employee 2");
        assert_eq!(view.employee, roster[1]);
        assert_eq!(view.payroll, compute_breakdown(&roster[1]));
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn omitted_employee_is_excluded_and_reported() {
        let roster = vec![employee(1, 900_000), employee(2, 1_500_000), employee(3, 600_000)];
        let service = ScriptedService { records: vec![record(&roster[0]), record(&roster[2])] };

        let projection = project(&roster, &service).await.expect("partial projection");

        assert_eq!(projection.len(), 2);
        assert!(projection.get(EmployeeId(2)).is_none());
        assert_eq!(projection.issues(), &[ProjectionIssue::MissingBreakdown { id: EmployeeId(2) }]);
    }

    #[tokio::test]
    async fn untrusted_figures_are_replaced_by_rule_engine_output() {
        let roster = vec![employee(1, 1_200_000)];
        let mut tampered = record(&roster[0]);
        tampered.breakdown.net_pay += Decimal::from(5_000);
        let service = ScriptedService { records: vec![tampered.clone()] };

        let projection = project(&roster, &service).await.expect("projection");

        let view = projection.get(EmployeeId(1)).expect("view is kept");
        assert_eq!(view.payroll, compute_breakdown(&roster[0]));
        assert!(matches!(
            projection.issues(),
            [ProjectionIssue::RuleMismatch { id, reported, .. }]
                if *id == EmployeeId(1) && *reported == tampered.breakdown
        ));
    }

    #[tokio::test]
    async fn unexpected_and_duplicate_records_are_reported() {
        let roster = vec![employee(1, 800_000)];
        let stranger = employee(99, 800_000);
        let service = ScriptedService {
            records: vec![record(&roster[0]), record(&roster[0]), record(&stranger)],
        };

        let projection = project(&roster, &service).await.expect("projection");

        assert_eq!(projection.len(), 1);
        assert!(projection
            .issues()
            .contains(&ProjectionIssue::DuplicateBreakdown { id: EmployeeId(1) }));
        assert!(projection
            .issues()
            .contains(&ProjectionIssue::UnexpectedBreakdown { id: EmployeeId(99) }));
    }

    #[tokio::test]
    async fn service_failure_is_propagated() {
        let error = project(&[employee(1, 800_000)], &FailingService)
            .await
            .expect_err("failure should surface");
        assert!(matches!(error, ApplicationError::ComputationServiceFailure(_)));
    }
}
