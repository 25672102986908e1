use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::employee::Department;
use crate::domain::payroll::EmployeeView;
use crate::errors::DomainError;
use crate::payroll::projection::{PayrollProjection, ProjectionIssue};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollSummary {
    pub headcount: usize,
    pub total_gross_pay: Decimal,
    pub total_deductions: Decimal,
    pub total_net_pay: Decimal,
}

impl PayrollSummary {
    pub fn from_views<'a>(views: impl IntoIterator<Item = &'a EmployeeView>) -> Self {
        views.into_iter().fold(Self::default(), |mut summary, view| {
            summary.headcount += 1;
            summary.total_gross_pay += view.payroll.gross_pay;
            summary.total_deductions += view.payroll.total_deductions();
            summary.total_net_pay += view.payroll.net_pay;
            summary
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentTotal {
    pub department: Department,
    pub headcount: usize,
    pub total_net_pay: Decimal,
}

/// Net pay per department, in catalogue order. Departments with no views are omitted.
pub fn department_totals<'a>(
    views: impl IntoIterator<Item = &'a EmployeeView>,
) -> Vec<DepartmentTotal> {
    let mut totals = BTreeMap::<Department, DepartmentTotal>::new();
    for view in views {
        let department = view.department();
        let entry = totals.entry(department).or_insert_with(|| DepartmentTotal {
            department,
            headcount: 0,
            total_net_pay: Decimal::ZERO,
        });
        entry.headcount += 1;
        entry.total_net_pay += view.payroll.net_pay;
    }
    totals.into_values().collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    Name,
    Role,
    GrossPay,
    NetPay,
}

impl SortKey {
    fn compare(self, left: &EmployeeView, right: &EmployeeView) -> Ordering {
        match self {
            Self::Name => left.employee.name.to_lowercase().cmp(&right.employee.name.to_lowercase()),
            Self::Role => left.employee.role.to_lowercase().cmp(&right.employee.role.to_lowercase()),
            Self::GrossPay => left.payroll.gross_pay.cmp(&right.payroll.gross_pay),
            Self::NetPay => left.payroll.net_pay.cmp(&right.payroll.net_pay),
        }
    }
}

impl FromStr for SortKey {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "name" => Ok(Self::Name),
            "role" => Ok(Self::Role),
            "grosspay" | "gross" => Ok(Self::GrossPay),
            "netpay" | "net" => Ok(Self::NetPay),
            other => Err(DomainError::InvariantViolation(format!(
                "unsupported sort key `{other}`; expected name, role, grossPay or netPay"
            ))),
        }
    }
}

/// Presentation filter over projected views. Never touches the roster.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewQuery {
    pub department: Option<Department>,
    pub search: Option<String>,
    pub sort: Option<SortKey>,
    pub descending: bool,
}

impl ViewQuery {
    pub fn apply<'a>(&self, views: impl IntoIterator<Item = &'a EmployeeView>) -> Vec<EmployeeView> {
        let needle = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|needle| !needle.is_empty())
            .map(str::to_lowercase);

        let mut selected = views
            .into_iter()
            .filter(|view| self.department.map_or(true, |department| view.department() == department))
            .filter(|view| {
                needle
                    .as_deref()
                    .map_or(true, |needle| view.employee.name.to_lowercase().contains(needle))
            })
            .cloned()
            .collect::<Vec<_>>();

        if let Some(key) = self.sort {
            selected.sort_by(|left, right| {
                let ordering = key.compare(left, right);
                if self.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }
        selected
    }
}

/// Filtered views plus the whole-projection totals, as served to operators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollReport {
    pub generation: u64,
    pub employees: Vec<EmployeeView>,
    pub summary: PayrollSummary,
    pub departments: Vec<DepartmentTotal>,
    pub issues: Vec<ProjectionIssue>,
}

impl PayrollReport {
    pub fn build(projection: &PayrollProjection, query: &ViewQuery) -> Self {
        Self {
            generation: projection.generation(),
            employees: query.apply(projection.views()),
            summary: PayrollSummary::from_views(projection.views()),
            departments: department_totals(projection.views()),
            issues: projection.issues().to_vec(),
        }
    }
}
