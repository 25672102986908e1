use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::employee::{Department, Employee, EmployeeId};

/// Monthly payroll figures for one employee, all amounts in INR.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollBreakdown {
    pub gross_pay: Decimal,
    pub taxes: Decimal,
    pub insurance: Decimal,
    pub pf: Decimal,
    pub esic: Decimal,
    pub net_pay: Decimal,
}

impl PayrollBreakdown {
    pub fn total_deductions(&self) -> Decimal {
        self.taxes + self.insurance + self.pf + self.esic
    }

    /// `net_pay + deductions == gross_pay`
    pub fn balances(&self) -> bool {
        self.net_pay + self.total_deductions() == self.gross_pay
    }
}

/// Breakdown tuple as exchanged with a batch computation service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollRecord {
    pub id: EmployeeId,
    #[serde(flatten)]
    pub breakdown: PayrollBreakdown,
}

/// Transient join of an employee and its breakdown. Never a source of truth.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeView {
    #[serde(flatten)]
    pub employee: Employee,
    #[serde(flatten)]
    pub payroll: PayrollBreakdown,
}

impl EmployeeView {
    pub fn id(&self) -> EmployeeId {
        self.employee.id
    }

    pub fn department(&self) -> Department {
        self.employee.department
    }
}
