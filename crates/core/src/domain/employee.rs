use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeId(pub u64);

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Department {
    Engineering,
    Sales,
    Marketing,
    #[serde(rename = "HR")]
    Hr,
    Finance,
    #[serde(rename = "IT")]
    It,
    Operations,
    #[serde(rename = "Customer Support")]
    CustomerSupport,
    #[serde(rename = "Product Management")]
    ProductManagement,
    Design,
    #[serde(rename = "Quality Assurance")]
    QualityAssurance,
    Legal,
    #[serde(rename = "Research & Development")]
    ResearchAndDevelopment,
    Administration,
    #[serde(rename = "Public Relations")]
    PublicRelations,
}

impl Department {
    pub const ALL: [Department; 15] = [
        Self::Engineering,
        Self::Sales,
        Self::Marketing,
        Self::Hr,
        Self::Finance,
        Self::It,
        Self::Operations,
        Self::CustomerSupport,
        Self::ProductManagement,
        Self::Design,
        Self::QualityAssurance,
        Self::Legal,
        Self::ResearchAndDevelopment,
        Self::Administration,
        Self::PublicRelations,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Engineering => "Engineering",
            Self::Sales => "Sales",
            Self::Marketing => "Marketing",
            Self::Hr => "HR",
            Self::Finance => "Finance",
            Self::It => "IT",
            Self::Operations => "Operations",
            Self::CustomerSupport => "Customer Support",
            Self::ProductManagement => "Product Management",
            Self::Design => "Design",
            Self::QualityAssurance => "Quality Assurance",
            Self::Legal => "Legal",
            Self::ResearchAndDevelopment => "Research & Development",
            Self::Administration => "Administration",
            Self::PublicRelations => "Public Relations",
        }
    }

    /// Comma separated display names, used in tool declarations and prompts.
    pub fn catalogue() -> String {
        Self::ALL.iter().map(Department::display_name).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Department {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(value);
        if normalized.is_empty() {
            return Err(DomainError::UnknownDepartment(value.to_string()));
        }

        Self::ALL
            .iter()
            .copied()
            .find(|department| normalize(department.display_name()) == normalized)
            .ok_or_else(|| DomainError::UnknownDepartment(value.trim().to_string()))
    }
}

fn normalize(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_lowercase()
}

/// Upper bound on annual salary (INR). Keeps every payroll rule within `Decimal` range.
pub const MAX_ANNUAL_SALARY: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);
/// Hours in a 31-day month.
pub const MAX_MONTHLY_HOURS: Decimal = Decimal::from_parts(744, 0, 0, false, 0);

/// Roster attributes of an employee before an id has been assigned.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEmployee {
    pub name: String,
    pub department: Department,
    pub role: String,
    /// Annual salary in INR.
    pub salary: Decimal,
    /// Hours worked this month.
    pub hours_worked: Decimal,
    /// Overtime hours this month.
    pub overtime_hours: Decimal,
}

impl NewEmployee {
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_attributes(
            &self.name,
            &self.role,
            self.salary,
            self.hours_worked,
            self.overtime_hours,
        )
    }

    pub(crate) fn with_id(self, id: EmployeeId) -> Employee {
        Employee {
            id,
            name: self.name.trim().to_string(),
            department: self.department,
            role: self.role.trim().to_string(),
            salary: self.salary,
            hours_worked: self.hours_worked,
            overtime_hours: self.overtime_hours,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub department: Department,
    pub role: String,
    pub salary: Decimal,
    pub hours_worked: Decimal,
    pub overtime_hours: Decimal,
}

impl Employee {
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_attributes(
            &self.name,
            &self.role,
            self.salary,
            self.hours_worked,
            self.overtime_hours,
        )
    }
}

fn validate_attributes(
    name: &str,
    role: &str,
    salary: Decimal,
    hours_worked: Decimal,
    overtime_hours: Decimal,
) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::InvariantViolation("employee name must not be empty".to_string()));
    }
    if role.trim().is_empty() {
        return Err(DomainError::InvariantViolation("employee role must not be empty".to_string()));
    }
    if salary < Decimal::ZERO {
        return Err(DomainError::InvariantViolation("salary must not be negative".to_string()));
    }
    if salary > MAX_ANNUAL_SALARY {
        return Err(DomainError::InvariantViolation(format!(
            "salary must not exceed {MAX_ANNUAL_SALARY}"
        )));
    }
    if hours_worked < Decimal::ZERO {
        return Err(DomainError::InvariantViolation(
            "hours worked must not be negative".to_string(),
        ));
    }
    if overtime_hours < Decimal::ZERO {
        return Err(DomainError::InvariantViolation(
            "overtime hours must not be negative".to_string(),
        ));
    }
    if hours_worked > MAX_MONTHLY_HOURS || overtime_hours > MAX_MONTHLY_HOURS {
        return Err(DomainError::InvariantViolation(format!(
            "hours worked and overtime hours must not exceed {MAX_MONTHLY_HOURS} per month"
        )));
    }
    Ok(())
}
