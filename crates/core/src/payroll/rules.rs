use rust_decimal::{Decimal, RoundingStrategy};

use crate::domain::employee::Employee;
use crate::domain::payroll::PayrollBreakdown;

pub const MONTHS_PER_YEAR: Decimal = Decimal::from_parts(12, 0, 0, false, 0);
/// Standard monthly hours used for the hourly rate, independent of hours worked.
pub const STANDARD_MONTHLY_HOURS: Decimal = Decimal::from_parts(160, 0, 0, false, 0);
pub const OVERTIME_MULTIPLIER: Decimal = Decimal::from_parts(15, 0, 0, false, 1);
pub const PF_RATE: Decimal = Decimal::from_parts(12, 0, 0, false, 2);
pub const ESIC_RATE: Decimal = Decimal::from_parts(75, 0, 0, false, 4);
/// ESIC applies while gross pay is at or below this amount.
pub const ESIC_GROSS_THRESHOLD: Decimal = Decimal::from_parts(21_000, 0, 0, false, 0);
pub const TAX_RATE: Decimal = Decimal::from_parts(20, 0, 0, false, 2);
pub const FLAT_INSURANCE: Decimal = Decimal::from_parts(1_000, 0, 0, false, 0);

const MONEY_SCALE: u32 = 2;

pub trait PayrollRuleEngine: Send + Sync {
    fn compute(&self, employee: &Employee) -> PayrollBreakdown;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicPayrollEngine;

impl PayrollRuleEngine for DeterministicPayrollEngine {
    fn compute(&self, employee: &Employee) -> PayrollBreakdown {
        compute_breakdown(employee)
    }
}

pub fn compute_breakdown(employee: &Employee) -> PayrollBreakdown {
    monthly_breakdown(employee.salary, employee.overtime_hours)
}

/// Take-home estimate for a hire who has not logged overtime yet.
pub fn estimate_new_hire(annual_salary: Decimal) -> PayrollBreakdown {
    monthly_breakdown(annual_salary, Decimal::ZERO)
}

fn monthly_breakdown(annual_salary: Decimal, overtime_hours: Decimal) -> PayrollBreakdown {
    let monthly_base = annual_salary / MONTHS_PER_YEAR;
    let hourly_rate = monthly_base / STANDARD_MONTHLY_HOURS;
    let overtime_pay = hourly_rate * OVERTIME_MULTIPLIER * overtime_hours;

    let gross_pay = money(monthly_base + overtime_pay);
    let pf = money(PF_RATE * monthly_base);
    let esic =
        if gross_pay <= ESIC_GROSS_THRESHOLD { money(ESIC_RATE * gross_pay) } else { Decimal::ZERO };
    let taxes = money(TAX_RATE * gross_pay);
    let insurance = FLAT_INSURANCE;
    let net_pay = gross_pay - taxes - insurance - pf - esic;

    PayrollBreakdown { gross_pay, taxes, insurance, pf, esic, net_pay }
}

fn money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}
