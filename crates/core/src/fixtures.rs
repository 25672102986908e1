//! Demo roster used by the CLI and server when `payroll.seed_roster` is enabled.

use rust_decimal::Decimal;

use crate::domain::employee::{Department, Department::*, Employee, EmployeeId};
use crate::roster::RosterStore;

type SeedRow = (u64, &'static str, Department, &'static str, i64, i64, i64);

#[rustfmt::skip]
const SEED_ROWS: [SeedRow; 30] = [
    (1, "Ravi Kumar", Engineering, "Senior Developer", 1_800_000, 160, 10),
    (2, "Sunita Singh", Engineering, "DevOps Engineer", 1_600_000, 165, 5),
    (3, "Priya Sharma", Sales, "Sales Manager", 2_200_000, 160, 20),
    (4, "Vikram Mehta", Sales, "Sales Executive", 900_000, 170, 15),
    (5, "Amit Singh", Marketing, "Digital Marketer", 1_200_000, 170, 0),
    (6, "Anjali Gupta", Marketing, "Content Strategist", 1_100_000, 160, 8),
    (7, "Neha Reddy", Hr, "HR Manager", 1_500_000, 160, 0),
    (8, "Rajesh Patel", Hr, "Recruiter", 850_000, 160, 12),
    (9, "Sanjay Verma", Finance, "Financial Analyst", 1_400_000, 160, 5),
    (10, "Pooja Desai", Finance, "Accountant", 1_000_000, 168, 0),
    (11, "Deepak Joshi", It, "System Administrator", 1_300_000, 160, 18),
    (12, "Meera Iyer", It, "IT Support Specialist", 750_000, 175, 10),
    (13, "Arun Nair", Operations, "Operations Manager", 1_900_000, 160, 0),
    (14, "Kavita Rao", Operations, "Logistics Coordinator", 800_000, 160, 25),
    (15, "Manoj Tiwari", CustomerSupport, "Support Lead", 950_000, 160, 30),
    (16, "Geeta Bisht", CustomerSupport, "Support Representative", 600_000, 180, 20),
    (17, "Aditya Chopra", ProductManagement, "Product Manager", 2_500_000, 160, 10),
    (18, "Smita Krishnan", ProductManagement, "Associate Product Manager", 1_500_000, 160, 5),
    (19, "Rohan Shetty", Design, "Lead UI/UX Designer", 1_700_000, 160, 0),
    (20, "Isha Negi", Design, "Graphic Designer", 900_000, 165, 0),
    (21, "Vivek Anand", QualityAssurance, "QA Lead", 1_650_000, 160, 15),
    (22, "Divya Soni", QualityAssurance, "QA Tester", 850_000, 170, 10),
    (23, "Harish Shankar", Legal, "Corporate Counsel", 2_800_000, 160, 0),
    (24, "Tanvi Shah", Legal, "Paralegal", 1_100_000, 160, 0),
    (25, "Alok Nath", ResearchAndDevelopment, "Research Scientist", 2_000_000, 160, 8),
    (26, "Bhavna Jha", ResearchAndDevelopment, "Lab Technician", 950_000, 160, 2),
    (27, "Umesh Yadav", Administration, "Office Manager", 1_050_000, 160, 0),
    (28, "Preeti Menon", Administration, "Administrative Assistant", 650_000, 160, 5),
    (29, "Gaurav Khanna", PublicRelations, "PR Manager", 1_750_000, 160, 10),
    (30, "Rina Dsouza", PublicRelations, "PR Specialist", 980_000, 160, 3),
];

pub fn seed_employees() -> Vec<Employee> {
    SEED_ROWS
        .iter()
        .map(|&(id, name, department, role, salary, hours_worked, overtime_hours)| Employee {
            id: EmployeeId(id),
            name: name.to_string(),
            department,
            role: role.to_string(),
            salary: Decimal::from(salary),
            hours_worked: Decimal::from(hours_worked),
            overtime_hours: Decimal::from(overtime_hours),
        })
        .collect()
}

impl RosterStore {
    pub fn seeded() -> Self {
        Self::with_employees(seed_employees())
    }
}
