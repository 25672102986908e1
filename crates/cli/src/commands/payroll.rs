use clap::Args;
use paydesk_core::config::{AppConfig, LoadOptions};
use paydesk_core::payroll::{PayrollReport, SortKey};
use paydesk_core::{Department, ProjectionIssue, ViewQuery};

use super::{block_on, build_projector, CommandResult, EXIT_COMPUTATION, EXIT_CONFIG, EXIT_RUNTIME};

#[derive(Debug, Clone, Default, Args)]
pub struct PayrollArgs {
    #[arg(long, help = "Emit machine-readable JSON output")]
    pub json: bool,
    #[arg(long, value_parser = parse_department, help = "Only show one department")]
    pub department: Option<Department>,
    #[arg(long, help = "Case-insensitive name search")]
    pub search: Option<String>,
    #[arg(long, value_parser = parse_sort_key, help = "Sort by name, role, grossPay or netPay")]
    pub sort: Option<SortKey>,
    #[arg(long, help = "Sort descending")]
    pub desc: bool,
}

impl PayrollArgs {
    fn query(&self) -> ViewQuery {
        ViewQuery {
            department: self.department,
            search: self.search.clone(),
            sort: self.sort,
            descending: self.desc,
        }
    }
}

fn parse_department(value: &str) -> Result<Department, String> {
    value.parse::<Department>().map_err(|error| error.to_string())
}

fn parse_sort_key(value: &str) -> Result<SortKey, String> {
    value.parse::<SortKey>().map_err(|error| error.to_string())
}

pub fn run(args: &PayrollArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("payroll", "config_validation", error.to_string(), EXIT_CONFIG)
        }
    };

    let projector = match build_projector(&config) {
        Ok(projector) => projector,
        Err(error) => {
            return CommandResult::failure("payroll", "config_validation", error.to_string(), EXIT_CONFIG)
        }
    };

    let projection = match block_on(projector.refresh()) {
        Ok(Ok(projection)) => projection,
        Ok(Err(error)) => {
            return CommandResult::failure(
                "payroll",
                "computation",
                error.to_string(),
                EXIT_COMPUTATION,
            )
        }
        Err(error) => return CommandResult::failure("payroll", "runtime", error, EXIT_RUNTIME),
    };

    let report = PayrollReport::build(&projection, &args.query());
    if args.json {
        return match serde_json::to_string_pretty(&report) {
            Ok(output) => CommandResult { exit_code: 0, output },
            Err(error) => {
                CommandResult::failure("payroll", "serialization", error.to_string(), EXIT_RUNTIME)
            }
        };
    }

    CommandResult { exit_code: 0, output: render_table(&report) }
}

fn render_table(report: &PayrollReport) -> String {
    let mut lines = vec![format!(
        "{:>4}  {:<22} {:<22} {:<26} {:>12} {:>12} {:>12}",
        "id", "name", "department", "role", "gross", "deductions", "net"
    )];

    for view in &report.employees {
        lines.push(format!(
            "{:>4}  {:<22} {:<22} {:<26} {:>12.2} {:>12.2} {:>12.2}",
            view.employee.id.to_string(),
            view.employee.name,
            view.employee.department.display_name(),
            view.employee.role,
            view.payroll.gross_pay,
            view.payroll.total_deductions(),
            view.payroll.net_pay,
        ));
    }

    let summary = &report.summary;
    lines.push(format!(
        "showing {} of {} employees; total gross {:.2}, deductions {:.2}, net {:.2}",
        report.employees.len(),
        summary.headcount,
        summary.total_gross_pay,
        summary.total_deductions,
        summary.total_net_pay,
    ));

    for issue in &report.issues {
        lines.push(format!("warning: {}", describe_issue(issue)));
    }

    lines.join("\n")
}

fn describe_issue(issue: &ProjectionIssue) -> String {
    match issue {
        ProjectionIssue::MissingBreakdown { id } => {
            format!("employee {id} has no breakdown and is not shown")
        }
        ProjectionIssue::UnexpectedBreakdown { id } => {
            format!("computation returned unknown employee {id}")
        }
        ProjectionIssue::DuplicateBreakdown { id } => {
            format!("computation returned employee {id} more than once")
        }
        ProjectionIssue::RuleMismatch { id, .. } => {
            format!("computation disagreed with payroll rules for employee {id}; rule figures used")
        }
    }
}
