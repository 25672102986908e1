use paydesk_agent::client_from_config;
use paydesk_core::config::{AgentProvider, AppConfig, ComputationMode, LoadOptions};
use serde::Serialize;

use super::{block_on, build_projector};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    fn exit_code(&self) -> u8 {
        if self.overall_status == CheckStatus::Pass {
            0
        } else {
            1
        }
    }
}

pub fn run(json_output: bool) -> super::CommandResult {
    let report = build_report();
    let exit_code = report.exit_code();

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    super::CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_payroll_computation(&config));
            checks.push(check_agent_readiness(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "payroll_computation",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
            checks.push(DoctorCheck {
                name: "agent_readiness",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_payroll_computation(config: &AppConfig) -> DoctorCheck {
    let fail = |details: String| DoctorCheck {
        name: "payroll_computation",
        status: CheckStatus::Fail,
        details,
    };

    let projector = match build_projector(config) {
        Ok(projector) => projector,
        Err(error) => return fail(error.to_string()),
    };

    match block_on(projector.refresh()) {
        Ok(Ok(projection)) => {
            let mode = match config.payroll.computation {
                ComputationMode::Local => "local rules".to_string(),
                ComputationMode::Http => format!(
                    "service `{}`",
                    config.payroll.service_url.as_deref().unwrap_or("<unset>")
                ),
            };
            let mut details = format!("projected {} employees using {mode}", projection.len());
            if !projection.is_consistent() {
                details.push_str(&format!(
                    " with {} reported inconsistencies",
                    projection.issues().len()
                ));
            }
            DoctorCheck { name: "payroll_computation", status: CheckStatus::Pass, details }
        }
        Ok(Err(error)) => fail(error.to_string()),
        Err(error) => fail(error),
    }
}

fn check_agent_readiness(config: &AppConfig) -> DoctorCheck {
    match client_from_config(&config.agent) {
        Ok(_) => {
            let details = match config.agent.provider {
                AgentProvider::Offline => "offline analyst ready".to_string(),
                AgentProvider::Http => format!(
                    "http analyst `{}` configured for `{}`",
                    config.agent.model,
                    config.agent.base_url.as_deref().unwrap_or("<unset>")
                ),
            };
            DoctorCheck { name: "agent_readiness", status: CheckStatus::Pass, details }
        }
        Err(error) => DoctorCheck {
            name: "agent_readiness",
            status: CheckStatus::Fail,
            details: format!("{error:#}"),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
