use std::env;
use std::io::Cursor;
use std::sync::{Mutex, OnceLock};

use paydesk_cli::commands::payroll::PayrollArgs;
use paydesk_cli::commands::{chat, config, doctor, payroll};
use paydesk_core::payroll::SortKey;
use paydesk_core::Department;
use serde_json::Value;

#[test]
fn config_reports_sources_and_redacts_credentials() {
    with_env(
        &[
            ("PAYDESK_AGENT_PROVIDER", "http"),
            ("PAYDESK_AGENT_BASE_URL", "https://analyst.example.test/v1/turns"),
            ("PAYDESK_AGENT_API_KEY", "sk-live-very-secret"),
            ("PAYDESK_LOG_LEVEL", "debug"),
        ],
        || {
            let output = config::run();

            assert!(output.contains(
                "- agent.provider = http (source: env (PAYDESK_AGENT_PROVIDER))"
            ));
            assert!(output.contains("- agent.api_key = sk-*** (source: env (PAYDESK_AGENT_API_KEY))"));
            assert!(output.contains("- payroll.api_key = <unset> (source: default)"));
            assert!(output.contains("- logging.level = debug (source: env (PAYDESK_LOG_LEVEL))"));
            assert!(!output.contains("very-secret"));
        },
    );
}

#[test]
fn config_reports_validation_failure() {
    with_env(&[("PAYDESK_AGENT_PROVIDER", "http")], || {
        let output = config::run();
        assert!(output.starts_with("config validation failed"), "{output}");
    });
}

#[test]
fn doctor_passes_with_defaults() {
    with_env(&[], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0, "expected all checks to pass: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");
        let checks = payload["checks"].as_array().expect("checks array");
        assert_eq!(checks.len(), 3);
        assert_eq!(checks[1]["name"], "payroll_computation");
        assert!(checks[1]["details"].as_str().unwrap_or_default().contains("30 employees"));
    });
}

#[test]
fn doctor_fails_when_payroll_service_is_unreachable() {
    with_env(
        &[
            ("PAYDESK_PAYROLL_COMPUTATION", "http"),
            ("PAYDESK_PAYROLL_SERVICE_URL", "http://127.0.0.1:9/compute"),
            ("PAYDESK_PAYROLL_TIMEOUT_SECS", "1"),
            ("PAYDESK_PAYROLL_MAX_RETRIES", "0"),
        ],
        || {
            let result = doctor::run(true);
            assert_eq!(result.exit_code, 1);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["overall_status"], "fail");
            assert_eq!(payload["checks"][1]["status"], "fail");
            assert_eq!(payload["checks"][2]["status"], "pass");
        },
    );
}

#[test]
fn doctor_skips_checks_when_config_is_invalid() {
    with_env(&[("PAYDESK_PAYROLL_COMPUTATION", "http")], || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 1);
        assert!(result.output.contains("- [fail] config_validation"));
        assert!(result.output.contains("- [skip] payroll_computation"));
    });
}

#[test]
fn payroll_json_covers_seeded_roster() {
    with_env(&[], || {
        let result = payroll::run(&PayrollArgs { json: true, ..PayrollArgs::default() });
        assert_eq!(result.exit_code, 0, "{}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["employees"].as_array().map(Vec::len), Some(30));
        assert_eq!(payload["summary"]["headcount"], 30);
        assert_eq!(payload["departments"].as_array().map(Vec::len), Some(15));
        assert_eq!(payload["issues"].as_array().map(Vec::len), Some(0));
        assert_eq!(payload["employees"][0]["name"], "Ravi Kumar");
        assert!(payload["employees"][0]["netPay"]
            .as_str()
            .is_some_and(|net_pay| net_pay.starts_with("112250")));
    });
}

#[test]
fn payroll_filters_and_sorts_views_without_changing_totals() {
    with_env(&[], || {
        let args = PayrollArgs {
            json: true,
            department: Some(Department::Legal),
            sort: Some(SortKey::NetPay),
            desc: true,
            ..PayrollArgs::default()
        };
        let payload = parse_payload(&payroll::run(&args).output);

        let names = payload["employees"]
            .as_array()
            .expect("employees")
            .iter()
            .map(|view| view["name"].as_str().unwrap_or_default().to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Harish Shankar", "Tanvi Shah"]);
        assert_eq!(payload["summary"]["headcount"], 30);
    });
}

#[test]
fn payroll_table_for_empty_roster() {
    with_env(&[("PAYDESK_PAYROLL_SEED_ROSTER", "false")], || {
        let result = payroll::run(&PayrollArgs::default());
        assert_eq!(result.exit_code, 0);
        assert!(result.output.contains("showing 0 of 0 employees"));
    });
}

#[test]
fn payroll_reports_computation_failure() {
    with_env(
        &[
            ("PAYDESK_PAYROLL_COMPUTATION", "http"),
            ("PAYDESK_PAYROLL_SERVICE_URL", "http://127.0.0.1:9/compute"),
            ("PAYDESK_PAYROLL_TIMEOUT_SECS", "1"),
            ("PAYDESK_PAYROLL_MAX_RETRIES", "0"),
        ],
        || {
            let result = payroll::run(&PayrollArgs::default());
            assert_eq!(result.exit_code, 3);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "payroll");
            assert_eq!(payload["error_class"], "computation");
        },
    );
}

#[test]
fn chat_runs_offline_analyst_and_reopens_after_roster_change() {
    with_env(&[], || {
        let input = Cursor::new(
            "who earns most?\n\nadd Asha Rao to Engineering as Analyst at 12 lakh\nexit\n",
        );
        let mut transcript = Vec::new();

        let result = chat::run_with_io(input, &mut transcript);
        assert_eq!(result.exit_code, 0, "{}", result.output);

        let transcript = String::from_utf8(transcript).expect("utf8 transcript");
        assert!(transcript.contains("analyst> 30 employees"), "{transcript}");
        assert!(transcript.contains("analyst> Harish Shankar"));
        assert!(transcript.contains("tool> added Asha Rao (estimated net pay ₹67,000/month)"));
        assert!(transcript.contains("analyst> Done. I've added Asha Rao to the payroll"));
        assert!(transcript.contains("-- roster changed; starting a new analysis --"));
        assert!(transcript.contains("analyst> 31 employees"));

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["message"], "session ended after 2 turns; roster has 31 employees");
    });
}

#[test]
fn chat_rejects_incomplete_hire_without_touching_roster() {
    with_env(&[], || {
        let input = Cursor::new("add Meera to Design\n");
        let mut transcript = Vec::new();

        let result = chat::run_with_io(input, &mut transcript);
        let transcript = String::from_utf8(transcript).expect("utf8 transcript");

        assert!(transcript.contains("tool> Invalid `role` for add_employee"), "{transcript}");
        assert!(!transcript.contains("roster changed"));
        assert_eq!(
            parse_payload(&result.output)["message"],
            "session ended after 1 turns; roster has 30 employees"
        );
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "PAYDESK_AGENT_PROVIDER",
        "PAYDESK_AGENT_BASE_URL",
        "PAYDESK_AGENT_API_KEY",
        "PAYDESK_AGENT_MODEL",
        "PAYDESK_AGENT_TIMEOUT_SECS",
        "PAYDESK_AGENT_MAX_RETRIES",
        "PAYDESK_PAYROLL_COMPUTATION",
        "PAYDESK_PAYROLL_SERVICE_URL",
        "PAYDESK_PAYROLL_API_KEY",
        "PAYDESK_PAYROLL_TIMEOUT_SECS",
        "PAYDESK_PAYROLL_MAX_RETRIES",
        "PAYDESK_PAYROLL_MAX_RECOMPUTE_ATTEMPTS",
        "PAYDESK_PAYROLL_SEED_ROSTER",
        "PAYDESK_SERVER_BIND_ADDRESS",
        "PAYDESK_SERVER_PORT",
        "PAYDESK_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "PAYDESK_LOGGING_LEVEL",
        "PAYDESK_LOGGING_FORMAT",
        "PAYDESK_LOG_LEVEL",
        "PAYDESK_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
