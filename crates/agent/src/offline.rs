//! Deterministic analyst used when no remote agent is configured.
//!
//! It answers short questions from the projection context and turns
//! requests like "add Asha Rao to Engineering as Analyst at 12 lakh" into
//! `add_employee` tool calls. Fields it cannot find are left out of the
//! call so the runtime's validation reports them.

use anyhow::Result;
use async_trait::async_trait;
use paydesk_core::Department;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::{Map, Value};

use crate::llm::{AgentReply, AgentRequest, LlmClient, PayrollContext, TurnInput};
use crate::tools::{ToolCall, ToolExecutionResult, ADD_EMPLOYEE};

#[derive(Clone, Debug, Default)]
pub struct OfflineAnalyst;

impl OfflineAnalyst {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LlmClient for OfflineAnalyst {
    async fn respond(&self, request: &AgentRequest) -> Result<AgentReply> {
        let reply = match &request.input {
            TurnInput::ToolResponse { result, .. } => AgentReply::text(confirm(result)),
            TurnInput::Text { text } => match extract_hire(text) {
                Some(call) if offers_tool(request) => AgentReply::ToolCall { call },
                _ => AgentReply::text(answer(text, &request.context)),
            },
        };
        Ok(reply)
    }
}

fn offers_tool(request: &AgentRequest) -> bool {
    request.tools.iter().any(|tool| tool.name == ADD_EMPLOYEE)
}

fn confirm(result: &ToolExecutionResult) -> String {
    match result {
        ToolExecutionResult::Success { employee_name, net_pay } => format!(
            "Done. I've added {employee_name} to the payroll; estimated monthly net pay is {}.",
            format_inr(*net_pay)
        ),
        ToolExecutionResult::Error { message } => {
            format!("I couldn't add that employee. {message}")
        }
    }
}

fn answer(text: &str, context: &PayrollContext) -> String {
    if context.employees.is_empty() {
        return "The roster is empty, so there is no payroll to analyse yet.".to_string();
    }

    let normalized = text.to_ascii_lowercase();
    let summary = &context.summary;
    if normalized.starts_with(INITIAL_ANALYSIS_PREFIX) {
        return overview(context);
    }

    if mentions_any(&normalized, &["highest", "top earner", "earns most", "most paid", "best paid"]) {
        if let Some(top) = context.employees.iter().max_by_key(|view| view.payroll.net_pay) {
            return format!(
                "{} ({}, {}) has the highest net pay at {} per month.",
                top.employee.name,
                top.employee.role,
                top.employee.department,
                format_inr(top.payroll.net_pay)
            );
        }
    }

    if mentions_any(&normalized, &["lowest", "least paid", "earns least"]) {
        if let Some(bottom) = context.employees.iter().min_by_key(|view| view.payroll.net_pay) {
            return format!(
                "{} has the lowest net pay at {} per month.",
                bottom.employee.name,
                format_inr(bottom.payroll.net_pay)
            );
        }
    }

    if mentions_any(&normalized, &["esic"]) {
        let covered = context.employees.iter().filter(|view| view.payroll.esic > Decimal::ZERO).count();
        return format!(
            "{covered} of {} employees have gross pay at or below the ESIC threshold.",
            summary.headcount
        );
    }

    if let Some(department) = mentioned_department(&normalized) {
        return match context.departments.iter().find(|total| total.department == department) {
            Some(total) => format!(
                "{department} has {} employees with a combined monthly net pay of {}.",
                total.headcount,
                format_inr(total.total_net_pay)
            ),
            None => format!("There is nobody in {department} on the current roster."),
        };
    }

    overview(context)
}

fn overview(context: &PayrollContext) -> String {
    let summary = &context.summary;
    let top_department = context.departments.iter().max_by_key(|total| total.total_net_pay);
    let mut reply = format!(
        "{} employees, monthly gross {} and net {} after {} in deductions.",
        summary.headcount,
        format_inr(summary.total_gross_pay),
        format_inr(summary.total_net_pay),
        format_inr(summary.total_deductions)
    );
    if let Some(top) = top_department {
        reply.push_str(&format!(" {} carries the largest net payroll.", top.department));
    }
    reply
}

fn mentions_any(normalized: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| normalized.contains(phrase))
}

/// Longest catalogue name found in the text, so "Product Management" wins over shorter overlaps.
fn mentioned_department(normalized: &str) -> Option<Department> {
    Department::ALL
        .iter()
        .copied()
        .filter(|department| {
            let name = department.display_name().to_ascii_lowercase();
            contains_word(normalized, &name)
        })
        .max_by_key(|department| department.display_name().len())
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, matched)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + matched.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

const INITIAL_ANALYSIS_PREFIX: &str = "analyze the following payroll data";
const HIRE_VERBS: [&str; 3] = ["add ", "hire ", "onboard "];
const NAME_TERMINATORS: [&str; 7] = [" to ", " in ", " into ", " as ", " at ", " with ", ","];
const ROLE_TERMINATORS: [&str; 8] =
    [" at ", " with ", " on ", " earning ", " for ", " in ", " to ", ","];

fn extract_hire(text: &str) -> Option<ToolCall> {
    let lowered = text.to_ascii_lowercase();
    let (verb_start, verb) = HIRE_VERBS
        .iter()
        .filter_map(|verb| find_word(&lowered, verb).map(|index| (index, *verb)))
        .min_by_key(|(index, _)| *index)?;
    let rest_start = verb_start + verb.len();

    let mut args = Map::new();

    let name_end = earliest(&lowered, rest_start, &NAME_TERMINATORS).unwrap_or(lowered.len());
    let name = strip_articles(text[rest_start..name_end].trim());
    if !name.is_empty() {
        args.insert("name".to_string(), Value::String(name.to_string()));
    }

    if let Some(department) = mentioned_department(&lowered[rest_start..]) {
        args.insert("department".to_string(), Value::String(department.display_name().to_string()));
    }

    if let Some(as_index) = lowered[rest_start..].find(" as ").map(|index| index + rest_start) {
        let role_start = as_index + " as ".len();
        let role_end = earliest(&lowered, role_start, &ROLE_TERMINATORS).unwrap_or(lowered.len());
        let role = strip_articles(text[role_start..role_end].trim());
        if !role.is_empty() {
            args.insert("role".to_string(), Value::String(role.to_string()));
        }
    }

    if let Some(salary) = extract_salary(&tokenize(&lowered[name_end..])) {
        args.insert("salary".to_string(), salary_value(salary));
    }

    Some(ToolCall { name: ADD_EMPLOYEE.to_string(), args })
}

fn find_word(haystack: &str, word: &str) -> Option<usize> {
    haystack.match_indices(word).map(|(index, _)| index).find(|index| {
        *index == 0 || !haystack[..*index].chars().next_back().is_some_and(char::is_alphanumeric)
    })
}

fn earliest(haystack: &str, from: usize, markers: &[&str]) -> Option<usize> {
    markers.iter().filter_map(|marker| haystack[from..].find(marker).map(|index| index + from)).min()
}

fn strip_articles(value: &str) -> &str {
    let lowered = value.to_ascii_lowercase();
    for prefix in ["a new ", "new ", "an ", "a ", "employee "] {
        if lowered.starts_with(prefix) {
            return value[prefix.len()..].trim();
        }
    }
    value
}

fn tokenize(text: &str) -> Vec<String> {
    let mut sanitized = String::with_capacity(text.len());
    for character in text.chars() {
        if character.is_ascii_alphanumeric() || character == '.' {
            sanitized.push(character);
        } else if character == ',' {
            // digit grouping
        } else {
            sanitized.push(' ');
        }
    }
    sanitized.split_whitespace().map(|token| token.trim_end_matches('.').to_string()).collect()
}

fn extract_salary(tokens: &[String]) -> Option<Decimal> {
    for (index, token) in tokens.iter().enumerate() {
        let Some((amount, inline_unit)) = split_amount(token) else {
            continue;
        };
        let unit = if inline_unit.is_empty() {
            tokens.get(index + 1).map(String::as_str).unwrap_or_default()
        } else {
            inline_unit
        };
        return Some(amount * unit_multiplier(unit));
    }
    None
}

fn split_amount(token: &str) -> Option<(Decimal, &str)> {
    let split = token
        .find(|character: char| !(character.is_ascii_digit() || character == '.'))
        .unwrap_or(token.len());
    if split == 0 {
        return None;
    }
    let (number, unit) = token.split_at(split);
    Some((number.parse::<Decimal>().ok()?, unit))
}

fn unit_multiplier(unit: &str) -> Decimal {
    match unit {
        "k" | "thousand" => Decimal::from(1_000),
        "l" | "lac" | "lacs" | "lakh" | "lakhs" | "lpa" => Decimal::from(100_000),
        "m" | "mn" | "million" => Decimal::from(1_000_000),
        "cr" | "crore" | "crores" => Decimal::from(10_000_000),
        _ => Decimal::ONE,
    }
}

fn salary_value(salary: Decimal) -> Value {
    if salary.fract().is_zero() {
        if let Some(whole) = salary.to_u64() {
            return Value::from(whole);
        }
    }
    salary.to_f64().map(Value::from).unwrap_or(Value::Null)
}

/// Whole rupees with Indian digit grouping, e.g. `₹1,12,250`.
pub fn format_inr(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    let digits = rounded.abs().trunc().to_string();

    let grouped = if digits.len() <= 3 {
        digits
    } else {
        let (head, tail) = digits.split_at(digits.len() - 3);
        let mut groups = Vec::new();
        let mut remaining = head;
        while remaining.len() > 2 {
            let (rest, group) = remaining.split_at(remaining.len() - 2);
            groups.push(group);
            remaining = rest;
        }
        groups.push(remaining);
        groups.reverse();
        format!("{},{tail}", groups.join(","))
    };

    format!("{sign}₹{grouped}")
}
