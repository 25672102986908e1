use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use paydesk_core::payroll::estimate_new_hire;
use paydesk_core::{Department, NewEmployee, RosterStore};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{info, warn};

pub const ADD_EMPLOYEE: &str = "add_employee";

/// Hours credited to a hire created through the analyst.
pub const DEFAULT_HOURS_WORKED: Decimal = Decimal::from_parts(160, 0, 0, false, 0);

/// Structured request emitted by the agent. Never built from user text directly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        let args = match args {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { name: name.into(), args }
    }
}

/// Outcome of a tool call, always produced locally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolExecutionResult {
    #[serde(rename_all = "camelCase")]
    Success { employee_name: String, net_pay: Decimal },
    Error { message: String },
}

impl ToolExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolCallError {
    #[error("Unknown tool \"{name}\" requested by the analyst.")]
    UnknownTool { name: String },
    #[error("Invalid `{field}` for add_employee: {reason}")]
    Validation { field: &'static str, reason: String },
}

impl From<ToolCallError> for ToolExecutionResult {
    fn from(error: ToolCallError) -> Self {
        Self::Error { message: error.to_string() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddEmployeeRequest {
    pub name: String,
    pub department: Department,
    pub role: String,
    /// Annual salary in INR.
    pub salary: Decimal,
}

/// A tool call that has passed schema validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolRequest {
    AddEmployee(AddEmployeeRequest),
}

impl ToolRequest {
    pub fn decode(call: &ToolCall) -> Result<Self, ToolCallError> {
        match call.name.as_str() {
            ADD_EMPLOYEE => AddEmployeeRequest::decode(&call.args).map(Self::AddEmployee),
            other => Err(ToolCallError::UnknownTool { name: other.to_string() }),
        }
    }
}

impl AddEmployeeRequest {
    fn decode(args: &Map<String, Value>) -> Result<Self, ToolCallError> {
        let name = required_text(args, "name")?;
        let department = required_text(args, "department")?;
        let department = Department::from_str(&department).map_err(|_| ToolCallError::Validation {
            field: "department",
            reason: format!("`{department}` is not one of {}", Department::catalogue()),
        })?;
        let role = required_text(args, "role")?;
        let salary = required_salary(args)?;

        Ok(Self { name, department, role, salary })
    }

    fn into_new_employee(self) -> NewEmployee {
        NewEmployee {
            name: self.name,
            department: self.department,
            role: self.role,
            salary: self.salary,
            hours_worked: DEFAULT_HOURS_WORKED,
            overtime_hours: Decimal::ZERO,
        }
    }
}

fn required_text(args: &Map<String, Value>, field: &'static str) -> Result<String, ToolCallError> {
    match args.get(field) {
        None | Some(Value::Null) => {
            Err(ToolCallError::Validation { field, reason: "is required".to_string() })
        }
        Some(Value::String(text)) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        Some(Value::String(_)) => {
            Err(ToolCallError::Validation { field, reason: "must not be empty".to_string() })
        }
        Some(_) => Err(ToolCallError::Validation { field, reason: "must be a string".to_string() }),
    }
}

fn required_salary(args: &Map<String, Value>) -> Result<Decimal, ToolCallError> {
    let field = "salary";
    let number = match args.get(field) {
        None | Some(Value::Null) => {
            return Err(ToolCallError::Validation { field, reason: "is required".to_string() })
        }
        Some(Value::Number(number)) => number,
        Some(_) => {
            return Err(ToolCallError::Validation { field, reason: "must be a number".to_string() })
        }
    };

    let salary = if let Some(whole) = number.as_u64() {
        Some(Decimal::from(whole))
    } else if let Some(whole) = number.as_i64() {
        Some(Decimal::from(whole))
    } else {
        let literal = number.to_string();
        Decimal::from_str(&literal).or_else(|_| Decimal::from_scientific(&literal)).ok()
    };

    match salary {
        Some(salary) if salary > Decimal::ZERO => Ok(salary),
        Some(_) => Err(ToolCallError::Validation {
            field,
            reason: "must be greater than zero".to_string(),
        }),
        None => Err(ToolCallError::Validation {
            field,
            reason: format!("`{number}` is not a representable amount"),
        }),
    }
}

/// Function declaration sent to the agent with every request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

pub fn add_employee_declaration() -> ToolDeclaration {
    ToolDeclaration {
        name: ADD_EMPLOYEE.to_string(),
        description: "Adds a new employee to the payroll system.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Full name of the employee." },
                "department": {
                    "type": "string",
                    "enum": Department::ALL.iter().map(Department::display_name).collect::<Vec<_>>(),
                    "description": format!("Department the employee works in. Must be one of: {}.", Department::catalogue()),
                },
                "role": { "type": "string", "description": "Job title or role of the employee." },
                "salary": { "type": "number", "description": "Annual salary in Indian Rupees (INR)." },
            },
            "required": ["name", "department", "role", "salary"],
        }),
    }
}

pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn declaration(&self) -> ToolDeclaration;
    fn execute(&self, request: ToolRequest) -> ToolExecutionResult;
}

/// Creates the roster record and answers with the local take-home estimate.
pub struct AddEmployeeTool {
    roster: Arc<RosterStore>,
}

impl AddEmployeeTool {
    pub fn new(roster: Arc<RosterStore>) -> Self {
        Self { roster }
    }
}

impl Tool for AddEmployeeTool {
    fn name(&self) -> &'static str {
        ADD_EMPLOYEE
    }

    fn declaration(&self) -> ToolDeclaration {
        add_employee_declaration()
    }

    fn execute(&self, request: ToolRequest) -> ToolExecutionResult {
        let ToolRequest::AddEmployee(request) = request;
        let salary = request.salary;
        match self.roster.create(request.into_new_employee()) {
            Ok(employee) => {
                let estimate = estimate_new_hire(salary);
                info!(
                    event_name = "analyst.tool_executed",
                    tool = ADD_EMPLOYEE,
                    employee_id = %employee.id,
                    "analyst added employee"
                );
                ToolExecutionResult::Success { employee_name: employee.name, net_pay: estimate.net_pay }
            }
            Err(error) => ToolExecutionResult::Error { message: error.to_string() },
        }
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Registry holding the single roster tool.
    pub fn for_roster(roster: Arc<RosterStore>) -> Self {
        let mut registry = Self::default();
        registry.register(AddEmployeeTool::new(roster));
        registry
    }

    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        let mut declarations = self.tools.values().map(|tool| tool.declaration()).collect::<Vec<_>>();
        declarations.sort_by(|left, right| left.name.cmp(&right.name));
        declarations
    }

    /// Validates and runs `call`. Nothing is mutated unless validation succeeds.
    pub fn dispatch(&self, call: &ToolCall) -> ToolExecutionResult {
        let Some(tool) = self.tools.get(&call.name) else {
            warn!(event_name = "analyst.tool_rejected", tool = %call.name, "unknown tool requested");
            return ToolCallError::UnknownTool { name: call.name.clone() }.into();
        };

        match ToolRequest::decode(call) {
            Ok(request) => tool.execute(request),
            Err(error) => {
                warn!(
                    event_name = "analyst.tool_rejected",
                    tool = %call.name,
                    error = %error,
                    "tool call failed validation"
                );
                error.into()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use paydesk_core::{Department, RosterStore};
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{
        ToolCall, ToolCallError, ToolExecutionResult, ToolRegistry, ToolRequest, ADD_EMPLOYEE,
    };

    fn asha() -> ToolCall {
        ToolCall::new(
            ADD_EMPLOYEE,
            json!({"name": "Asha Rao", "department": "Engineering", "role": "Analyst", "salary": 1200000}),
        )
    }

    #[test]
    fn valid_call_adds_exactly_one_employee_with_default_hours() {
        let roster = Arc::new(RosterStore::new());
        let registry = ToolRegistry::for_roster(Arc::clone(&roster));

        let result = registry.dispatch(&asha());

        assert_eq!(
            result,
            ToolExecutionResult::Success {
                employee_name: "Asha Rao".to_string(),
                net_pay: Decimal::from(67_000)
            }
        );
        let employees = roster.list();
        assert_eq!(employees.len(), 1);
        assert_eq!(employees[0].department, Department::Engineering);
        assert_eq!(employees[0].hours_worked, Decimal::from(160));
        assert_eq!(employees[0].overtime_hours, Decimal::ZERO);
    }

    #[test]
    fn missing_salary_is_rejected_without_mutation() {
        let roster = Arc::new(RosterStore::new());
        let registry = ToolRegistry::for_roster(Arc::clone(&roster));
        let mut call = asha();
        call.args.remove("salary");

        let result = registry.dispatch(&call);

        assert!(matches!(result, ToolExecutionResult::Error { ref message } if message.contains("salary")));
        assert!(roster.is_empty());
        assert_eq!(roster.generation(), 0);
    }

    #[test]
    fn unknown_tool_is_rejected_without_mutation() {
        let roster = Arc::new(RosterStore::new());
        let registry = ToolRegistry::for_roster(Arc::clone(&roster));

        let result = registry.dispatch(&ToolCall::new("delete_employee", json!({"id": 4})));

        assert!(matches!(result, ToolExecutionResult::Error { ref message } if message.contains("Unknown tool")));
        assert!(roster.is_empty());
    }

    #[test]
    fn decode_rejects_wrong_types_and_empty_values() {
        let cases = [
            (json!({"name": "", "department": "Sales", "role": "Rep", "salary": 500000}), "name"),
            (json!({"name": "A", "department": "Space", "role": "Rep", "salary": 500000}), "department"),
            (json!({"name": "A", "department": "Sales", "role": 7, "salary": 500000}), "role"),
            (json!({"name": "A", "department": "Sales", "role": "Rep", "salary": "500000"}), "salary"),
            (json!({"name": "A", "department": "Sales", "role": "Rep", "salary": 0}), "salary"),
            (json!({"name": "A", "department": "Sales", "role": "Rep", "salary": -10}), "salary"),
        ];

        for (args, expected_field) in cases {
            let error = ToolRequest::decode(&ToolCall::new(ADD_EMPLOYEE, args.clone()))
                .expect_err("invalid args");
            assert!(
                matches!(error, ToolCallError::Validation { field, .. } if field == expected_field),
                "{args} should fail on {expected_field}, got {error:?}"
            );
        }
    }

    #[test]
    fn decode_accepts_case_insensitive_department_and_fractional_salary() {
        let call = ToolCall::new(
            ADD_EMPLOYEE,
            json!({"name": " Kiran Das ", "department": "research & development", "role": "Scientist", "salary": 1250000.5}),
        );

        let ToolRequest::AddEmployee(request) = ToolRequest::decode(&call).expect("valid");
        assert_eq!(request.name, "Kiran Das");
        assert_eq!(request.department, Department::ResearchAndDevelopment);
        assert_eq!(request.salary, Decimal::new(12_500_005, 1));
    }

    #[test]
    fn declaration_lists_every_department_and_required_field() {
        let roster = Arc::new(RosterStore::new());
        let declarations = ToolRegistry::for_roster(roster).declarations();

        assert_eq!(declarations.len(), 1);
        let parameters = &declarations[0].parameters;
        assert_eq!(parameters["required"], json!(["name", "department", "role", "salary"]));
        assert_eq!(parameters["properties"]["department"]["enum"].as_array().map(Vec::len), Some(15));
        assert_eq!(parameters["properties"]["salary"]["type"], "number");
    }

    #[test]
    fn error_results_serialize_with_status_tag() {
        let result: ToolExecutionResult =
            ToolCallError::UnknownTool { name: "delete_employee".to_string() }.into();
        let json = serde_json::to_value(&result).expect("serialize");

        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "Unknown tool \"delete_employee\" requested by the analyst.");
    }
}
