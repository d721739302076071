//! Calculator tool: one arithmetic operation on two operands.
//!
//! Each operation maps to an explicit arithmetic operator; nothing the model
//! sends is ever evaluated as an expression. Bad input comes back as an
//! `{"error": ...}` object so the model can explain it to the user.

use async_trait::async_trait;
use serde_json::{Value, json};
use toolchat_core::error::ToolError;
use toolchat_core::tool::{Tool, ToolResult};

pub struct CalculatorTool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Sub,
    Mul,
    Div,
}

impl Operation {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "add" => Some(Self::Add),
            "sub" => Some(Self::Sub),
            "mul" => Some(Self::Mul),
            "div" => Some(Self::Div),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
        }
    }

    /// Apply the operation. Division by zero and non-finite results are errors.
    pub fn apply(&self, a: f64, b: f64) -> Result<f64, String> {
        let result = match self {
            Self::Add => a + b,
            Self::Sub => a - b,
            Self::Mul => a * b,
            Self::Div => {
                if b == 0.0 {
                    return Err("Division by zero is not allowed".into());
                }
                a / b
            }
        };
        if result.is_finite() {
            Ok(result)
        } else {
            Err(format!("Result of {} is not a finite number", self.as_str()))
        }
    }
}

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Perform a basic arithmetic operation on two numbers. Supported operations: add, sub, mul, div"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "first_operand": {
                    "type": "number",
                    "description": "The left-hand operand"
                },
                "second_operand": {
                    "type": "number",
                    "description": "The right-hand operand"
                },
                "operation": {
                    "type": "string",
                    "enum": ["add", "sub", "mul", "div"],
                    "description": "The operation to apply"
                }
            },
            "required": ["first_operand", "second_operand", "operation"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let first = match operand(&arguments, "first_operand", "first_num") {
            Ok(v) => v,
            Err(e) => return Ok(error_object(e)),
        };
        let second = match operand(&arguments, "second_operand", "second_num") {
            Ok(v) => v,
            Err(e) => return Ok(error_object(e)),
        };
        let Some(op_name) = arguments.get("operation").and_then(Value::as_str) else {
            return Ok(error_object("Missing 'operation' argument".into()));
        };
        let Some(operation) = Operation::parse(op_name) else {
            return Ok(error_object(format!("Unsupported operation '{op_name}'")));
        };

        match operation.apply(first, second) {
            Ok(result) => Ok(ToolResult::structured(json!({
                "first_operand": first,
                "second_operand": second,
                "operation": operation.as_str(),
                "result": result,
            }))),
            Err(e) => Ok(error_object(e)),
        }
    }
}

fn error_object(message: String) -> ToolResult {
    ToolResult::structured_failure(json!({ "error": message }))
}

/// Read an operand under its name or legacy alias. Numeric strings are accepted.
fn operand(arguments: &Value, key: &str, alias: &str) -> Result<f64, String> {
    let value = arguments
        .get(key)
        .or_else(|| arguments.get(alias))
        .ok_or_else(|| format!("Missing '{key}' argument"))?;
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("'{key}' is not a representable number")),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("'{key}' is not a number: '{s}'")),
        other => Err(format!("'{key}' must be a number, got {other}")),
    }
}
