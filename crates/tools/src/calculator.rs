//! Calculator tool: evaluates arithmetic expressions.
//!
//! Supports `+`, `-`, `*`, `/`, `^`, parentheses, and unary negation.
//! Uses a shunting-yard evaluator over two stacks. No dependencies
//! beyond std.

use async_trait::async_trait;
use maestro_core::tool::{ErrorPolicy, Tool, ToolFault, ToolInput};
use serde_json::Value;

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression. Supports +, -, *, /, ^, parentheses, and decimal numbers."
    }

    fn args_schema(&self) -> Option<Value> {
        Some(serde_json::json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "The expression to evaluate, e.g. '(2 + 3) * 4'"
                }
            },
            "required": ["expression"]
        }))
    }

    /// Evaluation errors go back to the model as observations so it can
    /// correct the expression and retry.
    fn error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::Report
    }

    async fn call(&self, input: ToolInput) -> Result<String, ToolFault> {
        let expression = match &input {
            ToolInput::Text(text) => text.clone(),
            ToolInput::Args(map) => map
                .get("expression")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolFault::new("Missing 'expression' argument"))?
                .to_owned(),
        };

        let value = evaluate(&expression).map_err(ToolFault::new)?;

        // Render integers without the trailing .0
        if value.fract() == 0.0 && value.abs() < 1e15 {
            Ok(format!("{}", value as i64))
        } else {
            Ok(format!("{value}"))
        }
    }
}

// ── Shunting-yard expression evaluator ────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Neg,
    LParen,
}

impl Op {
    fn precedence(self) -> u8 {
        match self {
            Op::Add | Op::Sub => 1,
            Op::Mul | Op::Div => 2,
            Op::Neg => 3,
            Op::Pow => 4,
            Op::LParen => 0,
        }
    }

    fn right_associative(self) -> bool {
        matches!(self, Op::Pow | Op::Neg)
    }
}

/// Evaluate an arithmetic expression string.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    let mut values: Vec<f64> = Vec::new();
    let mut ops: Vec<Op> = Vec::new();
    // Tracks whether the next token sits in operand position, which is
    // how a leading '-' is told apart from binary subtraction.
    let mut expect_operand = true;

    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let number: f64 = text
                    .parse()
                    .map_err(|_| format!("Invalid number: {text}"))?;
                values.push(number);
                expect_operand = false;
            }
            '(' => {
                ops.push(Op::LParen);
                expect_operand = true;
                i += 1;
            }
            ')' => {
                while let Some(&op) = ops.last() {
                    if op == Op::LParen {
                        break;
                    }
                    apply(ops.pop().unwrap_or(Op::LParen), &mut values)?;
                }
                if ops.pop() != Some(Op::LParen) {
                    return Err("Unbalanced parentheses".into());
                }
                expect_operand = false;
                i += 1;
            }
            '+' | '-' | '*' | '/' | '^' => {
                let op = match c {
                    '-' if expect_operand => Op::Neg,
                    '+' => Op::Add,
                    '-' => Op::Sub,
                    '*' => Op::Mul,
                    '/' => Op::Div,
                    '^' => Op::Pow,
                    _ => unreachable!(),
                };
                if op != Op::Neg && expect_operand {
                    return Err(format!("Operator '{c}' in operand position"));
                }
                while let Some(&top) = ops.last() {
                    let reduce = top != Op::LParen
                        && (top.precedence() > op.precedence()
                            || (top.precedence() == op.precedence()
                                && !op.right_associative()));
                    if !reduce {
                        break;
                    }
                    apply(ops.pop().unwrap_or(Op::LParen), &mut values)?;
                }
                ops.push(op);
                expect_operand = true;
                i += 1;
            }
            other => return Err(format!("Unexpected character: '{other}'")),
        }
    }

    if expect_operand && !values.is_empty() {
        return Err("Expression ends with an operator".into());
    }

    while let Some(op) = ops.pop() {
        if op == Op::LParen {
            return Err("Unbalanced parentheses".into());
        }
        apply(op, &mut values)?;
    }

    match values.as_slice() {
        [single] => Ok(*single),
        [] => Err("Empty expression".into()),
        _ => Err("Malformed expression".into()),
    }
}

fn apply(op: Op, values: &mut Vec<f64>) -> Result<(), String> {
    if op == Op::Neg {
        let operand = values.pop().ok_or("Missing operand")?;
        values.push(-operand);
        return Ok(());
    }

    let right = values.pop().ok_or("Missing operand")?;
    let left = values.pop().ok_or("Missing operand")?;
    let result = match op {
        Op::Add => left + right,
        Op::Sub => left - right,
        Op::Mul => left * right,
        Op::Div => {
            if right == 0.0 {
                return Err("Division by zero".into());
            }
            left / right
        }
        Op::Pow => left.powf(right),
        Op::Neg | Op::LParen => return Err("Malformed expression".into()),
    };
    values.push(result);
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────
