//! Operator semantics shared by the evaluator and the VM.
//!
//! Arithmetic on two integers stays integer (with wrapping overflow); any mix
//! with a float promotes both sides to float, including `%`. String `+`
//! concatenates. `&&`/`||` combine the truthiness of two already-evaluated
//! operands. Equality on mismatched or heap types is identity.

use std::rc::Rc;

use super::{RuntimeError, Value};

pub fn binary_op(operator: &str, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    // Logic operators are type-independent: both operands are already
    // evaluated, only their truthiness matters.
    match operator {
        "&&" => return Ok(Value::Boolean(left.is_truthy() && right.is_truthy())),
        "||" => return Ok(Value::Boolean(left.is_truthy() || right.is_truthy())),
        _ => {}
    }

    match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => integer_op(operator, *l, *r),
        (Value::Float(l), Value::Float(r)) => float_op(operator, *l, *r),
        (Value::Float(l), Value::Integer(r)) => float_op(operator, *l, *r as f64),
        (Value::Integer(l), Value::Float(r)) => float_op(operator, *l as f64, *r),
        (Value::String(l), Value::String(r)) => string_op(operator, l, r),
        _ => match operator {
            "==" => Ok(Value::Boolean(value_eq(left, right))),
            "!=" => Ok(Value::Boolean(!value_eq(left, right))),
            _ => Err(unknown_infix(operator, left, right)),
        },
    }
}

pub fn prefix_op(operator: &str, right: &Value) -> Result<Value, RuntimeError> {
    match operator {
        "!" => Ok(Value::Boolean(!right.is_truthy())),
        "-" => match right {
            Value::Integer(value) => Ok(Value::Integer(value.wrapping_neg())),
            Value::Float(value) => Ok(Value::Float(-value)),
            _ => Err(RuntimeError::new(format!(
                "unknown operator: -{}",
                right.inspect()
            ))),
        },
        _ => Err(RuntimeError::new(format!(
            "unknown operator: {operator}{}",
            right.inspect()
        ))),
    }
}

fn integer_op(operator: &str, left: i64, right: i64) -> Result<Value, RuntimeError> {
    let value = match operator {
        "<" => return Ok(Value::Boolean(left < right)),
        "<=" => return Ok(Value::Boolean(left <= right)),
        ">" => return Ok(Value::Boolean(left > right)),
        ">=" => return Ok(Value::Boolean(left >= right)),
        "==" => return Ok(Value::Boolean(left == right)),
        "!=" => return Ok(Value::Boolean(left != right)),
        "+" => left.wrapping_add(right),
        "-" => left.wrapping_sub(right),
        "*" => left.wrapping_mul(right),
        "/" => {
            if right == 0 {
                return Err(RuntimeError::new("division by zero"));
            }
            left.wrapping_div(right)
        }
        "%" => {
            if right == 0 {
                return Err(RuntimeError::new("division by zero"));
            }
            left.wrapping_rem(right)
        }
        _ => {
            return Err(RuntimeError::new(format!(
                "unknown operator: {left} {operator} {right}"
            )))
        }
    };

    Ok(Value::Integer(value))
}

fn float_op(operator: &str, left: f64, right: f64) -> Result<Value, RuntimeError> {
    let value = match operator {
        "<" => return Ok(Value::Boolean(left < right)),
        "<=" => return Ok(Value::Boolean(left <= right)),
        ">" => return Ok(Value::Boolean(left > right)),
        ">=" => return Ok(Value::Boolean(left >= right)),
        "==" => return Ok(Value::Boolean(left == right)),
        "!=" => return Ok(Value::Boolean(left != right)),
        "+" => left + right,
        "-" => left - right,
        "*" => left * right,
        "/" => left / right,
        "%" => left % right,
        _ => {
            return Err(RuntimeError::new(format!(
                "unknown operator: {left:?} {operator} {right:?}"
            )))
        }
    };

    Ok(Value::Float(value))
}

fn string_op(operator: &str, left: &Rc<String>, right: &Rc<String>) -> Result<Value, RuntimeError> {
    match operator {
        "+" => Ok(Value::String(Rc::new(format!("{left}{right}")))),
        "==" => Ok(Value::Boolean(left == right)),
        "!=" => Ok(Value::Boolean(left != right)),
        _ => Err(RuntimeError::new(format!(
            "unknown operator: {left} {operator} {right}"
        ))),
    }
}

/// Equality: numbers by (promoted) value, strings by content, booleans and
/// nil by value, everything heap-allocated by identity.
pub fn value_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => l == r,
        (Value::Float(l), Value::Float(r)) => l == r,
        (Value::Integer(l), Value::Float(r)) => *l as f64 == *r,
        (Value::Float(l), Value::Integer(r)) => *l == *r as f64,
        (Value::Boolean(l), Value::Boolean(r)) => l == r,
        (Value::Nil, Value::Nil) => true,
        (Value::String(l), Value::String(r)) => l == r,
        (Value::Array(l), Value::Array(r)) => Rc::ptr_eq(l, r),
        (Value::Hash(l), Value::Hash(r)) => Rc::ptr_eq(l, r),
        (Value::Function(l), Value::Function(r)) => Rc::ptr_eq(l, r),
        (Value::Native(l), Value::Native(r)) => Rc::ptr_eq(&l.func, &r.func),
        (Value::Compiled(l), Value::Compiled(r)) => Rc::ptr_eq(l, r),
        _ => false,
    }
}

fn unknown_infix(operator: &str, left: &Value, right: &Value) -> RuntimeError {
    RuntimeError::new(format!(
        "unknown operator: {} {operator} {}",
        left.inspect(),
        right.inspect()
    ))
}
