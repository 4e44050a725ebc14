//! Standard-library environments, reachable with `include "math";`.

use std::rc::Rc;

use super::env::{EnvRef, Environment};
use crate::value::{NativeFunction, RuntimeError, TypeTag, Value};

pub fn is_library(path: &str) -> bool {
    path == "math"
}

pub fn build_library(path: &str) -> EnvRef {
    match path {
        "math" => math(),
        _ => unreachable!("unknown standard library {path}"),
    }
}

fn math() -> EnvRef {
    let env = Environment::new();

    {
        let mut env = env.borrow_mut();
        env.declare("pi", Value::Float(std::f64::consts::PI), true);
        env.declare("abs", float_fn("abs", f64::abs), false);
        env.declare("sqrt", float_fn("sqrt", f64::sqrt), false);
        env.declare("floor", float_fn("floor", f64::floor), false);
        env.declare("ceil", float_fn("ceil", f64::ceil), false);
    }

    env
}

fn float_fn(name: &'static str, f: fn(f64) -> f64) -> Value {
    Value::Native(NativeFunction {
        name,
        args_count: 1,
        args_types: vec![TypeTag::Float],
        func: Rc::new(move |_, _, args| match &args[0] {
            Value::Float(value) => Ok(Value::Float(f(*value))),
            other => Err(RuntimeError::new(format!(
                "argument to `{name}` must be a float, got {}",
                other.type_tag()
            ))),
        }),
    })
}
